//! Rustible IOS - declarative Cisco IOS resource modules
//!
//! This is the main entry point for the rustible-ios CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use rustible_ios::config::{Config, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let loaded = Config::load(cli.config_file.as_ref());
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(cli.verbosity(), &logging);

    if cli.verbosity() >= 2 {
        eprintln!("rustible-ios v{}", VERSION);
    }

    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let mut ctx = CommandContext::new(&cli, config);

    let exit_code = match &cli.command {
        Commands::List(args) => args.execute(&mut ctx).await?,
        Commands::Run(args) => args.execute(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging from verbosity, falling back to the configured level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
