//! CLI module for rustible-ios
//!
//! This module provides the command-line interface: argument parsing,
//! output formatting, and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rustible-ios - declarative Cisco IOS resource modules
///
/// Computes the commands that converge a device onto a desired
/// configuration, against a running-configuration snapshot.
#[derive(Parser, Debug, Clone)]
#[command(name = "rustible-ios")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "Declarative Cisco IOS resource modules", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Path to configuration file
    #[arg(short = 'c', long = "config-file", global = true, env = "RUSTIBLE_IOS_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Invalid output format '{}'. Valid options: human, json, yaml",
                s
            )),
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the available resource modules
    List(commands::list::ListArgs),

    /// Run a resource module
    Run(commands::run::RunArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["rustible-ios", "run", "ios_acls", "--state", "rendered"])
            .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.module, "ios_acls");
                assert_eq!(args.state.as_deref(), Some("rendered"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["rustible-ios", "-vvvv", "list"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_output_format() {
        let cli = Cli::try_parse_from(["rustible-ios", "--output", "yaml", "list"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Yaml));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
