//! Subcommands module for rustible-ios CLI
//!
//! This module contains all the subcommand implementations.

pub mod list;
pub mod run;

use crate::cli::output::OutputFormatter;
use crate::cli::{Cli, OutputFormat};
use rustible_ios::config::Config;
use rustible_ios::modules::ModuleRegistry;
use std::sync::Arc;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Registered modules
    pub registry: Arc<ModuleRegistry>,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, config: Config) -> Self {
        let format = cli
            .output
            .or_else(|| config.output.format.parse::<OutputFormat>().ok())
            .unwrap_or_default();
        let output = OutputFormatter::new(
            !cli.no_color && config.output.colors,
            format,
            cli.verbosity(),
        );

        Self {
            config,
            output,
            registry: Arc::new(ModuleRegistry::with_builtins()),
            verbosity: cli.verbosity(),
        }
    }
}
