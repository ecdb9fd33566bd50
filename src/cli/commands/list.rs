//! List command implementation
//!
//! Prints the available resource modules.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use rustible_ios::modules::Module;

/// Arguments for the list command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {}

impl ListArgs {
    /// Execute the list command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let items: Vec<(String, String)> = ctx
            .registry
            .names()
            .into_iter()
            .filter_map(|name| ctx.registry.get(name))
            .map(|module| (module.name().to_string(), module.description().to_string()))
            .collect();

        ctx.output.list("modules", &items);
        ctx.output.flush();
        Ok(0)
    }
}
