//! Run command - Execute a resource module
//!
//! Runs one resource module against an offline device snapshot and prints
//! the facts and commands it produces.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use rustible_ios::connection::{Connection, OfflineDevice};
use rustible_ios::modules::{ModuleContext, ModuleParams};
use rustible_ios::Error;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Resource module to run (see `rustible-ios list`)
    #[arg(required = true)]
    pub module: String,

    /// Desired state: merged, replaced, overridden, deleted, gathered, parsed, rendered
    #[arg(long, short = 's')]
    pub state: Option<String>,

    /// Desired configuration (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Configuration text to parse with --state parsed
    #[arg(long)]
    pub running_config: Option<PathBuf>,

    /// Running configuration of the device to converge
    #[arg(long)]
    pub device_config: Option<PathBuf>,

    /// Compute commands without sending them
    #[arg(long = "check")]
    pub check_mode: bool,

    /// Show a diff of the facts
    #[arg(long = "diff")]
    pub diff_mode: bool,
}

/// Read a desired configuration file; JSON is accepted as YAML.
fn read_desired(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content).map_err(|e| Error::invalid_input(path, e.to_string()).into())
}

impl RunArgs {
    /// Build the module parameters from the arguments and configuration
    fn params(&self, ctx: &CommandContext) -> Result<ModuleParams> {
        let mut params = ModuleParams::new();
        let state = self
            .state
            .clone()
            .unwrap_or_else(|| ctx.config.defaults.state.clone());
        params.insert("state".to_string(), Value::String(state));

        if let Some(path) = &self.config {
            params.insert("config".to_string(), read_desired(path)?);
        }
        if let Some(path) = &self.running_config {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read running config: {}", path.display()))?;
            params.insert("running_config".to_string(), Value::String(text));
        }
        Ok(params)
    }

    fn context(&self, ctx: &CommandContext) -> Result<(ModuleContext, Option<Arc<OfflineDevice>>)> {
        let mut context = ModuleContext::new()
            .with_check_mode(self.check_mode || ctx.config.defaults.check_mode)
            .with_diff_mode(self.diff_mode || ctx.config.defaults.diff_mode);

        let device = match &self.device_config {
            Some(path) => {
                let device = OfflineDevice::from_file(path)
                    .with_context(|| format!("Failed to load device config: {}", path.display()))?;
                Some(Arc::new(device))
            }
            None => None,
        };
        if let Some(device) = &device {
            let connection: Arc<dyn Connection> = device.clone();
            context = context.with_connection(connection);
        }
        Ok((context, device))
    }

    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if !ctx.registry.contains(&self.module) {
            let err = Error::ModuleNotFound(self.module.clone());
            ctx.output.error(&err.to_string());
            return Ok(err.exit_code());
        }

        let params = self.params(ctx)?;
        let (context, device) = self.context(ctx)?;
        debug!(module = %self.module, check_mode = context.check_mode, "Running module");

        // Modules drive the device on their own runtime.
        let registry = Arc::clone(&ctx.registry);
        let name = self.module.clone();
        let result =
            tokio::task::spawn_blocking(move || registry.execute(&name, &params, &context))
                .await
                .context("Module task panicked")?;

        if let Some(device) = &device {
            let _ = device.close().await;
            ctx.output
                .debug(&format!("{} command batches sent", device.send_count()));
        }

        match result {
            Ok(output) => {
                info!(module = %self.module, changed = output.changed, "Module finished");
                ctx.output.module_result(&self.module, &output);
                ctx.output.flush();
                Ok(0)
            }
            Err(e) => {
                let err = Error::module(self.module.clone(), e);
                ctx.output.error(&err.to_string());
                Ok(err.exit_code())
            }
        }
    }
}
