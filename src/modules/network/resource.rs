//! Resource module orchestration
//!
//! [`ResourceModule`] drives one grammar through the engine: it validates the
//! desired configuration, reads and parses the device configuration, diffs,
//! renders, and sends the resulting commands. Every resource module is an
//! instance of it.

use super::common::{clean_config_output, generate_facts_diff, ResourceParams, ResourceState};
use crate::connection::{Connection, ConnectionError};
use crate::modules::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult};
use crate::resource::{apply, diff, render, Grammar, Policy, Tree};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A declarative resource module backed by a grammar
pub struct ResourceModule {
    grammar: &'static Grammar,
    description: &'static str,
}

impl std::fmt::Debug for ResourceModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceModule")
            .field("name", &self.grammar.name)
            .finish()
    }
}

impl ResourceModule {
    pub fn new(grammar: &'static Grammar, description: &'static str) -> Self {
        Self {
            grammar,
            description,
        }
    }

    pub fn grammar(&self) -> &'static Grammar {
        self.grammar
    }

    /// Parse configuration text into canonical facts.
    pub fn parse_facts(&self, text: &str) -> ModuleResult<Tree> {
        let grammar = self.grammar;
        let mut facts = grammar.parser.parse(text, &grammar.root)?;
        grammar.root.drop_bare_entities(&mut facts);

        let canonical = (grammar.canonical)(grammar.unwrap(&facts)).map_err(|e| {
            ModuleError::GrammarGap(format!("{}: parsed facts rejected: {}", grammar.name, e))
        })?;
        let mut facts = grammar.wrap(canonical);
        grammar.root.normalize_sets(&mut facts);
        debug!(module = grammar.name, "Parsed facts");
        Ok(facts)
    }

    /// Validate and canonicalize caller-supplied configuration.
    pub fn desired(&self, config: Option<&Value>) -> ModuleResult<Option<Tree>> {
        let Some(config) = config else {
            return Ok(None);
        };
        let grammar = self.grammar;
        let canonical = (grammar.canonical)(config.clone()).map_err(|e| {
            ModuleError::InvalidParameter(format!("{}: invalid config: {}", grammar.name, e))
        })?;
        let mut want = grammar.wrap(canonical);
        grammar.root.normalize_sets(&mut want);
        Ok(Some(want))
    }

    /// Commands for `want` against an empty device.
    pub fn render_config(&self, want: &Tree) -> ModuleResult<Vec<String>> {
        match diff(&Tree::new(), Some(want), &self.grammar.root, Policy::Replace)? {
            Some(plan) => render(self.grammar, &plan),
            None => Ok(Vec::new()),
        }
    }

    fn device<'c>(&self, context: &'c ModuleContext) -> ModuleResult<&'c Arc<dyn Connection>> {
        context.connection.as_ref().ok_or_else(|| {
            ModuleError::Transport(ConnectionError::ConnectionFailed(format!(
                "{} requires a device connection",
                self.grammar.name
            )))
        })
    }

    async fn gather(&self, context: &ModuleContext) -> ModuleResult<Tree> {
        let device = self.device(context)?;
        let text = device
            .get_config(self.grammar.show_command)
            .await
            .inspect_err(|e| warn!(module = self.grammar.name, error = %e, "Failed to read configuration"))?;
        self.parse_facts(&clean_config_output(&text))
    }

    /// Run the module.
    pub async fn run(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let params = ResourceParams::from_params(params)?;
        params.validate()?;
        let grammar = self.grammar;
        let want = self.desired(params.config.as_ref())?;

        debug!(module = grammar.name, state = %params.state, "Running resource module");

        match params.state {
            ResourceState::Parsed => {
                let text = params.running_config.as_deref().unwrap_or_default();
                let facts = self.parse_facts(text)?;
                Ok(ModuleOutput::ok("Parsed configuration")
                    .with_data("parsed", grammar.unwrap(&facts)))
            }
            ResourceState::Rendered => {
                let commands = self.render_config(&want.unwrap_or_default())?;
                Ok(ModuleOutput::ok(format!("Rendered {} commands", commands.len()))
                    .with_data("rendered", json!(commands)))
            }
            ResourceState::Gathered => {
                let facts = self.gather(context).await?;
                Ok(ModuleOutput::ok("Gathered configuration")
                    .with_data("gathered", grammar.unwrap(&facts)))
            }
            state => {
                let policy = state.policy().ok_or_else(|| {
                    ModuleError::InvalidParameter(format!("state {} does not change the device", state))
                })?;
                let have = self.gather(context).await?;
                let plan = diff(&have, want.as_ref(), &grammar.root, policy)?;
                let commands = match &plan {
                    Some(plan) => render(grammar, plan)?,
                    None => Vec::new(),
                };
                let after = apply(&have, plan.as_ref(), &grammar.root);

                let before = grammar.unwrap(&have);
                let after = grammar.unwrap(&after);

                if !commands.is_empty() && !context.check_mode {
                    self.device(context)?.send_commands(&commands).await?;
                    info!(module = grammar.name, state = %state, count = commands.len(), "Applied commands");
                }

                let mut output = if commands.is_empty() {
                    ModuleOutput::ok("Configuration already matches")
                } else if context.check_mode {
                    ModuleOutput::changed(format!("Would apply {} commands", commands.len()))
                } else {
                    ModuleOutput::changed(format!("Applied {} commands", commands.len()))
                };
                if context.diff_mode {
                    output = output.with_diff(generate_facts_diff(&before, &after));
                }
                Ok(output
                    .with_data("before", before)
                    .with_data("after", after)
                    .with_data("commands", json!(commands)))
            }
        }
    }
}

impl Module for ResourceModule {
    fn name(&self) -> &'static str {
        self.grammar.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        ResourceParams::from_params(params)?.validate()
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(params, context))
    }
}
