//! Common types shared by the resource modules
//!
//! This module provides:
//! - the `state` parameter and its mapping onto differ policies
//! - parameter extraction and validation
//! - facts diff generation for diff mode
//! - show-command output cleanup
//! - serde helpers shared by the resource models

use crate::modules::{Diff, ModuleError, ModuleParams, ModuleResult, ParamExt};
use crate::resource::tree::{parse_vlan_range, VLAN_ALL, VLAN_MAX, VLAN_NONE};
use crate::resource::Policy;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// State
// ============================================================================

/// Requested state of a resource module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    #[default]
    Merged,
    Replaced,
    Overridden,
    Deleted,
    Gathered,
    Parsed,
    Rendered,
}

impl ResourceState {
    pub const ALL: [ResourceState; 7] = [
        ResourceState::Merged,
        ResourceState::Replaced,
        ResourceState::Overridden,
        ResourceState::Deleted,
        ResourceState::Gathered,
        ResourceState::Parsed,
        ResourceState::Rendered,
    ];

    /// Differ policy for states that change the device
    pub fn policy(self) -> Option<Policy> {
        match self {
            ResourceState::Merged => Some(Policy::Merge),
            ResourceState::Replaced => Some(Policy::Replace),
            ResourceState::Overridden => Some(Policy::Override),
            ResourceState::Deleted => Some(Policy::Delete),
            ResourceState::Gathered | ResourceState::Parsed | ResourceState::Rendered => None,
        }
    }

    /// Whether `config` must be supplied
    pub fn requires_config(self) -> bool {
        matches!(
            self,
            ResourceState::Merged
                | ResourceState::Replaced
                | ResourceState::Overridden
                | ResourceState::Rendered
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceState::Merged => "merged",
            ResourceState::Replaced => "replaced",
            ResourceState::Overridden => "overridden",
            ResourceState::Deleted => "deleted",
            ResourceState::Gathered => "gathered",
            ResourceState::Parsed => "parsed",
            ResourceState::Rendered => "rendered",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceState {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceState::ALL
            .into_iter()
            .find(|state| state.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                ModuleError::InvalidParameter(format!(
                    "Invalid state '{}'. Valid options: merged, replaced, overridden, deleted, gathered, parsed, rendered",
                    s
                ))
            })
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Parameters common to every resource module
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceParams {
    pub state: ResourceState,
    /// Desired configuration, before validation
    pub config: Option<Value>,
    /// Configuration text to parse (`state=parsed` only)
    pub running_config: Option<String>,
}

impl ResourceParams {
    pub fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let state = match params.get_string("state")? {
            Some(s) => ResourceState::from_str(&s)?,
            None => ResourceState::Merged,
        };
        let config = params.get("config").filter(|v| !v.is_null()).cloned();
        let running_config = params.get_string("running_config")?;

        Ok(Self {
            state,
            config,
            running_config,
        })
    }

    /// Check parameter combinations for the requested state
    pub fn validate(&self) -> ModuleResult<()> {
        if self.config.is_some() && self.running_config.is_some() {
            return Err(ModuleError::InvalidParameter(
                "parameters are mutually exclusive: config, running_config".to_string(),
            ));
        }
        match self.state {
            ResourceState::Parsed if self.running_config.is_none() => Err(
                ModuleError::MissingParameter("running_config (required with state=parsed)".to_string()),
            ),
            state if state != ResourceState::Parsed && self.running_config.is_some() => {
                Err(ModuleError::InvalidParameter(format!(
                    "running_config is only valid with state=parsed, not {}",
                    state
                )))
            }
            state if state.requires_config() && self.config.is_none() => Err(
                ModuleError::MissingParameter(format!("config (required with state={})", state)),
            ),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Facts Diff
// ============================================================================

fn to_yaml(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Generate a unified diff between two facts trees rendered as YAML
pub fn generate_facts_diff(before: &Value, after: &Value) -> Diff {
    let before_text = to_yaml(before);
    let after_text = to_yaml(after);
    let text_diff = TextDiff::from_lines(&before_text, &after_text);

    let mut details = String::new();
    let mut additions = 0;
    let mut deletions = 0;

    for change in text_diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => {
                deletions += 1;
                "-"
            }
            ChangeTag::Insert => {
                additions += 1;
                "+"
            }
            ChangeTag::Equal => " ",
        };
        details.push_str(&format!("{}{}", sign, change));
    }

    Diff::new(
        format!("{} lines", before_text.lines().count()),
        format!(
            "{} lines ({} additions, {} deletions)",
            after_text.lines().count(),
            additions,
            deletions
        ),
    )
    .with_details(details)
}

// ============================================================================
// Output Cleanup
// ============================================================================

/// Strip a command echo and trailing prompt lines from show output
pub fn clean_config_output(output: &str) -> String {
    let mut lines: Vec<&str> = output.lines().collect();

    if lines.first().is_some_and(|first| first.trim_start().starts_with("show ")) {
        lines.remove(0);
    }

    while let Some(last) = lines.last().map(|line| line.trim()) {
        if last.ends_with('#') || last.ends_with('>') || last.is_empty() {
            lines.pop();
        } else {
            break;
        }
    }

    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

// ============================================================================
// Model Helpers
// ============================================================================

/// Accept a string or a number for a field the device treats as text
/// (ACL names, AS numbers, port names).
pub fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or a number, found {}",
            other
        ))),
    }
}

/// Optional form of [`text_or_number`].
pub fn opt_text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => text_or_number(value).map(Some).map_err(D::Error::custom),
    }
}

/// List form of [`text_or_number`].
pub fn texts_or_numbers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|value| text_or_number(value).map_err(D::Error::custom))
        .collect()
}

/// One element of a VLAN list: an id or a range such as `"10-20"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VlanSpec {
    Id(u32),
    Range(String),
}

/// Check a single VLAN id against 1-4094.
pub fn check_vlan_id(owner: &str, field: &str, id: u32) -> Result<(), String> {
    if (1..=VLAN_MAX).contains(&id) {
        Ok(())
    } else {
        Err(format!("{owner}: {field} {id} is outside 1-{VLAN_MAX}"))
    }
}

/// Check a VLAN list without expanding it.
///
/// Every comma part must be `N` or `N-M` within 1-4094. The keywords `all`
/// and `none` are accepted only when `allow_keywords` is set, and only as
/// the whole list.
pub fn check_vlan_list(
    owner: &str,
    field: &str,
    specs: &[VlanSpec],
    allow_keywords: bool,
) -> Result<(), String> {
    let is_keyword = |spec: &VlanSpec| {
        matches!(spec, VlanSpec::Range(text) if text.trim() == VLAN_ALL || text.trim() == VLAN_NONE)
    };
    if specs.iter().any(is_keyword) {
        if allow_keywords && specs.len() == 1 {
            return Ok(());
        }
        return Err(format!(
            "{owner}: {field} keywords '{VLAN_ALL}' and '{VLAN_NONE}' must be the only entry"
        ));
    }
    for spec in specs {
        match spec {
            VlanSpec::Id(id) => check_vlan_id(owner, field, *id)?,
            VlanSpec::Range(text) => {
                if text.trim().is_empty() {
                    return Err(format!("{owner}: {field} entry must not be empty"));
                }
                for part in text.split(',') {
                    parse_vlan_range(part)
                        .map_err(|e| format!("{owner}: invalid {field} entry '{text}': {e}"))?;
                }
            }
        }
    }
    Ok(())
}

/// `false` carries no configuration for presence keywords.
pub fn keyword(flag: &mut Option<bool>) {
    if *flag == Some(false) {
        *flag = None;
    }
}
