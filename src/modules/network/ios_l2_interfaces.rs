//! Cisco IOS Layer 2 Interfaces
//!
//! Manages switchport settings per interface: the port mode, the access and
//! voice VLANs, and the trunk encapsulation, native VLAN and allowed and
//! pruning VLAN lists. Trunk VLAN lists are compared as sets of ids, so
//! `10-12` and `10,11,12` are the same list, and changes are rendered as
//! `add` and `remove` edits.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Trunk towards the distribution switch
//!   ios_l2_interfaces:
//!     state: merged
//!     config:
//!       - name: GigabitEthernet0/1
//!         mode: trunk
//!         trunk:
//!           encapsulation: dot1q
//!           native_vlan: 10
//!           allowed_vlans: ["10-20", 40]
//! ```

use super::common::{check_vlan_id, check_vlan_list, VlanSpec};
use crate::resource::tree::{compress_vlans, expand_vlans, is_vlan_none, VLAN_NONE};
use crate::resource::{
    canonicalize, Coerce, Continuation, FieldRule, Grammar, Level, Parser, ResourceModel, Rule,
    SetKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar {
    name: "ios_l2_interfaces",
    show_command: "show running-config | section ^interface",
    list_field: Some("config"),
    root: Level::root().grouping().child(
        Level::list("config")
            .key(&["name"])
            .drop_bare()
            .set("trunk.allowed_vlans", SetKind::VlanRanges)
            .set("trunk.pruning_vlans", SetKind::VlanRanges)
            .header(|s| s.text("name").map(|name| format!("interface {name}")))
            .rule(
                FieldRule::value("trunk.encapsulation", "switchport trunk encapsulation")
                    .unset_line("no switchport trunk encapsulation"),
            )
            .rule(
                FieldRule::line("mode", |value, _| {
                    value
                        .as_str()
                        .and_then(Mode::from_field)
                        .map(|mode| format!("switchport mode {}", mode.keyword()))
                })
                .unset_line("no switchport mode"),
            )
            .rule(
                FieldRule::value("access.vlan", "switchport access vlan")
                    .unset_line("no switchport access vlan"),
            )
            .rule(
                FieldRule::value("voice.vlan", "switchport voice vlan")
                    .unset_line("no switchport voice vlan"),
            )
            .rule(
                FieldRule::value("trunk.native_vlan", "switchport trunk native vlan")
                    .unset_line("no switchport trunk native vlan"),
            )
            .rule(vlan_list("trunk.allowed_vlans", "switchport trunk allowed vlan"))
            .rule(vlan_list("trunk.pruning_vlans", "switchport trunk pruning vlan")),
    ),
    parser: parser(),
    canonical: canonicalize::<Vec<L2Interface>>,
});

/// A trunk VLAN list: set as a whole, edited with `add` and `remove`.
/// An empty list is the `none` keyword.
fn vlan_list(path: &'static str, command: &'static str) -> FieldRule {
    FieldRule::line(path, move |value, _| {
        let ranges = compress_vlans(&expand_vlans(value));
        if ranges.is_empty() {
            return is_vlan_none(value).then(|| format!("{command} {VLAN_NONE}"));
        }
        Some(format!("{command} {}", ranges.join(",")))
    })
    .unset(move |_, _| vec![format!("no {command}")])
    .on_change(move |old, new, _| {
        if is_vlan_none(new) {
            return vec![format!("{command} {VLAN_NONE}")];
        }
        let old = expand_vlans(old);
        let new = expand_vlans(new);
        let added = compress_vlans(&new.difference(&old).copied().collect());
        let removed = compress_vlans(&old.difference(&new).copied().collect());

        let mut lines = Vec::new();
        if !removed.is_empty() {
            lines.push(format!("{command} remove {}", removed.join(",")));
        }
        if !added.is_empty() {
            lines.push(format!("{command} add {}", added.join(",")));
        }
        lines
    })
}

// ============================================================================
// Model
// ============================================================================

/// Switchport mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Access,
    Trunk,
    DynamicAuto,
    DynamicDesirable,
    PrivateVlanHost,
    PrivateVlanPromiscuous,
    PrivateVlanTrunk,
}

impl Mode {
    const ALL: [Mode; 7] = [
        Mode::Access,
        Mode::Trunk,
        Mode::DynamicAuto,
        Mode::DynamicDesirable,
        Mode::PrivateVlanHost,
        Mode::PrivateVlanPromiscuous,
        Mode::PrivateVlanTrunk,
    ];

    /// Keywords following `switchport mode`.
    pub fn keyword(self) -> &'static str {
        match self {
            Mode::Access => "access",
            Mode::Trunk => "trunk",
            Mode::DynamicAuto => "dynamic auto",
            Mode::DynamicDesirable => "dynamic desirable",
            Mode::PrivateVlanHost => "private-vlan host",
            Mode::PrivateVlanPromiscuous => "private-vlan promiscuous",
            Mode::PrivateVlanTrunk => "private-vlan trunk",
        }
    }

    fn field(self) -> &'static str {
        match self {
            Mode::Access => "access",
            Mode::Trunk => "trunk",
            Mode::DynamicAuto => "dynamic_auto",
            Mode::DynamicDesirable => "dynamic_desirable",
            Mode::PrivateVlanHost => "private_vlan_host",
            Mode::PrivateVlanPromiscuous => "private_vlan_promiscuous",
            Mode::PrivateVlanTrunk => "private_vlan_trunk",
        }
    }

    fn from_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.field() == field)
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.keyword() == keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encapsulation {
    Dot1q,
    Isl,
    Negotiate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct L2Interface {
    pub name: String,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub access: Option<VlanRef>,
    #[serde(default)]
    pub voice: Option<VlanRef>,
    #[serde(default)]
    pub trunk: Option<Trunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VlanRef {
    pub vlan: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trunk {
    #[serde(default)]
    pub encapsulation: Option<Encapsulation>,
    #[serde(default)]
    pub native_vlan: Option<u32>,
    #[serde(default)]
    pub allowed_vlans: Vec<VlanSpec>,
    #[serde(default)]
    pub pruning_vlans: Vec<VlanSpec>,
}

impl ResourceModel for L2Interface {
    fn normalize(&mut self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("interface name must not be empty".to_string());
        }
        if let Some(access) = &self.access {
            check_vlan_id(&self.name, "access vlan", access.vlan)?;
        }
        if let Some(voice) = &self.voice {
            check_vlan_id(&self.name, "voice vlan", voice.vlan)?;
        }
        if let Some(trunk) = &self.trunk {
            if let Some(native) = trunk.native_vlan {
                check_vlan_id(&self.name, "native vlan", native)?;
            }
            check_vlan_list(&self.name, "allowed_vlans", &trunk.allowed_vlans, true)?;
            check_vlan_list(&self.name, "pruning_vlans", &trunk.pruning_vlans, true)?;
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn pattern(text: &str) -> Regex {
    Regex::new(text).unwrap_or_else(|e| panic!("Invalid continuation pattern '{}': {}", text, e))
}

fn mode_value(text: &str) -> Option<Value> {
    Mode::from_keyword(text).map(|mode| Value::String(mode.field().to_string()))
}

fn parser() -> Parser {
    Parser::new()
        .continuation(
            Continuation::new(pattern(r"^switchport trunk allowed vlan add (?P<rest>\S+)$"), ",")
                .after(pattern(r"^switchport trunk allowed vlan ")),
        )
        .continuation(
            Continuation::new(pattern(r"^switchport trunk pruning vlan add (?P<rest>\S+)$"), ",")
                .after(pattern(r"^switchport trunk pruning vlan ")),
        )
        .rule(
            Rule::open("interface", r"^interface (?P<name>\S+)$", &["config"])
                .top_level()
                .str("name", "name"),
        )
        .rule(
            Rule::fields("mode", r"^switchport mode (?P<v>.+)$", 1).map("v", "mode", mode_value),
        )
        .rule(Rule::fields("access", r"^switchport access vlan (?P<v>\d+)$", 1).int("v", "access.vlan"))
        .rule(Rule::fields("voice", r"^switchport voice vlan (?P<v>\d+)$", 1).int("v", "voice.vlan"))
        .rule(
            Rule::fields(
                "encapsulation",
                r"^switchport trunk encapsulation (?P<v>dot1q|isl|negotiate)$",
                1,
            )
            .str("v", "trunk.encapsulation"),
        )
        .rule(
            Rule::fields("native_vlan", r"^switchport trunk native vlan (?P<v>\d+)$", 1)
                .int("v", "trunk.native_vlan"),
        )
        .rule(
            Rule::fields(
                "allowed_vlans",
                r"^switchport trunk allowed vlan (?:add )?(?P<v>[\d,-]+|all|none)$",
                1,
            )
            .bind("v", "trunk.allowed_vlans", Coerce::Split(',')),
        )
        .rule(
            Rule::fields(
                "pruning_vlans",
                r"^switchport trunk pruning vlan (?:add )?(?P<v>[\d,-]+|all|none)$",
                1,
            )
            .bind("v", "trunk.pruning_vlans", Coerce::Split(',')),
        )
}
