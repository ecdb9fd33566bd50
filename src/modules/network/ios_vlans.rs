//! Cisco IOS VLANs
//!
//! Manages VLAN definitions: name, state, MTU, RSPAN and private-VLAN roles,
//! plus the EVPN member binding that lives under `vlan configuration <id>`.
//! Member lines are grouped after the `vlan <id>` block they belong to.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Define VLANs
//!   ios_vlans:
//!     state: merged
//!     config:
//!       - vlan_id: 10
//!         name: users
//!       - vlan_id: 20
//!         name: voice
//!         member:
//!           vni: 10020
//! ```

use super::common::{check_vlan_id, check_vlan_list, keyword, VlanSpec};
use crate::resource::tree::{compress_vlans, expand_vlans, scalar_text};
use crate::resource::{
    canonicalize, Coerce, FieldRule, Grammar, Level, Parser, ResourceModel, Rule, Scope, SetKind,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar {
    name: "ios_vlans",
    show_command: "show running-config | section ^vlan",
    list_field: Some("config"),
    root: Level::root().grouping().child(
        Level::list("config")
            .key(&["vlan_id"])
            .creates()
            .set("private_vlan.associated", SetKind::VlanRanges)
            .header(|s| s.text("vlan_id").map(|id| format!("vlan {id}")))
            .removal(|s| vec![format!("no vlan {}", s.text("vlan_id").unwrap_or_default())])
            .rule(FieldRule::value("name", "name").unset_line("no name"))
            .rule(FieldRule::value("state", "state").unset_line("no state"))
            .rule(FieldRule::flag("shutdown", "shutdown"))
            .rule(FieldRule::value("mtu", "mtu").unset_line("no mtu"))
            .rule(FieldRule::flag("remote_span", "remote-span"))
            .rule(FieldRule::value("private_vlan.type", "private-vlan"))
            .rule(
                FieldRule::line("private_vlan.associated", |value, _| {
                    ranges(value).map(|r| format!("private-vlan association {r}"))
                })
                .unset_line("no private-vlan association")
                .on_change(|old, new, _| {
                    let old = expand_vlans(old);
                    let new = expand_vlans(new);
                    let added = compress_vlans(&new.difference(&old).copied().collect());
                    let removed = compress_vlans(&old.difference(&new).copied().collect());
                    let mut lines = Vec::new();
                    if !added.is_empty() {
                        lines.push(format!("private-vlan association add {}", added.join(",")));
                    }
                    if !removed.is_empty() {
                        lines.push(format!("private-vlan association remove {}", removed.join(",")));
                    }
                    lines
                }),
            )
            .rule(
                FieldRule::line("member", |value, _| {
                    let vni = scalar_text(value.get("vni")?);
                    Some(match value.get("evi") {
                        Some(evi) => format!("member evpn-instance {} vni {vni}", scalar_text(evi)),
                        None => format!("member vni {vni}"),
                    })
                })
                .reset_on_change()
                .mode(configuration_mode),
            ),
    ),
    parser: parser(),
    canonical: canonicalize::<Vec<Vlan>>,
});

fn configuration_mode(scope: &Scope<'_>) -> Option<String> {
    scope.text("vlan_id").map(|id| format!("vlan configuration {id}"))
}

fn ranges(value: &Value) -> Option<String> {
    let ranges = compress_vlans(&expand_vlans(value));
    (!ranges.is_empty()).then(|| ranges.join(","))
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VlanState {
    Active,
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivateVlanType {
    Primary,
    Isolated,
    Community,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vlan {
    pub vlan_id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<VlanState>,
    #[serde(default)]
    pub shutdown: Option<bool>,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub remote_span: Option<bool>,
    #[serde(default)]
    pub private_vlan: Option<PrivateVlan>,
    #[serde(default)]
    pub member: Option<Member>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivateVlan {
    #[serde(default, rename = "type")]
    pub kind: Option<PrivateVlanType>,
    #[serde(default)]
    pub associated: Vec<VlanSpec>,
}

/// EVPN binding under `vlan configuration <id>`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Member {
    pub vni: u32,
    #[serde(default)]
    pub evi: Option<u32>,
}

impl ResourceModel for Vlan {
    fn normalize(&mut self) -> Result<(), String> {
        check_vlan_id("vlan", "vlan_id", self.vlan_id)?;
        if self.state == Some(VlanState::Active) {
            self.state = None;
        }
        keyword(&mut self.shutdown);
        keyword(&mut self.remote_span);
        if let Some(pvlan) = &self.private_vlan {
            let owner = format!("vlan {}", self.vlan_id);
            check_vlan_list(&owner, "private_vlan.associated", &pvlan.associated, false)?;
            if !pvlan.associated.is_empty() && pvlan.kind != Some(PrivateVlanType::Primary) {
                return Err(format!(
                    "vlan {}: only a primary private VLAN takes associations",
                    self.vlan_id
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parser() -> Parser {
    Parser::new()
        .rule(Rule::open("vlan", r"^vlan (?P<id>\d+)$", &["config"]).int("id", "vlan_id"))
        .rule(
            Rule::open("vlan_configuration", r"^vlan configuration (?P<id>\d+)$", &["config"])
                .int("id", "vlan_id"),
        )
        .rule(Rule::fields("name", r"^name (?P<v>.+)$", 1).str("v", "name"))
        .rule(Rule::fields("state", r"^state (?P<v>active|suspend)$", 1).str("v", "state"))
        .rule(Rule::fields("shutdown", r"^shutdown$", 1).constant("shutdown", json!(true)))
        .rule(Rule::fields("mtu", r"^mtu (?P<v>\d+)$", 1).int("v", "mtu"))
        .rule(Rule::fields("remote_span", r"^remote-span$", 1).constant("remote_span", json!(true)))
        .rule(
            Rule::fields("pvlan_type", r"^private-vlan (?P<v>primary|isolated|community)$", 1)
                .str("v", "private_vlan.type"),
        )
        .rule(
            Rule::fields("pvlan_association", r"^private-vlan association (?:add )?(?P<v>\S+)$", 1)
                .bind("v", "private_vlan.associated", Coerce::Split(',')),
        )
        .rule(
            Rule::fields(
                "member",
                r"^member (?:evpn-instance (?P<evi>\d+) )?vni (?P<vni>\d+)$",
                1,
            )
            .int("evi", "member.evi")
            .int("vni", "member.vni"),
        )
}
