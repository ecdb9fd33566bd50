//! Cisco IOS SNMP Server
//!
//! Manages the global `snmp-server` configuration: system contact and
//! location, trap and inform settings, enabled notifications, and the
//! communities, notification hosts, views and groups. Unlike the other
//! resources the configuration is a single object rather than a list.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Baseline SNMP
//!   ios_snmp_server:
//!     state: merged
//!     config:
//!       contact: noc@example.net
//!       location: rack 12
//!       communities:
//!         - name: monitor
//!           access: ro
//!           acl_v4: 10
//!       traps: [bgp, ospf]
//! ```

use super::common::{keyword, opt_text_or_number, text_or_number};
use crate::resource::tree::scalar_text;
use crate::resource::{
    canonicalize, Coerce, FieldRule, Grammar, Level, Parser, ResourceModel, Rule, Scope, SetKind,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar {
    name: "ios_snmp_server",
    show_command: "show running-config | include snmp-server",
    list_field: None,
    root: Level::root()
        .set("traps", SetKind::Plain)
        .rule(global("contact", "snmp-server contact"))
        .rule(global("location", "snmp-server location"))
        .rule(global("chassis_id", "snmp-server chassis-id"))
        .rule(global("packet_size", "snmp-server packetsize"))
        .rule(global("trap_source", "snmp-server trap-source"))
        .rule(global("trap_timeout", "snmp-server trap-timeout"))
        .rule(FieldRule::flag("system_shutdown", "snmp-server system-shutdown"))
        .rule(FieldRule::flag("if_index", "snmp-server ifindex persist"))
        .rule(
            FieldRule::line("inform", |value, _| {
                let mut line = String::from("snmp-server inform");
                for field in ["retries", "timeout", "pending"] {
                    if let Some(v) = value.get(field) {
                        line.push_str(&format!(" {field} {}", scalar_text(v)));
                    }
                }
                Some(line)
            })
            .unset_line("no snmp-server inform"),
        )
        .rule(
            FieldRule::new("traps", |value, _| trap_lines("", value.as_array()))
                .unset(|value, _| trap_lines("no ", value.as_array()))
                .on_change(|old, new, _| {
                    let (old, new) = (items(old), items(new));
                    let removed: Vec<Value> = old.iter().filter(|t| !new.contains(t)).cloned().collect();
                    let added: Vec<Value> = new.iter().filter(|t| !old.contains(t)).cloned().collect();
                    let mut lines = trap_lines("no ", Some(&removed));
                    lines.extend(trap_lines("", Some(&added)));
                    lines
                }),
        )
        .child(
            Level::list("communities")
                .key(&["name"])
                .atomic()
                .removal(|s| vec![format!("no snmp-server community {}", s.text("name").unwrap_or_default())])
                .rule(FieldRule::line("", community_line)),
        )
        .child(
            Level::list("hosts")
                .key(&["host", "community_string"])
                .atomic()
                .set("traps", SetKind::Plain)
                .rule(FieldRule::line("", host_line)),
        )
        .child(
            Level::list("views")
                .key(&["name", "family"])
                .atomic()
                .removal(|s| {
                    vec![format!(
                        "no snmp-server view {} {}",
                        s.text("name").unwrap_or_default(),
                        s.text("family").unwrap_or_default()
                    )]
                })
                .rule(FieldRule::line("", |value, _| {
                    let kind = if value.get("excluded") == Some(&Value::Bool(true)) {
                        "excluded"
                    } else {
                        "included"
                    };
                    Some(format!(
                        "snmp-server view {} {} {kind}",
                        scalar_text(value.get("name")?),
                        scalar_text(value.get("family")?)
                    ))
                })),
        )
        .child(
            Level::list("groups")
                .key(&["group", "version"])
                .atomic()
                .removal(|s| {
                    let mut line = format!(
                        "no snmp-server group {} {}",
                        s.text("group").unwrap_or_default(),
                        s.text("version").unwrap_or_default()
                    );
                    if let Some(option) = s.text("version_option") {
                        line.push(' ');
                        line.push_str(&option);
                    }
                    vec![line]
                })
                .rule(FieldRule::line("", group_line)),
        ),
    parser: parser(),
    canonical: canonicalize::<SnmpServer>,
});

fn global(path: &'static str, prefix: &'static str) -> FieldRule {
    FieldRule::value(path, prefix).unset(move |_, _| vec![format!("no {prefix}")])
}

fn items(value: &Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

fn trap_lines(prefix: &str, traps: Option<&Vec<Value>>) -> Vec<String> {
    traps
        .into_iter()
        .flatten()
        .map(|trap| format!("{prefix}snmp-server enable traps {}", scalar_text(trap)))
        .collect()
}

fn community_line(value: &Value, _: &Scope<'_>) -> Option<String> {
    let mut line = format!("snmp-server community {}", scalar_text(value.get("name")?));
    if let Some(view) = value.get("view") {
        line.push_str(&format!(" view {}", scalar_text(view)));
    }
    if let Some(access) = value.get("access").and_then(Value::as_str) {
        line.push(' ');
        line.push_str(&access.to_uppercase());
    }
    if let Some(acl) = value.get("acl_v4") {
        line.push(' ');
        line.push_str(&scalar_text(acl));
    }
    Some(line)
}

fn host_line(value: &Value, _: &Scope<'_>) -> Option<String> {
    let mut line = format!("snmp-server host {}", scalar_text(value.get("host")?));
    if value.get("informs") == Some(&Value::Bool(true)) {
        line.push_str(" informs");
    }
    if let Some(version) = value.get("version") {
        line.push_str(&format!(" version {}", scalar_text(version)));
        if let Some(option) = value.get("version_option") {
            line.push_str(&format!(" {}", scalar_text(option)));
        }
    }
    line.push_str(&format!(" {}", scalar_text(value.get("community_string")?)));
    for trap in value.get("traps").and_then(Value::as_array).into_iter().flatten() {
        line.push_str(&format!(" {}", scalar_text(trap)));
    }
    Some(line)
}

fn group_line(value: &Value, _: &Scope<'_>) -> Option<String> {
    let mut line = format!(
        "snmp-server group {} {}",
        scalar_text(value.get("group")?),
        scalar_text(value.get("version")?)
    );
    if let Some(option) = value.get("version_option") {
        line.push_str(&format!(" {}", scalar_text(option)));
    }
    for (field, word) in [("read", "read"), ("write", "write"), ("notify", "notify"), ("acl_v4", "access")] {
        if let Some(v) = value.get(field) {
            line.push_str(&format!(" {word} {}", scalar_text(v)));
        }
    }
    Some(line)
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnmpServer {
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub chassis_id: Option<String>,
    #[serde(default)]
    pub packet_size: Option<u32>,
    #[serde(default)]
    pub trap_source: Option<String>,
    #[serde(default)]
    pub trap_timeout: Option<u32>,
    #[serde(default)]
    pub system_shutdown: Option<bool>,
    #[serde(default)]
    pub if_index: Option<bool>,
    #[serde(default)]
    pub inform: Option<Inform>,
    #[serde(default)]
    pub traps: Vec<String>,
    #[serde(default)]
    pub communities: Vec<Community>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inform {
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub pending: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Ro,
    Rw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Community {
    pub name: String,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub acl_v4: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    pub host: String,
    #[serde(deserialize_with = "text_or_number")]
    pub community_string: String,
    #[serde(default)]
    pub informs: Option<bool>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub version: Option<String>,
    #[serde(default)]
    pub version_option: Option<SecurityLevel>,
    #[serde(default)]
    pub traps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Auth,
    Noauth,
    Priv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct View {
    pub name: String,
    pub family: String,
    #[serde(default)]
    pub included: Option<bool>,
    #[serde(default)]
    pub excluded: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupVersion {
    V1,
    V2c,
    V3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    pub group: String,
    pub version: GroupVersion,
    #[serde(default)]
    pub version_option: Option<SecurityLevel>,
    #[serde(default)]
    pub read: Option<String>,
    #[serde(default)]
    pub write: Option<String>,
    #[serde(default)]
    pub notify: Option<String>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub acl_v4: Option<String>,
}

impl ResourceModel for SnmpServer {
    fn normalize(&mut self) -> Result<(), String> {
        for flag in [&mut self.system_shutdown, &mut self.if_index] {
            keyword(flag);
        }
        for host in &mut self.hosts {
            keyword(&mut host.informs);
            match host.version.as_deref() {
                None | Some("1") | Some("2c") => {
                    if host.version_option.is_some() {
                        return Err(format!(
                            "host {}: version_option requires SNMP version 3",
                            host.host
                        ));
                    }
                }
                Some("3") => {
                    if host.version_option.is_none() {
                        return Err(format!("host {}: version 3 requires version_option", host.host));
                    }
                }
                Some(other) => {
                    return Err(format!(
                        "host {}: invalid version '{}'. Valid options: 1, 2c, 3",
                        host.host, other
                    ))
                }
            }
        }
        for view in &mut self.views {
            keyword(&mut view.included);
            keyword(&mut view.excluded);
            match (view.included, view.excluded) {
                (Some(true), Some(true)) => {
                    return Err(format!(
                        "view {} {}: included and excluded are mutually exclusive",
                        view.name, view.family
                    ))
                }
                (None, None) => view.included = Some(true),
                _ => {}
            }
        }
        for group in &self.groups {
            if group.version == GroupVersion::V3 && group.version_option.is_none() {
                return Err(format!("group {}: v3 requires version_option", group.group));
            }
            if group.version != GroupVersion::V3 && group.version_option.is_some() {
                return Err(format!("group {}: version_option requires v3", group.group));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn view_kind(text: &str) -> Option<Value> {
    Some(json!({ text: true }))
}

fn parser() -> Parser {
    Parser::new()
        .rule(Rule::fields("contact", r"^snmp-server contact (?P<v>.+)$", 0).str("v", "contact"))
        .rule(Rule::fields("location", r"^snmp-server location (?P<v>.+)$", 0).str("v", "location"))
        .rule(Rule::fields("chassis_id", r"^snmp-server chassis-id (?P<v>.+)$", 0).str("v", "chassis_id"))
        .rule(Rule::fields("packet_size", r"^snmp-server packetsize (?P<v>\d+)$", 0).int("v", "packet_size"))
        .rule(Rule::fields("trap_source", r"^snmp-server trap-source (?P<v>\S+)$", 0).str("v", "trap_source"))
        .rule(Rule::fields("trap_timeout", r"^snmp-server trap-timeout (?P<v>\d+)$", 0).int("v", "trap_timeout"))
        .rule(
            Rule::fields("system_shutdown", r"^snmp-server system-shutdown$", 0)
                .constant("system_shutdown", json!(true)),
        )
        .rule(Rule::fields("if_index", r"^snmp-server ifindex persist$", 0).constant("if_index", json!(true)))
        .rule(
            Rule::fields(
                "inform",
                r"^snmp-server inform(?: retries (?P<r>\d+))?(?: timeout (?P<t>\d+))?(?: pending (?P<p>\d+))?$",
                0,
            )
            .int("r", "inform.retries")
            .int("t", "inform.timeout")
            .int("p", "inform.pending"),
        )
        .rule(
            Rule::fields("traps", r"^snmp-server enable traps (?P<v>.+)$", 0)
                .bind("v", "traps", Coerce::Append),
        )
        .rule(
            Rule::open(
                "community",
                r"^snmp-server community (?P<name>\S+)(?: view (?P<view>\S+))?(?: (?P<access>RO|RW))?(?: (?P<acl>\S+))?$",
                &["communities"],
            )
            .str("name", "name")
            .str("view", "view")
            .map("access", "access", |text| Some(json!(text.to_lowercase())))
            .str("acl", "acl_v4"),
        )
        .rule(
            Rule::open(
                "host",
                r"^snmp-server host (?P<host>\S+)(?P<informs> informs)?(?: traps)?(?: version (?P<version>1|2c|3)(?: (?P<option>auth|noauth|priv))?)? (?P<community>\S+)(?: (?P<traps>.+))?$",
                &["hosts"],
            )
            .str("host", "host")
            .flag("informs", "informs")
            .str("version", "version")
            .str("option", "version_option")
            .str("community", "community_string")
            .words("traps", "traps"),
        )
        .rule(
            Rule::open(
                "view",
                r"^snmp-server view (?P<name>\S+) (?P<family>\S+) (?P<kind>included|excluded)$",
                &["views"],
            )
            .str("name", "name")
            .str("family", "family")
            .map("kind", "", view_kind),
        )
        .rule(
            Rule::open(
                "group",
                r"^snmp-server group (?P<group>\S+) (?P<version>v1|v2c|v3)(?: (?P<option>auth|noauth|priv))?(?: read (?P<read>\S+))?(?: write (?P<write>\S+))?(?: notify (?P<notify>\S+))?(?: access (?P<acl>\S+))?$",
                &["groups"],
            )
            .str("group", "group")
            .str("version", "version")
            .str("option", "version_option")
            .str("read", "read")
            .str("write", "write")
            .str("notify", "notify")
            .str("acl", "acl_v4"),
        )
}
