//! Cisco IOS HSRP Interfaces
//!
//! Manages Hot Standby Router Protocol settings per interface: the
//! interface-wide `standby` options and each standby group with its virtual
//! addresses, priority, preemption, timers, authentication and tracking.
//!
//! `standby version` is always rendered before any group command, since
//! group numbers above 255 only exist in version 2.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Configure HSRP on Vlan70
//!   ios_hsrp_interfaces:
//!     state: merged
//!     config:
//!       - name: Vlan70
//!         version: 2
//!         standby_groups:
//!           - group_no: 10
//!             ip:
//!               - virtual_ip: 10.0.10.1
//!             priority: 110
//!             preempt:
//!               minimum: 100
//! ```

use super::common::keyword;
use crate::resource::tree::scalar_text;
use crate::resource::{
    canonicalize, FieldRule, Grammar, Level, Parser, ResourceModel, Rule, Scope, SetKind,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar {
    name: "ios_hsrp_interfaces",
    show_command: "show running-config | section ^interface",
    list_field: Some("config"),
    root: Level::root().grouping().child(
        Level::list("config")
            .key(&["name"])
            .drop_bare()
            .header(|s| s.text("name").map(|name| format!("interface {name}")))
            .rule(FieldRule::value("version", "standby version").unset_line("no standby version"))
            .rule(FieldRule::flag("bfd", "standby bfd"))
            .rule(
                FieldRule::line("delay", |value, _| {
                    let mut line = "standby delay".to_string();
                    push_option(&mut line, value, "minimum", "minimum");
                    push_option(&mut line, value, "reload", "reload");
                    Some(line)
                })
                .unset_line("no standby delay"),
            )
            .rule(FieldRule::value("mac_refresh", "standby mac-refresh").unset_line("no standby mac-refresh"))
            .rule(
                FieldRule::line("use_bia", |value, _| {
                    let scoped = value.pointer("/scope/interface") == Some(&Value::Bool(true));
                    Some(if scoped {
                        "standby use-bia scope interface".to_string()
                    } else {
                        "standby use-bia".to_string()
                    })
                })
                .unset_line("no standby use-bia"),
            )
            .child(groups()),
    ),
    parser: parser(),
    canonical: canonicalize::<Vec<HsrpInterface>>,
});

fn groups() -> Level {
    Level::list("standby_groups")
        .key(&["group_no"])
        .set("ipv6.addresses", SetKind::Plain)
        .removal(|s| vec![format!("no standby {}", group(s))])
        .rule(group_value("priority", "priority"))
        .rule(
            FieldRule::line("preempt", preempt_line)
                .unset(|_, scope| vec![format!("no standby {} preempt", group(scope))])
                .clear_on_change(|old, new, scope| {
                    let dropped = ["minimum", "reload", "sync"]
                        .iter()
                        .any(|f| old.get(f).is_some() && new.get(f).is_none());
                    if dropped {
                        vec![format!("no standby {} preempt", group(scope))]
                    } else {
                        Vec::new()
                    }
                }),
        )
        .rule(
            FieldRule::line("timers", |value, scope| {
                let hello = scalar_text(value.get("hello_interval")?);
                let hold = scalar_text(value.get("hold_time")?);
                Some(if value.get("msec") == Some(&Value::Bool(true)) {
                    format!("standby {} timers msec {hello} msec {hold}", group(scope))
                } else {
                    format!("standby {} timers {hello} {hold}", group(scope))
                })
            })
            .unset(|_, scope| vec![format!("no standby {} timers", group(scope))]),
        )
        .rule(
            FieldRule::line("authentication", |value, scope| {
                let prefix = format!("standby {} authentication", group(scope));
                if let Some(chain) = value.get("key_chain") {
                    return Some(format!("{prefix} md5 key-chain {}", scalar_text(chain)));
                }
                if let Some(key) = value.get("key_string") {
                    return Some(match value.get("encryption") {
                        Some(encryption) => format!(
                            "{prefix} md5 key-string {} {}",
                            scalar_text(encryption),
                            scalar_text(key)
                        ),
                        None => format!("{prefix} md5 key-string {}", scalar_text(key)),
                    });
                }
                value
                    .get("password_text")
                    .map(|text| format!("{prefix} text {}", scalar_text(text)))
            })
            .unset(|_, scope| vec![format!("no standby {} authentication", group(scope))]),
        )
        .rule(group_value("name", "name"))
        .rule(group_value("mac_address", "mac-address"))
        .rule(group_value("follow", "follow"))
        .rule(FieldRule::line("ipv6.autoconfig", |value, scope| {
            (value == &Value::Bool(true)).then(|| format!("standby {} ipv6 autoconfig", group(scope)))
        }))
        .rule(
            FieldRule::new("ipv6.addresses", |value, scope| {
                addresses(value)
                    .map(|a| format!("standby {} ipv6 {a}", group(scope)))
                    .collect()
            })
            .on_change(|old, new, scope| {
                let old: Vec<_> = addresses(old).collect();
                let new: Vec<_> = addresses(new).collect();
                old.iter()
                    .filter(|a| !new.contains(a))
                    .map(|a| format!("no standby {} ipv6 {a}", group(scope)))
                    .chain(
                        new.iter()
                            .filter(|a| !old.contains(a))
                            .map(|a| format!("standby {} ipv6 {a}", group(scope))),
                    )
                    .collect()
            }),
        )
        .child(
            Level::list("ip")
                .key(&["virtual_ip"])
                .atomic()
                .rule(FieldRule::line("", |value, scope| {
                    let address = scalar_text(value.get("virtual_ip")?);
                    let group = scope.parent_text("group_no")?;
                    Some(if value.get("secondary") == Some(&Value::Bool(true)) {
                        format!("standby {group} ip {address} secondary")
                    } else {
                        format!("standby {group} ip {address}")
                    })
                })),
        )
        .child(
            Level::list("track")
                .key(&["track_no"])
                .atomic()
                .removal(|s| {
                    vec![format!(
                        "no standby {} track {}",
                        s.parent_text("group_no").unwrap_or_default(),
                        s.text("track_no").unwrap_or_default()
                    )]
                })
                .rule(FieldRule::line("", |value, scope| {
                    let mut line = format!(
                        "standby {} track {}",
                        scope.parent_text("group_no")?,
                        scalar_text(value.get("track_no")?)
                    );
                    push_option(&mut line, value, "decrement", "decrement");
                    if value.get("shutdown") == Some(&Value::Bool(true)) {
                        line.push_str(" shutdown");
                    }
                    Some(line)
                })),
        )
}

fn group(scope: &Scope<'_>) -> String {
    scope.text("group_no").unwrap_or_default()
}

/// `standby <group> <keyword> <value>`
fn group_value(path: &'static str, keyword: &'static str) -> FieldRule {
    FieldRule::line(path, move |value, scope| {
        Some(format!("standby {} {} {}", group(scope), keyword, scalar_text(value)))
    })
    .unset(move |_, scope| vec![format!("no standby {} {}", group(scope), keyword)])
}

fn preempt_line(value: &Value, scope: &Scope<'_>) -> Option<String> {
    let mut line = format!("standby {} preempt", group(scope));
    if ["minimum", "reload", "sync"].iter().any(|f| value.get(f).is_some()) {
        line.push_str(" delay");
        push_option(&mut line, value, "minimum", "minimum");
        push_option(&mut line, value, "reload", "reload");
        push_option(&mut line, value, "sync", "sync");
    }
    Some(line)
}

fn push_option(line: &mut String, value: &Value, field: &str, keyword: &str) {
    if let Some(v) = value.get(field) {
        line.push_str(&format!(" {} {}", keyword, scalar_text(v)));
    }
}

fn addresses(value: &Value) -> impl Iterator<Item = String> + '_ {
    value.as_array().into_iter().flatten().map(scalar_text)
}

// ============================================================================
// Model
// ============================================================================

/// HSRP settings of one interface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HsrpInterface {
    pub name: String,
    #[serde(default)]
    pub version: Option<u8>,
    #[serde(default)]
    pub bfd: Option<bool>,
    #[serde(default)]
    pub delay: Option<Delay>,
    #[serde(default)]
    pub mac_refresh: Option<u32>,
    #[serde(default)]
    pub use_bia: Option<UseBia>,
    #[serde(default)]
    pub standby_groups: Vec<StandbyGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Delay {
    #[serde(default)]
    pub minimum: Option<u32>,
    #[serde(default)]
    pub reload: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseBia {
    #[serde(default)]
    pub set: Option<bool>,
    #[serde(default)]
    pub scope: Option<UseBiaScope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseBiaScope {
    #[serde(default)]
    pub interface: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandbyGroup {
    pub group_no: u32,
    #[serde(default)]
    pub ip: Vec<VirtualIp>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub preempt: Option<Preempt>,
    #[serde(default)]
    pub timers: Option<Timers>,
    #[serde(default)]
    pub authentication: Option<Authentication>,
    #[serde(default)]
    pub track: Vec<Track>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub follow: Option<String>,
    #[serde(default)]
    pub ipv6: Option<Ipv6>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualIp {
    pub virtual_ip: String,
    #[serde(default)]
    pub secondary: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preempt {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub minimum: Option<u32>,
    #[serde(default)]
    pub reload: Option<u32>,
    #[serde(default)]
    pub sync: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timers {
    pub hello_interval: u32,
    pub hold_time: u32,
    #[serde(default)]
    pub msec: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Authentication {
    #[serde(default)]
    pub key_chain: Option<String>,
    #[serde(default)]
    pub key_string: Option<String>,
    #[serde(default)]
    pub encryption: Option<u8>,
    #[serde(default)]
    pub password_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Track {
    pub track_no: u32,
    #[serde(default)]
    pub decrement: Option<u32>,
    #[serde(default)]
    pub shutdown: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ipv6 {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub autoconfig: Option<bool>,
}

impl ResourceModel for HsrpInterface {
    fn normalize(&mut self) -> Result<(), String> {
        if let Some(version) = self.version {
            if version != 1 && version != 2 {
                return Err(format!("{}: HSRP version must be 1 or 2", self.name));
            }
        }
        keyword(&mut self.bfd);
        if let Some(bia) = &mut self.use_bia {
            if let Some(scope) = &mut bia.scope {
                keyword(&mut scope.interface);
            }
            if bia.scope.as_ref().is_some_and(|s| s.interface.is_some()) {
                bia.set = Some(true);
            }
            keyword(&mut bia.set);
            if bia.set.is_none() {
                self.use_bia = None;
            }
        }

        let max_group = if self.version == Some(2) { 4095 } else { 255 };
        for group in &mut self.standby_groups {
            if group.group_no > max_group {
                return Err(format!(
                    "{}: standby group {} requires HSRP version 2",
                    self.name, group.group_no
                ));
            }
            for ip in &mut group.ip {
                keyword(&mut ip.secondary);
            }
            for track in &mut group.track {
                keyword(&mut track.shutdown);
            }
            if let Some(preempt) = &mut group.preempt {
                if preempt.minimum.is_some() || preempt.reload.is_some() || preempt.sync.is_some() {
                    preempt.enabled = Some(true);
                }
                keyword(&mut preempt.enabled);
                if preempt.enabled.is_none() {
                    group.preempt = None;
                }
            }
            if let Some(timers) = &mut group.timers {
                keyword(&mut timers.msec);
            }
            if let Some(auth) = &group.authentication {
                let given = [
                    auth.key_chain.is_some(),
                    auth.key_string.is_some(),
                    auth.password_text.is_some(),
                ]
                .iter()
                .filter(|given| **given)
                .count();
                if given != 1 {
                    return Err(format!(
                        "{}: standby group {} authentication takes exactly one of key_chain, key_string, password_text",
                        self.name, group.group_no
                    ));
                }
            }
            if let Some(ipv6) = &mut group.ipv6 {
                keyword(&mut ipv6.autoconfig);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parser() -> Parser {
    let groups = &["config", "standby_groups"];
    Parser::new()
        .rule(
            Rule::open("interface", r"^interface (?P<name>\S+)$", &["config"])
                .top_level()
                .str("name", "name"),
        )
        .rule(Rule::fields("version", r"^standby version (?P<v>[12])$", 1).int("v", "version"))
        .rule(Rule::fields("bfd", r"^standby bfd$", 1).constant("bfd", json!(true)))
        .rule(
            Rule::fields(
                "delay",
                r"^standby delay(?: minimum (?P<min>\d+))?(?: reload (?P<reload>\d+))?$",
                1,
            )
            .int("min", "delay.minimum")
            .int("reload", "delay.reload"),
        )
        .rule(Rule::fields("mac_refresh", r"^standby mac-refresh (?P<v>\d+)$", 1).int("v", "mac_refresh"))
        .rule(
            Rule::fields("use_bia", r"^standby use-bia(?P<scope> scope interface)?$", 1)
                .constant("use_bia.set", json!(true))
                .flag("scope", "use_bia.scope.interface"),
        )
        .rule(
            Rule::open(
                "virtual_ip",
                r"^standby (?P<group>\d+) ip (?P<ip>\S+)(?P<secondary> secondary)?$",
                &["config", "standby_groups", "ip"],
            )
            .at(2)
            .int("group", "group_no")
            .at(3)
            .str("ip", "virtual_ip")
            .flag("secondary", "secondary"),
        )
        .rule(
            Rule::open(
                "track",
                r"^standby (?P<group>\d+) track (?P<track>\d+)(?: decrement (?P<decrement>\d+))?(?P<shutdown> shutdown)?$",
                &["config", "standby_groups", "track"],
            )
            .at(2)
            .int("group", "group_no")
            .at(3)
            .int("track", "track_no")
            .int("decrement", "decrement")
            .flag("shutdown", "shutdown"),
        )
        .rule(
            Rule::open("priority", r"^standby (?P<group>\d+) priority (?P<v>\d+)$", groups)
                .int("group", "group_no")
                .int("v", "priority"),
        )
        .rule(
            Rule::open(
                "preempt",
                r"^standby (?P<group>\d+) preempt(?: delay(?: minimum (?P<min>\d+))?(?: reload (?P<reload>\d+))?(?: sync (?P<sync>\d+))?)?$",
                groups,
            )
            .int("group", "group_no")
            .constant("preempt.enabled", json!(true))
            .int("min", "preempt.minimum")
            .int("reload", "preempt.reload")
            .int("sync", "preempt.sync"),
        )
        .rule(
            Rule::open(
                "timers",
                r"^standby (?P<group>\d+) timers (?P<msec>msec )?(?P<hello>\d+) (?:msec )?(?P<hold>\d+)$",
                groups,
            )
            .int("group", "group_no")
            .flag("msec", "timers.msec")
            .int("hello", "timers.hello_interval")
            .int("hold", "timers.hold_time"),
        )
        .rule(
            Rule::open(
                "auth_key_chain",
                r"^standby (?P<group>\d+) authentication md5 key-chain (?P<chain>\S+)$",
                groups,
            )
            .int("group", "group_no")
            .str("chain", "authentication.key_chain"),
        )
        .rule(
            Rule::open(
                "auth_key_string",
                r"^standby (?P<group>\d+) authentication md5 key-string (?:(?P<enc>[07]) )?(?P<key>\S+)(?: timeout \d+)?$",
                groups,
            )
            .int("group", "group_no")
            .int("enc", "authentication.encryption")
            .str("key", "authentication.key_string"),
        )
        .rule(
            Rule::open(
                "auth_text",
                r"^standby (?P<group>\d+) authentication (?:text )?(?P<text>\S+)$",
                groups,
            )
            .int("group", "group_no")
            .str("text", "authentication.password_text"),
        )
        .rule(
            Rule::open("name", r"^standby (?P<group>\d+) name (?P<v>\S+)$", groups)
                .int("group", "group_no")
                .str("v", "name"),
        )
        .rule(
            Rule::open("mac_address", r"^standby (?P<group>\d+) mac-address (?P<v>\S+)$", groups)
                .int("group", "group_no")
                .str("v", "mac_address"),
        )
        .rule(
            Rule::open("follow", r"^standby (?P<group>\d+) follow (?P<v>\S+)$", groups)
                .int("group", "group_no")
                .str("v", "follow"),
        )
        .rule(
            Rule::open("ipv6_autoconfig", r"^standby (?P<group>\d+) ipv6 autoconfig$", groups)
                .int("group", "group_no")
                .constant("ipv6.autoconfig", json!(true)),
        )
        .rule(
            Rule::open("ipv6_address", r"^standby (?P<group>\d+) ipv6 (?P<v>\S+)$", groups)
                .int("group", "group_no")
                .words("v", "ipv6.addresses"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::network::resource::ResourceModule;
    use crate::resource::{diff, render, Policy};
    use pretty_assertions::assert_eq;

    fn module() -> ResourceModule {
        ResourceModule::new(&GRAMMAR, "test")
    }

    const RUNNING: &str = "\
interface GigabitEthernet0/1
 description uplink
interface Vlan70
 standby version 2
 standby bfd
 standby 10 ip 10.0.10.1
 standby 10 ip 10.0.10.2 secondary
 standby 10 timers msec 250 msec 750
 standby 10 priority 110
 standby 10 preempt delay minimum 100 reload 50
 standby 10 authentication md5 key-chain HSRP_KEYS
 standby 10 name GRP10
 standby 10 track 1 decrement 20
 standby 10 ipv6 2001:db8::1/64
 standby 10 ipv6 2001:db8:1::1/64
";

    #[test]
    fn test_parse_facts() {
        let facts = module().parse_facts(RUNNING).unwrap();
        assert_eq!(
            GRAMMAR.unwrap(&facts),
            json!([{
                "name": "Vlan70",
                "version": 2,
                "bfd": true,
                "standby_groups": [{
                    "group_no": 10,
                    "ip": [
                        {"virtual_ip": "10.0.10.1"},
                        {"virtual_ip": "10.0.10.2", "secondary": true}
                    ],
                    "timers": {"hello_interval": 250, "hold_time": 750, "msec": true},
                    "priority": 110,
                    "preempt": {"enabled": true, "minimum": 100, "reload": 50},
                    "authentication": {"key_chain": "HSRP_KEYS"},
                    "name": "GRP10",
                    "track": [{"track_no": 1, "decrement": 20}],
                    "ipv6": {"addresses": ["2001:db8:1::1/64", "2001:db8::1/64"]}
                }]
            }])
        );
    }

    #[test]
    fn test_version_precedes_groups() {
        let want = module()
            .desired(Some(&json!([{
                "name": "Vlan80",
                "version": 2,
                "standby_groups": [{"group_no": 300, "ip": [{"virtual_ip": "10.0.80.1"}], "priority": 120}]
            }])))
            .unwrap()
            .unwrap();
        assert_eq!(
            module().render_config(&want).unwrap(),
            vec![
                "interface Vlan80",
                "standby version 2",
                "standby 300 priority 120",
                "standby 300 ip 10.0.80.1",
            ]
        );
    }

    #[test]
    fn test_replaced_group_changes() {
        let module = module();
        let have = module.parse_facts(RUNNING).unwrap();
        let want = module
            .desired(Some(&json!([{
                "name": "Vlan70",
                "version": 2,
                "bfd": true,
                "standby_groups": [{
                    "group_no": 10,
                    "ip": [{"virtual_ip": "10.0.10.1"}],
                    "priority": 120,
                    "preempt": {"enabled": true}
                }]
            }])))
            .unwrap()
            .unwrap();
        let plan = diff(&have, Some(&want), &GRAMMAR.root, Policy::Replace).unwrap().unwrap();
        assert_eq!(
            render(&GRAMMAR, &plan).unwrap(),
            vec![
                "interface Vlan70",
                "no standby 10 preempt",
                "no standby 10 timers",
                "no standby 10 authentication",
                "no standby 10 name",
                "no standby 10 ipv6 2001:db8:1::1/64",
                "no standby 10 ipv6 2001:db8::1/64",
                "no standby 10 ip 10.0.10.2 secondary",
                "no standby 10 track 1",
                "standby 10 priority 120",
                "standby 10 preempt",
            ]
        );
    }

    #[test]
    fn test_group_number_needs_version_2() {
        let err = module()
            .desired(Some(&json!([{"name": "Vlan80", "standby_groups": [{"group_no": 300}]}])))
            .unwrap_err();
        assert!(err.to_string().contains("requires HSRP version 2"));
    }
}
