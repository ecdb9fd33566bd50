//! Cisco IOS Route Maps
//!
//! Manages route-map entries and their `match` and `set` clauses. Entries
//! are identified by route-map name, action and sequence number; an entry
//! without a sequence number is sequence 10, as on the device.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Merge a route-map entry
//!   ios_route_maps:
//!     config:
//!       - route_map: test_1
//!         entries:
//!           - action: deny
//!             sequence: 10
//!             description: this is test
//!             continue_entry:
//!               entry_sequence: 20
//!             match:
//!               community:
//!                 name: [new_merge]
//!                 exact_match: true
//!             set:
//!               local_preference: 120
//! ```

use super::common::{keyword, text_or_number, texts_or_numbers};
use crate::resource::{
    canonicalize, FieldRule, Grammar, Level, Parser, ResourceModel, Rule, Scope, SetKind,
};
use crate::resource::tree::scalar_text;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SETS: [&str; 14] = [
    "match.as_path.acls",
    "match.community.name",
    "match.extcommunity",
    "match.interfaces",
    "match.ip.address.acls",
    "match.ip.address.prefix_lists",
    "match.ip.next_hop.acls",
    "match.ip.next_hop.prefix_lists",
    "match.ip.route_source.acls",
    "match.ip.route_source.prefix_lists",
    "match.local_preference",
    "match.route_type",
    "match.tag",
    "set.community.number",
];

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar {
    name: "ios_route_maps",
    show_command: "show running-config | section ^route-map",
    list_field: Some("config"),
    root: Level::root().grouping().child(
        Level::list("config")
            .key(&["route_map"])
            .removal(|s| vec![format!("no route-map {}", s.text("route_map").unwrap_or_default())])
            .child(entries()),
    ),
    parser: parser(),
    canonical: canonicalize::<Vec<RouteMap>>,
});

fn entries() -> Level {
    let mut level = Level::list("entries")
        .key(&["action", "sequence"])
        .creates()
        .header(entry_line)
        .removal(|s| entry_line(s).map(|line| format!("no {line}")).into_iter().collect());
    for path in SETS {
        level = level.set(path, SetKind::Plain);
    }
    level
        .rule(FieldRule::value("description", "description"))
        .rule(FieldRule::line("continue_entry", |value, _| {
            Some(match value.get("entry_sequence") {
                Some(sequence) => format!("continue {}", scalar_text(sequence)),
                None => "continue".to_string(),
            })
        }))
        .rule(words("match.as_path.acls", "match as-path"))
        .rule(
            FieldRule::line("match.community", |value, _| {
                let names = joined(value.get("name")?)?;
                Some(match value.get("exact_match") {
                    Some(Value::Bool(true)) => format!("match community {names} exact-match"),
                    _ => format!("match community {names}"),
                })
            })
            .reset_on_change(),
        )
        .rule(words("match.extcommunity", "match extcommunity"))
        .rule(words("match.interfaces", "match interface"))
        .rule(words("match.ip.address.acls", "match ip address"))
        .rule(words("match.ip.address.prefix_lists", "match ip address prefix-list"))
        .rule(words("match.ip.next_hop.acls", "match ip next-hop"))
        .rule(words("match.ip.next_hop.prefix_lists", "match ip next-hop prefix-list"))
        .rule(words("match.ip.route_source.acls", "match ip route-source"))
        .rule(words("match.ip.route_source.prefix_lists", "match ip route-source prefix-list"))
        .rule(FieldRule::value("match.ipv6.address.acl", "match ipv6 address"))
        .rule(FieldRule::value("match.ipv6.address.prefix_list", "match ipv6 address prefix-list"))
        .rule(FieldRule::value("match.ipv6.next_hop.acl", "match ipv6 next-hop"))
        .rule(FieldRule::value("match.ipv6.next_hop.prefix_list", "match ipv6 next-hop prefix-list"))
        .rule(
            FieldRule::line("match.length", |value, _| {
                Some(format!(
                    "match length {} {}",
                    scalar_text(value.get("minimum")?),
                    scalar_text(value.get("maximum")?)
                ))
            })
            .reset_on_change(),
        )
        .rule(words("match.local_preference", "match local-preference"))
        .rule(FieldRule::value("match.metric", "match metric").reset_on_change())
        .rule(FieldRule::flag("match.mpls_label", "match mpls-label"))
        .rule(words("match.route_type", "match route-type"))
        .rule(words("match.tag", "match tag"))
        .rule(
            FieldRule::line("set.as_path.prepend", |value, _| {
                match (value.get("last_as"), value.get("as_number")) {
                    (Some(last), _) => {
                        Some(format!("set as-path prepend last-as {}", scalar_text(last)))
                    }
                    (None, Some(numbers)) => {
                        Some(format!("set as-path prepend {}", joined(numbers)?))
                    }
                    (None, None) => None,
                }
            })
            .reset_on_change(),
        )
        .rule(
            FieldRule::line("set.community", |value, _| {
                if value.get("none") == Some(&Value::Bool(true)) {
                    return Some("set community none".to_string());
                }
                let numbers = joined(value.get("number")?)?;
                Some(match value.get("additive") {
                    Some(Value::Bool(true)) => format!("set community {numbers} additive"),
                    _ => format!("set community {numbers}"),
                })
            })
            .unset(|_, _| vec!["no set community".to_string()]),
        )
        .rule(
            FieldRule::line("set.dampening", |value, _| {
                let fields = [
                    "penalty_half_time",
                    "reuse_route_val",
                    "suppress_route_val",
                    "max_suppress",
                ];
                let values = fields
                    .iter()
                    .map(|field| value.get(field).map(scalar_text))
                    .collect::<Option<Vec<_>>>()?;
                Some(format!("set dampening {}", values.join(" ")))
            })
            .unset_line("no set dampening"),
        )
        .rule(FieldRule::flag("set.global", "set global"))
        .rule(words("set.interfaces", "set interface"))
        .rule(FieldRule::flag("set.ip.next_hop.self", "set ip next-hop self"))
        .rule(words("set.ip.next_hop.address", "set ip next-hop"))
        .rule(FieldRule::value("set.level", "set level"))
        .rule(FieldRule::value("set.local_preference", "set local-preference"))
        .rule(
            FieldRule::line("set.metric", |value, _| {
                let sign = match value.get("deviation").and_then(Value::as_str) {
                    Some("plus") => "+",
                    Some("minus") => "-",
                    _ => "",
                };
                Some(format!(
                    "set metric {sign}{}",
                    scalar_text(value.get("metric_value")?)
                ))
            })
            .unset_line("no set metric"),
        )
        .rule(FieldRule::value("set.metric_type", "set metric-type"))
        .rule(FieldRule::value("set.origin", "set origin"))
        .rule(FieldRule::value("set.tag", "set tag"))
        .rule(FieldRule::value("set.vrf", "set vrf"))
        .rule(FieldRule::value("set.weight", "set weight"))
}

/// `<prefix> <w1> <w2> ...` for a list leaf, redone whole on change.
fn words(path: &'static str, prefix: &'static str) -> FieldRule {
    FieldRule::line(path, move |value, _| Some(format!("{} {}", prefix, joined(value)?)))
        .reset_on_change()
}

fn joined(value: &Value) -> Option<String> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    Some(items.iter().map(scalar_text).collect::<Vec<_>>().join(" "))
}

fn entry_line(scope: &Scope<'_>) -> Option<String> {
    Some(format!(
        "route-map {} {} {}",
        scope.parent_text("route_map")?,
        scope.text("action")?,
        scope.text("sequence")?
    ))
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Permit,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteMap {
    #[serde(deserialize_with = "text_or_number")]
    pub route_map: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    pub action: Action,
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub continue_entry: Option<ContinueEntry>,
    #[serde(default, rename = "match")]
    pub match_clauses: Option<MatchClauses>,
    #[serde(default, rename = "set")]
    pub set_clauses: Option<SetClauses>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContinueEntry {
    #[serde(default)]
    pub set: Option<bool>,
    #[serde(default)]
    pub entry_sequence: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchClauses {
    #[serde(default)]
    pub as_path: Option<AsPathMatch>,
    #[serde(default)]
    pub community: Option<CommunityMatch>,
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub extcommunity: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub ip: Option<IpMatch>,
    #[serde(default)]
    pub ipv6: Option<Ipv6Match>,
    #[serde(default)]
    pub length: Option<Length>,
    #[serde(default)]
    pub local_preference: Vec<u32>,
    #[serde(default)]
    pub metric: Option<u32>,
    #[serde(default)]
    pub mpls_label: Option<bool>,
    #[serde(default)]
    pub route_type: Vec<String>,
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub tag: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsPathMatch {
    #[serde(default)]
    pub acls: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunityMatch {
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub name: Vec<String>,
    #[serde(default)]
    pub exact_match: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpMatch {
    #[serde(default)]
    pub address: Option<PrefixSources>,
    #[serde(default)]
    pub next_hop: Option<PrefixSources>,
    #[serde(default)]
    pub route_source: Option<PrefixSources>,
}

/// ACLs and prefix lists a match clause refers to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixSources {
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub acls: Vec<String>,
    #[serde(default)]
    pub prefix_lists: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ipv6Match {
    #[serde(default)]
    pub address: Option<Ipv6Source>,
    #[serde(default)]
    pub next_hop: Option<Ipv6Source>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ipv6Source {
    #[serde(default)]
    pub acl: Option<String>,
    #[serde(default)]
    pub prefix_list: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Length {
    pub minimum: u32,
    pub maximum: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetClauses {
    #[serde(default)]
    pub as_path: Option<AsPathSet>,
    #[serde(default)]
    pub community: Option<CommunitySet>,
    #[serde(default)]
    pub dampening: Option<Dampening>,
    #[serde(default)]
    pub global: Option<bool>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub ip: Option<IpSet>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub local_preference: Option<u32>,
    #[serde(default)]
    pub metric: Option<Metric>,
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub tag: Option<u32>,
    #[serde(default)]
    pub vrf: Option<String>,
    #[serde(default)]
    pub weight: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsPathSet {
    #[serde(default)]
    pub prepend: Option<Prepend>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Prepend {
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub as_number: Vec<String>,
    #[serde(default)]
    pub last_as: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunitySet {
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub number: Vec<String>,
    #[serde(default)]
    pub additive: Option<bool>,
    #[serde(default)]
    pub none: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dampening {
    pub penalty_half_time: u32,
    pub reuse_route_val: u32,
    pub suppress_route_val: u32,
    pub max_suppress: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpSet {
    #[serde(default)]
    pub next_hop: Option<NextHop>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NextHop {
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default, rename = "self")]
    pub own_address: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deviation {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metric {
    pub metric_value: u32,
    #[serde(default)]
    pub deviation: Option<Deviation>,
}

impl ResourceModel for RouteMap {
    fn normalize(&mut self) -> Result<(), String> {
        for entry in &mut self.entries {
            entry.sequence.get_or_insert(10);
            if let Some(next) = &mut entry.continue_entry {
                next.set = Some(true);
            }
            if let Some(clauses) = &mut entry.match_clauses {
                keyword(&mut clauses.mpls_label);
                if let Some(community) = &mut clauses.community {
                    keyword(&mut community.exact_match);
                    if community.name.is_empty() {
                        return Err(format!(
                            "route-map {} entry {}: match community requires a name",
                            self.route_map,
                            entry.sequence.unwrap_or_default()
                        ));
                    }
                }
                if let Some(length) = &clauses.length {
                    if length.minimum > length.maximum {
                        return Err(format!(
                            "route-map {}: match length minimum exceeds maximum",
                            self.route_map
                        ));
                    }
                }
            }
            if let Some(clauses) = &mut entry.set_clauses {
                keyword(&mut clauses.global);
                if let Some(community) = &mut clauses.community {
                    keyword(&mut community.additive);
                    keyword(&mut community.none);
                    if community.none.is_some() && !community.number.is_empty() {
                        return Err(format!(
                            "route-map {}: set community none excludes community numbers",
                            self.route_map
                        ));
                    }
                }
                if let Some(next_hop) = clauses.ip.as_mut().and_then(|ip| ip.next_hop.as_mut()) {
                    keyword(&mut next_hop.own_address);
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn deviation(sign: &str) -> Option<Value> {
    match sign {
        "+" => Some(json!("plus")),
        "-" => Some(json!("minus")),
        _ => None,
    }
}

fn parser() -> Parser {
    Parser::new()
        .rule(
            Rule::open(
                "route_map",
                r"^route-map (?P<name>\S+) (?P<action>permit|deny)(?: (?P<sequence>\d+))?$",
                &["config", "entries"],
            )
            .at(1)
            .str("name", "route_map")
            .at(2)
            .str("action", "action")
            .int("sequence", "sequence"),
        )
        .rule(Rule::fields("description", r"^description (?P<text>.+)$", 2).str("text", "description"))
        .rule(
            Rule::fields("continue", r"^continue(?: (?P<sequence>\d+))?$", 2)
                .constant("continue_entry.set", json!(true))
                .int("sequence", "continue_entry.entry_sequence"),
        )
        .rule(Rule::fields("match_as_path", r"^match as-path (?P<acls>.+)$", 2).ints("acls", "match.as_path.acls"))
        .rule(
            Rule::fields(
                "match_community",
                r"^match community (?P<names>.+?)(?P<exact> exact-match)?$",
                2,
            )
            .words("names", "match.community.name")
            .flag("exact", "match.community.exact_match"),
        )
        .rule(Rule::fields("match_extcommunity", r"^match extcommunity (?P<v>.+)$", 2).words("v", "match.extcommunity"))
        .rule(Rule::fields("match_interface", r"^match interface (?P<v>.+)$", 2).words("v", "match.interfaces"))
        .rule(
            Rule::fields("match_ip_address_pl", r"^match ip address prefix-list (?P<v>.+)$", 2)
                .words("v", "match.ip.address.prefix_lists"),
        )
        .rule(Rule::fields("match_ip_address", r"^match ip address (?P<v>.+)$", 2).words("v", "match.ip.address.acls"))
        .rule(
            Rule::fields("match_ip_next_hop_pl", r"^match ip next-hop prefix-list (?P<v>.+)$", 2)
                .words("v", "match.ip.next_hop.prefix_lists"),
        )
        .rule(Rule::fields("match_ip_next_hop", r"^match ip next-hop (?P<v>.+)$", 2).words("v", "match.ip.next_hop.acls"))
        .rule(
            Rule::fields("match_ip_route_source_pl", r"^match ip route-source prefix-list (?P<v>.+)$", 2)
                .words("v", "match.ip.route_source.prefix_lists"),
        )
        .rule(
            Rule::fields("match_ip_route_source", r"^match ip route-source (?P<v>.+)$", 2)
                .words("v", "match.ip.route_source.acls"),
        )
        .rule(
            Rule::fields("match_ipv6_address_pl", r"^match ipv6 address prefix-list (?P<v>\S+)$", 2)
                .str("v", "match.ipv6.address.prefix_list"),
        )
        .rule(Rule::fields("match_ipv6_address", r"^match ipv6 address (?P<v>\S+)$", 2).str("v", "match.ipv6.address.acl"))
        .rule(
            Rule::fields("match_ipv6_next_hop_pl", r"^match ipv6 next-hop prefix-list (?P<v>\S+)$", 2)
                .str("v", "match.ipv6.next_hop.prefix_list"),
        )
        .rule(Rule::fields("match_ipv6_next_hop", r"^match ipv6 next-hop (?P<v>\S+)$", 2).str("v", "match.ipv6.next_hop.acl"))
        .rule(
            Rule::fields("match_length", r"^match length (?P<min>\d+) (?P<max>\d+)$", 2)
                .int("min", "match.length.minimum")
                .int("max", "match.length.maximum"),
        )
        .rule(Rule::fields("match_local_pref", r"^match local-preference (?P<v>.+)$", 2).ints("v", "match.local_preference"))
        .rule(Rule::fields("match_metric", r"^match metric (?P<v>\d+)$", 2).int("v", "match.metric"))
        .rule(Rule::fields("match_mpls", r"^match mpls-label$", 2).constant("match.mpls_label", json!(true)))
        .rule(Rule::fields("match_route_type", r"^match route-type (?P<v>.+)$", 2).words("v", "match.route_type"))
        .rule(Rule::fields("match_tag", r"^match tag (?P<v>.+)$", 2).words("v", "match.tag"))
        .rule(
            Rule::fields("set_prepend_last_as", r"^set as-path prepend last-as (?P<n>\d+)$", 2)
                .int("n", "set.as_path.prepend.last_as"),
        )
        .rule(
            Rule::fields("set_prepend", r"^set as-path prepend (?P<v>.+)$", 2)
                .words("v", "set.as_path.prepend.as_number"),
        )
        .rule(Rule::fields("set_community_none", r"^set community none$", 2).constant("set.community.none", json!(true)))
        .rule(
            Rule::fields("set_community", r"^set community (?P<v>.+?)(?P<additive> additive)?$", 2)
                .words("v", "set.community.number")
                .flag("additive", "set.community.additive"),
        )
        .rule(
            Rule::fields(
                "set_dampening",
                r"^set dampening (?P<half>\d+) (?P<reuse>\d+) (?P<suppress>\d+) (?P<max>\d+)$",
                2,
            )
            .int("half", "set.dampening.penalty_half_time")
            .int("reuse", "set.dampening.reuse_route_val")
            .int("suppress", "set.dampening.suppress_route_val")
            .int("max", "set.dampening.max_suppress"),
        )
        .rule(Rule::fields("set_global", r"^set global$", 2).constant("set.global", json!(true)))
        .rule(Rule::fields("set_interface", r"^set interface (?P<v>.+)$", 2).words("v", "set.interfaces"))
        .rule(Rule::fields("set_next_hop_self", r"^set ip next-hop self$", 2).constant("set.ip.next_hop.self", json!(true)))
        .rule(Rule::fields("set_next_hop", r"^set ip next-hop (?P<v>.+)$", 2).words("v", "set.ip.next_hop.address"))
        .rule(Rule::fields("set_level", r"^set level (?P<v>\S+)$", 2).str("v", "set.level"))
        .rule(Rule::fields("set_local_pref", r"^set local-preference (?P<v>\d+)$", 2).int("v", "set.local_preference"))
        .rule(
            Rule::fields("set_metric", r"^set metric (?P<sign>[+-])?(?P<v>\d+)$", 2)
                .int("v", "set.metric.metric_value")
                .map("sign", "set.metric.deviation", deviation),
        )
        .rule(Rule::fields("set_metric_type", r"^set metric-type (?P<v>\S+)$", 2).str("v", "set.metric_type"))
        .rule(Rule::fields("set_origin", r"^set origin (?P<v>.+)$", 2).str("v", "set.origin"))
        .rule(Rule::fields("set_tag", r"^set tag (?P<v>\d+)$", 2).int("v", "set.tag"))
        .rule(Rule::fields("set_vrf", r"^set vrf (?P<v>\S+)$", 2).str("v", "set.vrf"))
        .rule(Rule::fields("set_weight", r"^set weight (?P<v>\d+)$", 2).int("v", "set.weight"))
}
