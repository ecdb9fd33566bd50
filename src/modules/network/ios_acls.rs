//! Cisco IOS Access Control Lists
//!
//! Manages named and numbered IPv4 ACLs and IPv6 ACLs. Entries are grouped
//! by address family, then by ACL name, then by sequence number.
//!
//! Access control entries cannot be changed in place: an entry that already
//! exists with different content is a policy violation under `merged`, and is
//! removed and re-added under `replaced` and `overridden`.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Merge a standard ACL
//!   ios_acls:
//!     state: merged
//!     config:
//!       - afi: ipv4
//!         acls:
//!           - name: std_acl
//!             acl_type: standard
//!             aces:
//!               - grant: deny
//!                 source:
//!                   address: 192.0.2.0
//!                   wildcard_bits: 0.0.0.255
//! ```

use super::common::{keyword, opt_text_or_number, text_or_number, texts_or_numbers};
use crate::resource::{
    canonicalize, Coerce, FieldRule, Grammar, Level, Parser, ResourceModel, Rule, Scope, SetKind,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::net::Ipv4Addr;

pub static GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar {
    name: "ios_acls",
    show_command: "show running-config | section access-list",
    list_field: Some("config"),
    root: Level::root().grouping().child(
        Level::list("config").key(&["afi"]).grouping().child(
            Level::list("acls")
                .key(&["name"])
                .creates()
                .immutable(&["acl_type"])
                .set("remarks", SetKind::Ordered)
                .header(acl_header)
                .removal(|s| acl_header(s).map(|h| format!("no {h}")).into_iter().collect())
                .rule(
                    FieldRule::new("remarks", |value, _| {
                        texts(value).map(|r| format!("remark {r}")).collect()
                    })
                    .on_change(|old, new, _| {
                        // New remarks land at the end; redo everything after
                        // the common prefix.
                        let old: Vec<_> = texts(old).collect();
                        let new: Vec<_> = texts(new).collect();
                        let kept = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
                        old[kept..]
                            .iter()
                            .map(|r| format!("no remark {r}"))
                            .chain(new[kept..].iter().map(|r| format!("remark {r}")))
                            .collect()
                    }),
                )
                .child(
                    Level::list("aces")
                        .key(&["sequence"])
                        .atomic()
                        .no_update()
                        .removal(ace_removal)
                        .rule(FieldRule::line("", ace_line)),
                ),
        ),
    ),
    parser: parser(),
    canonical: canonicalize::<Vec<AclFamily>>,
});

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Afi {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclType {
    Standard,
    Extended,
}

impl AclType {
    /// Type implied by an ACL number.
    pub fn for_number(name: &str) -> Option<Self> {
        match name.parse::<u32>().ok()? {
            1..=99 | 1300..=1999 => Some(AclType::Standard),
            100..=199 | 2000..=2699 => Some(AclType::Extended),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            AclType::Standard => "standard",
            AclType::Extended => "extended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grant {
    Permit,
    Deny,
}

/// ACLs of one address family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclFamily {
    pub afi: Afi,
    #[serde(default)]
    pub acls: Vec<Acl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Acl {
    #[serde(deserialize_with = "text_or_number")]
    pub name: String,
    #[serde(default)]
    pub acl_type: Option<AclType>,
    #[serde(default)]
    pub remarks: Vec<String>,
    #[serde(default)]
    pub aces: Vec<Ace>,
}

/// One access control entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ace {
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default)]
    pub grant: Option<Grant>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub protocol: Option<String>,
    /// Protocol keywords such as `ack` or `echo`
    #[serde(default, deserialize_with = "texts_or_numbers")]
    pub protocol_options: Vec<String>,
    #[serde(default)]
    pub source: Option<Endpoint>,
    #[serde(default)]
    pub destination: Option<Endpoint>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub dscp: Option<String>,
    #[serde(default)]
    pub fragments: Option<bool>,
    #[serde(default)]
    pub log: Option<bool>,
    #[serde(default)]
    pub log_input: Option<bool>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub precedence: Option<String>,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default, deserialize_with = "opt_text_or_number")]
    pub tos: Option<String>,
    #[serde(default)]
    pub ttl: Option<PortMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Endpoint {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub wildcard_bits: Option<String>,
    #[serde(default)]
    pub any: Option<bool>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub object_group: Option<String>,
    #[serde(default)]
    pub port_protocol: Option<PortMatch>,
}

/// A port or port name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u32),
    Name(String),
}

impl Port {
    fn parse(text: &str) -> Self {
        text.parse().map(Port::Number).unwrap_or_else(|_| Port::Name(text.to_string()))
    }

    fn normalize(&mut self) {
        if let Port::Name(name) = self {
            if let Ok(number) = name.parse() {
                *self = Port::Number(number);
            }
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Number(n) => write!(f, "{n}"),
            Port::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortRange {
    pub start: Port,
    pub end: Port,
}

/// Port (or TTL) comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortMatch {
    #[serde(default)]
    pub eq: Option<Port>,
    #[serde(default)]
    pub gt: Option<Port>,
    #[serde(default)]
    pub lt: Option<Port>,
    #[serde(default)]
    pub neq: Option<Port>,
    #[serde(default)]
    pub range: Option<PortRange>,
}

impl PortMatch {
    fn normalize(&mut self) {
        for port in [&mut self.eq, &mut self.gt, &mut self.lt, &mut self.neq]
            .into_iter()
            .flatten()
        {
            port.normalize();
        }
        if let Some(range) = &mut self.range {
            range.start.normalize();
            range.end.normalize();
        }
    }

    fn words(&self) -> Vec<String> {
        let mut words = Vec::new();
        for (op, port) in [("eq", &self.eq), ("gt", &self.gt), ("lt", &self.lt), ("neq", &self.neq)] {
            if let Some(port) = port {
                words.push(format!("{op} {port}"));
            }
        }
        if let Some(range) = &self.range {
            words.push(format!("range {} {}", range.start, range.end));
        }
        words
    }
}

impl Endpoint {
    fn normalize(&mut self) {
        keyword(&mut self.any);
        if let Some(ports) = &mut self.port_protocol {
            ports.normalize();
        }
    }

    fn words(&self) -> Vec<String> {
        let mut words = Vec::new();
        if self.any == Some(true) {
            words.push("any".to_string());
        } else if let Some(host) = &self.host {
            words.push(format!("host {host}"));
        } else if let Some(group) = &self.object_group {
            words.push(format!("object-group {group}"));
        } else if let Some(address) = &self.address {
            words.push(address.clone());
            words.extend(self.wildcard_bits.clone());
        }
        if let Some(ports) = &self.port_protocol {
            words.extend(ports.words());
        }
        words
    }

    fn is_empty(&self) -> bool {
        self.any.is_none()
            && self.host.is_none()
            && self.object_group.is_none()
            && self.address.is_none()
    }
}

impl Ace {
    fn has_content(&self) -> bool {
        self.grant.is_some()
            || self.protocol.is_some()
            || self.source.is_some()
            || self.destination.is_some()
    }

    /// The entry without its sequence number.
    fn command(&self) -> String {
        let mut words = Vec::new();
        words.push(match self.grant {
            Some(Grant::Deny) => "deny".to_string(),
            _ => "permit".to_string(),
        });
        words.extend(self.protocol.clone());
        if let Some(source) = &self.source {
            words.extend(source.words());
        }
        if let Some(destination) = &self.destination {
            words.extend(destination.words());
        }
        words.extend(self.protocol_options.iter().cloned());
        if let Some(dscp) = &self.dscp {
            words.push(format!("dscp {dscp}"));
        }
        if self.fragments == Some(true) {
            words.push("fragments".to_string());
        }
        if self.log == Some(true) {
            words.push("log".to_string());
        }
        if self.log_input == Some(true) {
            words.push("log-input".to_string());
        }
        if let Some(precedence) = &self.precedence {
            words.push(format!("precedence {precedence}"));
        }
        if let Some(range) = &self.time_range {
            words.push(format!("time-range {range}"));
        }
        if let Some(tos) = &self.tos {
            words.push(format!("tos {tos}"));
        }
        if let Some(ttl) = &self.ttl {
            words.extend(ttl.words().into_iter().map(|w| format!("ttl {w}")));
        }
        words.join(" ")
    }
}

impl ResourceModel for AclFamily {
    fn normalize(&mut self) -> Result<(), String> {
        for acl in &mut self.acls {
            match self.afi {
                Afi::Ipv4 => {
                    if acl.acl_type.is_none() {
                        acl.acl_type = AclType::for_number(&acl.name);
                    }
                }
                Afi::Ipv6 => {
                    if acl.acl_type.is_some() {
                        return Err(format!("ipv6 ACL {} does not take an acl_type", acl.name));
                    }
                }
            }
            acl.normalize()?;
        }
        Ok(())
    }
}

impl Acl {
    fn normalize(&mut self) -> Result<(), String> {
        let standard = self.acl_type == Some(AclType::Standard);
        for ace in &mut self.aces {
            for flag in [&mut ace.fragments, &mut ace.log, &mut ace.log_input] {
                keyword(flag);
            }
            for endpoint in [&mut ace.source, &mut ace.destination] {
                if let Some(inner) = endpoint {
                    inner.normalize();
                    if inner.is_empty() && inner.port_protocol.is_none() {
                        *endpoint = None;
                    }
                }
            }
            if let Some(ttl) = &mut ace.ttl {
                ttl.normalize();
            }

            if !ace.has_content() {
                continue;
            }
            if ace.grant.is_none() {
                return Err(format!("entry of ACL {} requires a grant", self.name));
            }
            if ace.source.as_ref().map_or(true, Endpoint::is_empty) {
                return Err(format!("entry of ACL {} requires a source", self.name));
            }
            if standard && (ace.protocol.is_some() || ace.destination.is_some()) {
                return Err(format!(
                    "standard ACL {} entries match on source only",
                    self.name
                ));
            }
            if !standard && (ace.protocol.is_none() || ace.destination.is_none()) {
                return Err(format!(
                    "entry of ACL {} requires a protocol and a destination",
                    self.name
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn texts(value: &Value) -> impl Iterator<Item = String> + '_ {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
}

fn is_ipv6(scope: &Scope<'_>) -> bool {
    scope.inherited("afi").as_deref() == Some("ipv6")
}

fn acl_header(scope: &Scope<'_>) -> Option<String> {
    let name = scope.text("name")?;
    if is_ipv6(scope) {
        Some(format!("ipv6 access-list {name}"))
    } else {
        let acl_type = scope.text("acl_type")?;
        Some(format!("ip access-list {acl_type} {name}"))
    }
}

fn ace_line(value: &Value, scope: &Scope<'_>) -> Option<String> {
    let ace: Ace = serde_json::from_value(value.clone()).ok()?;
    let command = ace.command();
    Some(match ace.sequence {
        Some(sequence) if is_ipv6(scope) => format!("{command} sequence {sequence}"),
        Some(sequence) => format!("{sequence} {command}"),
        None => command,
    })
}

fn ace_removal(scope: &Scope<'_>) -> Vec<String> {
    let line = match scope.text("sequence") {
        Some(sequence) if is_ipv6(scope) => format!("no sequence {sequence}"),
        Some(sequence) => format!("no {sequence}"),
        None => match ace_line(&Value::Object(scope.entity.clone()), scope) {
            Some(line) => format!("no {line}"),
            None => return Vec::new(),
        },
    };
    vec![line]
}

// ============================================================================
// Parsing
// ============================================================================

fn parser() -> Parser {
    let ace = r"(?:(?P<sequence>\d+) )?(?P<body>(?:permit|deny) .+?)(?: sequence (?P<seq6>\d+))?";
    Parser::new()
        .rule(
            Rule::open(
                "acl",
                r"^ip access-list (?P<acl_type>standard|extended) (?P<name>\S+)$",
                &["config", "acls"],
            )
            .at(1)
            .constant("afi", json!("ipv4"))
            .at(2)
            .str("name", "name")
            .str("acl_type", "acl_type"),
        )
        .rule(
            Rule::open("ipv6_acl", r"^ipv6 access-list (?P<name>\S+)$", &["config", "acls"])
                .at(1)
                .constant("afi", json!("ipv6"))
                .at(2)
                .str("name", "name"),
        )
        .rule(
            Rule::open(
                "numbered_ace",
                &format!(r"^access-list (?P<name>\d+) {ace}$"),
                &["config", "acls", "aces"],
            )
            .at(1)
            .constant("afi", json!("ipv4"))
            .at(2)
            .map("name", "", numbered_acl)
            .at(3)
            .int("sequence", "sequence")
            .map("body", "", parse_ace),
        )
        .rule(
            Rule::fields("remark", r"^(?:\d+ )?remark (?P<remark>.+)$", 2)
                .bind("remark", "remarks", Coerce::Append),
        )
        .rule(
            Rule::open("ace", &format!("^{ace}$"), &["config", "acls", "aces"])
                .int("sequence", "sequence")
                .int("seq6", "sequence")
                .map("body", "", parse_ace),
        )
}

fn numbered_acl(name: &str) -> Option<Value> {
    let mut acl = Map::new();
    acl.insert("name".to_string(), json!(name));
    if let Some(acl_type) = AclType::for_number(name) {
        acl.insert("acl_type".to_string(), json!(acl_type.as_str()));
    }
    Some(Value::Object(acl))
}

fn is_ipv4(word: &str) -> bool {
    word.parse::<Ipv4Addr>().is_ok()
}

struct Words<'a> {
    words: Vec<&'a str>,
    position: usize,
}

impl<'a> Words<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.words.get(self.position).copied()
    }

    fn next(&mut self) -> Option<&'a str> {
        let word = self.peek();
        if word.is_some() {
            self.position += 1;
        }
        word
    }

    fn endpoint(&mut self) -> Option<Endpoint> {
        let mut endpoint = Endpoint::default();
        match self.next()? {
            "any" => endpoint.any = Some(true),
            "host" => endpoint.host = Some(self.next()?.to_string()),
            "object-group" => endpoint.object_group = Some(self.next()?.to_string()),
            address if address.contains(':') => endpoint.address = Some(address.to_string()),
            address => match self.peek().filter(|w| is_ipv4(w)) {
                Some(wildcard) => {
                    self.position += 1;
                    endpoint.address = Some(address.to_string());
                    endpoint.wildcard_bits = Some(wildcard.to_string());
                }
                None => endpoint.host = Some(address.to_string()),
            },
        }
        Some(endpoint)
    }

    fn comparison(&mut self) -> Option<PortMatch> {
        let op = self.peek()?;
        if !matches!(op, "eq" | "gt" | "lt" | "neq" | "range") {
            return None;
        }
        self.position += 1;
        let mut ports = PortMatch::default();
        let port = Port::parse(self.next()?);
        match op {
            "eq" => ports.eq = Some(port),
            "gt" => ports.gt = Some(port),
            "lt" => ports.lt = Some(port),
            "neq" => ports.neq = Some(port),
            _ => {
                ports.range = Some(PortRange {
                    start: port,
                    end: Port::parse(self.next()?),
                })
            }
        }
        Some(ports)
    }
}

/// Parse `permit|deny ...` into entry fields.
fn parse_ace(body: &str) -> Option<Value> {
    let mut words = Words {
        words: body.split_whitespace().collect(),
        position: 0,
    };
    let mut ace = Ace {
        grant: Some(match words.next()? {
            "deny" => Grant::Deny,
            _ => Grant::Permit,
        }),
        ..Ace::default()
    };

    let first = words.peek()?;
    let standard = first == "any" || first == "host" || is_ipv4(first);
    if standard {
        ace.source = words.endpoint();
    } else {
        ace.protocol = words.next().map(str::to_string);
        let mut source = words.endpoint()?;
        source.port_protocol = words.comparison();
        let mut destination = words.endpoint()?;
        destination.port_protocol = words.comparison();
        ace.source = Some(source);
        ace.destination = Some(destination);
    }

    while let Some(word) = words.next() {
        match word {
            "dscp" => ace.dscp = words.next().map(str::to_string),
            "fragments" => ace.fragments = Some(true),
            "log" => ace.log = Some(true),
            "log-input" => ace.log_input = Some(true),
            "precedence" => ace.precedence = words.next().map(str::to_string),
            "time-range" => ace.time_range = words.next().map(str::to_string),
            "tos" => ace.tos = words.next().map(str::to_string),
            "ttl" => ace.ttl = words.comparison(),
            other => ace.protocol_options.push(other.to_string()),
        }
    }

    serde_json::to_value(ace).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::network::resource::ResourceModule;
    use pretty_assertions::assert_eq;

    fn module() -> ResourceModule {
        ResourceModule::new(&GRAMMAR, "test")
    }

    #[test]
    fn test_parse_extended_entry() {
        let ace = parse_ace(
            "deny icmp 192.0.2.0 0.0.0.255 192.0.3.0 0.0.0.255 echo dscp ef ttl eq 10",
        )
        .unwrap();
        let ace: Ace = serde_json::from_value(ace).unwrap();
        assert_eq!(ace.grant, Some(Grant::Deny));
        assert_eq!(ace.protocol.as_deref(), Some("icmp"));
        assert_eq!(ace.protocol_options, vec!["echo"]);
        assert_eq!(ace.dscp.as_deref(), Some("ef"));
        assert_eq!(ace.ttl.unwrap().eq, Some(Port::Number(10)));
        assert_eq!(
            ace.destination.unwrap().wildcard_bits.as_deref(),
            Some("0.0.0.255")
        );
    }

    #[test]
    fn test_parse_ports_and_hosts() {
        let ace = parse_ace("permit tcp host 192.0.3.1 eq 22 any range ftp telnet log").unwrap();
        let ace: Ace = serde_json::from_value(ace).unwrap();
        let source = ace.source.unwrap();
        assert_eq!(source.host.as_deref(), Some("192.0.3.1"));
        assert_eq!(source.port_protocol.unwrap().eq, Some(Port::Number(22)));
        let range = ace.destination.unwrap().port_protocol.unwrap().range.unwrap();
        assert_eq!(range.start, Port::Name("ftp".to_string()));
        assert_eq!(ace.log, Some(true));
    }

    #[test]
    fn test_parse_standard_entry() {
        let ace: Ace =
            serde_json::from_value(parse_ace("permit 192.0.2.1 log").unwrap()).unwrap();
        assert_eq!(ace.protocol, None);
        assert_eq!(ace.source.unwrap().host.as_deref(), Some("192.0.2.1"));
        assert_eq!(ace.log, Some(true));
    }

    #[test]
    fn test_number_implies_type() {
        assert_eq!(AclType::for_number("10"), Some(AclType::Standard));
        assert_eq!(AclType::for_number("110"), Some(AclType::Extended));
        assert_eq!(AclType::for_number("2500"), Some(AclType::Extended));
        assert_eq!(AclType::for_number("test_acl"), None);
    }

    #[test]
    fn test_parse_facts() {
        let config = "\
ip access-list standard test_acl
 10 permit 192.0.2.0 0.0.0.255
 remark management hosts
ip access-list extended 110
 10 deny tcp host 198.51.100.1 any eq telnet ack
access-list 5 permit any
ipv6 access-list R1_TRAFFIC
 deny tcp any eq www any eq telnet ack dscp af11 sequence 10
";
        let facts = module().parse_facts(config).unwrap();
        let facts = GRAMMAR.unwrap(&facts);

        assert_eq!(
            facts,
            json!([
                {"afi": "ipv4", "acls": [
                    {"name": "test_acl", "acl_type": "standard",
                     "remarks": ["management hosts"],
                     "aces": [{"sequence": 10, "grant": "permit",
                               "source": {"address": "192.0.2.0", "wildcard_bits": "0.0.0.255"}}]},
                    {"name": "110", "acl_type": "extended",
                     "aces": [{"sequence": 10, "grant": "deny", "protocol": "tcp",
                               "protocol_options": ["ack"],
                               "source": {"host": "198.51.100.1"},
                               "destination": {"any": true, "port_protocol": {"eq": "telnet"}}}]},
                    {"name": "5", "acl_type": "standard",
                     "aces": [{"grant": "permit", "source": {"any": true}}]}
                ]},
                {"afi": "ipv6", "acls": [
                    {"name": "R1_TRAFFIC",
                     "aces": [{"sequence": 10, "grant": "deny", "protocol": "tcp",
                               "protocol_options": ["ack"], "dscp": "af11",
                               "source": {"any": true, "port_protocol": {"eq": "www"}},
                               "destination": {"any": true, "port_protocol": {"eq": "telnet"}}}]}
                ]}
            ])
        );
    }

    #[test]
    fn test_render_entry_forms() {
        let want = json!([
            {"afi": "ipv4", "acls": [{"name": "150", "aces": [
                {"sequence": 20, "grant": "deny", "protocol": "tcp",
                 "source": {"address": "198.51.100.0", "wildcard_bits": "0.0.0.255",
                            "port_protocol": {"eq": "telnet"}},
                 "destination": {"any": true}, "log": true}
            ]}]},
            {"afi": "ipv6", "acls": [{"name": "V6", "aces": [
                {"sequence": 10, "grant": "permit", "protocol": "ipv6",
                 "source": {"address": "2001:db8::/32"}, "destination": {"any": true}}
            ]}]}
        ]);
        let want = module().desired(Some(&want)).unwrap().unwrap();
        let commands = module().render_config(&want).unwrap();
        assert_eq!(
            commands,
            vec![
                "ip access-list extended 150",
                "20 deny tcp 198.51.100.0 0.0.0.255 eq telnet any log",
                "ipv6 access-list V6",
                "permit ipv6 2001:db8::/32 any sequence 10",
            ]
        );
    }

    #[test]
    fn test_remarks_keep_device_order() {
        use crate::resource::{diff, render, Policy};

        let module = module();
        let have = module
            .parse_facts("ip access-list standard notes\n remark second\n remark first\n")
            .unwrap();
        assert_eq!(
            GRAMMAR.unwrap(&have)[0]["acls"][0]["remarks"],
            json!(["second", "first"])
        );

        let commands = |want: Value, policy: Policy| {
            let want = module.desired(Some(&want)).unwrap().unwrap();
            let plan = diff(&have, Some(&want), &GRAMMAR.root, policy).unwrap().unwrap();
            render(&GRAMMAR, &plan).unwrap()
        };

        assert_eq!(
            commands(
                json!([{"afi": "ipv4", "acls": [{"name": "notes", "remarks": ["first", "second"]}]}]),
                Policy::Replace
            ),
            vec![
                "ip access-list standard notes",
                "no remark second",
                "no remark first",
                "remark first",
                "remark second",
            ]
        );
        assert_eq!(
            commands(
                json!([{"afi": "ipv4", "acls": [{"name": "notes", "remarks": ["third", "first"]}]}]),
                Policy::Merge
            ),
            vec!["ip access-list standard notes", "remark third"]
        );
    }

    #[test]
    fn test_model_validation() {
        let module = module();
        let missing_grant = json!([{"afi": "ipv4", "acls": [
            {"name": "std", "acl_type": "standard", "aces": [{"source": {"any": true}}]}
        ]}]);
        assert!(module.desired(Some(&missing_grant)).is_err());

        let standard_with_protocol = json!([{"afi": "ipv4", "acls": [
            {"name": "10", "aces": [{"grant": "permit", "protocol": "tcp",
                                     "source": {"any": true}, "destination": {"any": true}}]}
        ]}]);
        assert!(module.desired(Some(&standard_with_protocol)).is_err());

        let unknown_field = json!([{"afi": "ipv4", "acls": [{"name": "x", "colour": "red"}]}]);
        assert!(module.desired(Some(&unknown_field)).is_err());

        let name_only = json!([{"afi": "ipv4", "acls": [{"name": 110}]}]);
        let want = module.desired(Some(&name_only)).unwrap().unwrap();
        assert_eq!(
            GRAMMAR.unwrap(&want),
            json!([{"afi": "ipv4", "acls": [{"name": "110", "acl_type": "extended"}]}])
        );
    }
}
