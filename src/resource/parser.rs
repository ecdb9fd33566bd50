//! Rule-table parser turning configuration text into a facts tree.
//!
//! Each [`Rule`] pairs a regex with typed bindings that project named
//! captures into the tree. Rules are tried in order and the first match wins.
//! An explicit context stack records which entity every open block belongs
//! to: a rule either opens an entity at a list path (finding it by natural
//! key or creating it) or writes fields into an already-open entity at a
//! fixed depth.

use super::grammar::Level;
use super::tokenizer::{Continuation, Line, Tokenizer};
use super::tree::{deep_merge, get_path, set_path, NaturalKey, Tree};
use crate::modules::{ModuleError, ModuleResult};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// How a captured group becomes a tree value.
#[derive(Debug, Clone)]
pub enum Coerce {
    /// Capture text as a string.
    Str,
    /// Capture parsed as an integer.
    Int,
    /// `true` whenever the group participates, even with empty text.
    Bool,
    /// Whitespace-separated words as a list of strings.
    Words,
    /// Whitespace- or comma-separated integers.
    Ints,
    /// Text split on a separator.
    Split(char),
    /// Capture pushed onto the list at the path.
    Append,
    /// A fixed value, written when the group participates (or always, when
    /// no group is named).
    Const(Value),
    /// Custom projection. An object returned for the empty path is merged
    /// into the entity.
    Map(fn(&str) -> Option<Value>),
}

#[derive(Debug, Clone)]
struct Binding {
    depth: usize,
    group: Option<&'static str>,
    path: &'static str,
    coerce: Coerce,
}

#[derive(Debug, Clone)]
enum Target {
    /// Open an entity in the nested list path, e.g. `["config", "acls"]`.
    Open(Vec<&'static str>),
    /// Write into the entity open at this depth (0 is the root).
    Fields(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Indent {
    Any,
    TopLevel,
    Nested,
}

/// One line pattern with its projection.
#[derive(Debug, Clone)]
pub struct Rule {
    name: &'static str,
    regex: Regex,
    target: Target,
    indent: Indent,
    cursor: usize,
    bindings: Vec<Binding>,
}

impl Rule {
    fn build(name: &'static str, pattern: &str, target: Target, cursor: usize) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("Invalid pattern for rule '{}': {}", name, e));
        Self {
            name,
            regex,
            target,
            indent: Indent::Any,
            cursor,
            bindings: Vec::new(),
        }
    }

    /// A rule opening an entity in the list at `lists` (outermost first).
    pub fn open(name: &'static str, pattern: &str, lists: &[&'static str]) -> Self {
        Self::build(name, pattern, Target::Open(lists.to_vec()), lists.len())
    }

    /// A rule writing fields of the entity open at `depth`.
    pub fn fields(name: &'static str, pattern: &str, depth: usize) -> Self {
        Self::build(name, pattern, Target::Fields(depth), depth)
    }

    /// Only match unindented lines.
    pub fn top_level(mut self) -> Self {
        self.indent = Indent::TopLevel;
        self
    }

    /// Only match indented lines.
    pub fn nested(mut self) -> Self {
        self.indent = Indent::Nested;
        self
    }

    /// Following bindings target the entity at `depth`.
    pub fn at(mut self, depth: usize) -> Self {
        self.cursor = depth;
        self
    }

    pub fn bind(mut self, group: &'static str, path: &'static str, coerce: Coerce) -> Self {
        self.bindings.push(Binding {
            depth: self.cursor,
            group: Some(group),
            path,
            coerce,
        });
        self
    }

    pub fn str(self, group: &'static str, path: &'static str) -> Self {
        self.bind(group, path, Coerce::Str)
    }

    pub fn int(self, group: &'static str, path: &'static str) -> Self {
        self.bind(group, path, Coerce::Int)
    }

    pub fn flag(self, group: &'static str, path: &'static str) -> Self {
        self.bind(group, path, Coerce::Bool)
    }

    pub fn words(self, group: &'static str, path: &'static str) -> Self {
        self.bind(group, path, Coerce::Words)
    }

    pub fn ints(self, group: &'static str, path: &'static str) -> Self {
        self.bind(group, path, Coerce::Ints)
    }

    pub fn map(self, group: &'static str, path: &'static str, f: fn(&str) -> Option<Value>) -> Self {
        self.bind(group, path, Coerce::Map(f))
    }

    /// Always write `value` at `path`.
    pub fn constant(mut self, path: &'static str, value: Value) -> Self {
        self.bindings.push(Binding {
            depth: self.cursor,
            group: None,
            path,
            coerce: Coerce::Const(value),
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn captures<'t>(&self, line: &'t Line) -> Option<Captures<'t>> {
        let indent_ok = match self.indent {
            Indent::Any => true,
            Indent::TopLevel => line.is_top_level(),
            Indent::Nested => !line.is_top_level(),
        };
        if indent_ok {
            self.regex.captures(&line.text)
        } else {
            None
        }
    }

    fn bindings_at(&self, depth: usize) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |b| b.depth == depth)
    }

    /// Project every binding at `depth` into `entity`.
    fn project(
        &self,
        depth: usize,
        caps: &Captures<'_>,
        line: &Line,
        entity: &mut Tree,
    ) -> ModuleResult<()> {
        for binding in self.bindings_at(depth) {
            let text = match binding.group {
                Some(group) => match caps.name(group) {
                    Some(m) => m.as_str(),
                    None => continue,
                },
                None => "",
            };
            self.write(binding, text, line, entity)?;
        }
        Ok(())
    }

    fn write(&self, binding: &Binding, text: &str, line: &Line, entity: &mut Tree) -> ModuleResult<()> {
        let value = match &binding.coerce {
            Coerce::Str => Value::String(text.trim().to_string()),
            Coerce::Int => Value::from(self.integer(text, line)?),
            Coerce::Bool => Value::Bool(true),
            Coerce::Words => Value::Array(
                text.split_whitespace()
                    .map(|w| Value::String(w.to_string()))
                    .collect(),
            ),
            Coerce::Ints => Value::Array(
                text.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|w| !w.is_empty())
                    .map(|w| self.integer(w, line).map(Value::from))
                    .collect::<ModuleResult<Vec<_>>>()?,
            ),
            Coerce::Split(separator) => Value::Array(
                text.split(*separator)
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(|w| Value::String(w.to_string()))
                    .collect(),
            ),
            Coerce::Append => {
                let mut items = match get_path(entity, binding.path) {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                items.push(Value::String(text.trim().to_string()));
                Value::Array(items)
            }
            Coerce::Const(value) => value.clone(),
            Coerce::Map(f) => match f(text) {
                Some(value) => value,
                None => return Ok(()),
            },
        };

        match (binding.path, value) {
            ("", Value::Object(fields)) => {
                for (name, value) in fields {
                    entity.insert(name, value);
                }
            }
            ("", _) => {}
            (path, value) => set_path(entity, path, value),
        }
        Ok(())
    }

    fn integer(&self, text: &str, line: &Line) -> ModuleResult<i64> {
        text.trim().parse::<i64>().map_err(|_| {
            ModuleError::GrammarGap(format!(
                "rule '{}' captured '{}' as an integer on line {}: {}",
                self.name, text, line.number, line.text
            ))
        })
    }
}

/// Position of one open entity: the list it lives in and its index.
#[derive(Debug, Clone, Copy)]
struct Frame {
    list: &'static str,
    index: usize,
}

fn entity_mut<'t>(root: &'t mut Tree, frames: &[Frame]) -> Option<&'t mut Tree> {
    let mut current = root;
    for frame in frames {
        current = current
            .get_mut(frame.list)?
            .as_array_mut()?
            .get_mut(frame.index)?
            .as_object_mut()?;
    }
    Some(current)
}

/// Ordered rule table plus the continuation rules of its tokenizer.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    rules: Vec<Rule>,
    continuations: Vec<Continuation>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn continuation(mut self, continuation: Continuation) -> Self {
        self.continuations.push(continuation);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Parse `text` into a facts tree shaped by `root`.
    pub fn parse(&self, text: &str, root: &Level) -> ModuleResult<Tree> {
        let mut facts = Tree::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut dropped = 0usize;

        for line in Tokenizer::new(text, &self.continuations) {
            let matched = self
                .rules
                .iter()
                .find_map(|rule| rule.captures(&line).map(|caps| (rule, caps)));

            let applied = match matched {
                Some((rule, caps)) => {
                    trace!(rule = rule.name, line = line.number, "matched");
                    self.apply(rule, &caps, &line, root, &mut facts, &mut stack)?
                }
                None => false,
            };

            if !applied {
                if line.is_top_level() {
                    stack.clear();
                }
                dropped += 1;
                trace!(line = line.number, text = %line.text, "no rule applied, line skipped");
            }
        }

        debug!(dropped, "parsed configuration");
        Ok(facts)
    }

    fn apply(
        &self,
        rule: &Rule,
        caps: &Captures<'_>,
        line: &Line,
        root: &Level,
        facts: &mut Tree,
        stack: &mut Vec<Frame>,
    ) -> ModuleResult<bool> {
        match &rule.target {
            Target::Fields(depth) => {
                if stack.len() < *depth {
                    return Ok(false);
                }
                let Some(entity) = entity_mut(facts, &stack[..*depth]) else {
                    return Ok(false);
                };
                rule.project(*depth, caps, line, entity)?;
                Ok(true)
            }
            Target::Open(lists) => {
                let mut level = root;
                for (index, list) in lists.iter().enumerate() {
                    level = level.child_level(list).ok_or_else(|| {
                        ModuleError::GrammarGap(format!(
                            "rule '{}' opens unknown list '{}'",
                            rule.name, list
                        ))
                    })?;
                    let depth = index + 1;
                    let is_target = depth == lists.len();

                    if !is_target && rule.bindings_at(depth).next().is_none() {
                        // Ancestor not named by the line: it must already be open.
                        match stack.get(index) {
                            Some(frame) if frame.list == *list => continue,
                            _ => return Ok(false),
                        }
                    }

                    let mut projected = Tree::new();
                    rule.project(depth, caps, line, &mut projected)?;

                    if stack.len() < index {
                        return Ok(false);
                    }
                    let Some(parent) = entity_mut(facts, &stack[..index]) else {
                        return Ok(false);
                    };
                    let items = parent
                        .entry(list.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !items.is_array() {
                        *items = Value::Array(Vec::new());
                    }
                    let Value::Array(items) = items else {
                        return Ok(false);
                    };

                    let key = NaturalKey::of(&projected, level.key_fields())
                        .filter(|_| !level.key_fields().is_empty());
                    let existing = key.as_ref().and_then(|key| {
                        items.iter().position(|item| {
                            item.as_object()
                                .and_then(|entity| NaturalKey::of(entity, level.key_fields()))
                                .as_ref()
                                == Some(key)
                        })
                    });
                    let position = match existing {
                        Some(position) => position,
                        None => {
                            items.push(Value::Object(Map::new()));
                            items.len() - 1
                        }
                    };
                    if let Some(Value::Object(entity)) = items.get_mut(position) {
                        *entity = deep_merge(entity, &projected, level.sets());
                    }

                    stack.truncate(index);
                    stack.push(Frame {
                        list: *list,
                        index: position,
                    });
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn shape() -> Level {
        Level::root().child(
            Level::list("config")
                .key(&["name"])
                .child(Level::list("groups").key(&["group_no"])),
        )
    }

    fn parser() -> Parser {
        Parser::new()
            .rule(
                Rule::open("interface", r"^interface (?P<name>\S+)$", &["config"])
                    .top_level()
                    .str("name", "name"),
            )
            .rule(
                Rule::fields("version", r"^standby version (?P<version>\d+)$", 1)
                    .nested()
                    .int("version", "version"),
            )
            .rule(
                Rule::open(
                    "priority",
                    r"^standby (?P<group>\d+) priority (?P<priority>\d+)$",
                    &["config", "groups"],
                )
                .nested()
                .int("group", "group_no")
                .int("priority", "priority"),
            )
            .rule(
                Rule::open(
                    "preempt",
                    r"^standby (?P<group>\d+) preempt(?P<delay> delay)?$",
                    &["config", "groups"],
                )
                .nested()
                .int("group", "group_no")
                .flag("delay", "preempt.delay")
                .constant("preempt.enabled", json!(true)),
            )
    }

    #[test]
    fn test_contexts_and_keys() {
        let config = "interface Vlan70\n standby version 2\n standby 10 priority 110\n standby 10 preempt\n standby 20 priority 90\n";
        let facts = parser().parse(config, &shape()).unwrap();

        assert_eq!(
            Value::Object(facts),
            json!({"config": [{
                "name": "Vlan70",
                "version": 2,
                "groups": [
                    {"group_no": 10, "priority": 110, "preempt": {"enabled": true}},
                    {"group_no": 20, "priority": 90}
                ]
            }]})
        );
    }

    #[test]
    fn test_unmatched_top_level_line_closes_context() {
        let config = "interface Vlan70\nhostname r1\n standby version 2\n";
        let facts = parser().parse(config, &shape()).unwrap();
        assert_eq!(Value::Object(facts), json!({"config": [{"name": "Vlan70"}]}));
    }

    #[test]
    fn test_reopening_merges_by_key() {
        let config = "interface Vlan70\n standby 10 priority 110\ninterface Vlan80\ninterface Vlan70\n standby 10 preempt delay\n";
        let facts = parser().parse(config, &shape()).unwrap();
        let config = facts.get("config").unwrap().as_array().unwrap();

        assert_eq!(config.len(), 2);
        assert_eq!(
            config[0],
            json!({"name": "Vlan70", "groups": [
                {"group_no": 10, "priority": 110, "preempt": {"enabled": true, "delay": true}}
            ]})
        );
    }

    #[test]
    fn test_empty_capture_counts_as_true() {
        let parser = Parser::new().rule(
            Rule::fields("ifindex", r"^snmp-server ifindex persist(?P<persist>)$", 0)
                .flag("persist", "if_index"),
        );
        let facts = parser.parse("snmp-server ifindex persist\n", &Level::root()).unwrap();
        assert_eq!(facts.get("if_index"), Some(&json!(true)));
    }

    #[test]
    fn test_integer_overflow_is_grammar_gap() {
        let config = "interface Vlan70\n standby 99999999999999999999 priority 1\n";
        let err = parser().parse(config, &shape()).unwrap_err();
        assert!(matches!(err, ModuleError::GrammarGap(_)));
    }

    #[test]
    fn test_field_rule_outside_context_is_dropped() {
        let facts = parser().parse(" standby version 2\n", &shape()).unwrap();
        assert!(facts.is_empty());
    }
}
