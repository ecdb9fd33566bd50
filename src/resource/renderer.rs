//! Command renderer.
//!
//! Turns an [`EntityDiff`] into an ordered list of device commands:
//! negations before reassertions, an entity header before its body, and
//! lines of separate configuration modes grouped under their own header
//! after the entity they belong to.

use super::grammar::{FieldRule, Grammar, Level, Scope};
use super::plan::{Change, DiffPlan, EntityDiff};
use super::tree::{leaves, NaturalKey, Tree};
use crate::modules::{ModuleError, ModuleResult};
use indexmap::IndexMap;
use serde_json::Value;

/// Render the commands that carry out `diff` for `grammar`.
///
/// Every changed field is checked against the grammar first; a field no rule
/// renders fails the whole render with [`ModuleError::GrammarGap`].
pub fn render(grammar: &Grammar, diff: &EntityDiff) -> ModuleResult<Vec<String>> {
    check_diff(grammar.name, &grammar.root, diff)?;

    let mut out = Vec::new();
    Renderer {
        resource: grammar.name,
    }
    .patch(&grammar.root, diff, &[], &mut out)?;
    Ok(out)
}

// ============================================================================
// Coverage
// ============================================================================

fn gap(resource: &str, level: &Level, path: &str) -> ModuleError {
    let location = if level.name().is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", level.name(), path)
    };
    ModuleError::GrammarGap(format!(
        "{}: no command renders field '{}'",
        resource, location
    ))
}

fn covered(level: &Level, path: &str) -> bool {
    level.in_header(path) || level.rules().iter().any(|rule| rule.covers(path))
}

fn check_entity(resource: &str, level: &Level, entity: &Tree) -> ModuleResult<()> {
    for path in leaves(&level.fields_of(entity), &[]).keys() {
        if !covered(level, path) {
            return Err(gap(resource, level, path));
        }
    }
    for child in level.children() {
        for item in Level::items(entity, child.name()) {
            if let Some(inner) = item.as_object() {
                check_entity(resource, child, inner)?;
            }
        }
    }
    Ok(())
}

fn check_plan(resource: &str, level: &Level, plan: &DiffPlan) -> ModuleResult<()> {
    if !level.has_custom_removal() {
        for removed in &plan.to_remove {
            check_entity(resource, level, removed)?;
        }
    }
    for added in &plan.to_add {
        check_entity(resource, level, added)?;
    }
    for diff in &plan.to_modify {
        check_diff(resource, level, diff)?;
    }
    Ok(())
}

fn check_diff(resource: &str, level: &Level, diff: &EntityDiff) -> ModuleResult<()> {
    match &diff.change {
        Change::Recreate { replacement } => {
            if !level.has_custom_removal() {
                check_entity(resource, level, &diff.before)?;
            }
            check_entity(resource, level, replacement)
        }
        Change::Patch {
            changes, children, ..
        } => {
            if let Some(change) = changes.iter().find(|c| !covered(level, &c.path)) {
                return Err(gap(resource, level, &change.path));
            }
            for (name, plan) in children {
                if let Some(child) = level.child_level(name) {
                    check_plan(resource, child, plan)?;
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Lines of one entity, split by configuration mode.
#[derive(Default)]
struct Block {
    body: Vec<String>,
    moded: IndexMap<String, Vec<String>>,
}

impl Block {
    fn push(&mut self, rule: &FieldRule, scope: &Scope<'_>, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        match rule.mode_header(scope) {
            Some(header) => self.moded.entry(header).or_default().extend(lines),
            None => self.body.extend(lines),
        }
    }

    fn emit(self, header: Option<String>, out: &mut Vec<String>) {
        out.extend(header);
        out.extend(self.body);
        for (header, lines) in self.moded {
            out.push(header);
            out.extend(lines);
        }
    }
}

/// Value a rule renders, treating an empty whole-entity object as absent.
fn rule_value(rule: &FieldRule, fields: &Tree) -> Option<Value> {
    match rule.value_in(fields) {
        Some(Value::Object(map)) if map.is_empty() => None,
        other => other,
    }
}

struct Renderer {
    resource: &'static str,
}

impl Renderer {
    /// Header for a block, when the block needs one.
    fn header(
        &self,
        level: &Level,
        scope: &Scope<'_>,
        block: &Block,
        always: bool,
    ) -> ModuleResult<Option<String>> {
        if !level.has_header() || !(always || !block.body.is_empty()) {
            return Ok(None);
        }
        level.header_line(scope).map(Some).ok_or_else(|| {
            let key = NaturalKey::of(scope.entity, level.key_fields())
                .map(|key| key.to_string())
                .unwrap_or_default();
            ModuleError::GrammarGap(format!(
                "{}: cannot render the {} header for '{}'",
                self.resource,
                level.name(),
                key
            ))
        })
    }

    fn add(
        &self,
        level: &Level,
        entity: &Tree,
        parents: &[&Tree],
        out: &mut Vec<String>,
    ) -> ModuleResult<()> {
        let scope = Scope::new(entity, parents);
        let fields = level.fields_of(entity);
        let mut block = Block::default();

        for rule in level.rules() {
            if let Some(value) = rule_value(rule, &fields) {
                block.push(rule, &scope, rule.render_set(&value, &scope));
            }
        }

        let mut chain = parents.to_vec();
        chain.push(entity);
        for child in level.children() {
            for item in Level::items(entity, child.name()) {
                if let Some(inner) = item.as_object() {
                    self.add(child, inner, &chain, &mut block.body)?;
                }
            }
        }

        let header = self.header(level, &scope, &block, level.header_creates())?;
        block.emit(header, out);
        Ok(())
    }

    fn remove(
        &self,
        level: &Level,
        entity: &Tree,
        parents: &[&Tree],
        out: &mut Vec<String>,
    ) -> ModuleResult<()> {
        let scope = Scope::new(entity, parents);
        if let Some(lines) = level.custom_removal(&scope) {
            out.extend(lines);
            return Ok(());
        }

        let fields = level.fields_of(entity);
        let mut block = Block::default();
        for rule in level.rules() {
            if let Some(value) = rule_value(rule, &fields) {
                block.push(rule, &scope, rule.render_unset(&value, &scope));
            }
        }

        let mut chain = parents.to_vec();
        chain.push(entity);
        for child in level.children() {
            for item in Level::items(entity, child.name()) {
                if let Some(inner) = item.as_object() {
                    self.remove(child, inner, &chain, &mut block.body)?;
                }
            }
        }

        let header = self.header(level, &scope, &block, false)?;
        block.emit(header, out);
        Ok(())
    }

    fn patch(
        &self,
        level: &Level,
        diff: &EntityDiff,
        parents: &[&Tree],
        out: &mut Vec<String>,
    ) -> ModuleResult<()> {
        let (fields, children) = match &diff.change {
            Change::Recreate { replacement } => {
                self.remove(level, &diff.before, parents, out)?;
                return self.add(level, replacement, parents, out);
            }
            Change::Patch {
                fields, children, ..
            } => (fields, children),
        };

        let old_fields = level.fields_of(&diff.before);
        let before = Scope::new(&diff.before, parents);
        let after = Scope::new(fields, parents);
        let mut block = Block::default();

        let mut chain = parents.to_vec();
        chain.push(&diff.before);

        // Negations first.
        for rule in level.rules() {
            match (rule_value(rule, &old_fields), rule_value(rule, fields)) {
                (Some(old), None) => block.push(rule, &before, rule.render_unset(&old, &before)),
                (Some(old), Some(new)) if old != new => {
                    block.push(rule, &before, rule.render_clear(&old, &new, &before))
                }
                _ => {}
            }
        }
        for child in level.children() {
            let Some(plan) = children.get(child.name()) else {
                continue;
            };
            for removed in &plan.to_remove {
                self.remove(child, removed, &chain, &mut block.body)?;
            }
            for modified in &plan.to_modify {
                if let Change::Recreate { .. } = modified.change {
                    self.remove(child, &modified.before, &chain, &mut block.body)?;
                }
            }
        }

        for rule in level.rules() {
            let lines = match (rule_value(rule, &old_fields), rule_value(rule, fields)) {
                (None, Some(new)) => rule.render_set(&new, &after),
                (Some(old), Some(new)) if old != new => rule.render_change(&old, &new, &after),
                _ => continue,
            };
            block.push(rule, &after, lines);
        }
        for child in level.children() {
            let Some(plan) = children.get(child.name()) else {
                continue;
            };
            for added in &plan.to_add {
                self.add(child, added, &chain, &mut block.body)?;
            }
            for modified in &plan.to_modify {
                match &modified.change {
                    Change::Recreate { replacement } => {
                        self.add(child, replacement, &chain, &mut block.body)?
                    }
                    Change::Patch { .. } => self.patch(child, modified, &chain, &mut block.body)?,
                }
            }
        }

        let header = self.header(level, &after, &block, false)?;
        block.emit(header, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::differ::{diff, Policy};
    use crate::resource::grammar::{canonicalize, ResourceModel};
    use crate::resource::parser::Parser;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Anything(Value);

    impl ResourceModel for Anything {}

    fn grammar() -> Grammar {
        Grammar {
            name: "test_vlans",
            show_command: "show running-config | section ^vlan",
            list_field: Some("config"),
            root: Level::root().grouping().child(
                Level::list("config")
                    .key(&["vlan_id"])
                    .creates()
                    .header(|s| s.text("vlan_id").map(|id| format!("vlan {id}")))
                    .removal(|s| vec![format!("no vlan {}", s.text("vlan_id").unwrap_or_default())])
                    .rule(FieldRule::value("name", "name"))
                    .rule(FieldRule::flag("shutdown", "shutdown"))
                    .rule(
                        FieldRule::value("member.vni", "member vni").mode(|s| {
                            s.text("vlan_id").map(|id| format!("vlan configuration {id}"))
                        }),
                    ),
            ),
            parser: Parser::new(),
            canonical: canonicalize::<Anything>,
        }
    }

    fn tree(value: Value) -> Tree {
        value.as_object().cloned().unwrap()
    }

    fn commands(have: Value, want: Value, policy: Policy) -> ModuleResult<Vec<String>> {
        let grammar = grammar();
        let have = grammar.wrap(have);
        let want = grammar.wrap(want);
        match diff(&have, Some(&want), &grammar.root, policy)? {
            Some(diff) => render(&grammar, &diff),
            None => Ok(Vec::new()),
        }
    }

    #[test]
    fn test_add_emits_header_even_when_bare() {
        let cmds = commands(json!([]), json!([{"vlan_id": 10}]), Policy::Merge).unwrap();
        assert_eq!(cmds, vec!["vlan 10"]);
    }

    #[test]
    fn test_negations_before_assertions() {
        let cmds = commands(
            json!([{"vlan_id": 10, "name": "old", "shutdown": true}]),
            json!([{"vlan_id": 10, "name": "new"}]),
            Policy::Replace,
        )
        .unwrap();
        assert_eq!(cmds, vec!["vlan 10", "no shutdown", "name new"]);
    }

    #[test]
    fn test_moded_lines_follow_entity() {
        let cmds = commands(
            json!([]),
            json!([{"vlan_id": 20, "name": "v", "member": {"vni": 5020}}]),
            Policy::Merge,
        )
        .unwrap();
        assert_eq!(
            cmds,
            vec!["vlan 20", "name v", "vlan configuration 20", "member vni 5020"]
        );
    }

    #[test]
    fn test_override_removal_comes_first() {
        let cmds = commands(
            json!([{"vlan_id": 10}, {"vlan_id": 30, "name": "x"}]),
            json!([{"vlan_id": 10}, {"vlan_id": 40}]),
            Policy::Override,
        )
        .unwrap();
        assert_eq!(cmds, vec!["no vlan 30", "vlan 40"]);
    }

    #[test]
    fn test_unrendered_field_is_grammar_gap() {
        let err = commands(
            json!([]),
            json!([{"vlan_id": 10, "remote_span": true}]),
            Policy::Merge,
        )
        .unwrap_err();
        match err {
            ModuleError::GrammarGap(msg) => assert!(msg.contains("config.remote_span")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unchanged_entity_renders_nothing() {
        let have = tree(json!({"config": [{"vlan_id": 10, "name": "a"}]}));
        let grammar = grammar();
        assert!(diff(&have, Some(&have), &grammar.root, Policy::Override)
            .unwrap()
            .is_none());
    }
}
