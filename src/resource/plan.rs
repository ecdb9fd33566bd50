//! Diff plans and their in-memory application.

use super::grammar::Level;
use super::tree::{leaves, prune_tree, NaturalKey, Tree};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Kind of change to one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// One changed leaf, by dotted path relative to its entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

/// How a matched entity changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Edit in place.
    Patch {
        /// Non-list fields after the change.
        fields: Tree,
        /// Leaf-level differences between the old fields and `fields`.
        changes: Vec<FieldChange>,
        /// Plans for nested lists, by list name.
        children: IndexMap<&'static str, DiffPlan>,
    },
    /// Remove the old entity, then add `replacement`.
    Recreate { replacement: Tree },
}

/// A matched entity whose content differs.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDiff {
    pub key: NaturalKey,
    /// The entity as it exists now.
    pub before: Tree,
    pub change: Change,
}

impl EntityDiff {
    /// A patch whose changes are computed from `before` to `fields`.
    pub fn patch(
        key: NaturalKey,
        before: &Tree,
        fields: Tree,
        level: &Level,
        children: IndexMap<&'static str, DiffPlan>,
    ) -> Self {
        let changes = leaf_changes(&level.fields_of(before), &fields);
        Self {
            key,
            before: before.clone(),
            change: Change::Patch {
                fields,
                changes,
                children,
            },
        }
    }

    /// Whether applying this diff would alter anything.
    pub fn is_empty(&self) -> bool {
        match &self.change {
            Change::Patch {
                changes, children, ..
            } => changes.is_empty() && children.values().all(DiffPlan::is_empty),
            Change::Recreate { .. } => false,
        }
    }
}

/// Changes to one keyed list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffPlan {
    pub to_remove: Vec<Tree>,
    pub to_add: Vec<Tree>,
    pub to_modify: Vec<EntityDiff>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty() && self.to_modify.is_empty()
    }
}

/// Leaf differences between two field sets.
pub fn leaf_changes(before: &Tree, after: &Tree) -> Vec<FieldChange> {
    let old = leaves(before, &[]);
    let new = leaves(after, &[]);
    let mut changes = Vec::new();

    for (path, value) in &old {
        match new.get(path) {
            None => changes.push(FieldChange {
                path: path.clone(),
                kind: ChangeKind::Removed,
                old: Some(value.clone()),
                new: None,
            }),
            Some(updated) if updated != value => changes.push(FieldChange {
                path: path.clone(),
                kind: ChangeKind::Changed,
                old: Some(value.clone()),
                new: Some(updated.clone()),
            }),
            Some(_) => {}
        }
    }
    for (path, value) in &new {
        if !old.contains_key(path) {
            changes.push(FieldChange {
                path: path.clone(),
                kind: ChangeKind::Added,
                old: None,
                new: Some(value.clone()),
            });
        }
    }
    changes
}

// ============================================================================
// Application
// ============================================================================

/// The root tree after `diff` is applied to `have`.
pub fn apply(have: &Tree, diff: Option<&EntityDiff>, level: &Level) -> Tree {
    let mut after = match diff {
        Some(diff) => apply_entity(have, diff, level),
        None => have.clone(),
    };
    prune_tree(&mut after);
    after
}

fn apply_entity(entity: &Tree, diff: &EntityDiff, level: &Level) -> Tree {
    match &diff.change {
        Change::Recreate { replacement } => replacement.clone(),
        Change::Patch {
            fields, children, ..
        } => {
            let mut updated = fields.clone();
            for child in level.children() {
                let current = Level::items(entity, child.name());
                let items = match children.get(child.name()) {
                    Some(plan) => apply_list(current, plan, child),
                    None => current.to_vec(),
                };
                if !items.is_empty() {
                    updated.insert(child.name().to_string(), Value::Array(items));
                }
            }
            updated
        }
    }
}

fn apply_list(items: &[Value], plan: &DiffPlan, level: &Level) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() + plan.to_add.len());
    for item in items {
        let Some(entity) = item.as_object() else {
            continue;
        };
        if plan.to_remove.iter().any(|removed| removed == entity) {
            continue;
        }
        let modified = plan.to_modify.iter().find(|diff| &diff.before == entity);
        match modified {
            Some(diff) => out.push(Value::Object(apply_entity(entity, diff, level))),
            None => out.push(item.clone()),
        }
    }
    out.extend(plan.to_add.iter().cloned().map(Value::Object));
    out
}
