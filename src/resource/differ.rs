//! Structural differ.
//!
//! Compares the facts tree of a device (`have`) with a desired tree (`want`)
//! under one of four policies and produces an [`EntityDiff`] for the root
//! entity. Entities in lists are matched by their natural key; desired
//! entities without a key are matched by content.

use super::grammar::Level;
use super::plan::{Change, DiffPlan, EntityDiff};
use super::tree::{deep_merge, get_path, leaves, remove_path, set_kind, set_path, NaturalKey, Tree};
use crate::modules::{ModuleError, ModuleResult};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

/// How desired state is reconciled with existing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Add or update what is given; never remove.
    Merge,
    /// Entities that are given replace their existing counterpart.
    Replace,
    /// The given configuration becomes the entire configuration.
    Override,
    /// Remove what is given, or everything when nothing is.
    Delete,
}

/// Diff the root entity.
///
/// Returns `None` when nothing would change.
pub fn diff(
    have: &Tree,
    want: Option<&Tree>,
    root: &Level,
    policy: Policy,
) -> ModuleResult<Option<EntityDiff>> {
    let key = NaturalKey::root();
    let diff = match policy {
        Policy::Delete => match want {
            Some(want) if !is_blank(want, root) => delete_entity(root, key, have, want),
            _ => clear_entity(root, key, have),
        },
        _ => {
            let empty = Tree::new();
            return diff_entity(root, key, have, want.unwrap_or(&empty), policy);
        }
    };
    Ok(Some(diff).filter(|d| !d.is_empty()))
}

fn is_blank(want: &Tree, level: &Level) -> bool {
    want.iter().all(|(name, value)| match level.child_level(name) {
        Some(_) => value.as_array().map_or(true, Vec::is_empty),
        None => false,
    })
}

fn carries_only_key(want: &Tree, level: &Level) -> bool {
    !want.is_empty()
        && want
            .keys()
            .all(|name| level.key_fields().iter().any(|f| *f == name.as_str()))
}

/// Entity content with key fields left out, for matching keyless entities.
fn content(entity: &Tree, level: &Level) -> Tree {
    entity
        .iter()
        .filter(|(name, _)| !level.key_fields().iter().any(|f| *f == name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Position in `have` of the entity matching `want`.
fn find_match(have: &[Value], want: &Tree, level: &Level) -> Option<usize> {
    if level.key_fields().is_empty() {
        return None;
    }
    match NaturalKey::of(want, level.key_fields()) {
        Some(key) => have.iter().position(|item| {
            item.as_object()
                .and_then(|entity| NaturalKey::of(entity, level.key_fields()))
                .is_some_and(|candidate| candidate == key)
        }),
        None => {
            let wanted = content(want, level);
            have.iter().position(|item| {
                item.as_object()
                    .is_some_and(|entity| content(entity, level) == wanted)
            })
        }
    }
}

fn key_of(entity: &Tree, level: &Level) -> NaturalKey {
    NaturalKey::of(entity, level.key_fields()).unwrap_or_else(NaturalKey::root)
}

// ============================================================================
// Merge, replace, override
// ============================================================================

fn diff_list(
    have: &[Value],
    want: &[Value],
    level: &Level,
    policy: Policy,
) -> ModuleResult<DiffPlan> {
    let mut plan = DiffPlan::default();
    let mut matched = vec![false; have.len()];

    for item in want {
        let Some(wanted) = item.as_object() else {
            continue;
        };
        match find_match(have, wanted, level) {
            Some(index) => {
                if matched[index] {
                    continue;
                }
                matched[index] = true;
                let Some(existing) = have[index].as_object() else {
                    continue;
                };
                // Matched by content: already present as desired.
                if NaturalKey::of(wanted, level.key_fields()).is_none() {
                    continue;
                }
                let key = key_of(existing, level);
                if let Some(diff) = diff_entity(level, key, existing, wanted, policy)? {
                    plan.to_modify.push(diff);
                }
            }
            None => plan.to_add.push(wanted.clone()),
        }
    }

    if policy == Policy::Override {
        plan.to_remove.extend(
            have.iter()
                .zip(&matched)
                .filter(|(_, seen)| !**seen)
                .filter_map(|(item, _)| item.as_object().cloned()),
        );
    }

    trace!(
        list = level.name(),
        remove = plan.to_remove.len(),
        add = plan.to_add.len(),
        modify = plan.to_modify.len(),
        "Diffed list"
    );
    Ok(plan)
}

fn diff_entity(
    level: &Level,
    key: NaturalKey,
    have: &Tree,
    want: &Tree,
    policy: Policy,
) -> ModuleResult<Option<EntityDiff>> {
    let have_fields = level.fields_of(have);
    let want_fields = level.fields_of(want);

    let fields = match policy {
        Policy::Merge => deep_merge(&have_fields, &want_fields, level.sets()),
        _ if level.is_grouping() => deep_merge(&have_fields, &want_fields, level.sets()),
        _ => {
            // Immutable fields left out of want keep their current value.
            let mut fields = want_fields;
            for field in level.immutable_fields() {
                if get_path(&fields, field).is_none() {
                    if let Some(value) = get_path(&have_fields, field) {
                        set_path(&mut fields, field, value.clone());
                    }
                }
            }
            fields
        }
    };

    let changed_immutable = level.immutable_fields().iter().find(|field| {
        match (get_path(&have_fields, field), get_path(&fields, field)) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        }
    });
    if let Some(field) = changed_immutable {
        if policy == Policy::Merge {
            return Err(ModuleError::PolicyViolation(format!(
                "'{}' of {} cannot be changed under merged; use replaced or overridden",
                field, key
            )));
        }
        return Ok(Some(EntityDiff {
            key,
            before: have.clone(),
            change: Change::Recreate {
                replacement: want.clone(),
            },
        }));
    }

    let child_policy = match policy {
        Policy::Replace if !level.is_grouping() => Policy::Override,
        other => other,
    };
    let mut children = IndexMap::new();
    for child in level.children() {
        let given = want.contains_key(child.name());
        if !given && child_policy != Policy::Override {
            continue;
        }
        let plan = diff_list(
            Level::items(have, child.name()),
            Level::items(want, child.name()),
            child,
            child_policy,
        )?;
        if !plan.is_empty() {
            children.insert(child.name(), plan);
        }
    }

    let diff = EntityDiff::patch(key, have, fields, level, children);
    if diff.is_empty() {
        return Ok(None);
    }

    if level.is_no_update() && policy == Policy::Merge {
        return Err(ModuleError::PolicyViolation(format!(
            "existing entry {} cannot be updated under merged; use replaced or overridden",
            diff.key
        )));
    }

    if level.is_atomic() {
        let replacement = match (&diff.change, policy) {
            (Change::Patch { fields, .. }, Policy::Merge) => {
                let mut merged = fields.clone();
                for child in level.children() {
                    if let Some(items) = have.get(child.name()) {
                        merged.insert(child.name().to_string(), items.clone());
                    }
                }
                merged
            }
            _ => want.clone(),
        };
        return Ok(Some(EntityDiff {
            key: diff.key,
            before: diff.before,
            change: Change::Recreate { replacement },
        }));
    }

    Ok(Some(diff))
}

// ============================================================================
// Delete
// ============================================================================

/// Remove every field and every child entity.
fn clear_entity(level: &Level, key: NaturalKey, have: &Tree) -> EntityDiff {
    let mut fields = Tree::new();
    for field in level.key_fields() {
        if let Some(value) = get_path(have, field) {
            set_path(&mut fields, field, value.clone());
        }
    }

    let mut children = IndexMap::new();
    for child in level.children() {
        let items = Level::items(have, child.name());
        if items.is_empty() {
            continue;
        }
        children.insert(
            child.name(),
            DiffPlan {
                to_remove: items.iter().filter_map(|i| i.as_object().cloned()).collect(),
                ..DiffPlan::default()
            },
        );
    }
    EntityDiff::patch(key, have, fields, level, children)
}

/// Remove the fields and child entities named in `want`.
fn delete_entity(level: &Level, key: NaturalKey, have: &Tree, want: &Tree) -> EntityDiff {
    let mut fields = level.fields_of(have);
    let requested = leaves(&level.fields_of(want), level.key_fields());
    for (path, value) in requested {
        match (set_kind(level.sets(), &path), get_path(&fields, &path)) {
            (Some(kind), Some(existing)) => {
                let rest = kind.difference(existing, &value);
                if rest.as_array().is_some_and(Vec::is_empty) {
                    remove_path(&mut fields, &path);
                } else {
                    set_path(&mut fields, &path, rest);
                }
            }
            (None, Some(_)) => {
                remove_path(&mut fields, &path);
            }
            _ => {}
        }
    }

    let mut children = IndexMap::new();
    for child in level.children() {
        let Some(requested) = want.get(child.name()).and_then(Value::as_array) else {
            continue;
        };
        let plan = delete_list(Level::items(have, child.name()), requested, child);
        if !plan.is_empty() {
            children.insert(child.name(), plan);
        }
    }
    EntityDiff::patch(key, have, fields, level, children)
}

fn delete_list(have: &[Value], want: &[Value], level: &Level) -> DiffPlan {
    let mut plan = DiffPlan::default();
    if want.is_empty() {
        plan.to_remove = have.iter().filter_map(|i| i.as_object().cloned()).collect();
        return plan;
    }

    for item in want {
        let Some(wanted) = item.as_object() else {
            continue;
        };
        let Some(index) = find_match(have, wanted, level) else {
            continue;
        };
        let Some(existing) = have[index].as_object() else {
            continue;
        };
        if plan.to_remove.contains(existing) {
            continue;
        }
        let bare = carries_only_key(wanted, level)
            || NaturalKey::of(wanted, level.key_fields()).is_none()
            || level.is_atomic();
        if bare {
            plan.to_remove.push(existing.clone());
        } else {
            let diff = delete_entity(level, key_of(existing, level), existing, wanted);
            if !diff.is_empty() {
                plan.to_modify.push(diff);
            }
        }
    }
    plan
}
