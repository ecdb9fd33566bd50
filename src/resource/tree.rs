//! Structured fact trees.
//!
//! Facts parsed from a device and desired state supplied by the caller share
//! one representation: a JSON object whose values are scalars, nested
//! objects, scalar lists, or lists of keyed entities. "Not configured" is
//! represented by the absence of a key; [`prune`] removes nulls and empty
//! containers so there is exactly one way to say it.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A facts tree, or one entity inside it.
pub type Tree = Map<String, Value>;

/// Comparison semantics for list-valued leaves that are unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// Scalars compared as a set, order ignored.
    Plain,
    /// VLAN lists such as `["10-20", "30"]`, compared as expanded id sets.
    VlanRanges,
    /// Scalars whose device order matters. Duplicates are dropped, merging
    /// appends new members after the existing ones.
    Ordered,
}

/// Look up a dotted path such as `match.community.name`.
///
/// The empty path is not a field lookup; callers that need the whole entity
/// handle it themselves.
pub fn get_path<'a>(tree: &'a Tree, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut parts = path.split('.');
    let mut current = tree.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects.
pub fn set_path(tree: &mut Tree, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };
    let mut current = tree;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => current = map,
            _ => return,
        }
    }
    current.insert(last.to_string(), value);
}

/// Remove the value at a dotted path, returning it.
pub fn remove_path(tree: &mut Tree, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => tree.remove(path),
        Some((head, rest)) => {
            let child = tree.get_mut(head)?.as_object_mut()?;
            let removed = remove_path(child, rest);
            if child.is_empty() {
                tree.remove(head);
            }
            removed
        }
    }
}

/// Drop nulls, empty objects and empty lists, recursively.
///
/// Returns `true` when the value itself became empty.
pub fn prune(value: &mut Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => {
            prune_tree(map);
            map.is_empty()
        }
        Value::Array(items) => {
            items.retain_mut(|item| !prune(item));
            items.is_empty()
        }
        _ => false,
    }
}

/// [`prune`] applied to every field of a tree.
pub fn prune_tree(tree: &mut Tree) {
    tree.retain(|_, value| !prune(value));
}

/// Total order over JSON scalars: numbers numerically, everything else by
/// its string form.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Render a scalar without JSON quoting.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every leaf of `tree` keyed by dotted path. Lists are leaves; nested
/// objects are walked. Fields named in `skip` are left out at the top level.
pub fn leaves(tree: &Tree, skip: &[&str]) -> BTreeMap<String, Value> {
    fn walk(prefix: &str, tree: &Tree, out: &mut BTreeMap<String, Value>) {
        for (key, value) in tree {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Object(child) => walk(&path, child, out),
                other => {
                    out.insert(path, other.clone());
                }
            }
        }
    }

    let mut out = BTreeMap::new();
    for (key, value) in tree {
        if skip.iter().any(|field| *field == key.as_str()) {
            continue;
        }
        match value {
            Value::Object(child) => walk(key, child, &mut out),
            other => {
                out.insert(key.clone(), other.clone());
            }
        }
    }
    out
}

// ============================================================================
// Set-valued leaves
// ============================================================================

fn as_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Highest VLAN id IOS accepts.
pub const VLAN_MAX: u32 = 4094;

/// Keyword for an explicitly empty VLAN list (`allowed vlan none`).
pub const VLAN_NONE: &str = "none";

/// Keyword for the full VLAN range (`allowed vlan all`).
pub const VLAN_ALL: &str = "all";

/// Parse one comma-separated part of a VLAN list: `N` or `N-M` with
/// `1 <= N <= M <= 4094`.
pub fn parse_vlan_range(part: &str) -> Result<(u32, u32), String> {
    let id = |text: &str| {
        let text = text.trim();
        text.parse::<u32>()
            .ok()
            .filter(|id| (1..=VLAN_MAX).contains(id))
            .ok_or_else(|| format!("'{text}' is not a VLAN id in 1-{VLAN_MAX}"))
    };
    match part.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (id(start)?, id(end)?);
            if start > end {
                return Err(format!("range '{}' ends before it starts", part.trim()));
            }
            Ok((start, end))
        }
        None => id(part).map(|id| (id, id)),
    }
}

/// Whether a VLAN list is the explicit `none` keyword.
pub fn is_vlan_none(value: &Value) -> bool {
    as_items(value)
        .iter()
        .any(|item| item.as_str().map(str::trim) == Some(VLAN_NONE))
}

/// Expand a VLAN list (`["10-12", "30"]`, `"10-12,30"` or integers) into ids.
///
/// `all` expands to every id and `none` to no ids. Parts that are not valid
/// ids or ranges within 1-4094 contribute nothing; desired state is checked
/// with [`parse_vlan_range`] before it gets here.
pub fn expand_vlans(value: &Value) -> BTreeSet<u32> {
    let mut ids = BTreeSet::new();
    for item in as_items(value) {
        let text = scalar_text(&item);
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part == VLAN_ALL {
                ids.extend(1..=VLAN_MAX);
            } else if let Ok((start, end)) = parse_vlan_range(part) {
                ids.extend(start..=end);
            }
        }
    }
    ids
}

/// Compress ids back into the range strings IOS prints.
pub fn compress_vlans(ids: &BTreeSet<u32>) -> Vec<String> {
    let mut ranges = Vec::new();
    let mut iter = ids.iter().copied();
    let Some(first) = iter.next() else {
        return ranges;
    };
    fn flush(start: u32, end: u32, ranges: &mut Vec<String>) {
        if start == end {
            ranges.push(start.to_string());
        } else {
            ranges.push(format!("{start}-{end}"));
        }
    }

    let (mut start, mut end) = (first, first);
    for id in iter {
        if id == end + 1 {
            end = id;
        } else {
            flush(start, end, &mut ranges);
            start = id;
            end = id;
        }
    }
    flush(start, end, &mut ranges);
    ranges
}

impl SetKind {
    /// Canonical form used when storing a set leaf.
    pub fn canonical(self, value: &Value) -> Value {
        match self {
            SetKind::Plain => {
                let mut items = as_items(value);
                items.sort_by(value_cmp);
                items.dedup();
                Value::Array(items)
            }
            SetKind::Ordered => {
                let mut items: Vec<Value> = Vec::new();
                for item in as_items(value) {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                Value::Array(items)
            }
            SetKind::VlanRanges => {
                let ids = expand_vlans(value);
                if ids.is_empty() && is_vlan_none(value) {
                    return Value::Array(vec![Value::from(VLAN_NONE)]);
                }
                Value::Array(compress_vlans(&ids).into_iter().map(Value::String).collect())
            }
        }
    }

    pub fn equal(self, a: &Value, b: &Value) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    /// Whether every member of `subset` is in `superset`.
    pub fn contains(self, superset: &Value, subset: &Value) -> bool {
        match self {
            SetKind::Plain | SetKind::Ordered => {
                let members = as_items(superset);
                as_items(subset).iter().all(|item| members.contains(item))
            }
            SetKind::VlanRanges => expand_vlans(subset).is_subset(&expand_vlans(superset)),
        }
    }

    pub fn union(self, a: &Value, b: &Value) -> Value {
        match self {
            SetKind::Plain | SetKind::Ordered => {
                let mut items = as_items(a);
                items.extend(as_items(b));
                self.canonical(&Value::Array(items))
            }
            SetKind::VlanRanges => {
                let mut ids = expand_vlans(a);
                ids.extend(expand_vlans(b));
                self.canonical(&Value::Array(
                    ids.into_iter().map(Value::from).collect(),
                ))
            }
        }
    }

    /// Members of `a` missing from `b`, in canonical form.
    pub fn difference(self, a: &Value, b: &Value) -> Value {
        match self {
            SetKind::Plain | SetKind::Ordered => {
                let other = as_items(b);
                let rest = as_items(a)
                    .into_iter()
                    .filter(|item| !other.contains(item))
                    .collect();
                self.canonical(&Value::Array(rest))
            }
            SetKind::VlanRanges => {
                let ids: BTreeSet<u32> = expand_vlans(a)
                    .difference(&expand_vlans(b))
                    .copied()
                    .collect();
                Value::Array(compress_vlans(&ids).into_iter().map(Value::String).collect())
            }
        }
    }
}

/// Deep-merge `overlay` onto `base`. Objects merge recursively, set leaves
/// (by dotted path relative to the entity) are unioned, anything else in
/// `overlay` wins.
pub fn deep_merge(base: &Tree, overlay: &Tree, sets: &[(&str, SetKind)]) -> Tree {
    fn merge_at(prefix: &str, base: &Tree, overlay: &Tree, sets: &[(&str, SetKind)]) -> Tree {
        let mut out = base.clone();
        for (key, value) in overlay {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            let merged = match (out.get(key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    Value::Object(merge_at(&path, existing, incoming, sets))
                }
                (Some(existing), incoming) => match set_kind(sets, &path) {
                    Some(kind) => kind.union(existing, incoming),
                    None => incoming.clone(),
                },
                (None, incoming) => incoming.clone(),
            };
            out.insert(key.clone(), merged);
        }
        out
    }
    merge_at("", base, overlay, sets)
}

/// Set kind registered for `path`, if any.
pub fn set_kind(sets: &[(&str, SetKind)], path: &str) -> Option<SetKind> {
    sets.iter()
        .find(|(candidate, _)| *candidate == path)
        .map(|(_, kind)| *kind)
}

/// Rewrite every set leaf into canonical form.
pub fn canonicalize_sets(tree: &mut Tree, sets: &[(&str, SetKind)]) {
    for (path, kind) in sets {
        if let Some(value) = get_path(tree, path) {
            let canonical = kind.canonical(value);
            set_path(tree, path, canonical);
        }
    }
}

// ============================================================================
// Natural keys
// ============================================================================

/// Values of an entity's key fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey(Vec<(String, Value)>);

impl NaturalKey {
    /// Extract the key of `entity`. `None` when any key field is absent.
    pub fn of(entity: &Tree, fields: &[&str]) -> Option<Self> {
        fields
            .iter()
            .map(|field| {
                get_path(entity, field).map(|value| ((*field).to_string(), value.clone()))
            })
            .collect::<Option<Vec<_>>>()
            .map(NaturalKey)
    }

    /// Key of the root entity, which has no key fields.
    pub fn root() -> Self {
        NaturalKey(Vec::new())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| format!("{}={}", name, scalar_text(value)))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
