//! Grammar descriptors.
//!
//! A resource is described once, as a tree of [`Level`]s mirroring the shape
//! of its facts. Each level names the list it lives in, the natural key of
//! its entities, how those entities are entered and removed on the device,
//! and one [`FieldRule`] per configurable field. The differ, renderer and
//! parser are generic over this description.

use super::parser::Parser;
use super::tree::{canonicalize_sets, get_path, prune, scalar_text, SetKind, Tree};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Renders the lines asserting a field value.
pub type LineFn = Box<dyn Fn(&Value, &Scope<'_>) -> Vec<String> + Send + Sync>;
/// Renders the lines moving a field from an old to a new value.
pub type ChangeFn = Box<dyn Fn(&Value, &Value, &Scope<'_>) -> Vec<String> + Send + Sync>;
/// Renders a mode-entry line for an entity.
pub type HeaderFn = Box<dyn Fn(&Scope<'_>) -> Option<String> + Send + Sync>;
/// Renders whole-entity commands, such as a removal.
pub type EntityFn = Box<dyn Fn(&Scope<'_>) -> Vec<String> + Send + Sync>;

/// The entity being rendered together with its enclosing entities.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub entity: &'a Tree,
    parents: &'a [&'a Tree],
}

impl<'a> Scope<'a> {
    pub fn new(entity: &'a Tree, parents: &'a [&'a Tree]) -> Self {
        Self { entity, parents }
    }

    pub fn get(&self, path: &str) -> Option<&'a Value> {
        get_path(self.entity, path)
    }

    /// Scalar at `path` as text.
    pub fn text(&self, path: &str) -> Option<String> {
        self.get(path).map(scalar_text)
    }

    /// Whether the boolean at `path` is present and true.
    pub fn flag(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Bool(true)))
    }

    /// Nearest enclosing entity.
    pub fn parent(&self) -> Option<&'a Tree> {
        self.parents.last().copied()
    }

    /// Scalar at `path` in the nearest enclosing entity.
    pub fn parent_text(&self, path: &str) -> Option<String> {
        self.parent().and_then(|p| get_path(p, path)).map(scalar_text)
    }

    /// Scalar at `path` in the closest ancestor that has it.
    pub fn inherited(&self, path: &str) -> Option<String> {
        self.text(path).or_else(|| {
            self.parents
                .iter()
                .rev()
                .find_map(|p| get_path(p, path))
                .map(scalar_text)
        })
    }
}

/// Turn a command into its negation, or a negation back into the command.
pub fn negate(line: &str) -> String {
    match line.strip_prefix("no ") {
        Some(positive) => positive.to_string(),
        None => format!("no {line}"),
    }
}

// ============================================================================
// Field rules
// ============================================================================

/// How one field (a leaf or a fixed-shape sub-object) maps to commands.
pub struct FieldRule {
    path: &'static str,
    set: LineFn,
    unset: Option<LineFn>,
    change: Option<ChangeFn>,
    clear: Option<ChangeFn>,
    reset: bool,
    mode: Option<HeaderFn>,
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("path", &self.path)
            .field("mode", &self.mode.is_some())
            .finish()
    }
}

impl FieldRule {
    /// A rule covering `path`. The empty path covers the whole entity.
    pub fn new<F>(path: &'static str, set: F) -> Self
    where
        F: Fn(&Value, &Scope<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            path,
            set: Box::new(set),
            unset: None,
            change: None,
            clear: None,
            reset: false,
            mode: None,
        }
    }

    /// A rule rendering at most one line.
    pub fn line<F>(path: &'static str, set: F) -> Self
    where
        F: Fn(&Value, &Scope<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(path, move |value, scope| set(value, scope).into_iter().collect())
    }

    /// `<prefix> <value>`, negated by `no <prefix> <value>`.
    pub fn value(path: &'static str, prefix: &'static str) -> Self {
        Self::line(path, move |value, _| Some(format!("{} {}", prefix, scalar_text(value))))
    }

    /// Boolean keyword: true renders `keyword`, false renders `no keyword`.
    pub fn flag(path: &'static str, keyword: &'static str) -> Self {
        Self::line(path, move |value, _| match value {
            Value::Bool(true) => Some(keyword.to_string()),
            Value::Bool(false) => Some(format!("no {keyword}")),
            _ => None,
        })
    }

    /// Override how the field is removed.
    pub fn unset<F>(mut self, unset: F) -> Self
    where
        F: Fn(&Value, &Scope<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.unset = Some(Box::new(unset));
        self
    }

    /// Removal is always the single line `line`.
    pub fn unset_line(self, line: &'static str) -> Self {
        self.unset(move |_, _| vec![line.to_string()])
    }

    /// Override how an existing value is changed into a new one.
    pub fn on_change<F>(mut self, change: F) -> Self
    where
        F: Fn(&Value, &Value, &Scope<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.change = Some(Box::new(change));
        self
    }

    /// Lines that clear part of an existing value before it changes. They
    /// are emitted with the entity's negations, ahead of any assertion.
    pub fn clear_on_change<F>(mut self, clear: F) -> Self
    where
        F: Fn(&Value, &Value, &Scope<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.clear = Some(Box::new(clear));
        self
    }

    /// A changed value is removed before the new one is set, for commands
    /// that add to rather than replace the existing value.
    pub fn reset_on_change(mut self) -> Self {
        self.reset = true;
        self
    }

    /// Lines of this field live under a separate configuration mode.
    pub fn mode<F>(mut self, header: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.mode = Some(Box::new(header));
        self
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Whether a changed leaf at `path` is rendered by this rule.
    pub fn covers(&self, path: &str) -> bool {
        self.path.is_empty()
            || path == self.path
            || path
                .strip_prefix(self.path)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// The value this rule renders from `fields`.
    pub fn value_in(&self, fields: &Tree) -> Option<Value> {
        if self.path.is_empty() {
            Some(Value::Object(fields.clone()))
        } else {
            get_path(fields, self.path).cloned()
        }
    }

    pub fn render_set(&self, value: &Value, scope: &Scope<'_>) -> Vec<String> {
        (self.set)(value, scope)
    }

    pub fn render_unset(&self, value: &Value, scope: &Scope<'_>) -> Vec<String> {
        match &self.unset {
            Some(unset) => unset(value, scope),
            None => self
                .render_set(value, scope)
                .iter()
                .map(|line| negate(line))
                .collect(),
        }
    }

    pub fn render_change(&self, old: &Value, new: &Value, scope: &Scope<'_>) -> Vec<String> {
        match &self.change {
            Some(change) => change(old, new, scope),
            None if self.reset => {
                let mut lines = self.render_unset(old, scope);
                lines.extend(self.render_set(new, scope));
                lines
            }
            None => self.render_set(new, scope),
        }
    }

    pub fn render_clear(&self, old: &Value, new: &Value, scope: &Scope<'_>) -> Vec<String> {
        self.clear
            .as_ref()
            .map(|clear| clear(old, new, scope))
            .unwrap_or_default()
    }

    pub fn mode_header(&self, scope: &Scope<'_>) -> Option<String> {
        self.mode.as_ref().and_then(|mode| mode(scope))
    }
}

// ============================================================================
// Levels
// ============================================================================

/// One repeatable entity type, or the resource root.
pub struct Level {
    list: &'static str,
    key: Vec<&'static str>,
    grouping: bool,
    atomic: bool,
    no_update: bool,
    creates: bool,
    drop_bare: bool,
    sets: Vec<(&'static str, SetKind)>,
    immutable: Vec<&'static str>,
    header: Option<HeaderFn>,
    removal: Option<EntityFn>,
    rules: Vec<FieldRule>,
    children: Vec<Level>,
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level")
            .field("list", &self.list)
            .field("key", &self.key)
            .field("rules", &self.rules)
            .field("children", &self.children)
            .finish()
    }
}

impl Level {
    /// The root entity of a resource.
    pub fn root() -> Self {
        Self::list("")
    }

    /// Entities stored in the list field `name` of their parent.
    pub fn list(name: &'static str) -> Self {
        Self {
            list: name,
            key: Vec::new(),
            grouping: false,
            atomic: false,
            no_update: false,
            creates: false,
            drop_bare: false,
            sets: Vec::new(),
            immutable: Vec::new(),
            header: None,
            removal: None,
            rules: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn key(mut self, fields: &[&'static str]) -> Self {
        self.key = fields.to_vec();
        self
    }

    /// A grouping level (the ACL address family): replaced only scopes
    /// the replacement of its children and never removes them wholesale.
    pub fn grouping(mut self) -> Self {
        self.grouping = true;
        self
    }

    /// The entity is one command line; a replacement removes and re-adds it.
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    /// An existing entity may not be changed under merged.
    pub fn no_update(mut self) -> Self {
        self.no_update = true;
        self
    }

    /// The header line alone creates the entity on the device.
    pub fn creates(mut self) -> Self {
        self.creates = true;
        self
    }

    /// Parsed entities carrying nothing but their key are not reported.
    pub fn drop_bare(mut self) -> Self {
        self.drop_bare = true;
        self
    }

    pub fn set(mut self, path: &'static str, kind: SetKind) -> Self {
        self.sets.push((path, kind));
        self
    }

    /// Fields that cannot change in place.
    pub fn immutable(mut self, fields: &[&'static str]) -> Self {
        self.immutable = fields.to_vec();
        self
    }

    pub fn header<F>(mut self, header: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.header = Some(Box::new(header));
        self
    }

    pub fn removal<F>(mut self, removal: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.removal = Some(Box::new(removal));
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn child(mut self, level: Level) -> Self {
        self.children.push(level);
        self
    }

    pub fn name(&self) -> &'static str {
        self.list
    }

    pub fn key_fields(&self) -> &[&'static str] {
        &self.key
    }

    pub fn is_grouping(&self) -> bool {
        self.grouping
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn is_no_update(&self) -> bool {
        self.no_update
    }

    pub fn header_creates(&self) -> bool {
        self.creates
    }

    pub fn sets(&self) -> &[(&'static str, SetKind)] {
        &self.sets
    }

    pub fn immutable_fields(&self) -> &[&'static str] {
        &self.immutable
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn children(&self) -> &[Level] {
        &self.children
    }

    pub fn child_level(&self, name: &str) -> Option<&Level> {
        self.children.iter().find(|child| child.list == name)
    }

    pub fn header_line(&self, scope: &Scope<'_>) -> Option<String> {
        self.header.as_ref().and_then(|header| header(scope))
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn has_custom_removal(&self) -> bool {
        self.removal.is_some()
    }

    pub fn custom_removal(&self, scope: &Scope<'_>) -> Option<Vec<String>> {
        self.removal.as_ref().map(|removal| removal(scope))
    }

    /// The entity without its child lists.
    pub fn fields_of(&self, entity: &Tree) -> Tree {
        entity
            .iter()
            .filter(|(name, _)| self.child_level(name).is_none())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Child list `name` of `entity`, empty when absent.
    pub fn items<'t>(entity: &'t Tree, name: &str) -> &'t [Value] {
        entity
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rewrite the set leaves of `entity` and its descendants into canonical
    /// form so that plain equality agrees with set equality.
    pub fn normalize_sets(&self, entity: &mut Tree) {
        canonicalize_sets(entity, &self.sets);
        for child in &self.children {
            if let Some(Value::Array(items)) = entity.get_mut(child.list) {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        child.normalize_sets(inner);
                    }
                }
            }
        }
    }

    /// Whether `path` is carried by the entity header rather than a rule.
    pub fn in_header(&self, path: &str) -> bool {
        self.key.iter().chain(self.immutable.iter()).any(|f| *f == path)
    }

    /// Remove parsed entities that carry nothing beyond their key, at every
    /// level flagged with [`Level::drop_bare`].
    pub fn drop_bare_entities(&self, entity: &mut Tree) {
        for child in &self.children {
            if let Some(Value::Array(items)) = entity.get_mut(child.list) {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        child.drop_bare_entities(inner);
                    }
                }
                if child.drop_bare {
                    items.retain(|item| {
                        item.as_object()
                            .is_some_and(|inner| inner.keys().any(|k| !child.key.iter().any(|f| *f == k.as_str())))
                    });
                }
            }
        }
    }
}

// ============================================================================
// Typed models
// ============================================================================

/// Typed view of a resource's configuration, used to validate desired state
/// and canonicalize parsed facts.
pub trait ResourceModel: Serialize + DeserializeOwned {
    /// Fill derivable fields and check cross-field constraints.
    fn normalize(&mut self) -> Result<(), String> {
        Ok(())
    }
}

impl<T: ResourceModel> ResourceModel for Vec<T> {
    fn normalize(&mut self) -> Result<(), String> {
        self.iter_mut().try_for_each(ResourceModel::normalize)
    }
}

/// Round-trip `value` through the model `M`, returning the pruned canonical
/// JSON form.
pub fn canonicalize<M: ResourceModel>(value: Value) -> Result<Value, String> {
    let mut model: M = serde_json::from_value(value).map_err(|e| e.to_string())?;
    model.normalize()?;
    let mut canonical = serde_json::to_value(&model).map_err(|e| e.to_string())?;
    prune(&mut canonical);
    Ok(canonical)
}

/// Everything the engine needs to know about one resource.
pub struct Grammar {
    /// Module name, e.g. `ios_acls`.
    pub name: &'static str,
    /// Command the device is asked for when gathering facts.
    pub show_command: &'static str,
    /// Field holding the entity list for list-shaped resources.
    pub list_field: Option<&'static str>,
    pub root: Level,
    pub parser: Parser,
    pub canonical: fn(Value) -> Result<Value, String>,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("name", &self.name)
            .field("show_command", &self.show_command)
            .finish()
    }
}

impl Grammar {
    /// Wrap caller-facing configuration into the root tree.
    pub fn wrap(&self, config: Value) -> Tree {
        match (self.list_field, config) {
            (Some(field), Value::Null) => {
                let mut root = Tree::new();
                root.insert(field.to_string(), Value::Array(Vec::new()));
                root
            }
            (Some(field), config) => {
                let mut root = Tree::new();
                root.insert(field.to_string(), config);
                root
            }
            (None, Value::Object(map)) => map,
            (None, _) => Tree::new(),
        }
    }

    /// Caller-facing configuration of a root tree.
    pub fn unwrap(&self, root: &Tree) -> Value {
        match self.list_field {
            Some(field) => root
                .get(field)
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            None => Value::Object(root.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Tree {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_negate() {
        assert_eq!(negate("shutdown"), "no shutdown");
        assert_eq!(negate("no shutdown"), "shutdown");
    }

    #[test]
    fn test_rule_coverage() {
        let rule = FieldRule::value("timers", "standby timers");
        assert!(rule.covers("timers"));
        assert!(rule.covers("timers.hello_interval"));
        assert!(!rule.covers("timers_extra"));
        assert!(FieldRule::value("", "x").covers("anything"));
    }

    #[test]
    fn test_flag_rule_rendering() {
        let entity = tree(json!({"shutdown": true}));
        let scope = Scope::new(&entity, &[]);
        let rule = FieldRule::flag("shutdown", "shutdown");

        assert_eq!(rule.render_set(&json!(true), &scope), vec!["shutdown"]);
        assert_eq!(rule.render_set(&json!(false), &scope), vec!["no shutdown"]);
        assert_eq!(rule.render_unset(&json!(true), &scope), vec!["no shutdown"]);
    }

    #[test]
    fn test_scope_parents() {
        let parent = tree(json!({"route_map": "test_1"}));
        let entity = tree(json!({"action": "deny", "sequence": 10}));
        let parents = [&parent];
        let scope = Scope::new(&entity, &parents);

        assert_eq!(scope.parent_text("route_map").as_deref(), Some("test_1"));
        assert_eq!(scope.inherited("route_map").as_deref(), Some("test_1"));
        assert_eq!(scope.text("sequence").as_deref(), Some("10"));
    }

    #[test]
    fn test_drop_bare_entities() {
        let level = Level::root().child(Level::list("config").key(&["name"]).drop_bare());
        let mut root = tree(json!({"config": [{"name": "Gi0/1"}, {"name": "Vlan70", "version": 2}]}));
        level.drop_bare_entities(&mut root);
        assert_eq!(root.get("config"), Some(&json!([{"name": "Vlan70", "version": 2}])));
    }
}
