// src/core/mutation.rs

//! The editable environment model and the commands that change it.
//!
//! Every command runs against a draft copy; the draft replaces the model
//! only when the whole command succeeded, and the effective list is rebuilt
//! after each commit.

use crate::constants::{
    DEFAULT_SCOPE, DEFAULT_SCOPE_PRIORITY, PLACEHOLDER_KEY, PRIORITY_STEP,
};
use crate::core::catalog::{CatalogError, ScopeCatalog};
use crate::core::store::{StoreError, VariableStore, is_valid_variable_name};
use crate::core::unify::{self, has_command_substitution, has_unsafe_chars};
use crate::models::{
    AuxScopeEntry, EffectiveVariable, RuntimeContext, Scope, ScopeId, ScopeKind, VariableId,
    VariableRecord,
};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Scope '{0}' is read-only.")]
    ReadOnlyScope(ScopeId),
    #[error(
        "The value of '{0}' contains a double quote or backslash, which environment files cannot hold."
    )]
    UnsafeValue(String),
    #[error("No room left between priorities {lower} and {upper}. Set an explicit priority instead.")]
    PriorityGapExhausted { lower: f64, upper: f64 },
    #[error(
        "Scopes '{before}' and '{after}' share priority {priority}, so nothing fits between them. Give one of them its own priority first."
    )]
    TiedNeighbours { before: ScopeId, after: ScopeId, priority: f64 },
    #[error("Drop position {index} is outside the loading order (0..={len}).")]
    InvalidDropPosition { index: usize, len: usize },
}

pub type MutationResult<T> = Result<T, MutationError>;

/// Where a dragged scope should land.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Index in the loading order without the dragged scope and the system scope.
    Index(usize),
    Priority(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddVariable {
        name: Option<String>,
        value: String,
        scope: Option<ScopeId>,
        comment: String,
    },
    DeleteVariable(VariableId),
    RenameVariable { id: VariableId, new_name: String },
    SetValue { id: VariableId, value: String },
    SetEnabled { id: VariableId, enabled: bool },
    SetComment { id: VariableId, comment: String },
    ChangeScope { id: VariableId, to: ScopeId },
    CopyToGlobal(VariableId),
    AddScope { name: String, priority: Option<f64> },
    DeleteScope(ScopeId),
    ReorderScope { scope: ScopeId, placement: Placement },
}

/// What a successful command did, for the caller to report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    VariableAdded(VariableId),
    VariableRemoved(VariableId),
    VariableRenamed { from: VariableId, to: VariableId },
    VariableUpdated(VariableId),
    VariableMoved { from: VariableId, to: VariableId },
    ScopeAdded { scope: ScopeId, priority: f64 },
    ScopeDeleted { scope: ScopeId, removed_variables: usize },
    ScopeReordered { scope: ScopeId, from: f64, to: f64 },
    /// The command targeted a read-only definition and was ignored.
    NotEditable(VariableId),
    /// The value contains `` ` `` or `$(`; it is stored but will never be evaluated.
    CommandSubstitution(VariableId),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvironmentModel {
    catalog: ScopeCatalog,
    store: VariableStore,
    effective: Vec<EffectiveVariable>,
    /// Etc scopes deleted in this session whose files must go on save.
    retired: BTreeSet<String>,
    default_scope: String,
}

impl EnvironmentModel {
    pub fn new(catalog: ScopeCatalog, store: VariableStore) -> Self {
        let effective = unify::unify(&catalog, &store);
        Self {
            catalog,
            store,
            effective,
            retired: BTreeSet::new(),
            default_scope: DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn with_default_scope(mut self, scope: &str) -> Self {
        self.default_scope = scope.to_string();
        self
    }

    pub fn catalog(&self) -> &ScopeCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn effective(&self) -> &[EffectiveVariable] {
        &self.effective
    }

    pub fn retired_scopes(&self) -> impl Iterator<Item = &String> {
        self.retired.iter()
    }

    /// Forgets deleted scopes once their files are gone.
    pub fn clear_retired(&mut self) {
        self.retired.clear();
    }

    pub fn find_effective(&self, key: &str) -> Option<&EffectiveVariable> {
        self.effective.iter().find(|v| v.key == key)
    }

    pub fn overlay_entries(&self) -> Vec<AuxScopeEntry> {
        self.catalog.overlay_entries()
    }

    /// Replaces the system scope's variables with facts for a (possibly new) root.
    pub fn install_system_variables(&mut self, records: Vec<VariableRecord>) {
        let system = ScopeId::system();
        self.store.drop_scope(&system);
        self.store.ensure_scope(&system);
        for record in records {
            if let Err(e) = self.store.put(&system, record) {
                log::warn!("Skipping system variable: {}", e);
            }
        }
        self.effective = unify::unify(&self.catalog, &self.store);
    }

    /// Applies a command atomically.
    pub fn apply(&mut self, command: Command) -> MutationResult<Vec<Event>> {
        let mut draft = self.clone();
        let events = draft.execute(command)?;
        draft.effective = unify::unify(&draft.catalog, &draft.store);
        *self = draft;
        Ok(events)
    }

    fn execute(&mut self, command: Command) -> MutationResult<Vec<Event>> {
        match command {
            Command::AddVariable {
                name,
                value,
                scope,
                comment,
            } => self.add_variable(name, value, scope, comment),
            Command::DeleteVariable(id) => self.delete_variable(id),
            Command::RenameVariable { id, new_name } => self.rename_variable(id, new_name),
            Command::SetValue { id, value } => self.set_value(id, value),
            Command::SetEnabled { id, enabled } => {
                self.editable(&id)?;
                self.store.get_mut(&id.scope, &id.name)?.enabled = enabled;
                Ok(vec![Event::VariableUpdated(id)])
            }
            Command::SetComment { id, comment } => {
                self.editable(&id)?;
                self.store.get_mut(&id.scope, &id.name)?.comment = comment;
                Ok(vec![Event::VariableUpdated(id)])
            }
            Command::ChangeScope { id, to } => self.change_scope(id, to),
            Command::CopyToGlobal(id) => self.copy_to_global(id),
            Command::AddScope { name, priority } => self.add_scope(name, priority),
            Command::DeleteScope(scope) => self.delete_scope(scope),
            Command::ReorderScope { scope, placement } => self.reorder_scope(scope, placement),
        }
    }

    // --- Variable commands ---

    fn editable(&self, id: &VariableId) -> MutationResult<()> {
        if !id.scope.kind.is_editable() {
            return Err(MutationError::ReadOnlyScope(id.scope.clone()));
        }
        if !self.store.contains(&id.scope, &id.name) {
            return Err(StoreError::UnknownVariable {
                scope: id.scope.clone(),
                name: id.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn check_value(id: &VariableId, value: &str) -> MutationResult<Vec<Event>> {
        if has_unsafe_chars(value) {
            return Err(MutationError::UnsafeValue(id.name.clone()));
        }
        if has_command_substitution(value) {
            log::warn!("Value of '{}' uses command substitution and will not be evaluated", id);
            return Ok(vec![Event::CommandSubstitution(id.clone())]);
        }
        Ok(Vec::new())
    }

    /// First free name of the form `KEY`, `KEY_2`, `KEY_3`, ... in a scope.
    fn placeholder_name(&self, scope: &ScopeId) -> String {
        if !self.store.contains(scope, PLACEHOLDER_KEY) {
            return PLACEHOLDER_KEY.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", PLACEHOLDER_KEY, n))
            .find(|candidate| !self.store.contains(scope, candidate))
            .unwrap_or_else(|| PLACEHOLDER_KEY.to_string())
    }

    /// Makes sure an etc scope exists, creating it at the user default priority if needed.
    fn ensure_etc_scope(&mut self, scope: &ScopeId, events: &mut Vec<Event>) -> MutationResult<()> {
        if !scope.kind.is_editable() {
            return Err(MutationError::ReadOnlyScope(scope.clone()));
        }
        if !self.catalog.contains(scope) {
            let priority = if scope.name == self.default_scope {
                DEFAULT_SCOPE_PRIORITY
            } else {
                self.default_user_priority()
            };
            self.catalog.add_scope(&scope.name, ScopeKind::Etc, priority)?;
            self.retired.remove(&scope.name);
            events.push(Event::ScopeAdded {
                scope: scope.clone(),
                priority,
            });
        }
        self.store.ensure_scope(scope);
        Ok(())
    }

    fn add_variable(
        &mut self,
        name: Option<String>,
        value: String,
        scope: Option<ScopeId>,
        comment: String,
    ) -> MutationResult<Vec<Event>> {
        let scope = scope.unwrap_or_else(|| ScopeId::etc(self.default_scope.clone()));
        let mut events = Vec::new();

        // An explicitly named scope must already exist; the default one may be created.
        if scope.name != self.default_scope && !self.catalog.contains(&scope) {
            return Err(CatalogError::UnknownScope(scope).into());
        }
        self.ensure_etc_scope(&scope, &mut events)?;

        let name = match name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => self.placeholder_name(&scope),
        };
        let id = VariableId::new(scope.clone(), name.clone());
        let warnings = Self::check_value(&id, &value)?;

        self.store
            .put(&scope, VariableRecord::new(name, value).with_comment(comment))?;
        events.push(Event::VariableAdded(id));
        events.extend(warnings);
        Ok(events)
    }

    fn delete_variable(&mut self, id: VariableId) -> MutationResult<Vec<Event>> {
        if !id.scope.kind.is_editable() {
            log::info!("Ignoring delete of read-only variable '{}'", id);
            return Ok(vec![Event::NotEditable(id)]);
        }
        self.store.remove(&id.scope, &id.name)?;
        Ok(vec![Event::VariableRemoved(id)])
    }

    fn rename_variable(&mut self, id: VariableId, new_name: String) -> MutationResult<Vec<Event>> {
        self.editable(&id)?;
        let new_name = new_name.trim().to_string();
        if !is_valid_variable_name(&new_name) {
            return Err(StoreError::InvalidName(new_name).into());
        }
        self.store.rename(&id.scope, &id.name, &new_name)?;
        let to = VariableId::new(id.scope.clone(), new_name);
        Ok(vec![Event::VariableRenamed { from: id, to }])
    }

    fn set_value(&mut self, id: VariableId, value: String) -> MutationResult<Vec<Event>> {
        self.editable(&id)?;
        let warnings = Self::check_value(&id, &value)?;
        self.store.get_mut(&id.scope, &id.name)?.raw_value = value;

        let mut events = vec![Event::VariableUpdated(id)];
        events.extend(warnings);
        Ok(events)
    }

    fn change_scope(&mut self, id: VariableId, to: ScopeId) -> MutationResult<Vec<Event>> {
        self.editable(&id)?;
        if id.scope == to {
            return Ok(Vec::new());
        }
        if self.store.contains(&to, &id.name) {
            return Err(StoreError::DuplicateKey {
                scope: to,
                name: id.name,
            }
            .into());
        }

        let mut events = Vec::new();
        self.ensure_etc_scope(&to, &mut events)?;
        self.store.move_variable(&id.scope, &id.name, &to)?;
        let moved = VariableId::new(to, id.name.clone());
        events.push(Event::VariableMoved { from: id, to: moved });
        Ok(events)
    }

    fn copy_to_global(&mut self, id: VariableId) -> MutationResult<Vec<Event>> {
        let record = self
            .store
            .get(&id.scope, &id.name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownVariable {
                scope: id.scope.clone(),
                name: id.name.clone(),
            })?;
        let global = ScopeId::etc(DEFAULT_SCOPE);
        if global == id.scope {
            return Err(StoreError::DuplicateKey {
                scope: global,
                name: id.name,
            }
            .into());
        }

        let mut events = Vec::new();
        self.ensure_etc_scope(&global, &mut events)?;
        let copied = VariableId::new(global.clone(), record.name.clone());
        self.store.put(&global, record)?;
        events.push(Event::VariableAdded(copied));
        Ok(events)
    }

    // --- Scope commands ---

    /// Midpoint between `global` and the next scope after it, or `global + 100`.
    pub fn default_user_priority(&self) -> f64 {
        let global = self
            .catalog
            .get(&ScopeId::etc(DEFAULT_SCOPE))
            .map(|s| s.priority)
            .unwrap_or(DEFAULT_SCOPE_PRIORITY);
        let successor = self
            .catalog
            .loading_order()
            .into_iter()
            .map(|s| s.priority)
            .find(|p| *p > global);
        match successor {
            Some(next) => (global + next) / 2.0,
            None => global + PRIORITY_STEP,
        }
    }

    fn add_scope(&mut self, name: String, priority: Option<f64>) -> MutationResult<Vec<Event>> {
        let name = name.trim().to_string();
        let priority = priority.unwrap_or_else(|| self.default_user_priority());
        let scope = self.catalog.add_scope(&name, ScopeKind::Etc, priority)?.id();
        self.store.ensure_scope(&scope);
        self.retired.remove(&name);
        Ok(vec![Event::ScopeAdded { scope, priority }])
    }

    fn delete_scope(&mut self, scope: ScopeId) -> MutationResult<Vec<Event>> {
        if !scope.kind.is_editable() {
            return Err(CatalogError::NotDeletable(scope).into());
        }
        self.catalog.remove_scope(&scope)?;
        let removed_variables = self.store.drop_scope(&scope).len();
        self.retired.insert(scope.name.clone());
        Ok(vec![Event::ScopeDeleted {
            scope,
            removed_variables,
        }])
    }

    fn reorder_scope(&mut self, scope: ScopeId, placement: Placement) -> MutationResult<Vec<Event>> {
        let current = self
            .catalog
            .get(&scope)
            .ok_or_else(|| CatalogError::UnknownScope(scope.clone()))?;
        if !current.draggable {
            return Err(CatalogError::NotDraggable(scope).into());
        }

        let priority = match placement {
            Placement::Priority(p) => p,
            Placement::Index(index) => self.priority_for_drop(&scope, index)?,
        };
        let from = self.catalog.reorder(&scope, priority)?;
        Ok(vec![Event::ScopeReordered {
            scope,
            from,
            to: priority,
        }])
    }

    /// Computes a priority that lands `scope` at `index` of the loading order.
    fn priority_for_drop(&self, scope: &ScopeId, index: usize) -> MutationResult<f64> {
        let others: Vec<&Scope> = self
            .catalog
            .loading_order()
            .into_iter()
            .filter(|s| s.kind != ScopeKind::System && s.id() != *scope)
            .collect();
        if index > others.len() {
            return Err(MutationError::InvalidDropPosition {
                index,
                len: others.len(),
            });
        }

        let before_scope = index.checked_sub(1).and_then(|i| others.get(i));
        let after_scope = others.get(index);
        if let (Some(b), Some(a)) = (before_scope, after_scope) {
            if b.priority == a.priority {
                return Err(MutationError::TiedNeighbours {
                    before: b.id(),
                    after: a.id(),
                    priority: b.priority,
                });
            }
        }
        let before = before_scope.map(|s| s.priority);
        let after = after_scope.map(|s| s.priority);

        match (before, after) {
            (Some(lower), Some(upper)) => {
                let mid = (lower + upper) / 2.0;
                if mid > lower && mid < upper {
                    Ok(mid)
                } else {
                    Err(MutationError::PriorityGapExhausted { lower, upper })
                }
            }
            (None, Some(upper)) => {
                let below = upper - PRIORITY_STEP;
                let candidate = if below > 0.0 { below } else { upper / 2.0 };
                if candidate > 0.0 && candidate < upper {
                    Ok(candidate)
                } else {
                    Err(MutationError::PriorityGapExhausted { lower: 0.0, upper })
                }
            }
            (Some(lower), None) => Ok(lower + PRIORITY_STEP),
            (None, None) => Ok(self
                .catalog
                .get(scope)
                .map(|s| s.priority)
                .unwrap_or(DEFAULT_SCOPE_PRIORITY)),
        }
    }

    /// Lists for every etc scope in the catalog, for saving.
    pub fn etc_lists(&self) -> Vec<(String, Vec<VariableRecord>)> {
        self.catalog
            .etc_scopes()
            .filter(|s| self.store.has_scope(&s.id()))
            .map(|s| (s.name.clone(), self.store.scope(&s.id()).to_vec()))
            .collect()
    }

    /// Builds the model for a freshly loaded project.
    pub fn from_parts(
        ctx: &RuntimeContext,
        etc_overlay: &[AuxScopeEntry],
        share_overlay: &[AuxScopeEntry],
        lists: Vec<(ScopeId, Vec<VariableRecord>)>,
        system: Vec<VariableRecord>,
    ) -> Self {
        let mut catalog = ScopeCatalog::with_builtins(ctx);
        catalog.apply_overlay(ScopeKind::Etc, etc_overlay);
        catalog.apply_overlay(ScopeKind::Share, share_overlay);

        let mut store = VariableStore::new();
        for (scope, records) in lists {
            if !catalog.contains(&scope) {
                log::warn!("No scope '{}' in the loading order; its variables are ignored", scope);
            }
            store.ensure_scope(&scope);
            for record in records {
                if let Err(e) = store.put(&scope, record) {
                    log::warn!("Skipping variable in '{}': {}", scope, e);
                }
            }
        }

        let mut model = Self::new(catalog, store);
        model.install_system_variables(system);
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> EnvironmentModel {
        let ctx = RuntimeContext::new("linux", "box", "alice");
        let lists = vec![
            (
                ScopeId::etc("global"),
                vec![VariableRecord::new("FOO", "g"), VariableRecord::new("BAR", "${FOO}")],
            ),
            (ScopeId::etc("project"), vec![VariableRecord::new("FOO", "p")]),
            (ScopeId::share("plugin"), vec![VariableRecord::new("SHARED", "s")]),
        ];
        EnvironmentModel::from_parts(&ctx, &[], &[], lists, vec![VariableRecord::new("MULLE_UNAME", "linux")])
    }

    fn id(scope: &str, name: &str) -> VariableId {
        VariableId::new(scope.parse().unwrap(), name)
    }

    #[test]
    fn test_add_variable_defaults_and_placeholders() {
        // --- Setup ---
        let mut model = model();

        // --- Execute ---
        for _ in 0..3 {
            model
                .apply(Command::AddVariable { name: None, value: String::new(), scope: None, comment: String::new() })
                .unwrap();
        }

        // --- Assert ---
        let names: Vec<&str> = model
            .store()
            .scope(&ScopeId::etc("global"))
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["FOO", "BAR", "KEY", "KEY_2", "KEY_3"]);
    }

    #[test]
    fn test_add_variable_to_unknown_scope_fails() {
        let mut model = model();
        let err = model
            .apply(Command::AddVariable {
                name: Some("X".to_string()),
                value: "1".to_string(),
                scope: Some(ScopeId::etc("nowhere")),
                comment: String::new(),
            })
            .unwrap_err();
        assert_eq!(err, MutationError::Catalog(CatalogError::UnknownScope(ScopeId::etc("nowhere"))));
    }

    #[test]
    fn test_failed_command_leaves_model_untouched() {
        let mut model = model();
        let before = model.clone();

        let err = model
            .apply(Command::SetValue { id: id("etc:global", "FOO"), value: "say \"hi\"".to_string() })
            .unwrap_err();

        assert_eq!(err, MutationError::UnsafeValue("FOO".to_string()));
        assert_eq!(model, before);
    }

    #[test]
    fn test_substitution_is_stored_with_warning() {
        let mut model = model();
        let events = model
            .apply(Command::SetValue { id: id("etc:global", "BAR"), value: "$(date)".to_string() })
            .unwrap();

        assert!(events.contains(&Event::CommandSubstitution(id("etc:global", "BAR"))));
        assert_eq!(model.store().get(&ScopeId::etc("global"), "BAR").unwrap().raw_value, "$(date)");
    }

    #[test]
    fn test_delete_read_only_is_a_no_op() {
        let mut model = model();
        let before = model.clone();

        let events = model.apply(Command::DeleteVariable(id("share:plugin", "SHARED"))).unwrap();

        assert_eq!(events, vec![Event::NotEditable(id("share:plugin", "SHARED"))]);
        assert_eq!(model, before);
    }

    #[test]
    fn test_delete_reveals_shadowed_definition() {
        let mut model = model();
        assert_eq!(model.find_effective("FOO").unwrap().scope, "project");

        model.apply(Command::DeleteVariable(id("etc:project", "FOO"))).unwrap();

        let foo = model.find_effective("FOO").unwrap();
        assert_eq!((foo.scope.as_str(), foo.raw_value.as_str()), ("global", "g"));
    }

    #[test]
    fn test_rename_trims_and_validates() {
        let mut model = model();
        model
            .apply(Command::RenameVariable { id: id("etc:global", "BAR"), new_name: "  BAZ ".to_string() })
            .unwrap();
        assert!(model.find_effective("BAZ").is_some());

        let err = model
            .apply(Command::RenameVariable { id: id("etc:global", "BAZ"), new_name: "FOO".to_string() })
            .unwrap_err();
        assert!(matches!(err, MutationError::Store(StoreError::DuplicateKey { .. })));

        let err = model
            .apply(Command::RenameVariable { id: id("share:plugin", "SHARED"), new_name: "X".to_string() })
            .unwrap_err();
        assert_eq!(err, MutationError::ReadOnlyScope(ScopeId::share("plugin")));
    }

    #[test]
    fn test_change_scope_creates_missing_destination_once() {
        // --- Setup ---
        let mut model = model();
        let dest = ScopeId::etc("local");

        // --- Execute ---
        let events = model
            .apply(Command::ChangeScope { id: id("etc:global", "BAR"), to: dest.clone() })
            .unwrap();

        // --- Assert ---
        assert!(matches!(events.first(), Some(Event::ScopeAdded { .. })));
        assert!(model.catalog().contains(&dest));
        assert_eq!(model.find_effective("BAR").unwrap().scope, "local");

        // Moving another variable there must not create a second scope.
        let count = model.catalog().len();
        model.apply(Command::ChangeScope { id: id("etc:global", "FOO"), to: dest }).unwrap();
        assert_eq!(model.catalog().len(), count);
    }

    #[test]
    fn test_copy_shared_variable_to_global() {
        let mut model = model();
        model.apply(Command::CopyToGlobal(id("share:plugin", "SHARED"))).unwrap();

        assert!(model.store().contains(&ScopeId::etc("global"), "SHARED"));
        assert!(model.store().contains(&ScopeId::share("plugin"), "SHARED"));
        // The share definition loads earlier and still wins.
        assert_eq!(model.find_effective("SHARED").unwrap().kind, ScopeKind::Share);
    }

    #[test]
    fn test_default_user_priority_sits_after_global() {
        let mut model = model();
        let events = model.apply(Command::AddScope { name: "local".to_string(), priority: None }).unwrap();
        assert_eq!(events, vec![Event::ScopeAdded { scope: ScopeId::etc("local"), priority: 50.0 }]);
    }

    #[test]
    fn test_delete_scope_retires_it() {
        let mut model = model();
        model.apply(Command::AddScope { name: "local".to_string(), priority: Some(45.0) }).unwrap();
        model
            .apply(Command::AddVariable {
                name: Some("X".to_string()),
                value: "1".to_string(),
                scope: Some(ScopeId::etc("local")),
                comment: String::new(),
            })
            .unwrap();

        let events = model.apply(Command::DeleteScope(ScopeId::etc("local"))).unwrap();

        assert_eq!(events, vec![Event::ScopeDeleted { scope: ScopeId::etc("local"), removed_variables: 1 }]);
        assert!(model.find_effective("X").is_none());
        assert_eq!(model.retired_scopes().collect::<Vec<_>>(), vec!["local"]);

        assert!(matches!(
            model.apply(Command::DeleteScope(ScopeId::etc("global"))),
            Err(MutationError::Catalog(CatalogError::NotDeletable(_)))
        ));
    }

    #[test]
    fn test_drop_between_neighbors_uses_midpoint() {
        // --- Setup ---
        let ctx = RuntimeContext::new("linux", "box", "alice");
        let overlay = vec![
            AuxScopeEntry { scope: "a".to_string(), priority: 11.0 },
            AuxScopeEntry { scope: "b".to_string(), priority: 13.0 },
            AuxScopeEntry { scope: "c".to_string(), priority: 30.0 },
        ];
        let mut model = EnvironmentModel::from_parts(&ctx, &overlay, &[], vec![], vec![]);
        let order: Vec<String> = model
            .catalog()
            .loading_order()
            .iter()
            .filter(|s| s.kind != ScopeKind::System && s.name != "c")
            .map(|s| s.name.clone())
            .collect();
        let index_of_b = order.iter().position(|n| n == "b").unwrap();

        // --- Execute ---
        model
            .apply(Command::ReorderScope { scope: ScopeId::etc("c"), placement: Placement::Index(index_of_b) })
            .unwrap();

        // --- Assert ---
        let c = model.catalog().get(&ScopeId::etc("c")).unwrap().priority;
        let a = model.catalog().get(&ScopeId::etc("a")).unwrap().priority;
        let b = model.catalog().get(&ScopeId::etc("b")).unwrap().priority;
        assert!(a < c && c < b);
        assert_eq!((a, b), (11.0, 13.0));
    }

    #[test]
    fn test_drop_into_exhausted_gap_fails() {
        let ctx = RuntimeContext::new("linux", "box", "alice");
        let lower = 10.0_f64;
        let upper = f64::from_bits(lower.to_bits() + 1);
        let overlay = vec![
            AuxScopeEntry { scope: "a".to_string(), priority: lower },
            AuxScopeEntry { scope: "b".to_string(), priority: upper },
            AuxScopeEntry { scope: "c".to_string(), priority: 500.0 },
        ];
        let mut model = EnvironmentModel::from_parts(&ctx, &overlay, &[], vec![], vec![]);
        let order: Vec<String> = model
            .catalog()
            .loading_order()
            .iter()
            .filter(|s| s.kind != ScopeKind::System && s.name != "c")
            .map(|s| s.name.clone())
            .collect();
        let index_of_b = order.iter().position(|n| n == "b").unwrap();

        let err = model
            .apply(Command::ReorderScope { scope: ScopeId::etc("c"), placement: Placement::Index(index_of_b) })
            .unwrap_err();
        assert_eq!(err, MutationError::PriorityGapExhausted { lower, upper });
    }

    #[test]
    fn test_drop_between_tied_neighbours_names_them() {
        // --- Setup ---
        // `local` sits at the default aux priority, tied with `project`.
        let ctx = RuntimeContext::new("linux", "box", "alice");
        let overlay = vec![
            AuxScopeEntry { scope: "local".to_string(), priority: 20.0 },
            AuxScopeEntry { scope: "late".to_string(), priority: 500.0 },
        ];
        let mut model = EnvironmentModel::from_parts(&ctx, &overlay, &[], vec![], vec![]);
        let order: Vec<String> = model
            .catalog()
            .loading_order()
            .iter()
            .filter(|s| s.kind != ScopeKind::System && s.name != "late")
            .map(|s| s.name.clone())
            .collect();
        let index_of_local = order.iter().position(|n| n == "local").unwrap();
        assert_eq!(order.get(index_of_local - 1).map(String::as_str), Some("project"));

        // --- Execute ---
        let err = model
            .apply(Command::ReorderScope { scope: ScopeId::etc("late"), placement: Placement::Index(index_of_local) })
            .unwrap_err();

        // --- Assert ---
        assert_eq!(
            err,
            MutationError::TiedNeighbours {
                before: ScopeId::etc("project"),
                after: ScopeId::etc("local"),
                priority: 20.0
            }
        );
        assert_eq!(model.catalog().get(&ScopeId::etc("late")).unwrap().priority, 500.0);
    }

    #[test]
    fn test_builtin_scope_is_not_draggable() {
        let mut model = model();
        let err = model
            .apply(Command::ReorderScope { scope: ScopeId::etc("global"), placement: Placement::Priority(3.0) })
            .unwrap_err();
        assert_eq!(err, MutationError::Catalog(CatalogError::NotDraggable(ScopeId::etc("global"))));
    }
}
