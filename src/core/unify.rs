// src/core/unify.rs

//! Collapses the per-scope lists into the effective variable list.

use crate::constants::UNSAFE_REPORT_LIMIT;
use crate::core::catalog::ScopeCatalog;
use crate::core::store::VariableStore;
use crate::models::{EffectiveVariable, ScopeId};
use std::collections::HashSet;

/// Walks scopes in loading order; the first scope to define a key owns it.
///
/// Disabled records still claim their key. The result preserves encounter
/// order, which is what evaluation prefixes are cut from.
pub fn unify(catalog: &ScopeCatalog, store: &VariableStore) -> Vec<EffectiveVariable> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut effective = Vec::new();

    for scope in catalog.loading_order() {
        for record in store.scope(&scope.id()) {
            if seen.insert(record.name.as_str()) {
                effective.push(EffectiveVariable::from_record(scope, record));
            }
        }
    }
    effective
}

pub fn position_of(effective: &[EffectiveVariable], key: &str) -> Option<usize> {
    effective.iter().position(|v| v.key == key)
}

/// Everything that loads before `key`.
pub fn prefix_before<'a>(effective: &'a [EffectiveVariable], key: &str) -> &'a [EffectiveVariable] {
    match position_of(effective, key) {
        Some(index) => effective.get(..index).unwrap_or(&[]),
        None => &[],
    }
}

/// Every scope that defines `key`, in loading order. The first one is the winner.
pub fn definitions_of(catalog: &ScopeCatalog, store: &VariableStore, key: &str) -> Vec<(ScopeId, String)> {
    catalog
        .loading_order()
        .into_iter()
        .filter_map(|scope| {
            let id = scope.id();
            store.get(&id, key).map(|r| (id, r.raw_value.clone()))
        })
        .collect()
}

/// Values the environment files cannot represent.
pub fn has_unsafe_chars(value: &str) -> bool {
    value.contains('"') || value.contains('\\')
}

pub fn has_command_substitution(value: &str) -> bool {
    value.contains('`') || value.contains("$(")
}

/// Effective variables whose value uses command substitution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnsafeReport {
    pub count: usize,
    /// At most the first few offenders as `KEY (scope)`, in loading order.
    pub names: Vec<String>,
}

impl UnsafeReport {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

pub fn unsafe_report(effective: &[EffectiveVariable]) -> UnsafeReport {
    let offenders: Vec<&EffectiveVariable> = effective
        .iter()
        .filter(|v| has_command_substitution(&v.raw_value))
        .collect();
    UnsafeReport {
        count: offenders.len(),
        names: offenders
            .iter()
            .take(UNSAFE_REPORT_LIMIT)
            .map(|v| format!("{} ({})", v.key, v.scope))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RuntimeContext, ScopeKind, VariableRecord};

    fn setup() -> (ScopeCatalog, VariableStore) {
        let catalog = ScopeCatalog::with_builtins(&RuntimeContext::new("linux", "box", "alice"));
        let mut store = VariableStore::new();
        store.put(&ScopeId::etc("project"), VariableRecord::new("FOO", "a")).unwrap();
        store.put(&ScopeId::etc("global"), VariableRecord::new("FOO", "b")).unwrap();
        store.put(&ScopeId::etc("global"), VariableRecord::new("BAR", "${FOO}-x")).unwrap();
        (catalog, store)
    }

    #[test]
    fn test_first_writer_wins() {
        let (catalog, store) = setup();
        let effective = unify(&catalog, &store);

        assert_eq!(effective.len(), 2);
        let foo = effective.first().unwrap();
        assert_eq!((foo.key.as_str(), foo.raw_value.as_str(), foo.scope.as_str()), ("FOO", "a", "project"));
        assert_eq!(foo.priority, 20.0);
        assert!(foo.editable);
    }

    #[test]
    fn test_disabled_definitions_still_claim_their_key() {
        let (catalog, mut store) = setup();
        store.get_mut(&ScopeId::etc("project"), "FOO").unwrap().enabled = false;

        let effective = unify(&catalog, &store);
        let foo = effective.iter().find(|v| v.key == "FOO").unwrap();
        assert_eq!(foo.scope, "project");
        assert!(!foo.enabled);
    }

    #[test]
    fn test_share_winner_is_not_editable() {
        let (catalog, mut store) = setup();
        store.put(&ScopeId::share("plugin"), VariableRecord::new("FOO", "s")).unwrap();

        let effective = unify(&catalog, &store);
        let foo = effective.first().unwrap();
        assert_eq!(foo.kind, ScopeKind::Share);
        assert!(!foo.editable);
    }

    #[test]
    fn test_prefix_and_definitions() {
        let (catalog, store) = setup();
        let effective = unify(&catalog, &store);

        let prefix = prefix_before(&effective, "BAR");
        assert_eq!(prefix.iter().map(|v| v.key.as_str()).collect::<Vec<_>>(), vec!["FOO"]);
        assert!(prefix_before(&effective, "FOO").is_empty());
        assert!(prefix_before(&effective, "MISSING").is_empty());

        let defs = definitions_of(&catalog, &store, "FOO");
        assert_eq!(
            defs,
            vec![
                (ScopeId::etc("project"), "a".to_string()),
                (ScopeId::etc("global"), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_unsafe_report_caps_names() {
        let catalog = ScopeCatalog::with_builtins(&RuntimeContext::new("linux", "box", "alice"));
        let mut store = VariableStore::new();
        for i in 0..7 {
            store
                .put(&ScopeId::etc("global"), VariableRecord::new(format!("V{}", i), "$(date)"))
                .unwrap();
        }
        store.put(&ScopeId::etc("global"), VariableRecord::new("OK", "plain")).unwrap();

        let report = unsafe_report(&unify(&catalog, &store));
        assert_eq!(report.count, 7);
        assert_eq!(
            report.names,
            vec!["V0 (global)", "V1 (global)", "V2 (global)", "V3 (global)", "V4 (global)"]
        );
    }
}
