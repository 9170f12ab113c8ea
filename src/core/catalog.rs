// src/core/catalog.rs

//! The set of known scopes and their loading order.
//!
//! A catalog starts from a fixed template derived from the runtime context,
//! then absorbs the `auxscope` overlays of both layers. Scopes load in
//! ascending priority; equal priorities keep their insertion order.

use crate::constants::{DEFAULT_SCOPE_PRIORITY, SYSTEM_SCOPE};
use crate::models::{AuxScopeEntry, RuntimeContext, Scope, ScopeId, ScopeKind};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref SCOPE_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("scope name pattern is valid");
}

/// Names of the builtin template, independent of the concrete machine.
/// A user scope may never take one of these names.
pub const RESERVED_SCOPE_NAMES: &[&str] = &[
    "system",
    "plugin",
    "plugin-os-darwin",
    "plugin-os-linux",
    "plugin-os-windows",
    "project",
    "global",
    "os-darwin",
    "os-linux",
    "os-windows",
    "host",
    "user",
    "user-os-darwin",
    "user-os-linux",
    "user-os-windows",
    "user-host",
    "custom",
    "post-global",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Scope '{0}' already exists.")]
    DuplicateScope(ScopeId),
    #[error("'{0}' is the name of a builtin scope.")]
    ReservedName(String),
    #[error("Scope '{0}' cannot be deleted.")]
    NotDeletable(ScopeId),
    #[error("Scope '{0}' has a fixed place in the loading order.")]
    NotDraggable(ScopeId),
    #[error("Scope '{0}' not found.")]
    UnknownScope(ScopeId),
    #[error(
        "Invalid scope name '{0}'. Use letters, digits, '_' and '-', starting with a letter or '_'."
    )]
    InvalidScopeName(String),
    #[error("Invalid priority {priority} for scope '{scope}'. Priorities must be positive numbers.")]
    InvalidPriority { scope: ScopeId, priority: f64 },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub fn is_valid_scope_name(name: &str) -> bool {
    SCOPE_NAME_RE.is_match(name)
}

/// The builtin scopes for a given machine, as `(name, kind, priority)`.
fn builtin_template(ctx: &RuntimeContext) -> Vec<(String, ScopeKind, f64)> {
    let os = &ctx.os;
    let host = &ctx.hostname;
    let user = &ctx.username;
    vec![
        (SYSTEM_SCOPE.to_string(), ScopeKind::System, 0.0),
        ("plugin".to_string(), ScopeKind::Share, 5.0),
        (format!("plugin-os-{}", os), ScopeKind::Share, 15.0),
        ("project".to_string(), ScopeKind::Etc, 20.0),
        ("global".to_string(), ScopeKind::Etc, DEFAULT_SCOPE_PRIORITY),
        (format!("os-{}", os), ScopeKind::Etc, 60.0),
        (format!("host-{}", host), ScopeKind::Etc, 80.0),
        (format!("user-{}", user), ScopeKind::Etc, 100.0),
        (format!("user-{}-os-{}", user, os), ScopeKind::Etc, 120.0),
        (format!("user-{}-host-{}", user, host), ScopeKind::Etc, 140.0),
        ("custom".to_string(), ScopeKind::Etc, 1000.0),
        ("post-global".to_string(), ScopeKind::Etc, 2000.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeCatalog {
    // Insertion order; loading order is derived by a stable sort on priority.
    scopes: Vec<Scope>,
}

impl ScopeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the builtin template for `ctx`. No overlay is applied yet.
    pub fn with_builtins(ctx: &RuntimeContext) -> Self {
        let scopes = builtin_template(ctx)
            .into_iter()
            .map(|(name, kind, priority)| Scope {
                name,
                kind,
                priority,
                builtin: true,
                deletable: false,
                draggable: false,
                in_overlay: false,
            })
            .collect();
        Self { scopes }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn get(&self, id: &ScopeId) -> Option<&Scope> {
        self.scopes
            .iter()
            .find(|s| s.kind == id.kind && s.name == id.name)
    }

    fn get_mut(&mut self, id: &ScopeId) -> Option<&mut Scope> {
        self.scopes
            .iter_mut()
            .find(|s| s.kind == id.kind && s.name == id.name)
    }

    pub fn contains(&self, id: &ScopeId) -> bool {
        self.get(id).is_some()
    }

    /// True for generic template names and for any builtin present in this catalog.
    pub fn is_reserved(&self, name: &str) -> bool {
        RESERVED_SCOPE_NAMES.contains(&name)
            || self.scopes.iter().any(|s| s.builtin && s.name == name)
    }

    /// Scopes sorted by ascending priority, ties in insertion order.
    pub fn loading_order(&self) -> Vec<&Scope> {
        let mut ordered: Vec<&Scope> = self.scopes.iter().collect();
        ordered.sort_by(|a, b| a.priority.total_cmp(&b.priority));
        ordered
    }

    /// Adds a user scope. Etc scopes become part of the overlay and can be
    /// deleted and dragged; share scopes are fixed.
    pub fn add_scope(&mut self, name: &str, kind: ScopeKind, priority: f64) -> CatalogResult<&Scope> {
        let id = ScopeId::new(name, kind);
        if !is_valid_scope_name(name) {
            return Err(CatalogError::InvalidScopeName(name.to_string()));
        }
        if kind == ScopeKind::System || self.is_reserved(name) {
            return Err(CatalogError::ReservedName(name.to_string()));
        }
        if self.contains(&id) {
            return Err(CatalogError::DuplicateScope(id));
        }
        if !priority.is_finite() || priority <= 0.0 {
            return Err(CatalogError::InvalidPriority { scope: id, priority });
        }

        let editable = kind.is_editable();
        self.scopes.push(Scope {
            name: name.to_string(),
            kind,
            priority,
            builtin: false,
            deletable: editable,
            draggable: editable,
            in_overlay: editable,
        });
        log::debug!("Added scope '{}' at priority {}", id, priority);
        self.get(&id).ok_or(CatalogError::UnknownScope(id))
    }

    pub fn remove_scope(&mut self, id: &ScopeId) -> CatalogResult<Scope> {
        let position = self
            .scopes
            .iter()
            .position(|s| s.kind == id.kind && s.name == id.name)
            .ok_or_else(|| CatalogError::UnknownScope(id.clone()))?;
        let deletable = self
            .scopes
            .get(position)
            .is_some_and(|s| s.deletable && !s.builtin);
        if !deletable {
            return Err(CatalogError::NotDeletable(id.clone()));
        }
        Ok(self.scopes.remove(position))
    }

    /// Moves a draggable scope to `priority`, returning the previous one.
    pub fn reorder(&mut self, id: &ScopeId, priority: f64) -> CatalogResult<f64> {
        let scope = self
            .get_mut(id)
            .ok_or_else(|| CatalogError::UnknownScope(id.clone()))?;
        if !scope.draggable {
            return Err(CatalogError::NotDraggable(id.clone()));
        }
        if !priority.is_finite() || priority <= 0.0 {
            return Err(CatalogError::InvalidPriority {
                scope: id.clone(),
                priority,
            });
        }
        let previous = scope.priority;
        scope.priority = priority;
        Ok(previous)
    }

    /// Merges an overlay read from `.mulle/<layer>/env/auxscope`.
    ///
    /// In the etc layer a known scope gets its priority overridden and becomes
    /// draggable; an unknown name becomes a custom scope. In the share layer
    /// entries only override priorities or add fixed scopes.
    pub fn apply_overlay(&mut self, kind: ScopeKind, entries: &[AuxScopeEntry]) {
        for entry in entries {
            let id = ScopeId::new(entry.scope.clone(), kind);
            if let Some(scope) = self.get_mut(&id) {
                scope.priority = entry.priority;
                if kind == ScopeKind::Etc {
                    scope.in_overlay = true;
                    scope.draggable = true;
                }
                continue;
            }

            let editable = kind == ScopeKind::Etc;
            log::debug!("Overlay introduces scope '{}' ({})", id, entry.priority);
            self.scopes.push(Scope {
                name: entry.scope.clone(),
                kind,
                priority: entry.priority,
                builtin: false,
                deletable: editable,
                draggable: editable,
                in_overlay: editable,
            });
        }
    }

    /// The etc overlay as it should be written back, in loading order.
    pub fn overlay_entries(&self) -> Vec<AuxScopeEntry> {
        self.loading_order()
            .into_iter()
            .filter(|s| s.kind == ScopeKind::Etc && s.in_overlay)
            .map(|s| AuxScopeEntry {
                scope: s.name.clone(),
                priority: s.priority,
            })
            .collect()
    }

    /// Writable scopes: everything in the etc layer.
    pub fn etc_scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().filter(|s| s.kind == ScopeKind::Etc)
    }
}
