// src/core/store.rs

use crate::models::{ScopeId, VariableRecord};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

lazy_static! {
    static ref VARIABLE_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("variable name pattern is valid");
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Variable '{name}' already exists in scope '{scope}'.")]
    DuplicateKey { scope: ScopeId, name: String },
    #[error("Invalid variable name '{0}'. Names must match [A-Za-z_][A-Za-z0-9_]*.")]
    InvalidName(String),
    #[error("Variable '{name}' not found in scope '{scope}'.")]
    UnknownVariable { scope: ScopeId, name: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn is_valid_variable_name(name: &str) -> bool {
    VARIABLE_NAME_RE.is_match(name)
}

/// Ordered variable lists, one per scope. Within a list names are unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableStore {
    lists: BTreeMap<ScopeId, Vec<VariableRecord>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The list of a scope; empty when the scope has none.
    pub fn scope(&self, id: &ScopeId) -> &[VariableRecord] {
        self.lists.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_scope(&self, id: &ScopeId) -> bool {
        self.lists.contains_key(id)
    }

    pub fn ensure_scope(&mut self, id: &ScopeId) {
        self.lists.entry(id.clone()).or_default();
    }

    /// Removes a scope's list, returning what it held.
    pub fn drop_scope(&mut self, id: &ScopeId) -> Vec<VariableRecord> {
        self.lists.remove(id).unwrap_or_default()
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = &ScopeId> {
        self.lists.keys()
    }

    pub fn get(&self, id: &ScopeId, name: &str) -> Option<&VariableRecord> {
        self.scope(id).iter().find(|r| r.name == name)
    }

    pub fn contains(&self, id: &ScopeId, name: &str) -> bool {
        self.get(id, name).is_some()
    }

    /// Mutable access to one record, for in-place edits of value, comment or flag.
    pub fn get_mut(&mut self, id: &ScopeId, name: &str) -> StoreResult<&mut VariableRecord> {
        self.lists
            .get_mut(id)
            .and_then(|list| list.iter_mut().find(|r| r.name == name))
            .ok_or_else(|| StoreError::UnknownVariable {
                scope: id.clone(),
                name: name.to_string(),
            })
    }

    /// Appends a record to the end of a scope's list.
    pub fn put(&mut self, id: &ScopeId, record: VariableRecord) -> StoreResult<()> {
        if !is_valid_variable_name(&record.name) {
            return Err(StoreError::InvalidName(record.name));
        }
        if self.contains(id, &record.name) {
            return Err(StoreError::DuplicateKey {
                scope: id.clone(),
                name: record.name,
            });
        }
        self.lists.entry(id.clone()).or_default().push(record);
        Ok(())
    }

    pub fn remove(&mut self, id: &ScopeId, name: &str) -> StoreResult<VariableRecord> {
        let unknown = || StoreError::UnknownVariable {
            scope: id.clone(),
            name: name.to_string(),
        };
        let list = self.lists.get_mut(id).ok_or_else(unknown)?;
        let position = list.iter().position(|r| r.name == name).ok_or_else(unknown)?;
        Ok(list.remove(position))
    }

    /// Renames in place; the record keeps its position in the list.
    pub fn rename(&mut self, id: &ScopeId, old: &str, new: &str) -> StoreResult<()> {
        if old == new {
            return if self.contains(id, old) {
                Ok(())
            } else {
                Err(StoreError::UnknownVariable {
                    scope: id.clone(),
                    name: old.to_string(),
                })
            };
        }
        if !is_valid_variable_name(new) {
            return Err(StoreError::InvalidName(new.to_string()));
        }
        if self.contains(id, new) {
            return Err(StoreError::DuplicateKey {
                scope: id.clone(),
                name: new.to_string(),
            });
        }
        self.get_mut(id, old)?.name = new.to_string();
        Ok(())
    }

    /// Moves a record to the end of another scope's list.
    pub fn move_variable(&mut self, from: &ScopeId, name: &str, to: &ScopeId) -> StoreResult<()> {
        if from == to {
            return self.get(from, name).map(|_| ()).ok_or_else(|| StoreError::UnknownVariable {
                scope: from.clone(),
                name: name.to_string(),
            });
        }
        if !self.contains(from, name) {
            return Err(StoreError::UnknownVariable {
                scope: from.clone(),
                name: name.to_string(),
            });
        }
        if self.contains(to, name) {
            return Err(StoreError::DuplicateKey {
                scope: to.clone(),
                name: name.to_string(),
            });
        }
        let record = self.remove(from, name)?;
        self.lists.entry(to.clone()).or_default().push(record);
        Ok(())
    }
}
