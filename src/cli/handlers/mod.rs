// src/cli/handlers/mod.rs

pub mod commons;

pub mod add;
pub mod edit;
pub mod eval;
pub mod export;
pub mod list;
pub mod recent;
pub mod relocate;
pub mod rename;
pub mod rm;
pub mod save_to;
pub mod scope;
pub mod scopes;
pub mod show;
