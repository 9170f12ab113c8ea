// src/core/mod.rs

pub mod applicability;
pub mod catalog;
pub mod evaluator;
pub mod mutation;
pub mod paths;
pub mod persistence;
pub mod recent;
pub mod store;
pub mod unify;
