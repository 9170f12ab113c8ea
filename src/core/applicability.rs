// src/core/applicability.rs

//! Decides whether a scope's definitions are in effect on a given machine.
//!
//! A scope name can carry `os-`, `host-` and `user-` constraints, e.g.
//! `user-alice-host-build-box`. A token runs from its keyword to the next
//! keyword segment that starts another token, so host names may contain `-`.

use crate::models::{RuntimeContext, ScopeId, ScopeKind};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeConstraints {
    pub os: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
}

impl ScopeConstraints {
    pub fn is_unconstrained(&self) -> bool {
        self.os.is_none() && self.host.is_none() && self.user.is_none()
    }
}

fn is_keyword(segment: &str) -> bool {
    matches!(segment, "os" | "host" | "user")
}

/// Extracts the constraints encoded in a scope name. Matching is case-insensitive.
pub fn parse_constraints(scope_name: &str) -> ScopeConstraints {
    let lowered = scope_name.to_lowercase();
    let segments: Vec<&str> = lowered.split('-').collect();
    let starts_token = |i: usize| {
        segments.get(i).is_some_and(|s| is_keyword(s)) && i + 1 < segments.len()
    };

    let mut constraints = ScopeConstraints::default();
    let mut i = 0;
    while i < segments.len() {
        if !starts_token(i) {
            i += 1;
            continue;
        }

        // The first segment after the keyword always belongs to the token.
        let start = i + 1;
        let mut end = start + 1;
        while end < segments.len() && !starts_token(end) {
            end += 1;
        }
        let token = segments.get(start..end).map(|s| s.join("-")).unwrap_or_default();

        let slot = match segments.get(i).copied() {
            Some("os") => &mut constraints.os,
            Some("host") => &mut constraints.host,
            _ => &mut constraints.user,
        };
        // The first occurrence of a keyword wins.
        if slot.is_none() {
            *slot = Some(token);
        }
        i = end;
    }
    constraints
}

/// System scopes always apply; other scopes apply when every constraint they
/// carry matches the context.
pub fn is_applicable(scope: &ScopeId, ctx: &RuntimeContext) -> bool {
    if scope.kind == ScopeKind::System {
        return true;
    }
    let constraints = parse_constraints(&scope.name);
    let matches = |wanted: &Option<String>, actual: &str| {
        wanted.as_deref().is_none_or(|w| w == actual.to_lowercase())
    };
    matches(&constraints.os, &ctx.os)
        && matches(&constraints.host, &ctx.hostname)
        && matches(&constraints.user, &ctx.username)
}
