// src/system/facts.rs

//! Machine facts: OS, host and user, plus the values of the `system` scope.

use crate::models::{RuntimeContext, VariableRecord};
use crate::system::executor;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Source of the machine identity scopes are matched against.
pub trait SystemFacts {
    fn os(&self) -> String;
    fn hostname(&self) -> String;
    fn username(&self) -> String;

    fn context(&self) -> RuntimeContext {
        RuntimeContext::new(&self.os(), &self.hostname(), &self.username())
    }
}

/// `std::env::consts::OS` in mulle's vocabulary.
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Facts of the running host, optionally asked from `mulle-env` first.
#[derive(Debug, Clone)]
pub struct HostFacts {
    use_mulle_env: bool,
    cwd: PathBuf,
}

impl HostFacts {
    pub fn new(use_mulle_env: bool, cwd: &Path) -> Self {
        Self {
            use_mulle_env,
            cwd: cwd.to_path_buf(),
        }
    }

    fn from_mulle_env(&self, subcommand: &str) -> Option<String> {
        if !self.use_mulle_env {
            return None;
        }
        match executor::capture_output(&format!("mulle-env {}", subcommand), &self.cwd) {
            Ok(value) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                log::debug!("mulle-env {} unavailable: {}", subcommand, e);
                None
            }
        }
    }
}

impl SystemFacts for HostFacts {
    fn os(&self) -> String {
        self.from_mulle_env("uname")
            .map(|os| os.to_lowercase())
            .unwrap_or_else(|| host_os().to_string())
    }

    fn hostname(&self) -> String {
        self.from_mulle_env("hostname").unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| String::from("localhost"))
        })
    }

    fn username(&self) -> String {
        self.from_mulle_env("username").unwrap_or_else(|| {
            std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| String::from("user"))
        })
    }
}

/// Fixed facts, for previews and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFacts(pub RuntimeContext);

impl SystemFacts for StaticFacts {
    fn os(&self) -> String {
        self.0.os.clone()
    }

    fn hostname(&self) -> String {
        self.0.hostname.clone()
    }

    fn username(&self) -> String {
        self.0.username.clone()
    }
}

/// Twelve hex characters of `sha256(root + "\n")`, starting at offset 1.
pub fn virtual_root_id(root: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.as_bytes());
    hasher.update(b"\n");
    let digest = hex::encode(hasher.finalize());
    digest.chars().skip(1).take(12).collect()
}

/// Rewrites `separator` to `/`. Environment values cannot hold backslashes.
fn to_shell_path(path: &str, separator: char) -> String {
    if separator == '/' {
        path.to_string()
    } else {
        path.replace(separator, "/")
    }
}

/// The variables of the `system` scope for a project root.
pub fn system_variables(ctx: &RuntimeContext, root: &Path) -> Vec<VariableRecord> {
    let root = to_shell_path(
        &dunce::simplified(root).to_string_lossy(),
        std::path::MAIN_SEPARATOR,
    );
    vec![
        VariableRecord::new("MULLE_UNAME", ctx.os.clone()),
        VariableRecord::new("MULLE_HOSTNAME", ctx.hostname.clone()),
        VariableRecord::new("MULLE_USERNAME", ctx.username.clone()),
        VariableRecord::new("MULLE_VIRTUAL_ROOT_ID", virtual_root_id(&root)),
        VariableRecord::new("MULLE_VIRTUAL_ROOT", root),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_root_id_shape() {
        // --- Execute ---
        let id = virtual_root_id("/home/alice/project");

        // --- Assert ---
        let mut hasher = Sha256::new();
        hasher.update(b"/home/alice/project\n");
        let full = format!("{:x}", hasher.finalize());
        assert_eq!(id.len(), 12);
        assert_eq!(id, full[1..13]);
    }

    #[test]
    fn test_system_variables() {
        let ctx = RuntimeContext::new("linux", "box", "alice");
        let vars = system_variables(&ctx, Path::new("/work/p"));

        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["MULLE_UNAME", "MULLE_HOSTNAME", "MULLE_USERNAME", "MULLE_VIRTUAL_ROOT_ID", "MULLE_VIRTUAL_ROOT"]
        );
        assert_eq!(vars.last().map(|v| v.raw_value.as_str()), Some("/work/p"));
        assert_eq!(vars.get(3).map(|v| v.raw_value.clone()), Some(virtual_root_id("/work/p")));
    }

    #[test]
    fn test_windows_root_uses_forward_slashes() {
        // --- Execute ---
        let root = to_shell_path(r"C:\work\p", '\\');

        // --- Assert ---
        assert_eq!(root, "C:/work/p");
        assert_eq!(to_shell_path("/work/p", '/'), "/work/p");
        assert!(!crate::core::unify::has_unsafe_chars(&root));
    }

    #[test]
    fn test_host_facts_without_mulle_env() {
        let facts = HostFacts::new(false, Path::new("."));
        let ctx = facts.context();
        assert_eq!(ctx.os, host_os());
        assert!(!ctx.hostname.is_empty());
        assert_eq!(ctx.hostname, ctx.hostname.trim());
    }

    #[test]
    fn test_static_facts_context() {
        let facts = StaticFacts(RuntimeContext::new("Darwin", "Mac", "Bob"));
        assert_eq!(facts.context(), RuntimeContext::new("darwin", "Mac", "Bob"));
    }
}
