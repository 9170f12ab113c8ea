// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// --- SCOPE MODELS ---

/// The layer a scope lives in. Only `Etc` is ever written back to disk.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Etc,
    Share,
    System,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Etc => "etc",
            Self::Share => "share",
            Self::System => "system",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Etc)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scope is identified by its name *and* its layer: `etc:global` and
/// `share:global` are different scopes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId {
    pub name: String,
    pub kind: ScopeKind,
}

impl ScopeId {
    pub fn new(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn etc(name: impl Into<String>) -> Self {
        Self::new(name, ScopeKind::Etc)
    }

    pub fn share(name: impl Into<String>) -> Self {
        Self::new(name, ScopeKind::Share)
    }

    pub fn system() -> Self {
        Self::new(crate::constants::SYSTEM_SCOPE, ScopeKind::System)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for ScopeId {
    type Err = String;

    /// Accepts `etc:NAME`, `share:NAME`, `system` or a bare `NAME` (taken as etc).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty scope name".to_string());
        }
        match s.split_once(':') {
            Some(("etc", name)) if !name.is_empty() => Ok(Self::etc(name)),
            Some(("share", name)) if !name.is_empty() => Ok(Self::share(name)),
            Some(("system", _)) => Ok(Self::system()),
            Some((layer, _)) => Err(format!("unknown layer '{}' in '{}'", layer, s)),
            None if s == crate::constants::SYSTEM_SCOPE => Ok(Self::system()),
            None => Ok(Self::etc(s)),
        }
    }
}

/// A named, prioritized layer of variable definitions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Scope {
    pub name: String,
    pub kind: ScopeKind,
    /// Lower loads earlier and wins ties against later scopes.
    pub priority: f64,
    /// Part of the fixed template derived from the runtime context.
    pub builtin: bool,
    pub deletable: bool,
    pub draggable: bool,
    /// Listed in (and therefore written to) the etc overlay file.
    pub in_overlay: bool,
}

impl Scope {
    pub fn id(&self) -> ScopeId {
        ScopeId::new(self.name.clone(), self.kind)
    }
}

/// One entry of an `auxscope` overlay file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuxScopeEntry {
    pub scope: String,
    pub priority: f64,
}

// --- VARIABLE MODELS ---

/// A variable as defined in one scope. `raw_value` is kept verbatim, unexpanded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub name: String,
    pub raw_value: String,
    pub enabled: bool,
    pub comment: String,
}

impl VariableRecord {
    pub fn new(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_value: raw_value.into(),
            enabled: true,
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Addresses a single definition: the scope it lives in plus its name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId {
    pub scope: ScopeId,
    pub name: String,
}

impl VariableId {
    pub fn new(scope: ScopeId, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// The winning definition of a key after unification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EffectiveVariable {
    pub key: String,
    pub raw_value: String,
    pub scope: String,
    pub kind: ScopeKind,
    pub priority: f64,
    pub editable: bool,
    pub enabled: bool,
    pub comment: String,
}

impl EffectiveVariable {
    pub fn from_record(scope: &Scope, record: &VariableRecord) -> Self {
        Self {
            key: record.name.clone(),
            raw_value: record.raw_value.clone(),
            scope: scope.name.clone(),
            kind: scope.kind,
            priority: scope.priority,
            editable: scope.kind.is_editable(),
            enabled: record.enabled,
            comment: record.comment.clone(),
        }
    }

    pub fn scope_id(&self) -> ScopeId {
        ScopeId::new(self.scope.clone(), self.kind)
    }

    pub fn id(&self) -> VariableId {
        VariableId::new(self.scope_id(), self.key.clone())
    }
}

// --- RUNTIME MODELS ---

/// The machine identity scopes are matched against. `os` is lowercase; host and
/// user names keep their casing because builtin scope file names are built from them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeContext {
    pub os: String,
    pub hostname: String,
    pub username: String,
}

impl RuntimeContext {
    pub fn new(os: &str, hostname: &str, username: &str) -> Self {
        Self {
            os: os.trim().to_lowercase(),
            hostname: hostname.trim().to_string(),
            username: username.trim().to_string(),
        }
    }
}

impl fmt::Display for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.username, self.hostname, self.os)
    }
}

/// A non-fatal problem found while reading project files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub file: PathBuf,
    /// 1-based; 0 when the warning concerns the whole file.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}: {}", self.file.display(), self.message)
        } else {
            write!(f, "{}:{}: {}", self.file.display(), self.line, self.message)
        }
    }
}

// --- SETTINGS MODELS (settings.toml) ---

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EvaluatorSettings {
    /// Shell command line the evaluation script is handed to with `-c`.
    pub shell: String,
    /// Host variables copied into the otherwise empty evaluation environment.
    #[serde(default)]
    pub passthrough_env: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            shell: "bash --noprofile --norc".to_string(),
            passthrough_env: vec!["PATH".to_string(), "HOME".to_string(), "TMPDIR".to_string()],
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EditorSettings {
    pub default_scope: String,
    /// Ask `mulle-env` for the machine facts before falling back to the host.
    pub use_mulle_env: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            default_scope: crate::constants::DEFAULT_SCOPE.to_string(),
            use_mulle_env: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub evaluator: EvaluatorSettings,
    #[serde(default)]
    pub editor: EditorSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_parsing() {
        assert_eq!("etc:global".parse::<ScopeId>(), Ok(ScopeId::etc("global")));
        assert_eq!("share:plugin".parse::<ScopeId>(), Ok(ScopeId::share("plugin")));
        assert_eq!("system".parse::<ScopeId>(), Ok(ScopeId::system()));
        assert_eq!("local".parse::<ScopeId>(), Ok(ScopeId::etc("local")));
        assert!("var:thing".parse::<ScopeId>().is_err());
        assert!("".parse::<ScopeId>().is_err());
    }

    #[test]
    fn test_runtime_context_keeps_name_casing() {
        let ctx = RuntimeContext::new("Darwin", " Build-Box ", "Alice");
        assert_eq!(ctx.os, "darwin");
        assert_eq!(ctx.hostname, "Build-Box");
        assert_eq!(ctx.username, "Alice");
    }

    #[test]
    fn test_settings_fill_missing_sections() {
        let settings: Settings = toml::from_str("[editor]\ndefault_scope = \"local\"\nuse_mulle_env = false\n")
            .unwrap();
        assert_eq!(settings.editor.default_scope, "local");
        assert_eq!(settings.evaluator, EvaluatorSettings::default());
    }
}
