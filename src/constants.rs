// src/constants.rs

/// The directory holding all mulle configuration for a project.
pub const MULLE_DIR: &str = ".mulle";

/// Editable layer, inside `.mulle/`.
pub const ETC_DIR: &str = "etc";

/// Read-only layer, inside `.mulle/`.
pub const SHARE_DIR: &str = "share";

/// Environment subdirectory of each layer (`.mulle/<layer>/env`).
pub const ENV_DIR: &str = "env";

/// Overlay file listing extra scopes and priority overrides for a layer.
pub const AUXSCOPE_FILENAME: &str = "auxscope";

pub const ENVIRONMENT_FILE_PREFIX: &str = "environment-";
pub const ENVIRONMENT_FILE_SUFFIX: &str = ".sh";

/// Priority assigned to overlay entries that omit one.
pub const DEFAULT_AUX_PRIORITY: f64 = 20.0;

/// Distance used when a scope is dropped before the first or after the last scope.
pub const PRIORITY_STEP: f64 = 100.0;

/// Scope new variables land in when none is named.
pub const DEFAULT_SCOPE: &str = "global";

/// Priority given to the default scope if it has to be created on demand.
pub const DEFAULT_SCOPE_PRIORITY: f64 = 40.0;

/// Name of the scope holding the machine facts.
pub const SYSTEM_SCOPE: &str = "system";

/// Base name for variables added without a name.
pub const PLACEHOLDER_KEY: &str = "KEY";

/// The name of the configuration directory (in ~/.config/).
pub const CONFIG_DIR_NAME: &str = "envscope";

/// The editor settings file (in ~/.config/envscope/).
pub const SETTINGS_FILENAME: &str = "settings.toml";

/// The recent projects list (in ~/.config/envscope/).
pub const RECENT_PROJECTS_FILENAME: &str = "recent.bin";

/// How many recently opened projects are remembered.
pub const MAX_RECENT_PROJECTS: usize = 10;

/// Number of offending variable names quoted in the load-time unsafe-value warning.
pub const UNSAFE_REPORT_LIMIT: usize = 5;

// --- Evaluation placeholders ---

pub const EVAL_EMPTY: &str = "(empty)";
pub const EVAL_BLOCKED_SUBSTITUTION: &str =
    "(evaluation blocked: command substitution not allowed)";
pub const EVAL_BLOCKED_VALUE_QUOTES: &str =
    "(evaluation blocked: value contains quotes or backslashes)";
