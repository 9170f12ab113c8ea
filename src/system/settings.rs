// src/system/settings.rs

use crate::constants::SETTINGS_FILENAME;
use crate::core::paths::{self, PathError};
use crate::models::Settings;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Could not read or write settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Loads `settings.toml` from the config directory, writing the defaults on first use.
pub fn load_settings() -> SettingsResult<Settings> {
    let config_dir = paths::get_config_dir()?;
    load_settings_from(&config_dir.join(SETTINGS_FILENAME))
}

pub fn load_settings_from(path: &Path) -> SettingsResult<Settings> {
    if !path.exists() {
        let defaults = Settings::default();
        fs::write(path, toml::to_string_pretty(&defaults)?)?;
        log::debug!("Wrote default settings to '{}'", path.display());
        return Ok(defaults);
    }
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_load_writes_defaults() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);

        // --- Execute ---
        let settings = load_settings_from(&path).unwrap();

        // --- Assert ---
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_user_edits_are_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(
            &path,
            "[evaluator]\nshell = \"sh\"\n\n[editor]\ndefault_scope = \"local\"\nuse_mulle_env = false\n",
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.evaluator.shell, "sh");
        assert!(settings.evaluator.passthrough_env.is_empty());
        assert_eq!(settings.editor.default_scope, "local");
        assert!(!settings.editor.use_mulle_env);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "[evaluator\n").unwrap();
        assert!(matches!(load_settings_from(&path), Err(SettingsError::Parse(_))));
    }
}
