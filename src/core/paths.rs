// src/core/paths.rs

use crate::constants::{CONFIG_DIR_NAME, RECENT_PROJECTS_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not expand path '{path}': {message}")]
    Expansion { path: String, message: String },
    #[error("Path '{path}' cannot be resolved: {source}")]
    Unresolvable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns `~/.config/envscope`, creating it if needed. Memoized after the first call.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached = CONFIG_DIR.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    // 1. Locate the platform config directory.
    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    // 2. Make sure it exists.
    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    // 3. Cache it.
    *cached = Some(config_path.clone());
    Ok(config_path)
}

pub fn get_recent_projects_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(RECENT_PROJECTS_FILENAME))
}

/// Expands `~` and `$VAR`, then resolves to an absolute, canonical path.
/// Relative paths are taken relative to `base`.
pub fn resolve_project_path(input: &str, base: &Path) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(input).map_err(|e| PathError::Expansion {
        path: input.to_string(),
        message: e.to_string(),
    })?;
    let candidate = PathBuf::from(&*expanded);
    let absolute = if candidate.is_absolute() {
        candidate
    } else {
        base.join(candidate)
    };
    dunce::canonicalize(&absolute).map_err(|e| PathError::Unresolvable {
        path: absolute.display().to_string(),
        source: e,
    })
}

/// The last two components of a path, for compact display.
pub fn short_display(path: &Path) -> String {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    let tail: Vec<&str> = components.iter().rev().take(2).rev().map(String::as_str).collect();
    if tail.is_empty() {
        path.display().to_string()
    } else {
        tail.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_and_absolute() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir(&project).unwrap();
        let canonical = dunce::canonicalize(&project).unwrap();

        // --- Execute & Assert ---
        assert_eq!(resolve_project_path("proj", dir.path()).unwrap(), canonical);
        assert_eq!(
            resolve_project_path(&project.display().to_string(), Path::new("/")).unwrap(),
            canonical
        );
        assert!(matches!(
            resolve_project_path("missing", dir.path()),
            Err(PathError::Unresolvable { .. })
        ));
    }

    #[test]
    fn test_short_display() {
        assert_eq!(short_display(Path::new("/home/alice/work/app")), "work/app");
        assert_eq!(short_display(Path::new("/app")), "app");
        assert_eq!(short_display(Path::new("/")), "/");
    }
}
