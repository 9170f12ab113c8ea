// src/core/recent.rs

use crate::constants::MAX_RECENT_PROJECTS;
use crate::core::paths::{self, PathError};
use crate::core::persistence::write_atomically_bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecentError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Could not access the recent projects list: {0}")]
    Io(#[from] std::io::Error),
    #[error("Recent projects list is corrupt: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("Could not encode the recent projects list: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error(transparent)]
    Persistence(#[from] crate::core::persistence::PersistenceError),
}

pub type RecentResult<T> = Result<T, RecentError>;

/// Most recent first, without duplicates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RecentProjects {
    paths: Vec<String>,
}

impl RecentProjects {
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.paths.iter().map(PathBuf::from)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Moves `project` to the front, dropping the oldest entry past the limit.
    pub fn touch(&mut self, project: &Path) {
        let entry = project.to_string_lossy().to_string();
        self.paths.retain(|p| *p != entry);
        self.paths.insert(0, entry);
        self.paths.truncate(MAX_RECENT_PROJECTS);
    }

    pub fn forget(&mut self, project: &Path) -> bool {
        let entry = project.to_string_lossy();
        let before = self.paths.len();
        self.paths.retain(|p| *p != entry);
        before != self.paths.len()
    }
}

pub fn load_recent_from(path: &Path) -> RecentResult<RecentProjects> {
    if !path.exists() {
        return Ok(RecentProjects::default());
    }
    let bytes = fs::read(path)?;
    let (recent, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
    Ok(recent)
}

pub fn save_recent_to(path: &Path, recent: &RecentProjects) -> RecentResult<()> {
    let bytes = bincode::serde::encode_to_vec(recent, bincode::config::standard())?;
    write_atomically_bytes(path, &bytes)?;
    Ok(())
}

pub fn load_recent() -> RecentResult<RecentProjects> {
    load_recent_from(&paths::get_recent_projects_path()?)
}

/// Records `project` as the most recently opened one.
pub fn remember(project: &Path) -> RecentResult<()> {
    let path = paths::get_recent_projects_path()?;
    let mut recent = load_recent_from(&path).unwrap_or_else(|e| {
        log::warn!("Starting a new recent projects list: {}", e);
        RecentProjects::default()
    });
    recent.touch(project);
    save_recent_to(&path, &recent)
}
