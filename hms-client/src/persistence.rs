//! Persistence of the signed-in user's identity snapshot.
//!
//! Only the non-secret [`AuthUser`] record is written; session credentials
//! live in the cookie jar and never touch disk.

use chrono::{DateTime, Utc};
use hms_core::AuthUser;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    pub user: AuthUser,
    pub saved_at: DateTime<Utc>,
}

impl PersistedIdentity {
    pub fn new(user: AuthUser) -> Self {
        Self {
            user,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn load(path: &Path) -> Result<Option<PersistedIdentity>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let identity = serde_json::from_str::<PersistedIdentity>(&contents)?;
    Ok(Some(identity))
}

pub fn save(path: &Path, identity: &PersistedIdentity) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(identity)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Remove the snapshot. Missing files are fine.
pub fn clear(path: &Path) -> Result<(), PersistenceError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
