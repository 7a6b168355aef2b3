//! Key/value stores for state blobs.

use crate::envelope::{decode, MigrationError, SavedState};
use chrono::Utc;
use plan_core::Scenario;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid key {0:?}")]
    InvalidKey(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Load/save of raw state blobs by key.
pub trait StateStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn save(&self, key: &str, blob: &Value) -> Result<(), StoreError>;
}

/// Keys become file names, so only a safe subset is accepted.
fn check_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        check_key(key)?;
        let blobs = self.blobs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &Value) -> Result<(), StoreError> {
        check_key(key)?;
        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        blobs.insert(key.to_string(), blob.clone());
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        check_key(key)?;
        let path = self.path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "state loaded");
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Writes to a temp file first so a crash never leaves a torn blob.
    fn save(&self, key: &str, blob: &Value) -> Result<(), StoreError> {
        check_key(key)?;
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(blob)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "state saved");
        Ok(())
    }
}

/// Wrap `scenario` in the current envelope and save it.
pub fn save_scenario<S: StateStore + ?Sized>(
    store: &S,
    key: &str,
    scenario: &Scenario,
) -> Result<SavedState, StoreError> {
    let saved = SavedState::new(scenario.clone(), Utc::now());
    store.save(key, &saved.to_value()?)?;
    Ok(saved)
}

/// Load and upgrade a saved scenario. `None` when the key was never saved.
pub fn load_scenario<S: StateStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<SavedState>, StoreError> {
    match store.load(key)? {
        None => Ok(None),
        Some(blob) => match decode(blob) {
            Ok(saved) => Ok(Some(saved)),
            Err(e) => {
                warn!(key, error = %e, "saved state rejected");
                Err(e.into())
            }
        },
    }
}
