//! Persistence of the latest [`MonitorState`] to a single JSON file.
//!
//! The file is rewritten as a whole after every sweep through a sibling
//! `.tmp` file and a rename, so readers never see a half-written document.

use std::path::PathBuf;
use std::{fs, io};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::monitoring::MonitorState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create state directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to read state file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse state file {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write state file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Owns the state file location
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store for `path`, creating its parent directory if missing.
    ///
    /// A directory that cannot be created is logged; the failure shows up
    /// again on the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let store = Self { path: path.into() };
        if let Err(e) = store.ensure_dir() {
            error!("{e}");
        }
        store
    }

    /// Create the parent directory of the state file (idempotent)
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .map_err(|source| StoreError::CreateDir { path: parent.to_path_buf(), source }),
            _ => Ok(()),
        }
    }

    /// Read the persisted state. `Ok(None)` when no file exists yet.
    pub fn try_load(&self) -> Result<Option<MonitorState>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: self.path.clone(), source }),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })
    }

    /// Read the persisted state, falling back to an empty state if it is
    /// absent, unreadable or corrupted.
    pub fn load(&self) -> MonitorState {
        match self.try_load() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("No state file at {}, starting empty", self.path.display());
                MonitorState::default()
            }
            Err(e) => {
                warn!("Error loading state: {e}");
                MonitorState::default()
            }
        }
    }

    /// Overwrite the state file with `state`
    pub fn try_save(&self, state: &MonitorState) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let json = serde_json::to_vec_pretty(state).map_err(StoreError::Serialize)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, json).map_err(|source| StoreError::Write { path: tmp.clone(), source })?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StoreError::Write { path: self.path.clone(), source }
        })
    }

    /// Overwrite the state file, logging instead of failing. The in-memory
    /// state stays authoritative when this does not succeed.
    pub fn save(&self, state: &MonitorState) {
        if let Err(e) = self.try_save(state) {
            error!("Error saving state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::now_millis;
    use crate::monitoring::{CheckResult, SiteConfig};

    fn sample_state() -> MonitorState {
        let now = now_millis();
        let ok = SiteConfig::new("A", "https://ok.example");
        let slow = SiteConfig::new("B", "https://timeout.example");
        MonitorState::new(
            vec![
                CheckResult::from_response(&ok, now, 200, 120),
                CheckResult::from_error(&slow, now, "ETIMEDOUT"),
            ],
            now,
        )
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/monitor-state.json");

        let store = StateStore::new(&path);

        assert!(path.parent().unwrap().is_dir());
        assert!(store.ensure_dir().is_ok());
    }

    #[test]
    fn test_load_after_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("monitor-state.json"));
        let state = sample_state();

        store.try_save(&state).unwrap();

        assert_eq!(store.load(), state);
        assert!(!dir.path().join("monitor-state.json.tmp").exists());
    }

    #[test]
    fn test_save_replaces_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("monitor-state.json"));

        store.save(&sample_state());
        let replacement = MonitorState::new(Vec::new(), now_millis());
        store.save(&replacement);

        assert_eq!(store.load(), replacement);
    }

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("monitor-state.json"));

        assert!(store.try_load().unwrap().is_none());
        assert_eq!(store.load(), MonitorState { last_check: None, sites: Vec::new() });
    }

    #[test]
    fn test_corrupted_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor-state.json");
        fs::write(&path, "{ \"sites\": [ oops").unwrap();
        let store = StateStore::new(&path);

        assert!(matches!(store.try_load(), Err(StoreError::Parse { .. })));
        assert_eq!(store.load(), MonitorState::default());
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("monitor-state.json");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let store = StateStore::new(&path);

        assert!(matches!(store.try_save(&sample_state()), Err(StoreError::Write { .. })));
        assert!(!dir.path().join("monitor-state.json.tmp").exists());

        store.save(&sample_state());
        assert!(!dir.path().join("monitor-state.json.tmp").exists());
    }
}
