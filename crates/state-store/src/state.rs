//! Position table and dedup table, persisted as one JSON document.

use crate::error::StoreError;
use execution_core::{Direction, Position};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dedup key for an inbound signal: `{symbol}_{signal}_{event_time}`.
pub fn dedup_key(symbol: &str, direction: Direction, event_time: &str) -> String {
    format!("{}_{}_{}", symbol, direction.as_str(), event_time)
}

/// Everything the engine persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// One record per symbol.
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    /// Dedup key -> unix seconds when it was accepted.
    #[serde(default)]
    pub processed_alerts: BTreeMap<String, i64>,
}

impl State {
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.get_mut(symbol)
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed_alerts.contains_key(key)
    }

    pub fn mark_processed(&mut self, key: impl Into<String>, unix_secs: i64) {
        self.processed_alerts.insert(key.into(), unix_secs);
    }
}

/// JSON-file backed store.
///
/// Every load, save and update runs under one process-wide mutex, so a
/// read-modify-write for one symbol never loses a concurrent write for another.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Shared state store handle.
pub type SharedStateStore = Arc<StateStore>;

/// Create a shared state store.
pub fn create_state_store(path: impl Into<PathBuf>) -> SharedStateStore {
    Arc::new(StateStore::new(path))
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state. A missing file is an empty state.
    pub fn load(&self) -> Result<State, StoreError> {
        let _guard = self.lock.lock();
        self.read()
    }

    /// Replace the persisted state.
    pub fn save(&self, state: &State) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        self.write(state)
    }

    /// Load, apply `f`, save. The whole sequence holds the store lock.
    pub fn update<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        let mut state = self.read()?;
        let out = f(&mut state);
        self.write(&state)?;
        Ok(out)
    }

    /// Overwrite with an empty state.
    pub fn reset(&self) -> Result<(), StoreError> {
        tracing::warn!(path = %self.path.display(), "Resetting state");
        self.save(&State::default())
    }

    fn read(&self) -> Result<State, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(State::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, state: &State) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
            file.sync_all()?;
        }

        // Atomic rename
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
