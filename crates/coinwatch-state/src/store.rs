use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::StateError;

/// Durable key-value container for whole JSON documents.
///
/// Implementations must make `save` durable before returning `Ok`, so a crash
/// right after a successful call never loses the written value.
pub trait PersistentStore: Send + Sync {
    /// Loads the document stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<Value>, StateError>;

    /// Replaces the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the value cannot be written, for example on
    /// I/O failure or an exhausted quota.
    fn save(&self, key: &str, value: &Value) -> Result<(), StateError>;
}

/// File-backed store holding every key in one JSON object.
///
/// Writes go to a sibling temporary file which is synced and then renamed
/// over the target, so readers see either the old or the new document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the store at `$COINWATCH_HOME/state.json`.
    pub fn open_default() -> Self {
        Self::new(resolve_coinwatch_home().join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(error) => return Err(StateError::io(&self.path, error)),
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            other => Err(StateError::Corrupt {
                key: self.path.display().to_string(),
                message: format!("expected a JSON object at the top level, found {}", kind_of(&other)),
            }),
        }
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<(), StateError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;

        let encoded = serde_json::to_vec_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).map_err(|e| StateError::io(&tmp_path, e))?;
        let written = file
            .write_all(&encoded)
            .and_then(|()| file.sync_all())
            .map_err(|e| StateError::io(&tmp_path, e));
        drop(file);

        let replaced = written.and_then(|()| {
            fs::rename(&tmp_path, &self.path).map_err(|e| StateError::io(&self.path, e))
        });
        if let Err(error) = replaced {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                tracing::warn!(
                    path = %tmp_path.display(),
                    error = %cleanup,
                    "could not remove temporary state file"
                );
            }
            return Err(error);
        }

        sync_dir(parent)
    }
}

/// Flushes a directory entry so a completed rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StateError> {
    fs::File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|e| StateError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StateError> {
    Ok(())
}

impl PersistentStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StateError> {
        let mut map = self.read_all()?;
        Ok(map.remove(key))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StateError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_all()?;
        map.insert(key.to_owned(), value.clone());
        self.write_all(&map)?;
        tracing::debug!(path = %self.path.display(), key, "state document written");
        Ok(())
    }
}

/// In-memory store, optionally bounded by a byte quota.
///
/// Useful for tests and for sessions that must not touch the disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Creates a store that rejects any single document larger than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StateError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StateError> {
        if let Some(quota) = self.quota {
            let needed = serde_json::to_vec(value)?.len();
            if needed > quota {
                return Err(StateError::QuotaExceeded { needed, quota });
            }
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.clone());
        Ok(())
    }
}

/// Resolves the coinwatch data directory.
///
/// `COINWATCH_HOME` wins when set and non-empty, then `$HOME/.coinwatch`,
/// then a relative `.coinwatch`.
pub fn resolve_coinwatch_home() -> PathBuf {
    if let Some(path) = env::var_os("COINWATCH_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".coinwatch");
    }

    PathBuf::from(".coinwatch")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
