//! services/app/src/adapters/kv.rs
//!
//! Implementations of the `KeyValueStore` port: a file-per-key JSON store for
//! the running application and an in-memory store for tests.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use studio_core::ports::{KeyValueStore, PortError, PortResult};

//=========================================================================================
// JsonFileStore
//=========================================================================================

/// Keyed local storage backed by one file per key under a data directory.
///
/// Values are stored verbatim; callers serialize to JSON before `set`. There
/// is no cross-process locking; concurrent writers can clobber each other,
/// which the store's single-user contract accepts.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys may contain characters that are not filename-safe (emails).
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", sanitized))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        fs::write(self.path_for(key), value).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

//=========================================================================================
// MemoryStore
//=========================================================================================

/// Hermetic in-memory `KeyValueStore` double.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Unexpected("kv store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Unexpected("kv store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Unexpected("kv store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        assert!(store.get("chat_sessions").unwrap().is_none());
        store.set("chat_sessions", r#"[{"id":1}]"#).unwrap();
        assert_eq!(store.get("chat_sessions").unwrap().unwrap(), r#"[{"id":1}]"#);
        store.remove("chat_sessions").unwrap();
        assert!(store.get("chat_sessions").unwrap().is_none());
        // Removing an absent key is not an error.
        store.remove("chat_sessions").unwrap();
    }

    #[test]
    fn file_store_sanitizes_unsafe_key_characters() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.set("auth_attempts_user@example.com", "{}").unwrap();
        assert_eq!(store.get("auth_attempts_user@example.com").unwrap().unwrap(), "{}");
    }
}
