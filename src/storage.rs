#[cfg(test)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
#[cfg(test)]
use parking_lot::Mutex;
use serde_json::Value;

/// Durable key/value persistence for client state, one JSON document per key.
///
/// Stores are handed an implementation of this port instead of touching the
/// filesystem themselves, so tests can swap in [`MemoryStore`].
pub trait StateStore: Send + Sync {
    /// Returns the stored document, or `None` when the key is absent or the
    /// stored bytes fail to parse.
    fn load(&self, key: &str) -> Option<Value>;
    fn save(&self, key: &str, value: &Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Production store: `<root>/<key>.json`, pretty-printed.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl StateStore for JsonFileStore {
    fn load(&self, key: &str) -> Option<Value> {
        read_json_document(&self.path_for(key))
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        write_json_document(&self.path_for(key), value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn read_json_document(path: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_json_document(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// In-process store backing deterministic tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
