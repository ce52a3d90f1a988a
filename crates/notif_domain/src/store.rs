//! Durable string key-value storage contract.
//!
//! Values are JSON text (records) or decimal text (timestamps, badge count).
//! Implementations must survive process restarts to be useful in production;
//! [`crate::memory::MemoryStore`] is the in-process variant for tests and
//! headless runs.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(None)` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Create or update a value (upsert semantics).
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// No-op if the key doesn't exist.
    fn remove(&self, key: &str) -> Result<()>;

    /// Every key/value pair currently stored.
    fn entries(&self) -> Result<Vec<(String, String)>>;

    /// Entries whose key starts with `prefix`, sorted by key.
    fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut matching: Vec<(String, String)> = self
            .entries()?
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matching)
    }

    /// Removes every key starting with `prefix`, returning how many went.
    fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.entries_with_prefix(prefix)?;
        for (key, _) in &keys {
            self.remove(key)?;
        }
        Ok(keys.len())
    }
}

/// Serializes `value` as JSON and stores it under `key`.
pub fn save_json<S: KeyValueStore + ?Sized, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Loads and deserializes a JSON value. A value that fails to parse is
/// reported as the inner `Err`, separately from store failures.
pub fn load_json<S: KeyValueStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Option<std::result::Result<T, serde_json::Error>>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&raw)))
}
