//! JSON-file backed [`KeyValueStore`].
//!
//! The whole map lives in memory and is rewritten on every mutation through a
//! temp file and a rename, so a crash leaves either the old or the new file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notif_domain::store::KeyValueStore;
use notif_domain::NotificationError;
use parking_lot::RwLock;
use tracing::{debug, warn};

pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing store file {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file missing, starting empty");
                BTreeMap::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading store file {}", path.display()))
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> notif_domain::Result<()> {
        let io_error =
            |err: std::io::Error| NotificationError::Store(format!("{}: {err}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, contents).map_err(io_error)?;
        fs::rename(&temp_path, &self.path).map_err(|err| {
            warn!(path = %self.path.display(), %err, "failed to replace store file");
            io_error(err)
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> notif_domain::Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> notif_domain::Result<()> {
        let mut entries = self.entries.write();
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(err) = self.persist(&entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> notif_domain::Result<()> {
        let mut entries = self.entries.write();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    fn entries(&self) -> notif_domain::Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// One rewrite for the whole batch.
    fn remove_prefix(&self, prefix: &str) -> notif_domain::Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.clone();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before.len() - entries.len();
        if removed == 0 {
            return Ok(0);
        }
        if let Err(err) = self.persist(&entries) {
            *entries = before;
            return Err(err);
        }
        Ok(removed)
    }
}
