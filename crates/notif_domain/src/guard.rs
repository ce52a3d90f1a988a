use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::notifications::NotificationPresenter;
use crate::store::KeyValueStore;

/// Duplicate suppression keyed by a caller-supplied string.
///
/// Each entry is the epoch-millisecond instant a notification bearing the key
/// was last shown. Entries never expire on their own.
pub struct DuplicateGuard {
    store: Arc<dyn KeyValueStore>,
    presenter: Arc<dyn NotificationPresenter>,
    clock: Arc<dyn Clock>,
    default_window_secs: u64,
}

impl DuplicateGuard {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
        default_window_secs: u64,
    ) -> Self {
        Self {
            store,
            presenter,
            clock,
            default_window_secs,
        }
    }

    pub fn default_window_secs(&self) -> u64 {
        self.default_window_secs
    }

    /// `true` while less than the window has passed since the last
    /// `mark_sent` for `key`. Unknown or unreadable entries are never
    /// duplicates.
    pub fn is_duplicate(&self, key: &str, window_secs: Option<u64>) -> Result<bool> {
        let Some(last_sent) = self.last_sent(key)? else {
            return Ok(false);
        };
        let window_ms = window_secs
            .unwrap_or(self.default_window_secs)
            .saturating_mul(1000)
            .min(i64::MAX as u64) as i64;
        let elapsed = self.clock.now_ms().saturating_sub(last_sent);
        Ok(elapsed < window_ms)
    }

    pub fn mark_sent(&self, key: &str) -> Result<()> {
        let now = self.clock.now_ms();
        self.store.set(&keys::duplicate_key(key), &now.to_string())?;
        debug!(key, now, "marked notification as sent");
        Ok(())
    }

    /// Forgets every key and clears displayed notifications.
    pub fn clear_history(&self) -> Result<()> {
        self.presenter.cancel_all()?;
        let removed = self.store.remove_prefix(keys::DUPLICATE_PREFIX)?;
        info!(removed, "cleared notification history");
        Ok(())
    }

    fn last_sent(&self, key: &str) -> Result<Option<i64>> {
        let Some(raw) = self.store.get(&keys::duplicate_key(key))? else {
            return Ok(None);
        };
        match raw.trim().parse::<i64>() {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(key, error = %err, "ignoring unreadable duplicate entry");
                Ok(None)
            }
        }
    }
}
