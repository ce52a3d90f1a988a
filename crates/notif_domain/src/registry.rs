//! Scheduled notification lifecycle.
//!
//! The registry keeps nothing in memory between calls. Records live in the
//! [`KeyValueStore`] under `scheduled_<id>` and each one is paired with a
//! deferred task tagged `notification_<id>`. A repeating notification is a
//! chain of one-shot tasks: every firing presents, then arms the next link.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::notifications::{
    DeferredTask, NotificationPresenter, ScheduleUpdate, ScheduledNotification, TaskOutcome,
    TaskPayload, TaskRunner,
};
use crate::store::{load_json, save_json, KeyValueStore};

/// Counts from one [`ScheduleRegistry::restore`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    pub rearmed: usize,
    pub expired: usize,
    pub corrupt: usize,
}

pub struct ScheduleRegistry {
    store: Arc<dyn KeyValueStore>,
    runner: Arc<dyn TaskRunner>,
    presenter: Arc<dyn NotificationPresenter>,
    clock: Arc<dyn Clock>,
}

impl ScheduleRegistry {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        runner: Arc<dyn TaskRunner>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            runner,
            presenter,
            clock,
        }
    }

    /// Arms a task and persists the record. Returns `Ok(false)` without side
    /// effects when `scheduled_at` is not strictly in the future.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub fn schedule(&self, record: ScheduledNotification) -> Result<bool> {
        let now = self.clock.now_ms();
        let Some(delay) = delay_until(record.scheduled_at, now) else {
            debug!(scheduled_at = record.scheduled_at, now, "schedule date is not in the future");
            return Ok(false);
        };

        // One live chain per id.
        self.runner.cancel(&keys::task_tag(&record.id))?;
        self.arm(&record, delay)?;
        save_json(self.store.as_ref(), &keys::scheduled_key(&record.id), &record)?;

        info!(
            delay_ms = delay.as_millis() as u64,
            repeating = record.repeats(),
            "scheduled notification"
        );
        Ok(true)
    }

    /// Cancels the pending task and, when the new date is in the future,
    /// re-arms it. Returns `Ok(true)` once the cancel went through.
    #[instrument(skip(self, update), fields(id = %update.id))]
    pub fn update(&self, update: ScheduleUpdate) -> Result<bool> {
        self.runner.cancel(&keys::task_tag(&update.id))?;

        let key = keys::scheduled_key(&update.id);
        let now = self.clock.now_ms();
        let Some(delay) = delay_until(update.scheduled_at, now) else {
            debug!("updated date is not in the future, dropping schedule");
            self.store.remove(&key)?;
            return Ok(true);
        };

        let content = match update.content {
            Some(content) => Some(content),
            None => self.get(&update.id)?.map(|existing| existing.content),
        };
        let Some(content) = content else {
            warn!("no content to re-arm with, dropping schedule");
            self.store.remove(&key)?;
            return Ok(true);
        };

        let record = ScheduledNotification {
            id: update.id,
            scheduled_at: update.scheduled_at,
            is_repeating: update.is_repeating,
            repeat_interval_secs: update.repeat_interval_secs,
            content,
        };
        self.arm(&record, delay)?;
        save_json(self.store.as_ref(), &key, &record)?;
        info!(delay_ms = delay.as_millis() as u64, "rescheduled notification");
        Ok(true)
    }

    /// Idempotent: unknown ids and already-fired tasks are fine.
    pub fn cancel(&self, id: &str) -> Result<()> {
        self.runner.cancel(&keys::task_tag(id))?;
        self.store.remove(&keys::scheduled_key(id))?;
        debug!(id, "cancelled scheduled notification");
        Ok(())
    }

    pub fn cancel_all(&self) -> Result<()> {
        self.runner.cancel_all()?;
        let removed = self.store.remove_prefix(keys::SCHEDULED_PREFIX)?;
        info!(removed, "cancelled all scheduled notifications");
        Ok(())
    }

    /// Reads one record. An unparsable record reads as absent.
    pub fn get(&self, id: &str) -> Result<Option<ScheduledNotification>> {
        match load_json::<_, ScheduledNotification>(self.store.as_ref(), &keys::scheduled_key(id))? {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(err)) => {
                debug!(id, error = %err, "ignoring unparsable scheduled record");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// All parsable records, ordered by fire time. Never mutates the store.
    pub fn list(&self) -> Result<Vec<ScheduledNotification>> {
        let mut records: Vec<ScheduledNotification> = self
            .store
            .entries_with_prefix(keys::SCHEDULED_PREFIX)?
            .into_iter()
            .filter_map(|(key, raw)| match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!(%key, error = %err, "skipping unparsable scheduled record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// Re-arms every persisted schedule after a process or device restart.
    ///
    /// Expired records are dropped, repeating ones included. Corrupt records
    /// are deleted. Nothing here fails to the caller.
    #[instrument(skip(self))]
    pub fn restore(&self) -> RestoreReport {
        let mut report = RestoreReport::default();
        let entries = match self.store.entries_with_prefix(keys::SCHEDULED_PREFIX) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "unable to enumerate scheduled records");
                return report;
            }
        };

        let now = self.clock.now_ms();
        for (key, raw) in entries {
            let record: ScheduledNotification = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%key, error = %err, "removing corrupt scheduled record");
                    self.discard(&key);
                    report.corrupt += 1;
                    continue;
                }
            };

            match delay_until(record.scheduled_at, now) {
                Some(delay) => match self.rearm(&record, delay) {
                    Ok(()) => report.rearmed += 1,
                    Err(err) => warn!(id = %record.id, error = %err, "failed to re-arm scheduled record"),
                },
                None => {
                    debug!(id = %record.id, "removing expired scheduled record");
                    self.discard(&key);
                    report.expired += 1;
                }
            }
        }

        if report != RestoreReport::default() {
            info!(
                rearmed = report.rearmed,
                expired = report.expired,
                corrupt = report.corrupt,
                "restored scheduled notifications"
            );
        }
        report
    }

    /// Handles a deferred task whose delay elapsed.
    ///
    /// A payload without `id`, `title` or `body`, or a presenter failure,
    /// yields [`TaskOutcome::Failure`] and leaves persisted state untouched.
    pub fn on_task_fired(&self, payload: &Value) -> TaskOutcome {
        let task = match TaskPayload::parse(payload) {
            Ok(task) => task,
            Err(err) => {
                warn!(error = %err, "deferred task payload is missing required fields");
                return TaskOutcome::Failure;
            }
        };

        if let Err(err) = self.presenter.present(&task.id, &task.content()) {
            warn!(id = %task.id, error = %err, "failed to present scheduled notification");
            return TaskOutcome::Failure;
        }

        if task.repeats() {
            if let Err(err) = self.advance(&task) {
                warn!(id = %task.id, error = %err, "failed to re-arm repeating notification");
            }
        } else if let Err(err) = self.store.remove(&keys::scheduled_key(&task.id)) {
            warn!(id = %task.id, error = %err, "failed to remove fired record");
        }
        TaskOutcome::Success
    }

    fn advance(&self, task: &TaskPayload) -> Result<()> {
        let interval_ms = i64::try_from(task.repeat_interval_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let next = self.clock.now_ms().saturating_add(interval_ms);
        let record = ScheduledNotification {
            id: task.id.clone(),
            scheduled_at: next,
            is_repeating: true,
            repeat_interval_secs: task.repeat_interval_secs,
            content: task.content(),
        };
        self.arm(&record, Duration::from_secs(task.repeat_interval_secs))?;
        save_json(self.store.as_ref(), &keys::scheduled_key(&record.id), &record)?;
        debug!(id = %record.id, next, "armed next repeat");
        Ok(())
    }

    /// Replaces whatever task survived the restart under the record's tag.
    fn rearm(&self, record: &ScheduledNotification, delay: Duration) -> Result<()> {
        self.runner.cancel(&keys::task_tag(&record.id))?;
        self.arm(record, delay)
    }

    fn arm(&self, record: &ScheduledNotification, delay: Duration) -> Result<()> {
        let payload = serde_json::to_value(TaskPayload::from_record(record))?;
        self.runner.arm(DeferredTask {
            tag: keys::task_tag(&record.id),
            delay,
            payload,
        })
    }

    fn discard(&self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            warn!(%key, error = %err, "failed to remove scheduled record");
        }
    }
}

/// Delay from `now` until `at`, or `None` unless `at` is strictly later.
fn delay_until(at: i64, now: i64) -> Option<Duration> {
    let delta = at.saturating_sub(now);
    (delta > 0).then(|| Duration::from_millis(delta as u64))
}
