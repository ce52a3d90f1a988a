//! In-memory collaborators for tests, simulations and unsupported targets.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::clock::Clock;
use crate::config::ChannelConfig;
use crate::error::{NotificationError, Result};
use crate::notifications::{DeferredTask, NotificationContent, NotificationPresenter, TaskRunner};
use crate::store::KeyValueStore;

/// Volatile key-value store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// A task armed on a [`MemoryTaskRunner`], with the instant it becomes due.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmedTask {
    pub task: DeferredTask,
    pub armed_at_ms: i64,
    pub due_at_ms: i64,
}

/// Task runner that only records what was armed.
///
/// Firing is explicit: call [`MemoryTaskRunner::take_due`] and hand each
/// payload to the registry, the way an OS scheduler would.
pub struct MemoryTaskRunner {
    clock: Arc<dyn Clock>,
    armed: Mutex<Vec<ArmedTask>>,
}

impl MemoryTaskRunner {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            armed: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> Vec<ArmedTask> {
        self.armed.lock().clone()
    }

    pub fn pending_for(&self, tag: &str) -> Vec<ArmedTask> {
        self.armed
            .lock()
            .iter()
            .filter(|armed| armed.task.tag == tag)
            .cloned()
            .collect()
    }

    /// Delay of the most recently armed task under `tag`.
    pub fn delay_for(&self, tag: &str) -> Option<Duration> {
        self.pending_for(tag).last().map(|armed| armed.task.delay)
    }

    /// Removes and returns every task due at the current clock reading,
    /// earliest first.
    pub fn take_due(&self) -> Vec<ArmedTask> {
        let now = self.clock.now_ms();
        let mut armed = self.armed.lock();
        let (mut due, remaining): (Vec<ArmedTask>, Vec<ArmedTask>) =
            armed.drain(..).partition(|task| task.due_at_ms <= now);
        *armed = remaining;
        due.sort_by_key(|task| task.due_at_ms);
        due
    }
}

impl TaskRunner for MemoryTaskRunner {
    fn arm(&self, task: DeferredTask) -> Result<()> {
        let now = self.clock.now_ms();
        let delay_ms = i64::try_from(task.delay.as_millis()).unwrap_or(i64::MAX);
        self.armed.lock().push(ArmedTask {
            task,
            armed_at_ms: now,
            due_at_ms: now.saturating_add(delay_ms),
        });
        Ok(())
    }

    fn cancel(&self, tag: &str) -> Result<()> {
        self.armed.lock().retain(|armed| armed.task.tag != tag);
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        self.armed.lock().clear();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentedNotification {
    pub id: String,
    pub content: NotificationContent,
}

#[derive(Debug, Default)]
struct PresenterState {
    displayed: Vec<PresentedNotification>,
    history: Vec<PresentedNotification>,
    channels: Vec<ChannelConfig>,
    badge: Option<u32>,
    fail_next: Option<String>,
}

/// Presenter that records what it was asked to show.
#[derive(Debug)]
pub struct MemoryPresenter {
    state: Mutex<PresenterState>,
    permitted: bool,
    native_badge: bool,
}

impl MemoryPresenter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PresenterState::default()),
            permitted: true,
            native_badge: false,
        }
    }

    pub fn denied() -> Self {
        Self {
            permitted: false,
            ..Self::new()
        }
    }

    /// Presenter that keeps the badge itself instead of deferring to the store.
    pub fn with_native_badge() -> Self {
        Self {
            native_badge: true,
            ..Self::new()
        }
    }

    /// Makes the next `present` call fail with `reason`.
    pub fn fail_next_present(&self, reason: impl Into<String>) {
        self.state.lock().fail_next = Some(reason.into());
    }

    pub fn displayed(&self) -> Vec<PresentedNotification> {
        self.state.lock().displayed.clone()
    }

    /// Every notification ever presented, including cancelled ones.
    pub fn history(&self) -> Vec<PresentedNotification> {
        self.state.lock().history.clone()
    }

    pub fn presented_count(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn channels(&self) -> Vec<ChannelConfig> {
        self.state.lock().channels.clone()
    }
}

impl Default for MemoryPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPresenter for MemoryPresenter {
    fn ensure_channel(&self, channel: &ChannelConfig) -> Result<()> {
        let mut state = self.state.lock();
        if !state.channels.iter().any(|existing| existing.id == channel.id) {
            state.channels.push(channel.clone());
        }
        Ok(())
    }

    fn request_permissions(&self) -> Result<bool> {
        Ok(self.permitted)
    }

    fn notifications_enabled(&self) -> Result<bool> {
        Ok(self.permitted)
    }

    fn present(&self, id: &str, content: &NotificationContent) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next.take() {
            return Err(NotificationError::Presenter(reason));
        }
        let presented = PresentedNotification {
            id: id.to_string(),
            content: content.clone(),
        };
        state.displayed.retain(|shown| shown.id != id);
        state.displayed.push(presented.clone());
        state.history.push(presented);
        Ok(())
    }

    fn cancel(&self, id: &str) -> Result<()> {
        self.state.lock().displayed.retain(|shown| shown.id != id);
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        self.state.lock().displayed.clear();
        Ok(())
    }

    fn badge_count(&self) -> Result<Option<u32>> {
        if !self.native_badge {
            return Ok(None);
        }
        Ok(Some(self.state.lock().badge.unwrap_or(0)))
    }

    fn set_badge_count(&self, count: u32) -> Result<bool> {
        if !self.native_badge {
            return Ok(false);
        }
        self.state.lock().badge = Some(count);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn memory_store_prefix_helpers() {
        let store = MemoryStore::new();
        store.set("scheduled_b", "{}").unwrap();
        store.set("scheduled_a", "{}").unwrap();
        store.set("duplicate_x", "1").unwrap();

        let scheduled = store.entries_with_prefix("scheduled_").unwrap();
        assert_eq!(
            scheduled.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["scheduled_a", "scheduled_b"]
        );
        assert_eq!(store.remove_prefix("scheduled_").unwrap(), 2);
        assert_eq!(store.len(), 1);
        store.remove("missing").unwrap();
    }

    #[test]
    fn task_runner_releases_only_due_tasks() {
        let clock = ManualClock::new(0);
        let runner = MemoryTaskRunner::new(Arc::new(clock.clone()));
        for (tag, delay) in [("late", 5_000), ("early", 1_000)] {
            runner
                .arm(DeferredTask {
                    tag: tag.to_string(),
                    delay: Duration::from_millis(delay),
                    payload: json!({}),
                })
                .unwrap();
        }

        assert!(runner.take_due().is_empty());
        clock.advance_ms(1_000);
        let due = runner.take_due();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].task.tag, "early");
        assert_eq!(runner.pending().len(), 1);

        runner.cancel("late").unwrap();
        runner.cancel("late").unwrap();
        assert!(runner.pending().is_empty());
    }

    #[test]
    fn presenter_failure_is_one_shot() {
        let presenter = MemoryPresenter::new();
        presenter.fail_next_present("boom");
        let content = NotificationContent::default();
        assert!(presenter.present("a", &content).is_err());
        presenter.present("a", &content).unwrap();
        assert_eq!(presenter.presented_count(), 1);
    }
}
