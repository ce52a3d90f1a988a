use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::config::ChannelConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_destructive: bool,
}

/// What a notification shows once it is rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub badge_number: u32,
}

/// An immediate notification, optionally guarded against repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowRequest {
    pub id: String,
    #[serde(flatten)]
    pub content: NotificationContent,
    #[serde(default)]
    pub duplicate_key: Option<String>,
    /// Suppression window in seconds; the configured default applies when absent.
    #[serde(default)]
    pub duplicate_window: Option<u64>,
}

/// Persisted description of a scheduled notification.
///
/// Self-describing: restore and re-arm need nothing beyond this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub id: String,
    /// Epoch milliseconds of the next firing.
    #[serde(rename = "scheduledDate")]
    pub scheduled_at: i64,
    #[serde(default)]
    pub is_repeating: bool,
    #[serde(rename = "repeatInterval", default, deserialize_with = "zero_if_null")]
    pub repeat_interval_secs: u64,
    #[serde(rename = "request")]
    pub content: NotificationContent,
}

impl ScheduledNotification {
    pub fn repeats(&self) -> bool {
        self.is_repeating && self.repeat_interval_secs > 0
    }
}

/// Data carried by an armed deferred task.
///
/// `id`, `title` and `body` are required when the task fires; everything else
/// falls back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub badge_number: u32,
    #[serde(default)]
    pub is_repeating: bool,
    #[serde(rename = "repeatInterval", default, deserialize_with = "zero_if_null")]
    pub repeat_interval_secs: u64,
}

impl TaskPayload {
    pub fn from_record(record: &ScheduledNotification) -> Self {
        let content = record.content.clone();
        Self {
            id: record.id.clone(),
            title: content.title,
            body: content.body,
            actions: content.actions,
            payload: content.payload,
            badge_number: content.badge_number,
            is_repeating: record.is_repeating,
            repeat_interval_secs: record.repeat_interval_secs,
        }
    }

    pub fn parse(value: &Value) -> std::result::Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn content(&self) -> NotificationContent {
        NotificationContent {
            title: self.title.clone(),
            body: self.body.clone(),
            actions: self.actions.clone(),
            payload: self.payload.clone(),
            badge_number: self.badge_number,
        }
    }

    pub fn repeats(&self) -> bool {
        self.is_repeating && self.repeat_interval_secs > 0
    }
}

/// Changes applied by [`crate::registry::ScheduleRegistry::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    pub id: String,
    #[serde(rename = "scheduledDate")]
    pub scheduled_at: i64,
    #[serde(default)]
    pub is_repeating: bool,
    #[serde(rename = "repeatInterval", default, deserialize_with = "zero_if_null")]
    pub repeat_interval_secs: u64,
    /// Replacement content; the stored record's content is reused when absent.
    #[serde(rename = "request", default)]
    pub content: Option<NotificationContent>,
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// A one-shot unit of work handed to a [`TaskRunner`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredTask {
    pub tag: String,
    pub delay: Duration,
    pub payload: Value,
}

/// What a firing reports back to the runner so it does not retry forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failure,
}

/// Deferred task facility (WorkManager, a timer thread, ...).
pub trait TaskRunner: Send + Sync {
    fn arm(&self, task: DeferredTask) -> Result<()>;
    /// Cancels every task armed under `tag`. Unknown tags are a no-op.
    fn cancel(&self, tag: &str) -> Result<()>;
    fn cancel_all(&self) -> Result<()>;
}

/// Platform-specific notification adapters will implement this trait.
pub trait NotificationPresenter: Send + Sync {
    fn ensure_channel(&self, channel: &ChannelConfig) -> Result<()>;
    fn request_permissions(&self) -> Result<bool>;
    fn notifications_enabled(&self) -> Result<bool>;
    fn present(&self, id: &str, content: &NotificationContent) -> Result<()>;
    /// Removes a displayed notification. Unknown ids are a no-op.
    fn cancel(&self, id: &str) -> Result<()>;
    fn cancel_all(&self) -> Result<()>;

    /// Native badge value, or `None` when the platform has no badge.
    fn badge_count(&self) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Returns `true` when the badge was applied natively.
    fn set_badge_count(&self, _count: u32) -> Result<bool> {
        Ok(false)
    }
}
