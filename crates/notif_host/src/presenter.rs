use std::collections::BTreeSet;

use notif_domain::config::ChannelConfig;
use notif_domain::notifications::{NotificationContent, NotificationPresenter};
use parking_lot::Mutex;
use tracing::info;

/// Presenter for hosts without a notification daemon: every notification is
/// written to the log and tracked as displayed until cancelled.
#[derive(Default)]
pub struct LogPresenter {
    channel: Mutex<Option<ChannelConfig>>,
    displayed: Mutex<BTreeSet<String>>,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> Vec<String> {
        self.displayed.lock().iter().cloned().collect()
    }
}

impl NotificationPresenter for LogPresenter {
    fn ensure_channel(&self, channel: &ChannelConfig) -> notif_domain::Result<()> {
        let mut current = self.channel.lock();
        if current.as_ref() != Some(channel) {
            info!(id = %channel.id, name = %channel.name, "registered notification channel");
            *current = Some(channel.clone());
        }
        Ok(())
    }

    fn request_permissions(&self) -> notif_domain::Result<bool> {
        Ok(true)
    }

    fn notifications_enabled(&self) -> notif_domain::Result<bool> {
        Ok(true)
    }

    fn present(&self, id: &str, content: &NotificationContent) -> notif_domain::Result<()> {
        let channel = self
            .channel
            .lock()
            .as_ref()
            .map(|channel| channel.id.clone())
            .unwrap_or_default();
        info!(
            id,
            %channel,
            title = %content.title,
            body = %content.body,
            actions = content.actions.len(),
            badge = content.badge_number,
            "notification"
        );
        self.displayed.lock().insert(id.to_string());
        Ok(())
    }

    fn cancel(&self, id: &str) -> notif_domain::Result<()> {
        if self.displayed.lock().remove(id) {
            info!(id, "dismissed notification");
        }
        Ok(())
    }

    fn cancel_all(&self) -> notif_domain::Result<()> {
        let mut displayed = self.displayed.lock();
        if !displayed.is_empty() {
            info!(count = displayed.len(), "dismissed all notifications");
            displayed.clear();
        }
        Ok(())
    }
}
