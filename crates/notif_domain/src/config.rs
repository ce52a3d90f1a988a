use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_DUPLICATE_WINDOW_SECS: u64 = 300;

/// Notification channel registered with the presenter on `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: "notification_manager_channel".to_string(),
            name: "Notification Manager".to_string(),
            description: "Notifications from the application".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub default_duplicate_window_secs: u64,
    pub channel: ChannelConfig,
}

impl NotificationConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(window) = lookup("NOTIF_DUPLICATE_WINDOW_SECS") {
            if let Ok(value) = window.trim().parse::<u64>() {
                info!(window_secs = value, "overriding default duplicate window");
                self.default_duplicate_window_secs = value;
            }
        }
        if let Some(id) = lookup("NOTIF_CHANNEL_ID") {
            if !id.trim().is_empty() {
                self.channel.id = id.trim().to_string();
            }
        }
        if let Some(name) = lookup("NOTIF_CHANNEL_NAME") {
            if !name.trim().is_empty() {
                self.channel.name = name.trim().to_string();
            }
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_duplicate_window_secs: DEFAULT_DUPLICATE_WINDOW_SECS,
            channel: ChannelConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("NOTIF_DUPLICATE_WINDOW_SECS", "not-a-number"),
            ("NOTIF_CHANNEL_ID", "  alerts "),
            ("NOTIF_CHANNEL_NAME", "   "),
        ]);
        let mut config = NotificationConfig::default();
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.default_duplicate_window_secs, 300);
        assert_eq!(config.channel.id, "alerts");
        assert_eq!(config.channel.name, "Notification Manager");
    }

    #[test]
    fn env_window_override_applies() {
        let mut config = NotificationConfig::default();
        config.apply_env(|name| (name == "NOTIF_DUPLICATE_WINDOW_SECS").then(|| "60".to_string()));
        assert_eq!(config.default_duplicate_window_secs, 60);
    }
}
