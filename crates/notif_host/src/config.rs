use std::path::PathBuf;

use anyhow::Result;
use notif_domain::config::NotificationConfig;

pub const DEFAULT_STORE_PATH: &str = "notifications.json";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug)]
pub struct HostConfig {
    pub store_path: PathBuf,
    pub log_filter: String,
    pub notifications: NotificationConfig,
}

impl HostConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            notifications: NotificationConfig::from_env(),
            ..Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("NOTIF_STORE_PATH") {
            if !path.trim().is_empty() {
                self.store_path = PathBuf::from(path.trim());
            }
        }
        if let Some(filter) = lookup("NOTIF_LOG") {
            if !filter.trim().is_empty() {
                self.log_filter = filter.trim().to_string();
            }
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            notifications: NotificationConfig::default(),
        }
    }
}
