//! Key conventions for the durable store and the task runner.

/// Prefix of every persisted scheduled-notification record.
pub const SCHEDULED_PREFIX: &str = "scheduled_";

/// Prefix of every duplicate-guard timestamp.
pub const DUPLICATE_PREFIX: &str = "duplicate_";

/// Prefix of every deferred task tag.
pub const TASK_TAG_PREFIX: &str = "notification_";

/// Key holding the badge count for presenters without a native badge.
pub const BADGE_COUNT_KEY: &str = "badge_count";

pub fn scheduled_key(id: &str) -> String {
    format!("{SCHEDULED_PREFIX}{id}")
}

pub fn duplicate_key(key: &str) -> String {
    format!("{DUPLICATE_PREFIX}{key}")
}

pub fn task_tag(id: &str) -> String {
    format!("{TASK_TAG_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_families_do_not_overlap() {
        assert_eq!(scheduled_key("A"), "scheduled_A");
        assert_eq!(duplicate_key("promo"), "duplicate_promo");
        assert_eq!(task_tag("A"), "notification_A");
        assert!(!scheduled_key("x").starts_with(DUPLICATE_PREFIX));
        assert!(!BADGE_COUNT_KEY.starts_with(SCHEDULED_PREFIX));
    }
}
