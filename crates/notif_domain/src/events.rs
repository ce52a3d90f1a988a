//! Single-subscriber relay for notification interactions.
//!
//! At most one subscriber is attached. Subscribing again replaces the previous
//! subscriber, whose receiver then reports disconnection. Events emitted while
//! nobody listens are dropped.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationEvent {
    #[serde(rename = "tap")]
    Tap {
        #[serde(rename = "notificationId")]
        notification_id: String,
        payload: Option<Map<String, Value>>,
    },
    #[serde(rename = "action")]
    Action {
        #[serde(rename = "notificationId")]
        notification_id: String,
        #[serde(rename = "actionId")]
        action_id: String,
    },
}

impl NotificationEvent {
    pub fn notification_id(&self) -> &str {
        match self {
            NotificationEvent::Tap {
                notification_id, ..
            }
            | NotificationEvent::Action {
                notification_id, ..
            } => notification_id,
        }
    }
}

/// Receiving end handed to the current subscriber.
pub struct Subscription {
    receiver: Receiver<NotificationEvent>,
}

impl Subscription {
    /// Blocks until an event arrives. `None` once the subscription was
    /// replaced or cancelled.
    pub fn recv(&self) -> Option<NotificationEvent> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<NotificationEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Events already delivered, without blocking.
    pub fn drain(&self) -> Vec<NotificationEvent> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Default)]
pub struct EventRelay {
    sender: Mutex<Option<Sender<NotificationEvent>>>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        if self.sender.lock().replace(sender).is_some() {
            debug!("replacing previous notification event subscriber");
        }
        Subscription { receiver }
    }

    pub fn unsubscribe(&self) {
        self.sender.lock().take();
    }

    pub fn has_subscriber(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Delivers to the current subscriber. Returns `false` when the event was
    /// dropped.
    pub fn emit(&self, event: NotificationEvent) -> bool {
        let mut slot = self.sender.lock();
        let Some(sender) = slot.as_ref() else {
            debug!(id = event.notification_id(), "no subscriber, dropping event");
            return false;
        };
        if sender.send(event).is_err() {
            // Receiver went away without unsubscribing.
            slot.take();
            return false;
        }
        true
    }

    pub fn tapped(&self, notification_id: &str, payload: Option<Map<String, Value>>) -> bool {
        self.emit(NotificationEvent::Tap {
            notification_id: notification_id.to_string(),
            payload,
        })
    }

    pub fn action_pressed(&self, notification_id: &str, action_id: &str) -> bool {
        self.emit(NotificationEvent::Action {
            notification_id: notification_id.to_string(),
            action_id: action_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn events_without_subscriber_are_dropped() {
        let relay = EventRelay::new();
        assert!(!relay.tapped("n1", None));

        let subscription = relay.subscribe();
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn resubscribing_replaces_the_previous_subscriber() {
        let relay = EventRelay::new();
        let first = relay.subscribe();
        let second = relay.subscribe();

        assert!(relay.action_pressed("n1", "reply"));
        assert!(first.recv().is_none());
        assert_eq!(
            second.drain(),
            vec![NotificationEvent::Action {
                notification_id: "n1".into(),
                action_id: "reply".into(),
            }]
        );
    }

    #[test]
    fn dropped_subscription_clears_the_slot() {
        let relay = EventRelay::new();
        drop(relay.subscribe());
        assert!(!relay.tapped("n1", None));
        assert!(!relay.has_subscriber());
    }

    #[test]
    fn unsubscribe_disconnects() {
        let relay = EventRelay::new();
        let subscription = relay.subscribe();
        relay.unsubscribe();
        assert!(!relay.tapped("n1", None));
        assert!(subscription.recv_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let mut payload = Map::new();
        payload.insert("screen".into(), json!("inbox"));
        let tap = NotificationEvent::Tap {
            notification_id: "n1".into(),
            payload: Some(payload),
        };
        assert_eq!(
            serde_json::to_value(&tap).unwrap(),
            json!({"type": "tap", "notificationId": "n1", "payload": {"screen": "inbox"}})
        );

        let action = NotificationEvent::Action {
            notification_id: "n1".into(),
            action_id: "archive".into(),
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "action", "notificationId": "n1", "actionId": "archive"})
        );
    }
}
