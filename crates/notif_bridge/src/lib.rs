use notif_domain::events::Subscription;
use notif_domain::notifications::{ScheduleUpdate, ScheduledNotification, ShowRequest, TaskOutcome};
use notif_domain::registry::RestoreReport;
use notif_domain::{NotificationError, NotificationService};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Error codes reported to the application layer.
pub mod codes {
    pub const SHOW_NOTIFICATION: &str = "SHOW_NOTIFICATION_ERROR";
    pub const SCHEDULE_NOTIFICATION: &str = "SCHEDULE_NOTIFICATION_ERROR";
    pub const GET_SCHEDULED_NOTIFICATIONS: &str = "GET_SCHEDULED_NOTIFICATIONS_ERROR";
    pub const UPDATE_SCHEDULED_NOTIFICATION: &str = "UPDATE_SCHEDULED_NOTIFICATION_ERROR";
    pub const CANCEL_SCHEDULED_NOTIFICATION: &str = "CANCEL_SCHEDULED_NOTIFICATION_ERROR";
    pub const CANCEL_ALL_SCHEDULED_NOTIFICATIONS: &str =
        "CANCEL_ALL_SCHEDULED_NOTIFICATIONS_ERROR";
    pub const CLEAR_NOTIFICATION_HISTORY: &str = "CLEAR_NOTIFICATION_HISTORY_ERROR";
    pub const GENERIC: &str = "NOTIFICATION_ERROR";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("method not implemented: {0}")]
    NotImplemented(String),

    #[error("{code}: {message}")]
    Native { code: &'static str, message: String },
}

impl BridgeError {
    pub fn code(&self) -> &str {
        match self {
            BridgeError::NotImplemented(_) => "NOT_IMPLEMENTED",
            BridgeError::Native { code, .. } => code,
        }
    }
}

/// One inbound request as it arrives from the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodResponse {
    Ok(Value),
    Error(ErrorBody),
}

impl From<Result<Value, BridgeError>> for MethodResponse {
    fn from(result: Result<Value, BridgeError>) -> Self {
        match result {
            Ok(value) => MethodResponse::Ok(value),
            Err(err) => MethodResponse::Error(ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct CountArgs {
    count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateArgs {
    duplicate_key: String,
    #[serde(default)]
    time_window: Option<u64>,
}

/// Maps method names onto [`NotificationService`] operations and relays
/// native callbacks.
pub struct NotificationBridge {
    service: NotificationService,
}

impl NotificationBridge {
    pub fn new(service: NotificationService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &NotificationService {
        &self.service
    }

    pub fn handle_call(&self, call: &MethodCall) -> MethodResponse {
        self.handle(&call.method, &call.arguments).into()
    }

    /// Dispatches one command. Missing or ill-typed arguments yield
    /// `false`; collaborator failures yield [`BridgeError::Native`].
    pub fn handle(&self, method: &str, arguments: &Value) -> Result<Value, BridgeError> {
        let service = &self.service;
        match method {
            "initialize" => native(codes::GENERIC, service.initialize()).map(Value::from),
            "requestPermissions" => {
                native(codes::GENERIC, service.request_permissions()).map(Value::from)
            }
            "areNotificationsEnabled" => {
                native(codes::GENERIC, service.are_notifications_enabled()).map(Value::from)
            }
            "showNotification" => {
                let Some(request) = parse_args::<ShowRequest>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(codes::SHOW_NOTIFICATION, service.show_notification(&request))
                    .map(Value::from)
            }
            "scheduleNotification" => {
                let Some(record) = parse_args::<ScheduledNotification>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(codes::SCHEDULE_NOTIFICATION, service.schedule_notification(record))
                    .map(Value::from)
            }
            "getScheduledNotifications" => {
                let records = native(
                    codes::GET_SCHEDULED_NOTIFICATIONS,
                    service.scheduled_notifications(),
                )?;
                serde_json::to_value(records).map_err(|err| BridgeError::Native {
                    code: codes::GET_SCHEDULED_NOTIFICATIONS,
                    message: err.to_string(),
                })
            }
            "updateScheduledNotification" => {
                let Some(update) = parse_args::<ScheduleUpdate>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(
                    codes::UPDATE_SCHEDULED_NOTIFICATION,
                    service.update_scheduled_notification(update),
                )
                .map(Value::from)
            }
            "cancelNotification" => {
                let Some(IdArgs { id }) = parse_args::<IdArgs>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(codes::GENERIC, service.cancel_notification(&id)).map(|()| Value::Bool(true))
            }
            "cancelScheduledNotification" => {
                let Some(IdArgs { id }) = parse_args::<IdArgs>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(
                    codes::CANCEL_SCHEDULED_NOTIFICATION,
                    service.cancel_scheduled_notification(&id),
                )
                .map(|()| Value::Bool(true))
            }
            "cancelAllNotifications" => {
                native(codes::GENERIC, service.cancel_all_notifications())
                    .map(|()| Value::Bool(true))
            }
            "cancelAllScheduledNotifications" => native(
                codes::CANCEL_ALL_SCHEDULED_NOTIFICATIONS,
                service.cancel_all_scheduled_notifications(),
            )
            .map(|()| Value::Bool(true)),
            "getBadgeCount" => native(codes::GENERIC, service.badge_count()).map(Value::from),
            "setBadgeCount" => {
                let Some(CountArgs { count }) = parse_args::<CountArgs>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(codes::GENERIC, service.set_badge_count(count)).map(|()| Value::Bool(true))
            }
            "clearBadgeCount" => {
                native(codes::GENERIC, service.clear_badge_count()).map(|()| Value::Bool(true))
            }
            "isDuplicateNotification" => {
                let Some(args) = parse_args::<DuplicateArgs>(method, arguments) else {
                    return Ok(Value::Bool(false));
                };
                native(
                    codes::GENERIC,
                    service.is_duplicate(&args.duplicate_key, args.time_window),
                )
                .map(Value::from)
            }
            "clearNotificationHistory" => native(
                codes::CLEAR_NOTIFICATION_HISTORY,
                service.clear_notification_history(),
            )
            .map(|()| Value::Bool(true)),
            other => Err(BridgeError::NotImplemented(other.to_string())),
        }
    }

    /// Attaches the event subscriber, replacing any previous one.
    pub fn listen(&self) -> Subscription {
        self.service.events().subscribe()
    }

    pub fn cancel_listen(&self) {
        self.service.events().unsubscribe();
    }

    pub fn notification_tapped(&self, notification_id: &str, payload: Option<Map<String, Value>>) {
        self.service.events().tapped(notification_id, payload);
    }

    pub fn action_pressed(&self, notification_id: &str, action_id: &str) {
        self.service.events().action_pressed(notification_id, action_id);
    }

    /// Process or device start.
    pub fn on_boot(&self) -> RestoreReport {
        self.service.restore_scheduled()
    }

    /// Deferred task runner callback.
    pub fn on_task_fired(&self, payload: &Value) -> TaskOutcome {
        self.service.on_task_fired(payload)
    }
}

fn parse_args<T: DeserializeOwned>(method: &str, arguments: &Value) -> Option<T> {
    match T::deserialize(arguments) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            debug!(method, error = %err, "rejecting malformed arguments");
            None
        }
    }
}

fn native<T>(code: &'static str, result: Result<T, NotificationError>) -> Result<T, BridgeError> {
    result.map_err(|err| {
        warn!(code, error = %err, "native call failed");
        BridgeError::Native {
            code,
            message: err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn responses_serialize_as_ok_or_error() {
        let ok: MethodResponse = Ok(json!(true)).into();
        assert_eq!(serde_json::to_value(ok).unwrap(), json!({"ok": true}));

        let err: MethodResponse = Err(BridgeError::NotImplemented("frobnicate".into())).into();
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({"error": {"code": "NOT_IMPLEMENTED", "message": "method not implemented: frobnicate"}})
        );
    }

    #[test]
    fn method_call_arguments_default_to_null() {
        let call: MethodCall = serde_json::from_value(json!({"method": "initialize"})).unwrap();
        assert_eq!(call.arguments, Value::Null);
    }
}
