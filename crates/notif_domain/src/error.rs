//! Error types shared by the notification core.

use thiserror::Error;

/// Errors raised by the registry, the guard and the service facade.
///
/// Validation problems (a past-due schedule date, a suppressed duplicate) are
/// not errors; they surface as `false` results.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The key-value store rejected a read or write.
    #[error("storage error: {0}")]
    Store(String),

    /// The native presenter rejected a request.
    #[error("presenter error: {0}")]
    Presenter(String),

    /// The deferred task runner rejected an arm or cancel.
    #[error("task runner error: {0}")]
    TaskRunner(String),

    /// A record or task payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The service builder was missing a required collaborator.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
