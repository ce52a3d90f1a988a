pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod keys;
pub mod memory;
pub mod notifications;
pub mod registry;
pub mod service;
pub mod store;

pub use crate::error::{NotificationError, Result};
pub use crate::service::{NotificationService, NotificationServiceBuilder};
