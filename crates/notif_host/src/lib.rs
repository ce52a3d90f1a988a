pub mod config;
pub mod file_store;
pub mod host;
pub mod presenter;
pub mod runner;

pub use crate::config::HostConfig;
pub use crate::host::{run, Host, HostMessage};
