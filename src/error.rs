// Error types for svcguard

use std::time::Duration;
use thiserror::Error;

/// Result type alias using anyhow::Error
pub type Result<T> = anyhow::Result<T>;

/// Failure talking to the service manager itself.
///
/// This is never used for "the service is down": a down unit is a
/// `HealthStatus`, a down control plane is an `AdapterError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Service manager unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },

    #[error("Service manager call {operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },
}

impl AdapterError {
    pub fn unavailable(operation: &str, message: impl Into<String>) -> Self {
        AdapterError::Unavailable {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Svcguard-specific error types
#[derive(Error, Debug)]
pub enum SvcguardError {
    #[error("Failed to connect to systemd D-Bus: {0}")]
    SystemdConnection(String),

    #[error("Service manager unreachable for all {services} monitored services")]
    ControlPlaneDown { services: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to deliver notification via {channel}: {message}")]
    Notification { channel: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
