// Resilient D-Bus connection handling, call timeouts and restart backoff

use crate::error::{AdapterError, Result, SvcguardError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use zbus::Connection;

/// Connection manager with automatic retry on connect
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    max_retries: usize,
    retry_delay: Duration,
    connection_timeout: Duration,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionManager {
    /// Create a new connection manager with custom settings
    pub fn new(max_retries: usize, retry_delay: Duration, connection_timeout: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
            connection_timeout,
        }
    }

    /// Establish a system bus connection with retry logic
    pub async fn connect_systemd(&self) -> Result<Connection> {
        self.with_retry("systemd connection", || async {
            let conn = tokio::time::timeout(self.connection_timeout, Connection::system())
                .await
                .map_err(|_| SvcguardError::SystemdConnection("Connection timeout".to_string()))?
                .map_err(|e| SvcguardError::SystemdConnection(format!("Failed to connect: {}", e)))?;

            Ok(conn)
        })
        .await
    }

    /// Execute an operation with automatic retry
    pub async fn with_retry<F, T, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!("Operation '{}' succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    tracing::warn!("Operation '{}' failed on attempt {}: {}", operation_name, attempt, error);
                    let fatal = should_not_retry(&error);
                    last_error = Some(error);

                    if fatal {
                        break;
                    }

                    // Wait before retry (except on last attempt)
                    if attempt < self.max_retries {
                        tracing::debug!("Retrying in {:?}...", self.retry_delay);
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SvcguardError::SystemdConnection("No error recorded during retry".to_string()).into()
        }))
    }
}

/// Errors that will not go away by asking again
fn should_not_retry(error: &anyhow::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    error_str.contains("permission denied")
        || error_str.contains("access denied")
        || error_str.contains("no such file")
        || error_str.contains("invalid argument")
}

/// Run one control plane call with an upper bound on its duration.
///
/// An elapsed timeout becomes `AdapterError::Timeout` so callers can tell a
/// hung service manager apart from a down service.
pub async fn bounded<T, Fut>(operation: &str, timeout: Duration, call: Fut) -> std::result::Result<T, AdapterError>
where
    Fut: Future<Output = std::result::Result<T, AdapterError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Control plane call '{}' timed out after {:?}", operation, timeout);
            Err(AdapterError::Timeout {
                operation: operation.to_string(),
                timeout,
            })
        }
    }
}

/// Delay schedule between restart attempts.
///
/// The delay inserted after attempt `k` (before attempt `k + 1`) is
/// `base_delay * k * k`: 1x, 4x, 9x the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to wait after `attempt` (1-based) has failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = attempt.saturating_mul(attempt);
        self.base_delay.saturating_mul(factor)
    }
}
