// Service control plane seam

use crate::error::AdapterError;
use crate::systemd::{HealthStatus, Relationships, ServiceName};
use async_trait::async_trait;

/// Query/command interface over the host service manager.
///
/// Unknown units are a classification (`HealthStatus::NotFound`, `false`,
/// empty relationships), never an error. `AdapterError` is reserved for the
/// service manager itself being unreachable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Current health of a unit
    async fn query_status(&self, name: &ServiceName) -> Result<HealthStatus, AdapterError>;

    /// Issue a restart job. `Ok(false)` means the manager rejected the command;
    /// `Ok(true)` does not imply the unit is running afterwards.
    async fn restart(&self, name: &ServiceName) -> Result<bool, AdapterError>;

    /// Declared Requires / RequiredBy / Wants of a unit
    async fn list_relationships(&self, name: &ServiceName) -> Result<Relationships, AdapterError>;

    /// Whether the manager knows the unit at all
    async fn unit_exists(&self, name: &ServiceName) -> Result<bool, AdapterError>;

    /// Short, human-readable status detail for a failed unit
    async fn diagnose(&self, name: &ServiceName) -> Result<String, AdapterError>;
}
