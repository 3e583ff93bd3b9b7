// Point-in-time health snapshots of monitored services

use crate::error::AdapterError;
use crate::systemd::{bounded, ControlPlane, HealthStatus, ServiceList, ServiceName};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// What the control plane told us about one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    Status(HealthStatus),
    /// The service manager could not be asked; says nothing about the service
    Unavailable(String),
}

impl Observation {
    pub fn status(&self) -> Option<HealthStatus> {
        match self {
            Observation::Status(status) => Some(*status),
            Observation::Unavailable(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Some(HealthStatus::Failed)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Observation::Unavailable(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Observation::Status(status) => status.label(),
            Observation::Unavailable(_) => "unavailable",
        }
    }
}

impl From<Result<HealthStatus, AdapterError>> for Observation {
    fn from(result: Result<HealthStatus, AdapterError>) -> Self {
        match result {
            Ok(status) => Observation::Status(status),
            Err(e) => Observation::Unavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub name: ServiceName,
    pub observation: Observation,
    /// Status detail, only captured for failed services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Immutable health record for a set of services
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    captured_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
}

impl HealthSnapshot {
    /// Snapshot captured now from already-collected entries
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            captured_at: Utc::now(),
            entries,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn get(&self, name: &ServiceName) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| &entry.name == name)
    }

    /// Services classified as failed, in snapshot order
    pub fn failed(&self) -> Vec<ServiceName> {
        self.entries
            .iter()
            .filter(|entry| entry.observation.is_failed())
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn count(&self, status: HealthStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.observation.status() == Some(status))
            .count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.observation.is_unavailable()).count()
    }

    /// True when there was something to check and not a single check got through
    pub fn control_plane_down(&self) -> bool {
        !self.entries.is_empty() && self.unavailable_count() == self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds health snapshots against a control plane
#[derive(Clone)]
pub struct SnapshotBuilder {
    control: Arc<dyn ControlPlane>,
    call_timeout: Duration,
}

impl SnapshotBuilder {
    pub fn new(control: Arc<dyn ControlPlane>, call_timeout: Duration) -> Self {
        Self { control, call_timeout }
    }

    /// Query every service once; one entry per name, in list order
    pub async fn capture(&self, services: &ServiceList) -> HealthSnapshot {
        let captured_at = Utc::now();
        let entries = futures::future::join_all(services.iter().map(|name| self.entry_for(name))).await;

        let snapshot = HealthSnapshot { captured_at, entries };
        tracing::info!(
            "Snapshot of {} services: {} running, {} failed, {} not found, {} unavailable",
            snapshot.len(),
            snapshot.count(HealthStatus::Running),
            snapshot.count(HealthStatus::Failed),
            snapshot.count(HealthStatus::NotFound),
            snapshot.unavailable_count()
        );
        snapshot
    }

    /// Single status query, used for post-restart verification as well
    pub async fn observe(&self, name: &ServiceName) -> Observation {
        bounded("query_status", self.call_timeout, self.control.query_status(name))
            .await
            .into()
    }

    async fn entry_for(&self, name: &ServiceName) -> SnapshotEntry {
        let observation = self.observe(name).await;

        let diagnostic = match &observation {
            Observation::Status(HealthStatus::Running) => {
                tracing::debug!("{} is running", name);
                None
            }
            Observation::Status(HealthStatus::NotFound) => {
                tracing::warn!("{} is not known to the service manager", name);
                None
            }
            Observation::Status(HealthStatus::Failed) => {
                tracing::warn!("{} is not running", name);
                Some(self.diagnostic_for(name).await)
            }
            Observation::Unavailable(reason) => {
                tracing::error!("Could not check {}: {}", name, reason);
                None
            }
        };

        SnapshotEntry {
            name: name.clone(),
            observation,
            diagnostic,
        }
    }

    /// Best effort; any failure degrades to an empty diagnostic
    async fn diagnostic_for(&self, name: &ServiceName) -> String {
        match bounded("diagnose", self.call_timeout, self.control.diagnose(name)).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::debug!("No diagnostic for {}: {}", name, e);
                String::new()
            }
        }
    }
}
