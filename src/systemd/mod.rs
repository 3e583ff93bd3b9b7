// Systemd integration module

pub mod client;
pub mod control;
pub mod journal;
pub mod models;
pub mod resilience;

#[cfg(test)]
mod tests;

pub use client::SystemdClient;
pub use control::ControlPlane;
pub use journal::{JournalReader, LogLine};
pub use models::{HealthStatus, Relationships, ServiceList, ServiceName, UnitState};
pub use resilience::{bounded, BackoffPolicy, ConnectionManager};

#[cfg(test)]
pub use control::MockControlPlane;
