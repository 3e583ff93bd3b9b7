// Health monitoring and recovery core

pub mod dependencies;
pub mod recovery;
pub mod snapshot;


pub use dependencies::{
    edges_from, DependencyAnalyzer, DependencyEdge, DependencyReport, EdgeKind, ServiceDependencies, UnitPresence,
};
pub use recovery::{
    AttemptOutcome, RecoveryController, RecoveryOutcome, RecoveryReport, RecoverySettings, RestartAttempt,
    ServiceRecovery,
};
pub use snapshot::{HealthSnapshot, Observation, SnapshotBuilder, SnapshotEntry};
