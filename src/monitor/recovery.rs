// Bounded restart-and-verify recovery of failed services

use crate::monitor::{Observation, SnapshotBuilder};
use crate::systemd::{bounded, BackoffPolicy, ControlPlane, HealthStatus, ServiceName};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Knobs for one recovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySettings {
    pub enabled: bool,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Wait between an accepted restart and the verification query
    pub settle: Duration,
    /// Services recovered at the same time; 1 means strictly one after another
    pub max_parallel: usize,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            settle: Duration::from_secs(5),
            max_parallel: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The service manager refused the restart job
    CommandFailed,
    CommandSucceededButInactive,
    Verified,
    /// The restart or its verification never got an answer
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartAttempt {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Backoff scheduled after this attempt; `None` on the terminal attempt
    pub delay_before_next: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Recovered,
    Exhausted,
    Cancelled,
    /// Recovery is disabled; nothing was tried
    NotAttempted,
    /// The service manager stopped answering mid-sequence
    Unavailable(String),
}

impl RecoveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryOutcome::Recovered => "recovered",
            RecoveryOutcome::Exhausted => "exhausted",
            RecoveryOutcome::Cancelled => "cancelled",
            RecoveryOutcome::NotAttempted => "not-attempted",
            RecoveryOutcome::Unavailable(_) => "unavailable",
        }
    }
}

/// The attempt history and final outcome for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRecovery {
    pub name: ServiceName,
    pub outcome: RecoveryOutcome,
    pub attempts: Vec<RestartAttempt>,
}

impl ServiceRecovery {
    fn finish(name: ServiceName, outcome: RecoveryOutcome, attempts: Vec<RestartAttempt>) -> Self {
        match &outcome {
            RecoveryOutcome::Recovered => {
                tracing::info!("{} recovered after {} attempt(s)", name, attempts.len())
            }
            RecoveryOutcome::Exhausted => {
                tracing::error!("{} still down after {} restart attempt(s)", name, attempts.len())
            }
            RecoveryOutcome::Cancelled => {
                tracing::warn!("Recovery of {} cancelled after {} attempt(s)", name, attempts.len())
            }
            RecoveryOutcome::NotAttempted => {}
            RecoveryOutcome::Unavailable(reason) => {
                tracing::error!("Recovery of {} abandoned, service manager unavailable: {}", name, reason)
            }
        }
        Self { name, outcome, attempts }
    }
}

/// Outcomes of one recovery run, in the order services were supplied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub services: Vec<ServiceRecovery>,
}

impl RecoveryReport {
    pub fn get(&self, name: &ServiceName) -> Option<&ServiceRecovery> {
        self.services.iter().find(|s| &s.name == name)
    }

    pub fn outcome(&self, name: &ServiceName) -> Option<&RecoveryOutcome> {
        self.get(name).map(|s| &s.outcome)
    }

    pub fn with_outcome(&self, wanted: &RecoveryOutcome) -> Vec<&ServiceRecovery> {
        self.services.iter().filter(|s| &s.outcome == wanted).collect()
    }

    /// Services that need a human: exhausted or cut off from the service manager
    pub fn needs_attention(&self) -> Vec<&ServiceRecovery> {
        self.services
            .iter()
            .filter(|s| matches!(s.outcome, RecoveryOutcome::Exhausted | RecoveryOutcome::Unavailable(_)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Restarts failed services with bounded retries and backoff
pub struct RecoveryController {
    control: Arc<dyn ControlPlane>,
    verifier: SnapshotBuilder,
    call_timeout: Duration,
    settings: RecoverySettings,
}

impl RecoveryController {
    pub fn new(control: Arc<dyn ControlPlane>, call_timeout: Duration, settings: RecoverySettings) -> Self {
        let verifier = SnapshotBuilder::new(control.clone(), call_timeout);
        Self {
            control,
            verifier,
            call_timeout,
            settings,
        }
    }

    pub fn settings(&self) -> &RecoverySettings {
        &self.settings
    }

    /// Recover every named service; one sequence per name, never overlapping.
    ///
    /// After `cancel` fires no new attempt or backoff starts; an in-flight
    /// restart is still verified and recorded.
    pub async fn recover(&self, failed: &[ServiceName], cancel: &CancellationToken) -> RecoveryReport {
        if !self.settings.enabled {
            tracing::info!("Automatic restart disabled, {} failed service(s) left alone", failed.len());
            return RecoveryReport {
                services: failed
                    .iter()
                    .map(|name| ServiceRecovery {
                        name: name.clone(),
                        outcome: RecoveryOutcome::NotAttempted,
                        attempts: Vec::new(),
                    })
                    .collect(),
            };
        }

        // Callers pass a deduplicated list, but a name must never run twice at once
        let mut unique: Vec<ServiceName> = Vec::with_capacity(failed.len());
        for name in failed {
            if !unique.contains(name) {
                unique.push(name.clone());
            }
        }

        let services: Vec<ServiceRecovery> = futures::stream::iter(unique)
            .map(|name| self.recover_one(name, cancel))
            .buffered(self.settings.max_parallel.max(1))
            .collect()
            .await;

        RecoveryReport { services }
    }

    async fn recover_one(&self, name: ServiceName, cancel: &CancellationToken) -> ServiceRecovery {
        let max_attempts = self.settings.max_attempts;
        let mut attempts: Vec<RestartAttempt> = Vec::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return ServiceRecovery::finish(name, RecoveryOutcome::Cancelled, attempts);
            }

            tracing::info!("Restarting {} (attempt {}/{})", name, attempt, max_attempts);
            let restarted = bounded("restart", self.call_timeout, self.control.restart(&name)).await;
            let accepted = match restarted {
                Ok(accepted) => accepted,
                Err(e) => {
                    // The job may have been queued before the call failed
                    attempts.push(RestartAttempt {
                        attempt,
                        outcome: AttemptOutcome::Unavailable,
                        delay_before_next: None,
                    });
                    return ServiceRecovery::finish(name, RecoveryOutcome::Unavailable(e.to_string()), attempts);
                }
            };

            let mut unavailable = None;
            let outcome = if !accepted {
                tracing::warn!("Restart command for {} failed", name);
                AttemptOutcome::CommandFailed
            } else {
                tokio::select! {
                    _ = sleep(self.settings.settle) => {}
                    _ = cancel.cancelled() => {
                        tracing::debug!("Settle wait for {} cut short by cancellation", name);
                    }
                }

                match self.verifier.observe(&name).await {
                    Observation::Status(HealthStatus::Running) => AttemptOutcome::Verified,
                    Observation::Status(status) => {
                        tracing::warn!("{} restarted but is {} after settling", name, status);
                        AttemptOutcome::CommandSucceededButInactive
                    }
                    Observation::Unavailable(reason) => {
                        tracing::error!("Could not verify {} after restart: {}", name, reason);
                        unavailable = Some(reason);
                        AttemptOutcome::Unavailable
                    }
                }
            };

            let terminal = outcome == AttemptOutcome::Verified || unavailable.is_some() || attempt == max_attempts;
            let delay_before_next = (!terminal).then(|| self.settings.backoff.delay_after(attempt));

            attempts.push(RestartAttempt {
                attempt,
                outcome,
                delay_before_next,
            });

            if outcome == AttemptOutcome::Verified {
                return ServiceRecovery::finish(name, RecoveryOutcome::Recovered, attempts);
            }
            if let Some(reason) = unavailable {
                return ServiceRecovery::finish(name, RecoveryOutcome::Unavailable(reason), attempts);
            }

            if let Some(delay) = delay_before_next {
                tracing::debug!("Backing off {:?} before restarting {} again", delay, name);
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return ServiceRecovery::finish(name, RecoveryOutcome::Cancelled, attempts);
                    }
                }
            }
        }

        ServiceRecovery::finish(name, RecoveryOutcome::Exhausted, attempts)
    }
}
