// One monitoring run: snapshot, recovery, dependencies, alerts

use crate::config::Config;
use crate::error::{Result, SvcguardError};
use crate::monitor::{DependencyAnalyzer, RecoveryController, SnapshotBuilder};
use crate::notify::{alerts_for, Alert, NotifierSet};
use crate::report::{Mode, RunReport};
use crate::systemd::{ControlPlane, ServiceList};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires the monitoring core to a control plane and a configuration
pub struct Monitor {
    control: Arc<dyn ControlPlane>,
    config: Config,
    notifier: Option<NotifierSet>,
}

impl Monitor {
    pub fn new(control: Arc<dyn ControlPlane>, config: Config) -> Self {
        Self {
            control,
            config,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: NotifierSet) -> Self {
        if !notifier.is_empty() {
            self.notifier = Some(notifier);
        }
        self
    }

    pub async fn run(&self, mode: Mode, services: &ServiceList, cancel: &CancellationToken) -> Result<RunReport> {
        if services.is_empty() {
            tracing::info!("No services configured, nothing to {}", mode.label());
            return Ok(RunReport::empty(mode));
        }

        tracing::info!("Starting {} run over {} service(s)", mode.label(), services.len());
        let call_timeout = self.config.call_timeout();

        let mut snapshot = None;
        let mut recovery = None;
        if mode.takes_snapshot() {
            let captured = SnapshotBuilder::new(self.control.clone(), call_timeout)
                .capture(services)
                .await;

            if captured.control_plane_down() {
                self.send_alerts(&alerts_for(&captured, None)).await;
                return Err(SvcguardError::ControlPlaneDown {
                    services: captured.len(),
                }
                .into());
            }

            if matches!(mode, Mode::Restart | Mode::Full) {
                let mut settings = self.config.recovery_settings();
                if mode == Mode::Restart && !settings.enabled {
                    tracing::info!("Restart requested explicitly, ignoring services.auto_restart=false");
                    settings.enabled = true;
                }

                let failed = captured.failed();
                if !failed.is_empty() {
                    let controller = RecoveryController::new(self.control.clone(), call_timeout, settings);
                    recovery = Some(controller.recover(&failed, cancel).await);
                }
            }
            snapshot = Some(captured);
        }

        let mut dependencies = None;
        if mode.reads_dependencies() {
            let report = DependencyAnalyzer::new(self.control.clone(), call_timeout)
                .analyze(services)
                .await;
            if mode == Mode::Dependencies && report.control_plane_down() {
                return Err(SvcguardError::ControlPlaneDown {
                    services: report.services.len(),
                }
                .into());
            }
            dependencies = Some(report);
        }

        if let Some(snapshot) = &snapshot {
            self.send_alerts(&alerts_for(snapshot, recovery.as_ref())).await;
        }

        let report = RunReport::new(mode, snapshot, recovery, dependencies);
        tracing::info!("{} run finished, {} unresolved", mode.label(), report.unresolved);
        Ok(report)
    }

    async fn send_alerts(&self, alerts: &[Alert]) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if alerts.is_empty() {
            return;
        }
        let delivered = notifier.dispatch(alerts).await;
        tracing::debug!("{} of {} alert(s) delivered", delivered, alerts.len());
    }
}
