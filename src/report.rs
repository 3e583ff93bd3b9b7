// Run reports and their text/YAML rendering

use crate::error::Result;
use crate::monitor::{
    AttemptOutcome, DependencyReport, EdgeKind, HealthSnapshot, Observation, RecoveryOutcome, RecoveryReport,
    UnitPresence,
};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write;

/// What a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Snapshot only
    Check,
    /// Snapshot, then restart whatever failed
    Restart,
    /// Declared dependency relationships only
    Dependencies,
    /// Snapshot, recovery per configuration, and dependencies
    Full,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Check => "check",
            Mode::Restart => "restart",
            Mode::Dependencies => "dependencies",
            Mode::Full => "full",
        }
    }

    pub fn takes_snapshot(&self) -> bool {
        !matches!(self, Mode::Dependencies)
    }

    pub fn reads_dependencies(&self) -> bool {
        matches!(self, Mode::Dependencies | Mode::Full)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Yaml,
}

/// Everything one run observed and did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<HealthSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyReport>,
    pub unresolved: usize,
}

impl RunReport {
    pub fn new(
        mode: Mode,
        snapshot: Option<HealthSnapshot>,
        recovery: Option<RecoveryReport>,
        dependencies: Option<DependencyReport>,
    ) -> Self {
        let mut report = Self {
            mode,
            snapshot,
            recovery,
            dependencies,
            unresolved: 0,
        };
        report.unresolved = report.count_unresolved();
        report
    }

    /// Empty report for an empty service list
    pub fn empty(mode: Mode) -> Self {
        Self::new(mode, None, None, None)
    }

    /// Failed services that were not recovered plus services that could not be checked.
    /// Without a snapshot, dependency lookups that could not be made count instead.
    fn count_unresolved(&self) -> usize {
        match (&self.snapshot, &self.dependencies) {
            (Some(snapshot), _) => snapshot
                .entries()
                .iter()
                .filter(|entry| match &entry.observation {
                    Observation::Status(_) if entry.observation.is_failed() => {
                        let recovered = self
                            .recovery
                            .as_ref()
                            .and_then(|r| r.outcome(&entry.name))
                            .is_some_and(|o| *o == RecoveryOutcome::Recovered);
                        !recovered
                    }
                    Observation::Status(_) => false,
                    Observation::Unavailable(_) => true,
                })
                .count(),
            (None, Some(dependencies)) => dependencies.unavailable_count(),
            (None, None) => 0,
        }
    }

    /// Process exit status for this report
    pub fn exit_code(&self) -> i32 {
        self.unresolved.min(255) as i32
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        match &self.snapshot {
            Some(snapshot) => {
                let _ = writeln!(
                    out,
                    "svcguard {} at {}",
                    self.mode.label(),
                    snapshot.captured_at().format("%Y-%m-%d %H:%M:%S UTC")
                );
                if snapshot.is_empty() {
                    let _ = writeln!(out, "  no services configured");
                }
                for entry in snapshot.entries() {
                    let outcome = self
                        .recovery
                        .as_ref()
                        .and_then(|r| r.outcome(&entry.name))
                        .map(|o| format!("  ({})", o.label()))
                        .unwrap_or_default();
                    let _ = writeln!(out, "  {:<32} {:<12}{}", entry.name.as_str(), entry.observation.label(), outcome);
                    if let Observation::Unavailable(reason) = &entry.observation {
                        let _ = writeln!(out, "      {}", reason);
                    }
                    if let Some(detail) = &entry.diagnostic {
                        for line in detail.lines() {
                            let _ = writeln!(out, "      {}", line);
                        }
                    }
                }
            }
            None => {
                let _ = writeln!(out, "svcguard {}", self.mode.label());
            }
        }

        if let Some(recovery) = self.recovery.as_ref().filter(|r| !r.is_empty()) {
            let _ = writeln!(out, "\nRecovery:");
            for service in &recovery.services {
                let attempts: Vec<&str> = service
                    .attempts
                    .iter()
                    .map(|a| match a.outcome {
                        AttemptOutcome::CommandFailed => "rejected",
                        AttemptOutcome::CommandSucceededButInactive => "inactive",
                        AttemptOutcome::Verified => "verified",
                        AttemptOutcome::Unavailable => "unavailable",
                    })
                    .collect();
                let _ = writeln!(
                    out,
                    "  {:<32} {:<14} attempts: {}",
                    service.name.as_str(),
                    service.outcome.label(),
                    if attempts.is_empty() { "none".to_string() } else { attempts.join(", ") }
                );
            }
        }

        if let Some(dependencies) = &self.dependencies {
            let _ = writeln!(out, "\nDependencies:");
            for service in &dependencies.services {
                match &service.presence {
                    UnitPresence::NotFound => {
                        let _ = writeln!(out, "  {} (not found)", service.name);
                    }
                    UnitPresence::Unavailable(reason) => {
                        let _ = writeln!(out, "  {} (unavailable: {})", service.name, reason);
                    }
                    UnitPresence::Found => {
                        let _ = writeln!(out, "  {}", service.name);
                        for kind in [EdgeKind::Requires, EdgeKind::RequiredBy, EdgeKind::Wants] {
                            let targets = service.targets(kind);
                            if !targets.is_empty() {
                                let names: Vec<&str> = targets.iter().map(|t| t.as_str()).collect();
                                let _ = writeln!(out, "      {:<12} {}", kind.label(), names.join(", "));
                            }
                        }
                    }
                }
            }
        }

        let _ = writeln!(out, "\nUnresolved: {}", self.unresolved);
        out
    }
}
