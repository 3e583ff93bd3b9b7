// Alert composition and delivery (mail, webhook)

use crate::config::NotificationConfig;
use crate::error::{Result, SvcguardError};
use crate::monitor::{HealthSnapshot, Observation, RecoveryOutcome, RecoveryReport};
use crate::systemd::HealthStatus;
use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// A delivery channel for alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn notify(&self, audience: &str, subject: &str, body: &str) -> Result<()>;
}

/// Sends alerts through a local `mail`-compatible program
#[derive(Debug, Clone)]
pub struct MailNotifier {
    command: String,
}

impl MailNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn channel(&self) -> &'static str {
        "mail"
    }

    async fn notify(&self, audience: &str, subject: &str, body: &str) -> Result<()> {
        let failure = |message: String| SvcguardError::Notification {
            channel: "mail".to_string(),
            message,
        };

        let mut child = Command::new(&self.command)
            .arg("-s")
            .arg(subject)
            .arg(audience)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failure(format!("Failed to spawn {}: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failure("Failed to capture stdin".to_string()))?;
        stdin.write_all(body.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    audience: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// POSTs alerts as JSON to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("svcguard/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { url: url.into(), client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, audience: &str, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { audience, subject, body })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SvcguardError::Notification {
                channel: "webhook".to_string(),
                message: format!("{} returned status {}", self.url, response.status()),
            }
            .into());
        }
        Ok(())
    }
}

/// Subject and body of one alert, before the subject prefix is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

/// Alerts raised by a run: failures in the snapshot and recoveries that gave up
pub fn alerts_for(snapshot: &HealthSnapshot, recovery: Option<&RecoveryReport>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let problems: Vec<String> = snapshot
        .entries()
        .iter()
        .filter_map(|entry| match &entry.observation {
            Observation::Status(HealthStatus::Failed) => {
                let outcome = recovery
                    .and_then(|r| r.outcome(&entry.name))
                    .map(|o| format!(" [{}]", o.label()))
                    .unwrap_or_default();
                let mut line = format!("{} is failed{}", entry.name, outcome);
                if let Some(detail) = entry.diagnostic.as_deref().filter(|d| !d.is_empty()) {
                    for detail_line in detail.lines() {
                        line.push_str("\n    ");
                        line.push_str(detail_line);
                    }
                }
                Some(line)
            }
            Observation::Unavailable(reason) => Some(format!("{} could not be checked: {}", entry.name, reason)),
            Observation::Status(_) => None,
        })
        .collect();

    if !problems.is_empty() {
        alerts.push(Alert {
            subject: format!("{} of {} monitored services unhealthy", problems.len(), snapshot.len()),
            body: format!(
                "Health check at {}\n\n{}\n",
                snapshot.captured_at().to_rfc3339(),
                problems.join("\n")
            ),
        });
    }

    if let Some(report) = recovery {
        let gave_up = report.needs_attention();
        if !gave_up.is_empty() {
            let lines: Vec<String> = gave_up
                .iter()
                .map(|s| match &s.outcome {
                    RecoveryOutcome::Unavailable(reason) => {
                        format!("{}: service manager unavailable after {} attempt(s): {}", s.name, s.attempts.len(), reason)
                    }
                    _ => format!("{}: still down after {} restart attempt(s)", s.name, s.attempts.len()),
                })
                .collect();
            alerts.push(Alert {
                subject: format!("Automatic restart failed for {} service(s)", gave_up.len()),
                body: format!("{}\n\nManual intervention required.\n", lines.join("\n")),
            });
        }
    }

    alerts
}

/// Fans alerts out to every configured channel
pub struct NotifierSet {
    audience: String,
    subject_prefix: String,
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new(audience: impl Into<String>, subject_prefix: impl Into<String>, channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            audience: audience.into(),
            subject_prefix: subject_prefix.into(),
            channels,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if config.enabled {
            if !config.mail_command.trim().is_empty() {
                channels.push(Box::new(MailNotifier::new(config.mail_command.trim())));
            }
            if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
                channels.push(Box::new(WebhookNotifier::new(url.trim())?));
            }
        }
        Ok(Self::new(&config.recipient, &config.subject_prefix, channels))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver every alert on every channel; returns how many deliveries succeeded.
    /// Delivery failures are logged, never propagated.
    pub async fn dispatch(&self, alerts: &[Alert]) -> usize {
        let mut delivered = 0;
        for alert in alerts {
            let subject = if self.subject_prefix.is_empty() {
                alert.subject.clone()
            } else {
                format!("{} {}", self.subject_prefix, alert.subject)
            };

            for channel in &self.channels {
                match channel.notify(&self.audience, &subject, &alert.body).await {
                    Ok(()) => {
                        tracing::info!("Sent '{}' via {}", subject, channel.channel());
                        delivered += 1;
                    }
                    Err(e) => tracing::warn!("Notification via {} failed: {}", channel.channel(), e),
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ServiceRecovery, SnapshotEntry};
    use crate::systemd::ServiceName;
    use std::sync::{Arc, Mutex};

    type Sent = Arc<Mutex<Vec<(String, String, String)>>>;

    struct RecordingNotifier {
        sent: Sent,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, audience: &str, subject: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("channel down"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((audience.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_prefixes_subject_and_survives_failing_channel() {
        let sent: Sent = Arc::default();
        let set = NotifierSet::new(
            "ops@example.com",
            "[svcguard]",
            vec![
                Box::new(RecordingNotifier { sent: sent.clone(), fail: true }),
                Box::new(RecordingNotifier { sent: sent.clone(), fail: false }),
            ],
        );

        let delivered = set
            .dispatch(&[Alert {
                subject: "1 of 2 monitored services unhealthy".to_string(),
                body: "cron.service is failed".to_string(),
            }])
            .await;

        assert_eq!(delivered, 1);
        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].0, "ops@example.com");
        assert_eq!(sent[0].1, "[svcguard] 1 of 2 monitored services unhealthy");
    }

    #[test]
    fn test_disabled_notifications_have_no_channels() -> Result<()> {
        let config = NotificationConfig {
            enabled: false,
            webhook_url: Some("https://hooks.example.com/x".to_string()),
            ..NotificationConfig::default()
        };
        assert!(NotifierSet::from_config(&config)?.is_empty());

        let mail_only = NotificationConfig::default();
        assert_eq!(NotifierSet::from_config(&mail_only)?.channels.len(), 1);
        Ok(())
    }

    fn entry(name: &str, observation: Observation, diagnostic: Option<&str>) -> SnapshotEntry {
        SnapshotEntry {
            name: ServiceName::parse(name).unwrap(),
            observation,
            diagnostic: diagnostic.map(str::to_string),
        }
    }

    #[test]
    fn test_healthy_snapshot_raises_no_alerts() {
        let snapshot = HealthSnapshot::new(vec![
            entry("sshd", Observation::Status(HealthStatus::Running), None),
            entry("bogus-unit", Observation::Status(HealthStatus::NotFound), None),
        ]);
        assert!(alerts_for(&snapshot, None).is_empty());
    }

    #[test]
    fn test_failures_and_exhausted_recovery_raise_alerts() {
        let snapshot = HealthSnapshot::new(vec![
            entry("sshd", Observation::Status(HealthStatus::Running), None),
            entry(
                "nginx",
                Observation::Status(HealthStatus::Failed),
                Some("failed/failed result=exit-code restarts=2\nnginx[42]: bind() failed"),
            ),
            entry("cron", Observation::Unavailable("bus closed".to_string()), None),
        ]);
        let recovery = RecoveryReport {
            services: vec![ServiceRecovery {
                name: ServiceName::parse("nginx").unwrap(),
                outcome: RecoveryOutcome::Exhausted,
                attempts: Vec::new(),
            }],
        };

        let alerts = alerts_for(&snapshot, Some(&recovery));

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].subject, "2 of 3 monitored services unhealthy");
        assert!(alerts[0].body.contains("nginx.service is failed [exhausted]"));
        assert!(alerts[0].body.contains("    nginx[42]: bind() failed"));
        assert!(alerts[0].body.contains("cron.service could not be checked: bus closed"));
        assert_eq!(alerts[1].subject, "Automatic restart failed for 1 service(s)");
        assert!(alerts[1].body.contains("nginx.service: still down after 0 restart attempt(s)"));
    }

    #[test]
    fn test_recovered_failure_still_reported_but_no_escalation() {
        let snapshot = HealthSnapshot::new(vec![entry("cron", Observation::Status(HealthStatus::Failed), Some(""))]);
        let recovery = RecoveryReport {
            services: vec![ServiceRecovery {
                name: ServiceName::parse("cron").unwrap(),
                outcome: RecoveryOutcome::Recovered,
                attempts: Vec::new(),
            }],
        };

        let alerts = alerts_for(&snapshot, Some(&recovery));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].body.lines().nth(2), Some("cron.service is failed [recovered]"));
    }

    #[tokio::test]
    async fn test_mail_notifier_pipes_body_to_command() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let out = dir.path().join("mail.out");
        let script = dir.path().join("fake-mail");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$1|$2|$3\" > {0}\ncat >> {0}\n", out.display()),
        )?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;

        MailNotifier::new(script.to_string_lossy())
            .notify("root", "cron down", "cron.service is failed")
            .await?;

        let written = std::fs::read_to_string(&out)?;
        assert_eq!(written, "-s|cron down|root\ncron.service is failed");
        Ok(())
    }

    #[tokio::test]
    async fn test_mail_notifier_reports_missing_program() {
        let result = MailNotifier::new("/nonexistent/mail")
            .notify("root", "subject", "body")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_webhook_notifier_reports_unreachable_endpoint() -> Result<()> {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook")?;
        assert!(notifier.notify("root", "subject", "body").await.is_err());
        Ok(())
    }
}
