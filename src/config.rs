// Configuration management

use crate::error::{Result, SvcguardError};
use crate::monitor::RecoverySettings;
use crate::systemd::{BackoffPolicy, ConnectionManager, ServiceList};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Services to watch: a YAML list or a single whitespace/comma separated string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitoredServices {
    List(Vec<String>),
    Inline(String),
}

impl Default for MonitoredServices {
    fn default() -> Self {
        MonitoredServices::List(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub monitored: MonitoredServices,
    pub auto_restart: bool,
    pub max_restart_attempts: u32,
    /// Base backoff delay in seconds
    pub restart_delay: u64,
    pub settle_secs: u64,
    pub max_parallel: usize,
    pub diagnostic_lines: usize,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            monitored: MonitoredServices::default(),
            auto_restart: true,
            max_restart_attempts: 3,
            restart_delay: 30,
            settle_secs: 5,
            max_parallel: 4,
            diagnostic_lines: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub call_timeout_secs: u64,
    pub connect_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 10,
            connect_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub recipient: String,
    /// Mail program invoked as `<mail_command> -s <subject> <recipient>`; empty disables mail
    pub mail_command: String,
    pub webhook_url: Option<String>,
    pub subject_prefix: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: "root".to_string(),
            mail_command: "mail".to_string(),
            webhook_url: None,
            subject_prefix: "[svcguard]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub services: ServicesConfig,
    pub control_plane: ControlPlaneConfig,
    pub notifications: NotificationConfig,
}

impl Config {
    /// Get default config path: ~/.config/svcguard/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("svcguard").join("config.yaml"))
    }

    /// Load config from path, falling back to defaults if not found
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        Self::load_with_overrides(path, &[])
    }

    /// Load config and apply `dotted.key=value` overrides on top of the file
    pub fn load_with_overrides(path: Option<PathBuf>, overrides: &[String]) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Self::default_path().unwrap_or_default());

        let mut tree = if config_path.is_file() {
            let contents = std::fs::read_to_string(&config_path)?;
            tracing::debug!("Loaded config from {}", config_path.display());
            serde_yaml::from_str::<Value>(&contents)?
        } else {
            Value::Null
        };

        // An empty file parses as null
        if tree.is_null() {
            tree = Value::Mapping(Mapping::new());
        }

        for entry in overrides {
            let (key, raw) = entry
                .split_once('=')
                .ok_or_else(|| SvcguardError::Config(format!("Override '{}' is not KEY=VALUE", entry)))?;
            let value = serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            set_path(&mut tree, key.trim(), value)?;
        }

        let config: Config = serde_yaml::from_value(tree)?;
        Ok(config)
    }

    /// Save config to path
    pub fn save(&self, path: PathBuf) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Raw value at a dotted path such as `services.max_restart_attempts`
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut node = serde_yaml::to_value(self).ok()?;
        for segment in path.split('.') {
            node = node.get(segment)?.clone();
        }
        Some(node)
    }

    /// Validated, deduplicated service list; bad entries are logged and dropped
    pub fn service_list(&self) -> ServiceList {
        let (list, rejected) = match &self.services.monitored {
            MonitoredServices::List(entries) => ServiceList::parse(entries.iter().map(String::as_str)),
            MonitoredServices::Inline(raw) => ServiceList::parse_str(raw),
        };
        for reason in rejected {
            tracing::warn!("Ignoring monitored service entry: {}", reason);
        }
        list
    }

    pub fn recovery_settings(&self) -> RecoverySettings {
        if self.services.max_restart_attempts == 0 {
            tracing::warn!("services.max_restart_attempts is 0, using 1");
        }
        RecoverySettings {
            enabled: self.services.auto_restart,
            max_attempts: self.services.max_restart_attempts.max(1),
            backoff: BackoffPolicy::new(Duration::from_secs(self.services.restart_delay)),
            settle: Duration::from_secs(self.services.settle_secs),
            max_parallel: self.services.max_parallel.max(1),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.control_plane.call_timeout_secs.max(1))
    }

    pub fn connection_manager(&self) -> ConnectionManager {
        ConnectionManager::new(
            self.control_plane.connect_retries,
            Duration::from_millis(self.control_plane.retry_delay_ms),
            Duration::from_secs(5),
        )
    }
}

/// Set `value` at a dotted path, creating intermediate mappings
fn set_path(tree: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(SvcguardError::Config(format!("Invalid config key '{}'", path)).into());
    }

    let not_a_section = || SvcguardError::Config(format!("'{}' is not a section", path));

    let mut node = tree;
    for segment in &segments[..segments.len() - 1] {
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let mapping = node.as_mapping_mut().ok_or_else(not_a_section)?;
        if !mapping.contains_key(*segment) {
            mapping.insert(Value::String(segment.to_string()), Value::Mapping(Mapping::new()));
        }
        node = mapping.get_mut(*segment).ok_or_else(not_a_section)?;
    }

    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    let last = segments[segments.len() - 1];
    node.as_mapping_mut()
        .ok_or_else(not_a_section)?
        .insert(Value::String(last.to_string()), value);
    Ok(())
}
