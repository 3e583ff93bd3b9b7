// Systemd unit data models

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_UNIT_NAME_LEN: usize = 256;

/// Unit suffixes systemd understands; anything else gets `.service` appended
const UNIT_SUFFIXES: &[&str] = &[
    ".service", ".socket", ".target", ".timer", ".mount", ".automount", ".path", ".slice",
    ".scope", ".device", ".swap",
];

/// A validated systemd unit name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Parse and normalize a unit name, e.g. `sshd` -> `sshd.service`
    pub fn parse(raw: &str) -> Result<Self, String> {
        let name = raw.trim();
        if name.is_empty() {
            return Err("Service name cannot be empty".to_string());
        }
        if name.contains("..") || name.contains('\0') || name.contains('/') {
            return Err(format!("Invalid service name format: {:?}", name));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(format!("Service name contains whitespace: {:?}", name));
        }

        let name = if UNIT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            name.to_string()
        } else {
            format!("{}.service", name)
        };

        if name.len() > MAX_UNIT_NAME_LEN {
            return Err(format!("Service name longer than {} bytes", MAX_UNIT_NAME_LEN));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free list of services to watch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceList {
    names: Vec<ServiceName>,
}

impl ServiceList {
    /// Build from already-parsed names, collapsing duplicates (first one wins)
    pub fn new(names: impl IntoIterator<Item = ServiceName>) -> Self {
        let mut list = Self::default();
        for name in names {
            list.push(name);
        }
        list
    }

    /// Parse raw entries, returning the list and the entries that were rejected
    pub fn parse<'a>(raw: impl IntoIterator<Item = &'a str>) -> (Self, Vec<String>) {
        let mut rejected = Vec::new();
        let mut list = Self::default();
        for entry in raw {
            match ServiceName::parse(entry) {
                Ok(name) => list.push(name),
                Err(reason) => rejected.push(reason),
            }
        }
        (list, rejected)
    }

    /// Split a shell-style list (`"sshd cron, nginx"`) and parse it
    pub fn parse_str(raw: &str) -> (Self, Vec<String>) {
        Self::parse(
            raw.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty()),
        )
    }

    fn push(&mut self, name: ServiceName) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> IntoIterator for &'a ServiceList {
    type Item = &'a ServiceName;
    type IntoIter = std::slice::Iter<'a, ServiceName>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

/// Point-in-time health classification of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Running,
    Failed,
    NotFound,
}

impl HealthStatus {
    /// Classify systemd's LoadState/ActiveState pair
    pub fn from_states(load_state: &str, active_state: &str) -> Self {
        if load_state == "not-found" {
            return HealthStatus::NotFound;
        }
        match active_state {
            "active" | "reloading" => HealthStatus::Running,
            _ => HealthStatus::Failed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Running => "running",
            HealthStatus::Failed => "failed",
            HealthStatus::NotFound => "not-found",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Declared relationships of a unit, as reported by the service manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    pub requires: Vec<ServiceName>,
    pub required_by: Vec<ServiceName>,
    pub wants: Vec<ServiceName>,
}

/// Subset of unit properties used for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitState {
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
    pub result: String,
    pub n_restarts: u32,
}

impl UnitState {
    pub fn health(&self) -> HealthStatus {
        HealthStatus::from_states(&self.load_state, &self.active_state)
    }

    /// One-line summary, e.g. `failed/failed result=exit-code restarts=4`
    pub fn summary(&self) -> String {
        format!(
            "{}/{} result={} restarts={}",
            self.active_state,
            self.sub_state,
            if self.result.is_empty() { "unknown" } else { &self.result },
            self.n_restarts
        )
    }
}
