// Systemd D-Bus control plane using zbus

use crate::error::{AdapterError, Result};
use crate::systemd::{
    ConnectionManager, ControlPlane, HealthStatus, JournalReader, Relationships, ServiceName, UnitState,
};
use async_trait::async_trait;
use std::collections::HashMap;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::Connection;

const SYSTEMD_DEST: &str = "org.freedesktop.systemd1";
const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";
const MANAGER_IFACE: &str = "org.freedesktop.systemd1.Manager";
const NO_SUCH_UNIT: &str = "org.freedesktop.systemd1.NoSuchUnit";
const SYSTEMD_ERROR_PREFIX: &str = "org.freedesktop.systemd1.";
const REFUSAL_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.AccessDenied",
    "org.freedesktop.DBus.Error.InteractiveAuthorizationRequired",
    "org.freedesktop.DBus.Error.InvalidArgs",
];

type UnitProperties = HashMap<String, OwnedValue>;

/// Systemd D-Bus client with resilient connection handling
#[derive(Clone)]
pub struct SystemdClient {
    connection: Connection,
    connection_manager: ConnectionManager,
    journal: JournalReader,
    diagnostic_lines: usize,
}

impl SystemdClient {
    /// Connect to the system bus
    pub async fn connect(connection_manager: ConnectionManager, diagnostic_lines: usize) -> Result<Self> {
        let connection = connection_manager.connect_systemd().await?;

        Ok(Self {
            connection,
            connection_manager,
            journal: JournalReader::default(),
            diagnostic_lines,
        })
    }

    async fn manager_proxy(&self, operation: &str) -> std::result::Result<zbus::Proxy<'_>, AdapterError> {
        zbus::Proxy::new(&self.connection, SYSTEMD_DEST, SYSTEMD_PATH, MANAGER_IFACE)
            .await
            .map_err(|e| AdapterError::unavailable(operation, e.to_string()))
    }

    /// Load unit properties; `None` when systemd has never heard of the unit
    async fn unit_properties(
        &self,
        operation: &str,
        name: &ServiceName,
    ) -> std::result::Result<Option<UnitProperties>, AdapterError> {
        let proxy = self.manager_proxy(operation).await?;

        // LoadUnit works for loaded and not-loaded units alike, unlike GetUnit
        let unit_path: OwnedObjectPath = match proxy.call("LoadUnit", &(name.as_str(),)).await {
            Ok(path) => path,
            Err(e) if is_no_such_unit(&e) => return Ok(None),
            Err(e) => return Err(AdapterError::unavailable(operation, e.to_string())),
        };

        let props_proxy = zbus::fdo::PropertiesProxy::builder(&self.connection)
            .destination(SYSTEMD_DEST)
            .and_then(|b| b.path(unit_path.as_str()))
            .map_err(|e| AdapterError::unavailable(operation, e.to_string()))?
            .build()
            .await
            .map_err(|e| AdapterError::unavailable(operation, e.to_string()))?;

        use zbus::zvariant::Optional;
        let props = props_proxy
            .get_all(Optional::default())
            .await
            .map_err(|e| AdapterError::unavailable(operation, e.to_string()))?;

        Ok(Some(props))
    }

    /// Query unit properties, retrying transient bus failures
    async fn unit_properties_with_retry(
        &self,
        operation: &str,
        name: &ServiceName,
    ) -> std::result::Result<Option<UnitProperties>, AdapterError> {
        self.connection_manager
            .with_retry(operation, || async {
                self.unit_properties(operation, name).await.map_err(anyhow::Error::from)
            })
            .await
            .map_err(|e| match e.downcast::<AdapterError>() {
                Ok(adapter_error) => adapter_error,
                Err(other) => AdapterError::unavailable(operation, other.to_string()),
            })
    }

    async fn unit_state(&self, operation: &str, name: &ServiceName) -> std::result::Result<UnitState, AdapterError> {
        let state = match self.unit_properties_with_retry(operation, name).await? {
            Some(props) => unit_state_from(&props),
            None => UnitState {
                load_state: "not-found".to_string(),
                ..UnitState::default()
            },
        };
        tracing::debug!("{} state for {}: {:?}", operation, name, state);
        Ok(state)
    }
}

#[async_trait]
impl ControlPlane for SystemdClient {
    async fn query_status(&self, name: &ServiceName) -> std::result::Result<HealthStatus, AdapterError> {
        Ok(self.unit_state("query_status", name).await?.health())
    }

    async fn restart(&self, name: &ServiceName) -> std::result::Result<bool, AdapterError> {
        let proxy = self.manager_proxy("restart").await?;

        // Mutating call: no transparent retry, the recovery loop owns retries
        let job: std::result::Result<OwnedObjectPath, zbus::Error> =
            proxy.call("RestartUnit", &(name.as_str(), "replace")).await;

        match job {
            Ok(job_path) => {
                tracing::debug!("Restart job for {} queued at {}", name, job_path.as_str());
                Ok(true)
            }
            Err(e) if is_rejection(&e) => {
                tracing::warn!("Systemd rejected restart of {}: {}", name, e);
                Ok(false)
            }
            Err(e) => Err(AdapterError::unavailable("restart", e.to_string())),
        }
    }

    async fn list_relationships(&self, name: &ServiceName) -> std::result::Result<Relationships, AdapterError> {
        let props = self.unit_properties_with_retry("list_relationships", name).await?;
        Ok(props.map(|p| relationships_from(&p)).unwrap_or_default())
    }

    async fn unit_exists(&self, name: &ServiceName) -> std::result::Result<bool, AdapterError> {
        let state = self.unit_state("unit_exists", name).await?;
        Ok(state.health() != HealthStatus::NotFound)
    }

    async fn diagnose(&self, name: &ServiceName) -> std::result::Result<String, AdapterError> {
        let state = self.unit_state("diagnose", name).await?;
        let mut detail = state.summary();

        match self.journal.recent(name, self.diagnostic_lines).await {
            Ok(lines) => {
                for line in lines {
                    detail.push('\n');
                    detail.push_str(&line.message);
                }
            }
            Err(e) => tracing::debug!("No journal lines for {}: {}", name, e),
        }

        Ok(detail)
    }
}

fn is_no_such_unit(error: &zbus::Error) -> bool {
    matches!(error, zbus::Error::MethodError(name, _, _) if name.as_str() == NO_SUCH_UNIT)
}

/// Refusals by systemd itself (masked unit, unknown unit, denied by polkit)
/// as opposed to the bus or the manager not answering
fn is_rejection(error: &zbus::Error) -> bool {
    match error {
        zbus::Error::MethodError(name, _, _) => is_refusal_name(name.as_str()),
        zbus::Error::FDO(fdo) => matches!(
            **fdo,
            zbus::fdo::Error::AccessDenied(_)
                | zbus::fdo::Error::InteractiveAuthorizationRequired(_)
                | zbus::fdo::Error::InvalidArgs(_)
        ),
        _ => false,
    }
}

fn is_refusal_name(error_name: &str) -> bool {
    error_name.starts_with(SYSTEMD_ERROR_PREFIX) || REFUSAL_ERRORS.contains(&error_name)
}

fn prop_string(props: &UnitProperties, key: &str) -> String {
    props
        .get(key)
        .and_then(|v| v.downcast_ref::<String>().ok())
        .unwrap_or_default()
}

fn unit_state_from(props: &UnitProperties) -> UnitState {
    UnitState {
        load_state: prop_string(props, "LoadState"),
        active_state: prop_string(props, "ActiveState"),
        sub_state: prop_string(props, "SubState"),
        result: prop_string(props, "Result"),
        n_restarts: props
            .get("NRestarts")
            .and_then(|v| v.downcast_ref::<u32>().ok())
            .unwrap_or(0),
    }
}

fn relationships_from(props: &UnitProperties) -> Relationships {
    Relationships {
        requires: unit_names(extract_string_array(props, "Requires")),
        required_by: unit_names(extract_string_array(props, "RequiredBy")),
        wants: unit_names(extract_string_array(props, "Wants")),
    }
}

fn unit_names(raw: Vec<String>) -> Vec<ServiceName> {
    raw.iter()
        .filter_map(|unit| match ServiceName::parse(unit) {
            Ok(name) => Some(name),
            Err(reason) => {
                tracing::debug!("Skipping related unit {:?}: {}", unit, reason);
                None
            }
        })
        .collect()
}

/// Helper to extract string arrays from D-Bus properties
fn extract_string_array(props: &UnitProperties, key: &str) -> Vec<String> {
    props
        .get(key)
        .and_then(|v| v.downcast_ref::<zbus::zvariant::Array>().ok())
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.downcast_ref::<String>().ok())
                .collect()
        })
        .unwrap_or_default()
}
