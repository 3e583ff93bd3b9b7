// Declared dependency relationships of monitored services

use crate::systemd::{bounded, ControlPlane, Relationships, ServiceList, ServiceName};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Requires,
    RequiredBy,
    Wants,
}

impl EdgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::Requires => "requires",
            EdgeKind::RequiredBy => "required-by",
            EdgeKind::Wants => "wants",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub source: ServiceName,
    pub target: ServiceName,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPresence {
    Found,
    NotFound,
    Unavailable(String),
}

/// Outgoing edges of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDependencies {
    pub name: ServiceName,
    pub presence: UnitPresence,
    pub edges: Vec<DependencyEdge>,
}

impl ServiceDependencies {
    pub fn targets(&self, kind: EdgeKind) -> Vec<&ServiceName> {
        self.edges
            .iter()
            .filter(|edge| edge.kind == kind)
            .map(|edge| &edge.target)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub services: Vec<ServiceDependencies>,
}

impl DependencyReport {
    pub fn get(&self, name: &ServiceName) -> Option<&ServiceDependencies> {
        self.services.iter().find(|s| &s.name == name)
    }

    pub fn unavailable_count(&self) -> usize {
        self.services
            .iter()
            .filter(|s| matches!(s.presence, UnitPresence::Unavailable(_)))
            .count()
    }

    pub fn control_plane_down(&self) -> bool {
        !self.services.is_empty() && self.unavailable_count() == self.services.len()
    }
}

/// Turn a relationship listing into a duplicate-free edge set
pub fn edges_from(source: &ServiceName, relationships: &Relationships) -> Vec<DependencyEdge> {
    let groups = [
        (EdgeKind::Requires, &relationships.requires),
        (EdgeKind::RequiredBy, &relationships.required_by),
        (EdgeKind::Wants, &relationships.wants),
    ];

    let mut edges: Vec<DependencyEdge> = Vec::new();
    for (kind, targets) in groups {
        for target in targets {
            let edge = DependencyEdge {
                source: source.clone(),
                target: target.clone(),
                kind,
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
    }
    edges
}

/// Reports raw declared relationships; no ordering or cycle analysis
pub struct DependencyAnalyzer {
    control: Arc<dyn ControlPlane>,
    call_timeout: Duration,
}

impl DependencyAnalyzer {
    pub fn new(control: Arc<dyn ControlPlane>, call_timeout: Duration) -> Self {
        Self { control, call_timeout }
    }

    pub async fn analyze(&self, services: &ServiceList) -> DependencyReport {
        let services = futures::future::join_all(services.iter().map(|name| self.analyze_one(name))).await;
        DependencyReport { services }
    }

    async fn analyze_one(&self, name: &ServiceName) -> ServiceDependencies {
        let unavailable = |reason: String| {
            tracing::error!("Could not read dependencies of {}: {}", name, reason);
            ServiceDependencies {
                name: name.clone(),
                presence: UnitPresence::Unavailable(reason),
                edges: Vec::new(),
            }
        };

        match bounded("unit_exists", self.call_timeout, self.control.unit_exists(name)).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("{} not found, skipping dependency lookup", name);
                return ServiceDependencies {
                    name: name.clone(),
                    presence: UnitPresence::NotFound,
                    edges: Vec::new(),
                };
            }
            Err(e) => return unavailable(e.to_string()),
        }

        match bounded("list_relationships", self.call_timeout, self.control.list_relationships(name)).await {
            Ok(relationships) => {
                let edges = edges_from(name, &relationships);
                tracing::debug!("{} has {} dependency edge(s)", name, edges.len());
                ServiceDependencies {
                    name: name.clone(),
                    presence: UnitPresence::Found,
                    edges,
                }
            }
            Err(e) => unavailable(e.to_string()),
        }
    }
}
