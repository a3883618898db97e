//! Per-dependency health reporting.
//!
//! Probes never fail the caller: each dependency records whether it answered and, when it did
//! not, the error text observed.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Outcome of probing a single dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyHealth {
    /// Whether the dependency answered the probe successfully.
    pub healthy: bool,
    /// Diagnostic captured when the probe failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyHealth {
    /// Healthy dependency.
    pub fn up() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    /// Unhealthy dependency with the observed error.
    pub fn down(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }

    /// Convert a probe result, logging failures.
    pub fn from_probe<E: Display>(name: &str, probe: Result<(), E>) -> Self {
        match probe {
            Ok(()) => Self::up(),
            Err(error) => {
                tracing::warn!(dependency = name, error = %error, "Health probe failed");
                Self::down(error.to_string())
            }
        }
    }
}

/// Health of every dependency a service relies on, keyed by dependency name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Individual dependency outcomes.
    pub dependencies: BTreeMap<String, DependencyHealth>,
}

impl HealthReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for one dependency.
    pub fn insert(&mut self, name: impl Into<String>, health: DependencyHealth) {
        self.dependencies.insert(name.into(), health);
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: HealthReport) {
        self.dependencies.extend(other.dependencies);
    }

    /// True when every recorded dependency is healthy.
    pub fn is_healthy(&self) -> bool {
        self.dependencies.values().all(|health| health.healthy)
    }

    /// Dependency name to healthy flag.
    pub fn statuses(&self) -> BTreeMap<String, bool> {
        self.dependencies
            .iter()
            .map(|(name, health)| (name.clone(), health.healthy))
            .collect()
    }

    /// Dependency name to error text for failing dependencies.
    pub fn errors(&self) -> BTreeMap<String, String> {
        self.dependencies
            .iter()
            .filter_map(|(name, health)| {
                health
                    .error
                    .as_ref()
                    .map(|error| (name.clone(), error.clone()))
            })
            .collect()
    }
}
