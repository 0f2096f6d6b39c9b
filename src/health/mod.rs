//! Resource health aggregation.
//!
//! Combines a resource's lifecycle state with its health check reports into
//! one status. Health only means something while a resource is running.

use std::fmt;

/// Health status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthStatus {
    /// Everything is working
    Healthy,
    /// Minor issues but still operational
    Degraded,
    /// Not operational, or not yet known to be operational
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Degraded => "Degraded",
            Self::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    NotStarted,
    Waiting,
    Starting,
    Running,
    Stopping,
    Exited,
    Finished,
    FailedToStart,
    RuntimeUnhealthy,
    Unknown,
}

impl ResourceState {
    /// Returns true for states in which health checks are meaningful
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Result of one health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub name: String,
    /// `None` until the check has been evaluated once
    pub status: Option<HealthStatus>,
    pub description: Option<String>,
}

impl HealthReport {
    pub fn new<N: Into<String>>(name: N, status: Option<HealthStatus>) -> Self {
        Self {
            name: name.into(),
            status,
            description: None,
        }
    }
}

/// Aggregates health check reports for a resource.
///
/// Returns `None` unless the resource is running. A running resource with
/// no checks is healthy; otherwise the worst report wins, and a check that
/// has not completed counts as unhealthy.
pub fn compute_health_status(
    reports: &[HealthReport],
    state: ResourceState,
) -> Option<HealthStatus> {
    if !state.is_running() {
        return None;
    }

    Some(
        reports
            .iter()
            .map(|report| report.status.unwrap_or(HealthStatus::Unhealthy))
            .max()
            .unwrap_or(HealthStatus::Healthy),
    )
}
