//! The telemetry repository.
//!
//! [`TelemetryRepository`] is the composition root: it is built once from a
//! [`Config`] and passed explicitly to ingestion and query call sites. It
//! owns the resource registry and the three typed stores.

pub mod events;
pub mod ingest;
pub mod query;

pub use events::{RepositoryEvent, Subscription};
pub use ingest::AddContext;
pub use query::SpanBackLink;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::otel_compliance::AttributeLimits;
use crate::logs::LogStorage;
use crate::metrics::MetricStorage;
use crate::resource::ResourceRegistry;
use crate::storage::TraceStorage;
use tokio::sync::broadcast;

/// Item counts across the repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub resources: usize,
    pub traces: usize,
    pub spans: usize,
    pub logs: usize,
    pub metric_points: usize,
}

#[derive(Debug)]
pub struct TelemetryRepository {
    config: Config,
    limits: AttributeLimits,
    resources: ResourceRegistry,
    traces: TraceStorage,
    logs: LogStorage,
    metrics: MetricStorage,
    events: broadcast::Sender<RepositoryEvent>,
}

impl TelemetryRepository {
    /// Creates an empty repository after validating `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = &config.storage;
        let (events, _) = broadcast::channel(storage.event_channel_capacity);
        tracing::debug!(
            max_traces = storage.max_traces,
            max_logs_per_resource = storage.max_logs_per_resource,
            max_metric_points = storage.max_metric_points,
            "Creating telemetry repository"
        );

        Ok(Self {
            limits: AttributeLimits::from_config(storage),
            resources: ResourceRegistry::new(),
            traces: TraceStorage::new(storage.max_traces),
            logs: LogStorage::new(storage.max_logs_per_resource),
            metrics: MetricStorage::new(storage.max_metric_points),
            events,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribes to change notifications
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    fn publish(&self, event: RepositoryEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn stats(&self) -> RepositoryStats {
        RepositoryStats {
            resources: self.resources.len(),
            traces: self.traces.len(),
            spans: self.traces.span_count(),
            logs: self.logs.len(),
            metric_points: self.metrics.point_count(),
        }
    }

    /// Removes all telemetry and every resource
    pub fn clear(&self) {
        self.traces.clear();
        self.logs.clear();
        self.metrics.clear();
        self.resources.clear();
        tracing::info!("Repository cleared");
        self.publish(events::RepositoryEvent::ResourcesChanged);
    }
}
