//! Ingestion of OTLP batches.
//!
//! Batches are processed best-effort: every invalid item is counted on the
//! [`AddContext`] and skipped, and valid items in the same batch are still
//! stored.

use crate::core::error::{RepositoryError, Result};
use crate::core::otel_compliance::{
    convert_any_value, convert_attributes, convert_span_kind, convert_span_status,
    optional_span_id, optional_trace_id, system_time_to_nanos, AttributeLimits,
};
use crate::core::types::{AttributeValue, KeyValue, Span, SpanEvent, SpanId, SpanLink, TraceId};
use crate::logs::LogEntry;
use crate::metrics::{
    AggregationTemporality, HistogramValue, InstrumentKind, InstrumentSummary, MetricPoint,
    PointValue,
};
use crate::repository::events::RepositoryEvent;
use crate::repository::TelemetryRepository;
use crate::resource::{derive_key, InstrumentationScope, Resource, ResourceKey};
use crate::storage::BackLink;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsPartialSuccess;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsPartialSuccess;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTracePartialSuccess;
use opentelemetry_proto::tonic::common::v1::{
    InstrumentationScope as ProtoScope, KeyValue as ProtoKeyValue,
};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, HistogramDataPoint, Metric, NumberDataPoint, ResourceMetrics,
};
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, Span as ProtoSpan};
use std::sync::Arc;
use std::time::SystemTime;

/// Accepted/rejected counters for one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddContext {
    pub success_count: u64,
    pub failure_count: u64,
    /// Message of the most recent rejection
    pub last_error: Option<String>,
}

impl AddContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, count: usize) {
        self.success_count += count as u64;
    }

    pub fn record_failure(&mut self, error: &RepositoryError) {
        self.record_failures(1, error);
    }

    pub fn record_failures(&mut self, count: usize, error: &RepositoryError) {
        if count == 0 {
            return;
        }
        tracing::debug!(count, category = error.category(), "Rejected telemetry: {}", error);
        self.failure_count += count as u64;
        self.last_error = Some(error.to_string());
    }

    /// Adds another context's counters to this one
    pub fn merge(&mut self, other: &AddContext) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        if other.last_error.is_some() {
            self.last_error.clone_from(&other.last_error);
        }
    }

    fn rejected(&self) -> i64 {
        i64::try_from(self.failure_count).unwrap_or(i64::MAX)
    }

    fn error_message(&self) -> String {
        self.last_error.clone().unwrap_or_default()
    }

    /// Partial success response for a trace export, if anything was rejected
    pub fn trace_partial_success(&self) -> Option<ExportTracePartialSuccess> {
        (self.failure_count > 0).then(|| ExportTracePartialSuccess {
            rejected_spans: self.rejected(),
            error_message: self.error_message(),
        })
    }

    /// Partial success response for a logs export, if anything was rejected
    pub fn logs_partial_success(&self) -> Option<ExportLogsPartialSuccess> {
        (self.failure_count > 0).then(|| ExportLogsPartialSuccess {
            rejected_log_records: self.rejected(),
            error_message: self.error_message(),
        })
    }

    /// Partial success response for a metrics export, if anything was rejected
    pub fn metrics_partial_success(&self) -> Option<ExportMetricsPartialSuccess> {
        (self.failure_count > 0).then(|| ExportMetricsPartialSuccess {
            rejected_data_points: self.rejected(),
            error_message: self.error_message(),
        })
    }
}

fn resource_attributes(resource: Option<&ProtoResource>) -> &[ProtoKeyValue] {
    resource.map(|r| r.attributes.as_slice()).unwrap_or(&[])
}

impl TelemetryRepository {
    /// Resolves the resource for a sub-batch, creating it on first sight
    fn resolve_resource(
        &self,
        attributes: &[ProtoKeyValue],
        created_any: &mut bool,
    ) -> Result<Arc<Resource>> {
        let key = derive_key(attributes)?;
        let (resource, created) = self.resources.get_or_create(key, attributes, &self.limits);
        if created {
            tracing::info!(resource = %resource.key(), "New resource");
            *created_any = true;
        }
        Ok(resource)
    }

    fn register_scope(
        &self,
        resource: &Resource,
        scope: Option<&ProtoScope>,
    ) -> Arc<InstrumentationScope> {
        resource.get_or_add_scope(InstrumentationScope::from_proto(scope, &self.limits))
    }

    /// Ingests OTLP trace data.
    pub fn add_traces(&self, ctx: &mut AddContext, resource_spans: &[ResourceSpans]) {
        let mut created_any = false;
        let mut spans = Vec::new();

        for rs in resource_spans {
            let attributes = resource_attributes(rs.resource.as_ref());
            let resource = match self.resolve_resource(attributes, &mut created_any) {
                Ok(resource) => resource,
                Err(e) => {
                    let count = rs.scope_spans.iter().map(|ss| ss.spans.len()).sum();
                    ctx.record_failures(count, &e);
                    continue;
                },
            };

            for ss in &rs.scope_spans {
                let scope = self.register_scope(&resource, ss.scope.as_ref());
                for proto in &ss.spans {
                    let max_events = self.config.storage.max_span_events;
                    match convert_span(proto, &resource, &scope, &self.limits, max_events) {
                        Ok(span) => spans.push(span),
                        Err(e) => ctx.record_failure(&e),
                    }
                }
            }
        }

        let write = self.traces.add_spans(spans);
        for (trace_id, span_id) in &write.duplicates {
            ctx.record_failure(&RepositoryError::invalid_span(format!(
                "duplicate span {} in trace {}",
                span_id, trace_id
            )));
        }
        ctx.record_success(write.stored.len());

        if created_any {
            self.publish(RepositoryEvent::ResourcesChanged);
        }
        if !write.stored.is_empty() {
            let mut keys: Vec<ResourceKey> = Vec::new();
            for span in &write.stored {
                if !keys.contains(span.resource_key()) {
                    keys.push(span.resource_key().clone());
                }
            }
            self.publish(RepositoryEvent::Traces(keys));
        }
    }

    /// Ingests OTLP log data.
    pub fn add_logs(&self, ctx: &mut AddContext, resource_logs: &[ResourceLogs]) {
        let mut created_any = false;
        let mut touched = Vec::new();

        for rl in resource_logs {
            let attributes = resource_attributes(rl.resource.as_ref());
            let resource = match self.resolve_resource(attributes, &mut created_any) {
                Ok(resource) => resource,
                Err(e) => {
                    let count = rl.scope_logs.iter().map(|sl| sl.log_records.len()).sum();
                    ctx.record_failures(count, &e);
                    continue;
                },
            };

            let mut entries = Vec::new();
            for sl in &rl.scope_logs {
                let scope = self.register_scope(&resource, sl.scope.as_ref());
                for record in &sl.log_records {
                    match convert_log(record, &resource, &scope, &self.limits) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => ctx.record_failure(&e),
                    }
                }
            }

            let write = self.logs.add_logs(resource.key(), entries);
            let backlinks = self.traces.backlinks();
            for entry in &write.stored {
                if let (Some(trace_id), Some(span_id)) = (entry.trace_id, entry.span_id) {
                    backlinks.add(trace_id, span_id, BackLink::Log { log_id: entry.id });
                }
            }
            for &log_id in &write.evicted {
                backlinks.remove_log(log_id);
            }
            ctx.record_success(write.stored.len());
            if !write.stored.is_empty() {
                touched.push(resource.key().clone());
            }
        }

        if created_any {
            self.publish(RepositoryEvent::ResourcesChanged);
        }
        for key in touched {
            self.publish(RepositoryEvent::Logs(key));
        }
    }

    /// Ingests OTLP metric data. Each OTLP metric counts as one item.
    pub fn add_metrics(&self, ctx: &mut AddContext, resource_metrics: &[ResourceMetrics]) {
        let mut created_any = false;
        let mut touched = Vec::new();

        for rm in resource_metrics {
            let attributes = resource_attributes(rm.resource.as_ref());
            let resource = match self.resolve_resource(attributes, &mut created_any) {
                Ok(resource) => resource,
                Err(e) => {
                    let count = rm.scope_metrics.iter().map(|sm| sm.metrics.len()).sum();
                    ctx.record_failures(count, &e);
                    continue;
                },
            };

            let mut stored_any = false;
            for sm in &rm.scope_metrics {
                let scope = self.register_scope(&resource, sm.scope.as_ref());
                for metric in &sm.metrics {
                    match convert_metric(metric, &scope, &self.limits) {
                        Ok((summary, points)) => {
                            self.metrics.add_points(resource.key(), summary, points);
                            ctx.record_success(1);
                            stored_any = true;
                        },
                        Err(e) => ctx.record_failure(&e),
                    }
                }
            }
            if stored_any {
                touched.push(resource.key().clone());
            }
        }

        if created_any {
            self.publish(RepositoryEvent::ResourcesChanged);
        }
        for key in touched {
            self.publish(RepositoryEvent::Metrics(key));
        }
    }
}

/// Validates and converts one OTLP span
fn convert_span(
    proto: &ProtoSpan,
    resource: &Arc<Resource>,
    scope: &Arc<InstrumentationScope>,
    limits: &AttributeLimits,
    max_events: usize,
) -> Result<Span> {
    let trace_id = TraceId::from_bytes(&proto.trace_id)?;
    let span_id = SpanId::from_bytes(&proto.span_id)?;
    let parent_span_id = optional_span_id(&proto.parent_span_id)?;

    if proto.start_time_unix_nano == 0 {
        return Err(RepositoryError::invalid_span(format!(
            "span {} has no start time",
            span_id
        )));
    }
    if proto.end_time_unix_nano < proto.start_time_unix_nano {
        return Err(RepositoryError::invalid_span(format!(
            "span {} ends before it starts",
            span_id
        )));
    }

    let (status, status_message) = convert_span_status(proto.status.as_ref());

    let events = proto
        .events
        .iter()
        .take(max_events)
        .map(|event| SpanEvent {
            name: event.name.clone(),
            time_unix_nano: event.time_unix_nano,
            attributes: convert_attributes(&event.attributes, limits),
        })
        .collect();

    let links = proto
        .links
        .iter()
        .filter_map(|link| {
            let linked = TraceId::from_bytes(&link.trace_id)
                .and_then(|trace_id| Ok((trace_id, SpanId::from_bytes(&link.span_id)?)));
            match linked {
                Ok((trace_id, span_id)) => Some(SpanLink {
                    trace_id,
                    span_id,
                    trace_state: (!link.trace_state.is_empty()).then(|| link.trace_state.clone()),
                    attributes: convert_attributes(&link.attributes, limits),
                }),
                Err(e) => {
                    tracing::debug!("Dropping span link: {}", e);
                    None
                },
            }
        })
        .collect();

    Ok(Span {
        trace_id,
        span_id,
        parent_span_id,
        resource: Arc::clone(resource),
        scope: Arc::clone(scope),
        name: proto.name.clone(),
        kind: convert_span_kind(proto.kind),
        start_time_unix_nano: proto.start_time_unix_nano,
        end_time_unix_nano: proto.end_time_unix_nano,
        status,
        status_message,
        trace_state: (!proto.trace_state.is_empty()).then(|| proto.trace_state.clone()),
        attributes: convert_attributes(&proto.attributes, limits),
        events,
        links,
    })
}

/// Validates and converts one OTLP log record
fn convert_log(
    record: &LogRecord,
    resource: &Arc<Resource>,
    scope: &Arc<InstrumentationScope>,
    limits: &AttributeLimits,
) -> Result<LogEntry> {
    let body = record
        .body
        .as_ref()
        .map(|body| convert_any_value(body, limits))
        .filter(|body| !matches!(body, AttributeValue::String(s) if s.is_empty()))
        .ok_or_else(|| RepositoryError::invalid_log("log record has no body"))?;

    let trace_id = optional_trace_id(&record.trace_id)?;
    let span_id = optional_span_id(&record.span_id)?;

    let time_unix_nano = match (record.time_unix_nano, record.observed_time_unix_nano) {
        (0, 0) => system_time_to_nanos(SystemTime::now()),
        (0, observed) => observed,
        (time, _) => time,
    };
    let observed_time_unix_nano = match record.observed_time_unix_nano {
        0 => time_unix_nano,
        observed => observed,
    };

    Ok(LogEntry {
        id: 0,
        resource: Arc::clone(resource),
        scope: Arc::clone(scope),
        time_unix_nano,
        observed_time_unix_nano,
        severity_number: record.severity_number,
        body,
        attributes: convert_attributes(&record.attributes, limits),
        trace_id,
        span_id,
        flags: record.flags,
    })
}

type Points = Vec<(Vec<KeyValue>, MetricPoint)>;

/// Validates and converts one OTLP metric into an instrument and its points
fn convert_metric(
    metric: &Metric,
    scope: &Arc<InstrumentationScope>,
    limits: &AttributeLimits,
) -> Result<(InstrumentSummary, Points)> {
    if metric.name.is_empty() {
        return Err(RepositoryError::invalid_metric("metric has no name"));
    }

    let (kind, points) = match &metric.data {
        Some(Data::Gauge(gauge)) => {
            (InstrumentKind::Gauge, number_points(&gauge.data_points, limits))
        },
        Some(Data::Sum(sum)) => (
            InstrumentKind::Sum {
                is_monotonic: sum.is_monotonic,
                temporality: AggregationTemporality::from_proto(sum.aggregation_temporality),
            },
            number_points(&sum.data_points, limits),
        ),
        Some(Data::Histogram(histogram)) => (
            InstrumentKind::Histogram {
                temporality: AggregationTemporality::from_proto(histogram.aggregation_temporality),
            },
            histogram_points(&histogram.data_points, limits),
        ),
        Some(Data::ExponentialHistogram(_)) | Some(Data::Summary(_)) => {
            return Err(RepositoryError::invalid_metric(format!(
                "metric {} has an unsupported data type",
                metric.name
            )));
        },
        None => {
            return Err(RepositoryError::invalid_metric(format!(
                "metric {} has no data",
                metric.name
            )));
        },
    };

    let summary = InstrumentSummary {
        name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        kind,
        scope: Arc::clone(scope),
    };
    Ok((summary, points))
}

fn number_points(
    data_points: &[NumberDataPoint],
    limits: &AttributeLimits,
) -> Points {
    data_points
        .iter()
        .filter_map(|point| {
            let value = match point.value.as_ref() {
                Some(number_data_point::Value::AsDouble(d)) => PointValue::Double(*d),
                Some(number_data_point::Value::AsInt(i)) => PointValue::Long(*i),
                None => {
                    tracing::debug!(time = point.time_unix_nano, "Dropping point without a value");
                    return None;
                },
            };
            Some((
                convert_attributes(&point.attributes, limits),
                MetricPoint {
                    start_time_unix_nano: point.start_time_unix_nano,
                    time_unix_nano: point.time_unix_nano,
                    value,
                },
            ))
        })
        .collect()
}

fn histogram_points(
    data_points: &[HistogramDataPoint],
    limits: &AttributeLimits,
) -> Points {
    data_points
        .iter()
        .map(|point| {
            (
                convert_attributes(&point.attributes, limits),
                MetricPoint {
                    start_time_unix_nano: point.start_time_unix_nano,
                    time_unix_nano: point.time_unix_nano,
                    value: PointValue::Histogram(HistogramValue {
                        count: point.count,
                        sum: point.sum,
                        bucket_counts: point.bucket_counts.clone(),
                        explicit_bounds: point.explicit_bounds.clone(),
                        min: point.min,
                        max: point.max,
                    }),
                },
            )
        })
        .collect()
}
