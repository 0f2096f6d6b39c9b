//! Common test utilities and fixtures.
#![allow(dead_code)]

use opentelemetry_proto::tonic::common::v1::{
    any_value::Value, AnyValue, InstrumentationScope, KeyValue,
};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, Gauge, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{status, ResourceSpans, ScopeSpans, Span, Status};
use telemetry_repository::{Config, TelemetryRepository};

pub const SCOPE: &str = "test-scope";

pub fn string_attr(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

pub fn resource(name: &str, instance: Option<&str>) -> Resource {
    let mut attributes = vec![string_attr("service.name", name)];
    if let Some(instance) = instance {
        attributes.push(string_attr("service.instance.id", instance));
    }
    Resource {
        attributes,
        ..Default::default()
    }
}

pub fn scope() -> Option<InstrumentationScope> {
    Some(InstrumentationScope {
        name: SCOPE.to_string(),
        version: "1.0.0".to_string(),
        ..Default::default()
    })
}

pub fn trace_id(n: u8) -> Vec<u8> {
    let mut id = vec![0u8; 16];
    id[15] = n;
    id[0] = 0xab;
    id
}

pub fn span_id(n: u8) -> Vec<u8> {
    let mut id = vec![0u8; 8];
    id[7] = n;
    id[0] = 0xcd;
    id
}

/// Test fixture builder for OTLP spans with sensible defaults.
pub struct TestSpanBuilder {
    trace: u8,
    span: u8,
    parent: Option<u8>,
    name: String,
    start: u64,
    duration: u64,
    has_error: bool,
    attributes: Vec<KeyValue>,
}

impl TestSpanBuilder {
    pub fn new(trace: u8, span: u8) -> Self {
        Self {
            trace,
            span,
            parent: None,
            name: format!("operation-{}", span),
            start: 1_000_000_000,
            duration: 1_000_000,
            has_error: false,
            attributes: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: u8) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    pub fn duration(mut self, duration: u64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_error(mut self) -> Self {
        self.has_error = true;
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push(string_attr(key, value));
        self
    }

    pub fn build(self) -> Span {
        Span {
            trace_id: trace_id(self.trace),
            span_id: span_id(self.span),
            parent_span_id: self.parent.map(span_id).unwrap_or_default(),
            name: self.name,
            kind: 2,
            start_time_unix_nano: self.start,
            end_time_unix_nano: self.start + self.duration,
            attributes: self.attributes,
            status: Some(Status {
                message: String::new(),
                code: if self.has_error {
                    status::StatusCode::Error as i32
                } else {
                    status::StatusCode::Ok as i32
                },
            }),
            ..Default::default()
        }
    }
}

pub fn resource_spans(name: &str, instance: Option<&str>, spans: Vec<Span>) -> ResourceSpans {
    ResourceSpans {
        resource: Some(resource(name, instance)),
        scope_spans: vec![ScopeSpans {
            scope: scope(),
            spans,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn log_record(time: u64, severity: i32, body: &str) -> LogRecord {
    LogRecord {
        time_unix_nano: time,
        observed_time_unix_nano: time,
        severity_number: severity,
        body: Some(AnyValue {
            value: Some(Value::StringValue(body.to_string())),
        }),
        ..Default::default()
    }
}

pub fn resource_logs(name: &str, instance: Option<&str>, records: Vec<LogRecord>) -> ResourceLogs {
    ResourceLogs {
        resource: Some(resource(name, instance)),
        scope_logs: vec![ScopeLogs {
            scope: scope(),
            log_records: records,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn gauge(name: &str, points: &[(u64, f64)]) -> Metric {
    Metric {
        name: name.to_string(),
        unit: "ms".to_string(),
        data: Some(Data::Gauge(Gauge {
            data_points: points
                .iter()
                .map(|(time, value)| NumberDataPoint {
                    time_unix_nano: *time,
                    value: Some(number_data_point::Value::AsDouble(*value)),
                    ..Default::default()
                })
                .collect(),
        })),
        ..Default::default()
    }
}

pub fn resource_metrics(
    name: &str,
    instance: Option<&str>,
    metrics: Vec<Metric>,
) -> ResourceMetrics {
    ResourceMetrics {
        resource: Some(resource(name, instance)),
        scope_metrics: vec![ScopeMetrics {
            scope: scope(),
            metrics,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn repository() -> TelemetryRepository {
    TelemetryRepository::new(Config::default()).unwrap()
}
