//! OTLP-flavored JSON document model.
//!
//! Field names follow the OTLP JSON mapping (`resourceLogs`, `scopeSpans`,
//! `timeUnixNano`, ...). Ids are lowercase hex and timestamps are integer
//! Unix nanoseconds. Severity is written both as the exact OTLP number and as
//! a readable label; only the number is read back.

use crate::core::error::RepositoryError;
use crate::core::types::{AttributeValue, KeyValue, Span};
use crate::logs::{LogEntry, LogSeverity};
use crate::metrics::{InstrumentData, InstrumentKind, MetricPoint, PointValue};
use crate::repository::AddContext;
use crate::resource::{InstrumentationScope, Resource};
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, InstrumentationScope as ProtoScope,
    KeyValue as ProtoKeyValue, KeyValueList,
};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, Gauge, Histogram, HistogramDataPoint, Metric,
    NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum,
};
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;
use opentelemetry_proto::tonic::trace::v1::{
    span::{Event, Link},
    ResourceSpans, ScopeSpans, Span as ProtoSpan, Status,
};
use serde::{Deserialize, Serialize};

/// One exported document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_logs: Vec<ResourceLogsJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_spans: Vec<ResourceSpansJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_metrics: Vec<ResourceMetricsJson>,
}

impl TelemetryDocument {
    pub fn is_empty(&self) -> bool {
        self.resource_logs.is_empty()
            && self.resource_spans.is_empty()
            && self.resource_metrics.is_empty()
    }
}

/// Typed attribute value, tagged by its OTLP JSON field name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnyValueJson {
    StringValue(String),
    IntValue(i64),
    DoubleValue(#[serde(with = "float")] f64),
    BoolValue(bool),
    /// Hex-encoded
    BytesValue(String),
    ArrayValue { values: Vec<AnyValueJson> },
    KvlistValue { values: Vec<KeyValueJson> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueJson {
    pub key: String,
    pub value: AnyValueJson,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceJson {
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeJson {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<KeyValueJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLogsJson {
    #[serde(default)]
    pub resource: ResourceJson,
    #[serde(default)]
    pub scope_logs: Vec<ScopeLogsJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeLogsJson {
    #[serde(default)]
    pub scope: ScopeJson,
    #[serde(default)]
    pub log_records: Vec<LogRecordJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecordJson {
    #[serde(default)]
    pub time_unix_nano: u64,
    #[serde(default)]
    pub observed_time_unix_nano: u64,
    #[serde(default)]
    pub severity_number: i32,
    #[serde(default)]
    pub severity_text: String,
    #[serde(default)]
    pub body: Option<AnyValueJson>,
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub span_id: String,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpansJson {
    #[serde(default)]
    pub resource: ResourceJson,
    #[serde(default)]
    pub scope_spans: Vec<ScopeSpansJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpansJson {
    #[serde(default)]
    pub scope: ScopeJson,
    #[serde(default)]
    pub spans: Vec<SpanJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanJson {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_span_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace_state: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: i32,
    #[serde(default)]
    pub start_time_unix_nano: u64,
    #[serde(default)]
    pub end_time_unix_nano: u64,
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEventJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SpanLinkJson>,
    #[serde(default)]
    pub status: StatusJson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEventJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub time_unix_nano: u64,
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanLinkJson {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace_state: String,
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusJson {
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetricsJson {
    #[serde(default)]
    pub resource: ResourceJson,
    #[serde(default)]
    pub scope_metrics: Vec<ScopeMetricsJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMetricsJson {
    #[serde(default)]
    pub scope: ScopeJson,
    #[serde(default)]
    pub metrics: Vec<MetricJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricJson {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gauge: Option<GaugeJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<SumJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeJson {
    #[serde(default)]
    pub data_points: Vec<NumberPointJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SumJson {
    #[serde(default)]
    pub aggregation_temporality: i32,
    #[serde(default)]
    pub is_monotonic: bool,
    #[serde(default)]
    pub data_points: Vec<NumberPointJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramJson {
    #[serde(default)]
    pub aggregation_temporality: i32,
    #[serde(default)]
    pub data_points: Vec<HistogramPointJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberPointJson {
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
    #[serde(default)]
    pub start_time_unix_nano: u64,
    #[serde(default)]
    pub time_unix_nano: u64,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "float::option")]
    pub as_double: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_int: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramPointJson {
    #[serde(default)]
    pub attributes: Vec<KeyValueJson>,
    #[serde(default)]
    pub start_time_unix_nano: u64,
    #[serde(default)]
    pub time_unix_nano: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "float::option")]
    pub sum: Option<f64>,
    #[serde(default)]
    pub bucket_counts: Vec<u64>,
    #[serde(default)]
    pub explicit_bounds: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "float::option")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "float::option")]
    pub max: Option<f64>,
}

/// Doubles as JSON numbers. JSON has no NaN or infinities, so those are
/// written as the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
mod float {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    impl Repr {
        fn into_f64<E: Error>(self) -> Result<f64, E> {
            match self {
                Repr::Number(value) => Ok(value),
                Repr::Text(text) => match text.as_str() {
                    "NaN" => Ok(f64::NAN),
                    "Infinity" => Ok(f64::INFINITY),
                    "-Infinity" => Ok(f64::NEG_INFINITY),
                    other => other
                        .parse()
                        .map_err(|_| E::custom(format!("invalid double: {:?}", other))),
                },
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Repr::deserialize(deserializer)?.into_f64()
    }

    pub mod option {
        use super::Repr;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<f64>, D::Error> {
            Option::<Repr>::deserialize(deserializer)?.map(Repr::into_f64).transpose()
        }
    }
}

// Model -> document

pub(crate) fn value_to_json(value: &AttributeValue) -> AnyValueJson {
    match value {
        AttributeValue::String(s) => AnyValueJson::StringValue(s.clone()),
        AttributeValue::Int(i) => AnyValueJson::IntValue(*i),
        AttributeValue::Double(d) => AnyValueJson::DoubleValue(*d),
        AttributeValue::Bool(b) => AnyValueJson::BoolValue(*b),
        AttributeValue::Bytes(bytes) => AnyValueJson::BytesValue(hex::encode(bytes)),
        AttributeValue::Array(values) => AnyValueJson::ArrayValue {
            values: values.iter().map(value_to_json).collect(),
        },
        AttributeValue::KvList(pairs) => AnyValueJson::KvlistValue {
            values: attributes_to_json(pairs),
        },
    }
}

pub(crate) fn attributes_to_json(attributes: &[KeyValue]) -> Vec<KeyValueJson> {
    attributes
        .iter()
        .map(|kv| KeyValueJson {
            key: kv.key.clone(),
            value: value_to_json(&kv.value),
        })
        .collect()
}

pub(crate) fn resource_to_json(resource: &Resource) -> ResourceJson {
    ResourceJson {
        attributes: attributes_to_json(resource.attributes()),
    }
}

pub(crate) fn scope_to_json(scope: &InstrumentationScope) -> ScopeJson {
    ScopeJson {
        name: scope.name.clone(),
        version: scope.version.clone(),
        attributes: attributes_to_json(&scope.attributes),
    }
}

pub(crate) fn log_to_json(entry: &LogEntry) -> LogRecordJson {
    LogRecordJson {
        time_unix_nano: entry.time_unix_nano,
        observed_time_unix_nano: entry.observed_time_unix_nano,
        severity_number: entry.severity_number,
        severity_text: LogSeverity::from_otlp(entry.severity_number).as_str().to_string(),
        body: Some(value_to_json(&entry.body)),
        attributes: attributes_to_json(&entry.attributes),
        trace_id: entry.trace_id.map(|id| id.to_hex()).unwrap_or_default(),
        span_id: entry.span_id.map(|id| id.to_hex()).unwrap_or_default(),
        flags: entry.flags,
    }
}

pub(crate) fn span_to_json(span: &Span) -> SpanJson {
    SpanJson {
        trace_id: span.trace_id.to_hex(),
        span_id: span.span_id.to_hex(),
        parent_span_id: span.parent_span_id.map(|id| id.to_hex()).unwrap_or_default(),
        trace_state: span.trace_state.clone().unwrap_or_default(),
        name: span.name.clone(),
        kind: span.kind.as_proto(),
        start_time_unix_nano: span.start_time_unix_nano,
        end_time_unix_nano: span.end_time_unix_nano,
        attributes: attributes_to_json(&span.attributes),
        events: span
            .events
            .iter()
            .map(|event| SpanEventJson {
                name: event.name.clone(),
                time_unix_nano: event.time_unix_nano,
                attributes: attributes_to_json(&event.attributes),
            })
            .collect(),
        links: span
            .links
            .iter()
            .map(|link| SpanLinkJson {
                trace_id: link.trace_id.to_hex(),
                span_id: link.span_id.to_hex(),
                trace_state: link.trace_state.clone().unwrap_or_default(),
                attributes: attributes_to_json(&link.attributes),
            })
            .collect(),
        status: StatusJson {
            code: span.status.as_proto(),
            message: span.status_message.clone().unwrap_or_default(),
        },
    }
}

fn number_point_to_json(attributes: &[KeyValue], point: &MetricPoint) -> Option<NumberPointJson> {
    let (as_double, as_int) = match point.value {
        PointValue::Double(d) => (Some(d), None),
        PointValue::Long(i) => (None, Some(i)),
        PointValue::Histogram(_) => return None,
    };
    Some(NumberPointJson {
        attributes: attributes_to_json(attributes),
        start_time_unix_nano: point.start_time_unix_nano,
        time_unix_nano: point.time_unix_nano,
        as_double,
        as_int,
    })
}

fn histogram_point_to_json(
    attributes: &[KeyValue],
    point: &MetricPoint,
) -> Option<HistogramPointJson> {
    let PointValue::Histogram(histogram) = &point.value else {
        return None;
    };
    Some(HistogramPointJson {
        attributes: attributes_to_json(attributes),
        start_time_unix_nano: point.start_time_unix_nano,
        time_unix_nano: point.time_unix_nano,
        count: histogram.count,
        sum: histogram.sum,
        bucket_counts: histogram.bucket_counts.clone(),
        explicit_bounds: histogram.explicit_bounds.clone(),
        min: histogram.min,
        max: histogram.max,
    })
}

pub(crate) fn instrument_to_json(data: &InstrumentData) -> MetricJson {
    let number_points = || -> Vec<NumberPointJson> {
        data.dimensions
            .iter()
            .flat_map(|d| d.points.iter().filter_map(|p| number_point_to_json(&d.attributes, p)))
            .collect()
    };

    let summary = &data.summary;
    let mut metric = MetricJson {
        name: summary.name.clone(),
        description: summary.description.clone(),
        unit: summary.unit.clone(),
        gauge: None,
        sum: None,
        histogram: None,
    };
    match summary.kind {
        InstrumentKind::Gauge => {
            metric.gauge = Some(GaugeJson {
                data_points: number_points(),
            });
        },
        InstrumentKind::Sum {
            is_monotonic,
            temporality,
        } => {
            metric.sum = Some(SumJson {
                aggregation_temporality: temporality.as_proto(),
                is_monotonic,
                data_points: number_points(),
            });
        },
        InstrumentKind::Histogram { temporality } => {
            metric.histogram = Some(HistogramJson {
                aggregation_temporality: temporality.as_proto(),
                data_points: data
                    .dimensions
                    .iter()
                    .flat_map(|d| {
                        d.points
                            .iter()
                            .filter_map(|p| histogram_point_to_json(&d.attributes, p))
                    })
                    .collect(),
            });
        },
    }
    metric
}

// Document -> OTLP

/// Decodes a hex id, recording a failure on `ctx` when it is malformed.
///
/// Empty strings decode to empty bytes, which ingestion reads as "absent".
fn decode_id(hex_id: &str, kind: &'static str, ctx: &mut AddContext) -> Option<Vec<u8>> {
    match hex::decode(hex_id) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            ctx.record_failure(&RepositoryError::invalid_id(kind, e.to_string()));
            None
        },
    }
}

fn value_to_proto(value: AnyValueJson) -> AnyValue {
    let value = match value {
        AnyValueJson::StringValue(s) => any_value::Value::StringValue(s),
        AnyValueJson::IntValue(i) => any_value::Value::IntValue(i),
        AnyValueJson::DoubleValue(d) => any_value::Value::DoubleValue(d),
        AnyValueJson::BoolValue(b) => any_value::Value::BoolValue(b),
        AnyValueJson::BytesValue(hex_bytes) => match hex::decode(&hex_bytes) {
            Ok(bytes) => any_value::Value::BytesValue(bytes),
            // Keep the text rather than dropping the attribute
            Err(_) => any_value::Value::StringValue(hex_bytes),
        },
        AnyValueJson::ArrayValue { values } => any_value::Value::ArrayValue(ArrayValue {
            values: values.into_iter().map(value_to_proto).collect(),
        }),
        AnyValueJson::KvlistValue { values } => any_value::Value::KvlistValue(KeyValueList {
            values: attributes_to_proto(values),
        }),
    };
    AnyValue { value: Some(value) }
}

fn attributes_to_proto(attributes: Vec<KeyValueJson>) -> Vec<ProtoKeyValue> {
    attributes
        .into_iter()
        .map(|kv| ProtoKeyValue {
            key: kv.key,
            value: Some(value_to_proto(kv.value)),
        })
        .collect()
}

fn resource_to_proto(resource: ResourceJson) -> Option<ProtoResource> {
    Some(ProtoResource {
        attributes: attributes_to_proto(resource.attributes),
        ..Default::default()
    })
}

fn scope_to_proto(scope: ScopeJson) -> Option<ProtoScope> {
    Some(ProtoScope {
        name: scope.name,
        version: scope.version.unwrap_or_default(),
        attributes: attributes_to_proto(scope.attributes),
        ..Default::default()
    })
}

pub(crate) fn logs_to_proto(
    resource_logs: Vec<ResourceLogsJson>,
    ctx: &mut AddContext,
) -> Vec<ResourceLogs> {
    resource_logs
        .into_iter()
        .map(|rl| ResourceLogs {
            resource: resource_to_proto(rl.resource),
            scope_logs: rl
                .scope_logs
                .into_iter()
                .map(|sl| ScopeLogs {
                    scope: scope_to_proto(sl.scope),
                    log_records: sl
                        .log_records
                        .into_iter()
                        .filter_map(|record| log_to_proto(record, ctx))
                        .collect(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
        .collect()
}

fn log_to_proto(record: LogRecordJson, ctx: &mut AddContext) -> Option<LogRecord> {
    let trace_id = decode_id(&record.trace_id, "trace id", ctx)?;
    let span_id = decode_id(&record.span_id, "span id", ctx)?;
    Some(LogRecord {
        time_unix_nano: record.time_unix_nano,
        observed_time_unix_nano: record.observed_time_unix_nano,
        severity_number: record.severity_number,
        severity_text: record.severity_text,
        body: record.body.map(value_to_proto),
        attributes: attributes_to_proto(record.attributes),
        flags: record.flags,
        trace_id,
        span_id,
        ..Default::default()
    })
}

pub(crate) fn spans_to_proto(
    resource_spans: Vec<ResourceSpansJson>,
    ctx: &mut AddContext,
) -> Vec<ResourceSpans> {
    resource_spans
        .into_iter()
        .map(|rs| ResourceSpans {
            resource: resource_to_proto(rs.resource),
            scope_spans: rs
                .scope_spans
                .into_iter()
                .map(|ss| ScopeSpans {
                    scope: scope_to_proto(ss.scope),
                    spans: ss
                        .spans
                        .into_iter()
                        .filter_map(|span| span_to_proto(span, ctx))
                        .collect(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
        .collect()
}

fn span_to_proto(span: SpanJson, ctx: &mut AddContext) -> Option<ProtoSpan> {
    let trace_id = decode_id(&span.trace_id, "trace id", ctx)?;
    let span_id = decode_id(&span.span_id, "span id", ctx)?;
    let parent_span_id = decode_id(&span.parent_span_id, "span id", ctx)?;

    // Malformed links are dropped without failing the span
    let links = span
        .links
        .into_iter()
        .filter_map(|link| {
            Some(Link {
                trace_id: hex::decode(&link.trace_id).ok()?,
                span_id: hex::decode(&link.span_id).ok()?,
                trace_state: link.trace_state,
                attributes: attributes_to_proto(link.attributes),
                ..Default::default()
            })
        })
        .collect();

    let events = span
        .events
        .into_iter()
        .map(|event| Event {
            time_unix_nano: event.time_unix_nano,
            name: event.name,
            attributes: attributes_to_proto(event.attributes),
            ..Default::default()
        })
        .collect();

    Some(ProtoSpan {
        trace_id,
        span_id,
        trace_state: span.trace_state,
        parent_span_id,
        name: span.name,
        kind: span.kind,
        start_time_unix_nano: span.start_time_unix_nano,
        end_time_unix_nano: span.end_time_unix_nano,
        attributes: attributes_to_proto(span.attributes),
        events,
        links,
        status: Some(Status {
            message: span.status.message,
            code: span.status.code,
        }),
        ..Default::default()
    })
}

pub(crate) fn metrics_to_proto(resource_metrics: Vec<ResourceMetricsJson>) -> Vec<ResourceMetrics> {
    resource_metrics
        .into_iter()
        .map(|rm| ResourceMetrics {
            resource: resource_to_proto(rm.resource),
            scope_metrics: rm
                .scope_metrics
                .into_iter()
                .map(|sm| ScopeMetrics {
                    scope: scope_to_proto(sm.scope),
                    metrics: sm.metrics.into_iter().map(metric_to_proto).collect(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
        .collect()
}

fn number_points_to_proto(points: Vec<NumberPointJson>) -> Vec<NumberDataPoint> {
    points
        .into_iter()
        .map(|point| NumberDataPoint {
            attributes: attributes_to_proto(point.attributes),
            start_time_unix_nano: point.start_time_unix_nano,
            time_unix_nano: point.time_unix_nano,
            value: match (point.as_double, point.as_int) {
                (Some(d), _) => Some(number_data_point::Value::AsDouble(d)),
                (None, Some(i)) => Some(number_data_point::Value::AsInt(i)),
                (None, None) => None,
            },
            ..Default::default()
        })
        .collect()
}

fn histogram_points_to_proto(points: Vec<HistogramPointJson>) -> Vec<HistogramDataPoint> {
    points
        .into_iter()
        .map(|point| HistogramDataPoint {
            attributes: attributes_to_proto(point.attributes),
            start_time_unix_nano: point.start_time_unix_nano,
            time_unix_nano: point.time_unix_nano,
            count: point.count,
            sum: point.sum,
            bucket_counts: point.bucket_counts,
            explicit_bounds: point.explicit_bounds,
            min: point.min,
            max: point.max,
            ..Default::default()
        })
        .collect()
}

/// A metric without a recognized data section converts with no data and is
/// rejected by ingestion.
fn metric_to_proto(metric: MetricJson) -> Metric {
    let data = if let Some(gauge) = metric.gauge {
        Some(Data::Gauge(Gauge {
            data_points: number_points_to_proto(gauge.data_points),
        }))
    } else if let Some(sum) = metric.sum {
        Some(Data::Sum(Sum {
            data_points: number_points_to_proto(sum.data_points),
            aggregation_temporality: sum.aggregation_temporality,
            is_monotonic: sum.is_monotonic,
        }))
    } else {
        metric.histogram.map(|histogram| {
            Data::Histogram(Histogram {
                data_points: histogram_points_to_proto(histogram.data_points),
                aggregation_temporality: histogram.aggregation_temporality,
            })
        })
    };

    Metric {
        name: metric.name,
        description: metric.description,
        unit: metric.unit,
        data,
        ..Default::default()
    }
}
