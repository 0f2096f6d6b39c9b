//! OpenTelemetry protocol compliance layer.
//!
//! Conversions from the OTLP protobuf object model into the repository's own
//! types, plus the semantic convention keys the repository understands.

use opentelemetry_proto::tonic::common::v1::{
    any_value::Value as ProtoValue, AnyValue as ProtoAnyValue, KeyValue as ProtoKeyValue,
};
use opentelemetry_proto::tonic::trace::v1::{
    span::SpanKind as ProtoSpanKind, status::StatusCode as ProtoStatusCode, Status as ProtoStatus,
};

use crate::core::config::StorageConfig;
use crate::core::error::Result;
use crate::core::types::{AttributeValue, KeyValue, SpanId, SpanKind, SpanStatus, TraceId};
use std::time::{SystemTime, UNIX_EPOCH};

/// Truncation limits applied to attributes at ingestion.
#[derive(Debug, Clone, Copy)]
pub struct AttributeLimits {
    pub max_count: usize,
    pub max_length: Option<usize>,
}

impl AttributeLimits {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_count: config.max_attribute_count,
            max_length: config.max_attribute_length,
        }
    }
}

impl Default for AttributeLimits {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Convert OTEL protocol span kind to our internal representation.
#[inline]
pub fn convert_span_kind(proto_kind: i32) -> SpanKind {
    match ProtoSpanKind::try_from(proto_kind) {
        Ok(ProtoSpanKind::Unspecified) | Err(_) => SpanKind::Unspecified,
        Ok(ProtoSpanKind::Internal) => SpanKind::Internal,
        Ok(ProtoSpanKind::Server) => SpanKind::Server,
        Ok(ProtoSpanKind::Client) => SpanKind::Client,
        Ok(ProtoSpanKind::Producer) => SpanKind::Producer,
        Ok(ProtoSpanKind::Consumer) => SpanKind::Consumer,
    }
}

/// Convert OTEL protocol status to our internal status and message.
#[inline]
pub fn convert_span_status(proto_status: Option<&ProtoStatus>) -> (SpanStatus, Option<String>) {
    match proto_status {
        Some(status) => {
            let code = match ProtoStatusCode::try_from(status.code) {
                Ok(ProtoStatusCode::Ok) => SpanStatus::Ok,
                Ok(ProtoStatusCode::Error) => SpanStatus::Error,
                Ok(ProtoStatusCode::Unset) | Err(_) => SpanStatus::Unset,
            };
            let message = (!status.message.is_empty()).then(|| status.message.clone());
            (code, message)
        },
        None => (SpanStatus::Unset, None),
    }
}

/// Convert an OTLP `AnyValue` into the tagged attribute variant.
pub fn convert_any_value(value: &ProtoAnyValue, limits: &AttributeLimits) -> AttributeValue {
    match &value.value {
        Some(ProtoValue::StringValue(s)) => AttributeValue::String(truncate(s, limits.max_length)),
        Some(ProtoValue::BoolValue(b)) => AttributeValue::Bool(*b),
        Some(ProtoValue::IntValue(i)) => AttributeValue::Int(*i),
        Some(ProtoValue::DoubleValue(d)) => AttributeValue::Double(*d),
        Some(ProtoValue::BytesValue(bytes)) => AttributeValue::Bytes(bytes.clone()),
        Some(ProtoValue::ArrayValue(array)) => AttributeValue::Array(
            array
                .values
                .iter()
                .map(|v| convert_any_value(v, limits))
                .collect(),
        ),
        Some(ProtoValue::KvlistValue(kvlist)) => {
            AttributeValue::KvList(convert_attributes(&kvlist.values, limits))
        },
        None => AttributeValue::String(String::new()),
    }
}

/// Convert OTLP attributes, keeping at most `max_count` of them.
pub fn convert_attributes(attributes: &[ProtoKeyValue], limits: &AttributeLimits) -> Vec<KeyValue> {
    attributes
        .iter()
        .take(limits.max_count)
        .map(|attr| KeyValue {
            key: attr.key.clone(),
            value: attr
                .value
                .as_ref()
                .map(|v| convert_any_value(v, limits))
                .unwrap_or_else(|| AttributeValue::String(String::new())),
        })
        .collect()
}

/// Extract a string resource/span attribute from raw OTLP attributes.
pub fn extract_string_attribute(attributes: &[ProtoKeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|attr| attr.key == key)
        .and_then(|attr| attr.value.as_ref())
        .and_then(|value| match &value.value {
            Some(ProtoValue::StringValue(s)) if !s.is_empty() => Some(s.clone()),
            Some(ProtoValue::IntValue(i)) => Some(i.to_string()),
            _ => None,
        })
}

/// Parse an optional trace id: empty or all-zero bytes mean "absent".
pub fn optional_trace_id(bytes: &[u8]) -> Result<Option<TraceId>> {
    if is_all_zeros(bytes) {
        return Ok(None);
    }
    TraceId::from_bytes(bytes).map(Some)
}

/// Parse an optional span id: empty or all-zero bytes mean "absent".
pub fn optional_span_id(bytes: &[u8]) -> Result<Option<SpanId>> {
    if is_all_zeros(bytes) {
        return Ok(None);
    }
    SpanId::from_bytes(bytes).map(Some)
}

/// Check if byte slice is empty or all zeros without allocating
#[inline]
pub fn is_all_zeros(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Truncate a string to at most `max_length` characters.
pub fn truncate(value: &str, max_length: Option<usize>) -> String {
    match max_length {
        Some(max) if value.chars().count() > max => value.chars().take(max).collect(),
        _ => value.to_string(),
    }
}

/// Convert nanoseconds since Unix epoch to SystemTime.
#[inline]
pub fn nanos_to_system_time(nanos: u64) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_nanos(nanos)
}

/// Convert SystemTime to nanoseconds since Unix epoch.
#[inline]
pub fn system_time_to_nanos(time: SystemTime) -> u64 {
    u64::try_from(time.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos())
        .unwrap_or(u64::MAX)
}

/// Semantic convention keys understood by the repository.
pub mod attributes {
    // Resource identity
    pub const SERVICE_NAME: &str = "service.name";
    pub const SERVICE_INSTANCE_ID: &str = "service.instance.id";
    pub const SERVICE_VERSION: &str = "service.version";

    // HTTP attributes
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const HTTP_ROUTE: &str = "http.route";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_TARGET: &str = "http.target";
    pub const URL_FULL: &str = "url.full";
    pub const URL_PATH: &str = "url.path";

    // Database attributes
    pub const DB_SYSTEM: &str = "db.system";
    pub const DB_NAME: &str = "db.name";

    // RPC attributes
    pub const RPC_SERVICE: &str = "rpc.service";
    pub const RPC_METHOD: &str = "rpc.method";

    // Messaging attributes
    pub const MESSAGING_SYSTEM: &str = "messaging.system";
    pub const MESSAGING_OPERATION: &str = "messaging.operation";

    // Peer attributes
    pub const PEER_SERVICE: &str = "peer.service";
    pub const SERVER_ADDRESS: &str = "server.address";
    pub const SERVER_PORT: &str = "server.port";
    pub const NET_PEER_NAME: &str = "net.peer.name";
    pub const NET_PEER_PORT: &str = "net.peer.port";
}
