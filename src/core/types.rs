use crate::core::error::{RepositoryError, Result};
use crate::core::otel_compliance::{attributes as semconv, nanos_to_system_time};
use crate::resource::{InstrumentationScope, Resource, ResourceKey};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Unique identifier for a trace (16 raw bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId([u8; 16]);

/// Unique identifier for a span within a trace (8 raw bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId([u8; 8]);

impl TraceId {
    /// Creates a TraceId from its raw bytes after validation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 16] = bytes.try_into().map_err(|_| {
            let reason = format!("expected 16 bytes, got {}", bytes.len());
            RepositoryError::invalid_id("trace id", reason)
        })?;
        if raw.iter().all(|&b| b == 0) {
            return Err(RepositoryError::invalid_id("trace id", "all zeros"));
        }
        Ok(TraceId(raw))
    }

    /// Parses a lowercase or uppercase hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| RepositoryError::invalid_id("trace id", e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl SpanId {
    /// Creates a SpanId from its raw bytes after validation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| {
            RepositoryError::invalid_id("span id", format!("expected 8 bytes, got {}", bytes.len()))
        })?;
        if raw.iter().all(|&b| b == 0) {
            return Err(RepositoryError::invalid_id("span id", "all zeros"));
        }
        Ok(SpanId(raw))
    }

    /// Parses a lowercase or uppercase hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| RepositoryError::invalid_id("span id", e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Returns the lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Dynamically typed attribute value (OTLP `AnyValue`)
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Array(Vec<AttributeValue>),
    KvList(Vec<KeyValue>),
}

impl AttributeValue {
    /// Returns the inner string for string values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a numeric view of int and double values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            AttributeValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
            AttributeValue::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")
            },
            AttributeValue::KvList(pairs) => {
                f.write_str("{")?;
                for (i, kv) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", kv.key, kv.value)?;
                }
                f.write_str("}")
            },
        }
    }
}

/// A single attribute
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: AttributeValue,
}

impl KeyValue {
    pub fn new<K: Into<String>>(key: K, value: AttributeValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Shorthand for a string-valued attribute
    pub fn string<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::new(key, AttributeValue::String(value.into()))
    }
}

/// Finds the first attribute with the given key
pub fn find_attribute<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a AttributeValue> {
    attributes.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
}

/// Finds the first attribute with the given key, rendered as a string
pub fn find_attribute_string(attributes: &[KeyValue], key: &str) -> Option<String> {
    find_attribute(attributes, key).map(ToString::to_string)
}

/// Kind of a span, per the OTLP enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    /// Returns the OTLP numeric value
    pub fn as_proto(self) -> i32 {
        match self {
            SpanKind::Unspecified => 0,
            SpanKind::Internal => 1,
            SpanKind::Server => 2,
            SpanKind::Client => 3,
            SpanKind::Producer => 4,
            SpanKind::Consumer => 5,
        }
    }

    /// Returns the display string
    pub fn as_str(self) -> &'static str {
        match self {
            SpanKind::Unspecified => "unspecified",
            SpanKind::Internal => "internal",
            SpanKind::Server => "server",
            SpanKind::Client => "client",
            SpanKind::Producer => "producer",
            SpanKind::Consumer => "consumer",
        }
    }
}

/// Status of a span execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanStatus {
    /// No status was set
    Unset,
    /// Span completed successfully
    Ok,
    /// Span completed with an error
    Error,
}

impl SpanStatus {
    /// Returns the OTLP numeric status code
    pub fn as_proto(self) -> i32 {
        match self {
            SpanStatus::Unset => 0,
            SpanStatus::Ok => 1,
            SpanStatus::Error => 2,
        }
    }

    /// Returns the display string
    pub fn as_str(self) -> &'static str {
        match self {
            SpanStatus::Unset => "unset",
            SpanStatus::Ok => "ok",
            SpanStatus::Error => "error",
        }
    }

    /// Returns true if the span status indicates an error
    pub fn is_error(self) -> bool {
        matches!(self, SpanStatus::Error)
    }
}

/// A timestamped event recorded on a span
#[derive(Debug, Clone, PartialEq)]
pub struct SpanEvent {
    pub name: String,
    pub time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

/// A link from a span to another span, possibly in another trace
#[derive(Debug, Clone, PartialEq)]
pub struct SpanLink {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_state: Option<String>,
    pub attributes: Vec<KeyValue>,
}

/// Represents a single span in a distributed trace
#[derive(Debug, Clone)]
pub struct Span {
    /// Unique identifier for the trace this span belongs to
    pub trace_id: TraceId,
    /// Unique identifier for this span
    pub span_id: SpanId,
    /// Parent span ID if this is a child span
    pub parent_span_id: Option<SpanId>,
    /// Resource that produced the span
    pub resource: Arc<Resource>,
    /// Instrumentation scope that produced the span
    pub scope: Arc<InstrumentationScope>,
    /// Name of the operation this span represents
    pub name: String,
    pub kind: SpanKind,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub status: SpanStatus,
    pub status_message: Option<String>,
    pub trace_state: Option<String>,
    pub attributes: Vec<KeyValue>,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,
}

impl Span {
    /// Key of the resource that produced this span
    pub fn resource_key(&self) -> &ResourceKey {
        self.resource.key()
    }

    /// Returns true if this span is a root span (has no parent)
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    pub fn start_time(&self) -> SystemTime {
        nanos_to_system_time(self.start_time_unix_nano)
    }

    pub fn end_time(&self) -> SystemTime {
        nanos_to_system_time(self.end_time_unix_nano)
    }

    /// How long the span took to complete
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.end_time_unix_nano.saturating_sub(self.start_time_unix_nano))
    }

    /// Gets an attribute value by key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        find_attribute(&self.attributes, key)
    }

    /// Short human-readable description derived from semantic conventions.
    pub fn display_summary(&self) -> String {
        let attr = |key: &str| find_attribute_string(&self.attributes, key);

        let http_method = attr(semconv::HTTP_REQUEST_METHOD).or_else(|| attr(semconv::HTTP_METHOD));
        if let Some(method) = http_method {
            let target = match self.kind {
                SpanKind::Client => attr(semconv::URL_FULL).or_else(|| attr(semconv::HTTP_URL)),
                _ => attr(semconv::HTTP_ROUTE)
                    .or_else(|| attr(semconv::URL_PATH))
                    .or_else(|| attr(semconv::HTTP_TARGET)),
            };
            return match target {
                Some(target) => format!("{} {}", method, target),
                None => method,
            };
        }

        if let Some(system) = attr(semconv::DB_SYSTEM) {
            return match attr(semconv::DB_NAME) {
                Some(db) => format!("DB {} {}", system, db),
                None => format!("DB {}", system),
            };
        }

        let rpc = (attr(semconv::RPC_SERVICE), attr(semconv::RPC_METHOD));
        if let (Some(service), Some(method)) = rpc {
            return format!("{}/{}", service, method);
        }

        if let Some(system) = attr(semconv::MESSAGING_SYSTEM) {
            let operation = attr(semconv::MESSAGING_OPERATION).unwrap_or_else(|| self.name.clone());
            return format!("{} {}", system, operation);
        }

        self.name.clone()
    }
}

/// Snapshot of a distributed trace.
///
/// Spans are in insertion order, which is not necessarily time order, and a
/// child may precede its parent.
#[derive(Debug, Clone)]
pub struct Trace {
    trace_id: TraceId,
    spans: Arc<Vec<Arc<Span>>>,
}

impl Trace {
    pub(crate) fn new(trace_id: TraceId, spans: Arc<Vec<Arc<Span>>>) -> Self {
        Self { trace_id, spans }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// All spans in insertion order
    pub fn spans(&self) -> &[Arc<Span>] {
        &self.spans
    }

    /// Finds a span by ID
    pub fn span(&self, span_id: &SpanId) -> Option<&Arc<Span>> {
        self.spans.iter().find(|span| &span.span_id == span_id)
    }

    /// The span without a parent, if one has arrived yet
    pub fn root_span(&self) -> Option<&Arc<Span>> {
        self.spans.iter().find(|span| span.is_root())
    }

    /// The span with the earliest start time
    pub fn first_span(&self) -> Option<&Arc<Span>> {
        self.spans.iter().min_by_key(|span| span.start_time_unix_nano)
    }

    pub fn start_time_unix_nano(&self) -> u64 {
        self.spans
            .iter()
            .map(|span| span.start_time_unix_nano)
            .min()
            .unwrap_or(0)
    }

    pub fn end_time_unix_nano(&self) -> u64 {
        self.spans
            .iter()
            .map(|span| span.end_time_unix_nano)
            .max()
            .unwrap_or(0)
    }

    /// Total duration from first span start to last span end
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.end_time_unix_nano().saturating_sub(self.start_time_unix_nano()))
    }

    /// `<application>: <span name>` of the root span, or of the earliest span
    /// while the root is still missing.
    pub fn full_name(&self) -> String {
        self.root_span()
            .or_else(|| self.first_span())
            .map(|span| format!("{}: {}", span.resource_key().name, span.name))
            .unwrap_or_default()
    }

    /// Returns true if this trace has any errors
    pub fn has_error(&self) -> bool {
        self.spans.iter().any(|span| span.status.is_error())
    }

    /// Distinct resources in order of first span arrival
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        let mut seen: Vec<Arc<Resource>> = Vec::new();
        for span in self.spans.iter() {
            if !seen.iter().any(|r| r.key() == span.resource_key()) {
                seen.push(Arc::clone(&span.resource));
            }
        }
        seen
    }

    /// Returns true if any span matches the key (grouping keys match every instance)
    pub fn has_resource(&self, key: &ResourceKey) -> bool {
        self.spans.iter().any(|span| key.matches(span.resource_key()))
    }
}
