//! Log data types and structures

use crate::core::otel_compliance::nanos_to_system_time;
use crate::core::types::{AttributeValue, KeyValue, SpanId, TraceId};
use crate::resource::{InstrumentationScope, Resource, ResourceKey};
use std::sync::Arc;
use std::time::SystemTime;

/// Log severity levels per OpenTelemetry specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogSeverity {
    Unspecified = 0,
    Trace = 1,
    Debug = 5,
    Info = 9,
    Warn = 13,
    Error = 17,
    Fatal = 21,
}

impl LogSeverity {
    /// Convert from OTLP severity number
    pub fn from_otlp(severity: i32) -> Self {
        match severity {
            1..=4 => Self::Trace,
            5..=8 => Self::Debug,
            9..=12 => Self::Info,
            13..=16 => Self::Warn,
            17..=20 => Self::Error,
            21..=24 => Self::Fatal,
            _ => Self::Unspecified,
        }
    }

    /// Parse a display label, case-insensitively
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" | "information" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "fatal" | "critical" => Some(Self::Fatal),
            "unspecified" => Some(Self::Unspecified),
            _ => None,
        }
    }

    /// Lowest OTLP severity number in this band
    pub fn as_number(self) -> i32 {
        self as i32
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

/// A stored log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Repository-wide sequence number, assigned on insertion
    pub id: u64,
    pub resource: Arc<Resource>,
    pub scope: Arc<InstrumentationScope>,
    /// Timestamp in nanoseconds
    pub time_unix_nano: u64,
    pub observed_time_unix_nano: u64,
    /// Exact OTLP severity number as received
    pub severity_number: i32,
    pub body: AttributeValue,
    pub attributes: Vec<KeyValue>,
    /// Optional trace ID for correlation
    pub trace_id: Option<TraceId>,
    /// Optional span ID for correlation
    pub span_id: Option<SpanId>,
    pub flags: u32,
}

impl LogEntry {
    pub fn resource_key(&self) -> &ResourceKey {
        self.resource.key()
    }

    pub fn severity(&self) -> LogSeverity {
        LogSeverity::from_otlp(self.severity_number)
    }

    /// Body rendered as text
    pub fn message(&self) -> String {
        self.body.to_string()
    }

    pub fn time(&self) -> SystemTime {
        nanos_to_system_time(self.time_unix_nano)
    }

    /// Returns true if the record is correlated with the given span
    pub fn is_for_span(&self, trace_id: TraceId, span_id: SpanId) -> bool {
        self.trace_id == Some(trace_id) && self.span_id == Some(span_id)
    }
}
