//! Core domain models for the telemetry repository.
//!
//! Identifiers, attribute values, spans and traces, plus the error type,
//! configuration and OTLP conversion helpers shared by every store.

pub mod config;
pub mod error;
pub mod otel_compliance;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel, StorageConfig};
pub use error::{RepositoryError, Result};
pub use types::{
    AttributeValue, KeyValue, Span, SpanEvent, SpanId, SpanKind, SpanLink, SpanStatus, Trace,
    TraceId,
};
