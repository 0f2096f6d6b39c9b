//! OpenTelemetry logs storage
//!
//! Per-resource bounded log buffers with trace correlation.

pub mod storage;
pub mod types;

pub use storage::{LogStorage, LogWrite};
pub use types::{LogEntry, LogSeverity};
