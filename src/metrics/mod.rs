//! OpenTelemetry metrics storage.
//!
//! Instruments per resource, one bounded point series per attribute set.

pub mod storage;
pub mod types;

pub use storage::{MetricStorage, MetricWrite};
pub use types::{
    AggregationTemporality, DimensionData, HistogramValue, InstrumentData, InstrumentKey,
    InstrumentKind, InstrumentSummary, MetricPoint, PointValue,
};
