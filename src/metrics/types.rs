//! Instrument model.
//!
//! An instrument is identified per resource by `(meter name, instrument
//! name)` and holds one bounded point series per distinct attribute set.

use crate::core::types::KeyValue;
use crate::resource::InstrumentationScope;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// OTLP aggregation temporality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationTemporality {
    Unspecified,
    Delta,
    Cumulative,
}

impl AggregationTemporality {
    pub fn from_proto(value: i32) -> Self {
        match value {
            1 => Self::Delta,
            2 => Self::Cumulative,
            _ => Self::Unspecified,
        }
    }

    pub fn as_proto(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Delta => 1,
            Self::Cumulative => 2,
        }
    }
}

/// Kind of data an instrument produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Point-in-time measurement (CPU usage, memory)
    Gauge,
    /// Counter or up-down counter
    Sum {
        is_monotonic: bool,
        temporality: AggregationTemporality,
    },
    /// Latency/size distributions with explicit buckets
    Histogram { temporality: AggregationTemporality },
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Sum { .. } => "sum",
            Self::Histogram { .. } => "histogram",
        }
    }
}

/// Identity of an instrument within a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentKey {
    pub meter_name: String,
    pub instrument_name: String,
}

/// Instrument definition without its data
#[derive(Debug, Clone)]
pub struct InstrumentSummary {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: InstrumentKind,
    pub scope: Arc<InstrumentationScope>,
}

impl InstrumentSummary {
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey {
            meter_name: self.scope.name.clone(),
            instrument_name: self.name.clone(),
        }
    }
}

/// Histogram data point with explicit bucket bounds
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramValue {
    pub count: u64,
    pub sum: Option<f64>,
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl HistogramValue {
    /// Estimates a quantile (0.0..=1.0) by linear interpolation within the
    /// bucket containing it. Returns `None` for empty histograms.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.count == 0 || self.bucket_counts.is_empty() {
            return None;
        }
        let rank = q.clamp(0.0, 1.0) * self.count as f64;
        let mut seen = 0u64;
        for (i, &bucket) in self.bucket_counts.iter().enumerate() {
            if bucket == 0 {
                continue;
            }
            let before = seen as f64;
            seen += bucket;
            if seen as f64 >= rank {
                let lower = if i == 0 {
                    self.min.unwrap_or(0.0)
                } else {
                    self.explicit_bounds.get(i - 1).copied().unwrap_or(0.0)
                };
                let upper = self
                    .explicit_bounds
                    .get(i)
                    .copied()
                    .or(self.max)
                    .unwrap_or(lower);
                let fraction = (rank - before) / bucket as f64;
                return Some(lower + (upper - lower) * fraction);
            }
        }
        self.max.or_else(|| self.explicit_bounds.last().copied())
    }
}

/// Value of one data point
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    Double(f64),
    Long(i64),
    Histogram(HistogramValue),
}

impl PointValue {
    /// Scalar view used for charting; histograms report their mean
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Long(l) => Some(*l as f64),
            Self::Histogram(h) if h.count > 0 => h.sum.map(|sum| sum / h.count as f64),
            Self::Histogram(_) => None,
        }
    }
}

/// Metric data point
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub value: PointValue,
}

/// Points recorded for one attribute set
#[derive(Debug, Clone)]
pub struct DimensionSeries {
    pub attributes: Vec<KeyValue>,
    pub points: VecDeque<MetricPoint>,
}

/// Canonical, order-independent key of an attribute set
pub fn dimension_key(attributes: &[KeyValue]) -> String {
    let mut pairs: Vec<(&str, String)> = attributes
        .iter()
        .map(|kv| (kv.key.as_str(), kv.value.to_string()))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Query result for one instrument
#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub summary: InstrumentSummary,
    pub dimensions: Vec<DimensionData>,
    /// Every value observed per attribute key, sorted
    pub known_attribute_values: BTreeMap<String, Vec<String>>,
}

/// Points of one dimension within the requested time range, oldest first
#[derive(Debug, Clone)]
pub struct DimensionData {
    pub attributes: Vec<KeyValue>,
    pub points: Vec<MetricPoint>,
}
