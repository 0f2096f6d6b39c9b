//! Per-resource metric storage.
//!
//! Each resource owns its instruments behind its own lock. Each dimension
//! series keeps at most `max_points` points, dropping the oldest first.

use crate::core::types::KeyValue;
use crate::metrics::types::{
    dimension_key, DimensionData, DimensionSeries, InstrumentData, InstrumentKey,
    InstrumentSummary, MetricPoint,
};
use crate::resource::ResourceKey;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug)]
struct Instrument {
    summary: InstrumentSummary,
    dimensions: Vec<DimensionSeries>,
    dimension_index: HashMap<String, usize>,
}

impl Instrument {
    fn new(summary: InstrumentSummary) -> Self {
        Self {
            summary,
            dimensions: Vec::new(),
            dimension_index: HashMap::new(),
        }
    }

    fn series_mut(&mut self, attributes: Vec<KeyValue>) -> &mut DimensionSeries {
        let key = dimension_key(&attributes);
        let index = match self.dimension_index.get(&key) {
            Some(&index) => index,
            None => {
                self.dimensions.push(DimensionSeries {
                    attributes,
                    points: VecDeque::new(),
                });
                self.dimension_index.insert(key, self.dimensions.len() - 1);
                self.dimensions.len() - 1
            },
        };
        &mut self.dimensions[index]
    }
}

#[derive(Debug, Default)]
struct ResourceMetrics {
    instruments: Vec<Instrument>,
    index: HashMap<InstrumentKey, usize>,
}

impl ResourceMetrics {
    fn instrument_mut(&mut self, summary: InstrumentSummary) -> &mut Instrument {
        let key = summary.key();
        let index = match self.index.get(&key) {
            Some(&index) => {
                let existing = &mut self.instruments[index].summary;
                if existing.description.is_empty() {
                    existing.description = summary.description;
                }
                if existing.unit.is_empty() {
                    existing.unit = summary.unit;
                }
                index
            },
            None => {
                self.instruments.push(Instrument::new(summary));
                self.index.insert(key, self.instruments.len() - 1);
                self.instruments.len() - 1
            },
        };
        &mut self.instruments[index]
    }
}

/// Outcome of one write
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricWrite {
    pub stored: usize,
    pub evicted: usize,
}

#[derive(Debug)]
pub struct MetricStorage {
    max_points: usize,
    resources: DashMap<ResourceKey, Arc<Mutex<ResourceMetrics>>>,
}

impl MetricStorage {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            resources: DashMap::new(),
        }
    }

    /// Records points for one instrument of one resource.
    pub fn add_points(
        &self,
        key: &ResourceKey,
        summary: InstrumentSummary,
        points: Vec<(Vec<KeyValue>, MetricPoint)>,
    ) -> MetricWrite {
        let metrics = self.resource_metrics(key);
        let mut metrics = metrics.lock();
        let instrument = metrics.instrument_mut(summary);

        let mut write = MetricWrite::default();
        for (attributes, point) in points {
            let series = instrument.series_mut(attributes);
            write.evicted += push_point(&mut series.points, point, self.max_points);
            write.stored += 1;
        }

        if write.evicted > 0 {
            tracing::trace!(resource = %key, count = write.evicted, "Evicted metric points");
        }
        write
    }

    fn resource_metrics(&self, key: &ResourceKey) -> Arc<Mutex<ResourceMetrics>> {
        if let Some(metrics) = self.resources.get(key) {
            return Arc::clone(metrics.value());
        }
        let entry = self.resources.entry(key.clone()).or_default();
        Arc::clone(entry.value())
    }

    fn selected(&self, key: &ResourceKey) -> Vec<Arc<Mutex<ResourceMetrics>>> {
        self.resources
            .iter()
            .filter(|entry| key.matches(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Instrument summaries for the resources selected by `key`, deduplicated
    /// by meter and instrument name
    pub fn instruments(&self, key: &ResourceKey) -> Vec<InstrumentSummary> {
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();
        for metrics in self.selected(key) {
            for instrument in &metrics.lock().instruments {
                if seen.insert(instrument.summary.key()) {
                    summaries.push(instrument.summary.clone());
                }
            }
        }
        summaries
    }

    /// Points of one instrument within `[start, end]`.
    ///
    /// Grouping keys merge every instance; series with the same attribute set
    /// are combined and re-sorted by time.
    pub fn get_instrument(
        &self,
        key: &ResourceKey,
        instrument: &InstrumentKey,
        start_time_unix_nano: Option<u64>,
        end_time_unix_nano: Option<u64>,
    ) -> Option<InstrumentData> {
        let in_range = |point: &MetricPoint| {
            start_time_unix_nano.map_or(true, |start| point.time_unix_nano >= start)
                && end_time_unix_nano.map_or(true, |end| point.time_unix_nano <= end)
        };

        let mut summary: Option<InstrumentSummary> = None;
        let mut dimensions: Vec<DimensionData> = Vec::new();
        let mut dimension_index: HashMap<String, usize> = HashMap::new();
        let mut known: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for metrics in self.selected(key) {
            let metrics = metrics.lock();
            let Some(&index) = metrics.index.get(instrument) else {
                continue;
            };
            let stored = &metrics.instruments[index];
            summary.get_or_insert_with(|| stored.summary.clone());

            for series in &stored.dimensions {
                for kv in &series.attributes {
                    known
                        .entry(kv.key.clone())
                        .or_default()
                        .insert(kv.value.to_string());
                }

                let points = series.points.iter().filter(|p| in_range(*p)).cloned();
                let dim_key = dimension_key(&series.attributes);
                match dimension_index.get(&dim_key) {
                    Some(&i) => dimensions[i].points.extend(points),
                    None => {
                        dimension_index.insert(dim_key, dimensions.len());
                        dimensions.push(DimensionData {
                            attributes: series.attributes.clone(),
                            points: points.collect(),
                        });
                    },
                }
            }
        }

        for dimension in &mut dimensions {
            dimension.points.sort_by_key(|p| p.time_unix_nano);
        }

        summary.map(|summary| InstrumentData {
            summary,
            dimensions,
            known_attribute_values: known
                .into_iter()
                .map(|(k, values)| (k, values.into_iter().collect()))
                .collect(),
        })
    }

    /// Total points across every series
    pub fn point_count(&self) -> usize {
        self.resources
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .lock()
                    .instruments
                    .iter()
                    .flat_map(|i| i.dimensions.iter())
                    .map(|d| d.points.len())
                    .sum::<usize>()
            })
            .sum()
    }

    pub fn clear(&self) {
        self.resources.clear();
    }
}

/// Appends a point, dropping the oldest past `max_points`; returns the
/// number dropped. A repeated timestamp replaces the latest point.
fn push_point(points: &mut VecDeque<MetricPoint>, point: MetricPoint, max_points: usize) -> usize {
    if let Some(last) = points.back_mut() {
        if last.time_unix_nano == point.time_unix_nano {
            *last = point;
            return 0;
        }
    }
    points.push_back(point);

    let mut dropped = 0;
    while points.len() > max_points {
        points.pop_front();
        dropped += 1;
    }
    dropped
}
