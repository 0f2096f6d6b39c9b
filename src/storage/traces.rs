//! Global trace store.
//!
//! Traces are kept in arrival order in a bounded [`SnapshotBuffer`]; the
//! oldest trace is evicted once `max_traces` is exceeded. Each trace owns an
//! append-only span list published copy-on-write, and every span is also
//! indexed by `(TraceId, SpanId)`.

use crate::core::types::{Span, SpanId, Trace, TraceId};
use crate::storage::backlinks::{BackLink, BacklinkIndex};
use crate::storage::buffer::SnapshotBuffer;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Storage slot for one trace
#[derive(Debug)]
pub struct TraceEntry {
    trace_id: TraceId,
    spans: ArcSwap<Vec<Arc<Span>>>,
    writer: Mutex<()>,
    evicted: AtomicBool,
}

impl TraceEntry {
    fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            spans: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            evicted: AtomicBool::new(false),
        }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Snapshot of the trace as it is now
    pub fn to_trace(&self) -> Trace {
        Trace::new(self.trace_id, self.spans.load_full())
    }

    pub fn span_count(&self) -> usize {
        self.spans.load().len()
    }
}

/// Outcome of one write
#[derive(Debug, Default)]
pub struct TraceWrite {
    /// Spans that were stored, in batch order
    pub stored: Vec<Arc<Span>>,
    /// Spans rejected because their id already exists in the trace
    pub duplicates: Vec<(TraceId, SpanId)>,
    /// Traces evicted to make room
    pub evicted: Vec<TraceId>,
}

#[derive(Debug)]
pub struct TraceStorage {
    traces: DashMap<TraceId, Arc<TraceEntry>>,
    order: SnapshotBuffer<TraceEntry>,
    span_index: DashMap<(TraceId, SpanId), Arc<Span>>,
    backlinks: BacklinkIndex,
}

impl TraceStorage {
    pub fn new(max_traces: usize) -> Self {
        Self {
            traces: DashMap::new(),
            order: SnapshotBuffer::new(max_traces),
            span_index: DashMap::new(),
            backlinks: BacklinkIndex::new(),
        }
    }

    /// Stores validated spans, grouping them by trace.
    pub fn add_spans(&self, spans: Vec<Span>) -> TraceWrite {
        let mut result = TraceWrite::default();
        let mut created = Vec::new();

        for (trace_id, batch) in group_by_trace(spans) {
            self.append_to_trace(trace_id, batch, &mut result, &mut created);
        }

        for entry in self.order.push_batch(created) {
            self.evict(&entry);
            result.evicted.push(entry.trace_id);
        }

        if !result.evicted.is_empty() {
            tracing::trace!(count = result.evicted.len(), "Evicted oldest traces");
        }
        result
    }

    fn append_to_trace(
        &self,
        trace_id: TraceId,
        batch: Vec<Span>,
        result: &mut TraceWrite,
        created: &mut Vec<Arc<TraceEntry>>,
    ) {
        loop {
            let (entry, is_new) = self.entry_for(trace_id);
            let _guard = entry.writer.lock();
            if entry.evicted.load(Ordering::Acquire) {
                // Lost a race with eviction; the next lookup creates a fresh slot
                continue;
            }
            if is_new {
                created.push(Arc::clone(&entry));
            }

            let current = entry.spans.load_full();
            let mut next: Vec<Arc<Span>> = Vec::with_capacity(current.len() + batch.len());
            next.extend(current.iter().map(Arc::clone));

            for span in batch {
                let key = (trace_id, span.span_id);
                if self.span_index.contains_key(&key) {
                    result.duplicates.push(key);
                    continue;
                }

                let span = Arc::new(span);
                for link in &span.links {
                    self.backlinks.add(
                        link.trace_id,
                        link.span_id,
                        BackLink::Span {
                            trace_id,
                            span_id: span.span_id,
                        },
                    );
                }
                self.span_index.insert(key, Arc::clone(&span));
                next.push(Arc::clone(&span));
                result.stored.push(span);
            }

            entry.spans.store(Arc::new(next));
            return;
        }
    }

    fn entry_for(&self, trace_id: TraceId) -> (Arc<TraceEntry>, bool) {
        if let Some(entry) = self.traces.get(&trace_id) {
            return (Arc::clone(entry.value()), false);
        }
        let mut is_new = false;
        let entry = self.traces.entry(trace_id).or_insert_with(|| {
            is_new = true;
            Arc::new(TraceEntry::new(trace_id))
        });
        (Arc::clone(entry.value()), is_new)
    }

    fn evict(&self, entry: &Arc<TraceEntry>) {
        let _guard = entry.writer.lock();
        entry.evicted.store(true, Ordering::Release);
        self.traces
            .remove_if(&entry.trace_id, |_, current| Arc::ptr_eq(current, entry));
        for span in entry.spans.load().iter() {
            self.span_index.remove(&(entry.trace_id, span.span_id));
        }
        self.backlinks.remove_trace(entry.trace_id);
    }

    /// Snapshot of every trace, oldest first
    pub fn traces(&self) -> Vec<Trace> {
        self.order
            .snapshot()
            .iter()
            .map(|entry| entry.to_trace())
            .collect()
    }

    pub fn get_trace(&self, trace_id: TraceId) -> Option<Trace> {
        self.traces.get(&trace_id).map(|entry| entry.to_trace())
    }

    pub fn get_span(&self, trace_id: TraceId, span_id: SpanId) -> Option<Arc<Span>> {
        self.span_index
            .get(&(trace_id, span_id))
            .map(|span| Arc::clone(span.value()))
    }

    pub fn backlinks(&self) -> &BacklinkIndex {
        &self.backlinks
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn span_count(&self) -> usize {
        self.span_index.len()
    }

    pub fn is_full(&self) -> bool {
        self.order.is_full()
    }

    pub fn clear(&self) {
        self.order.clear();
        self.traces.clear();
        self.span_index.clear();
        self.backlinks.clear();
    }
}

/// Groups spans by trace id, keeping first-appearance order of traces and
/// batch order within each trace.
fn group_by_trace(spans: Vec<Span>) -> Vec<(TraceId, Vec<Span>)> {
    let mut positions: HashMap<TraceId, usize> = HashMap::new();
    let mut groups: Vec<(TraceId, Vec<Span>)> = Vec::new();
    for span in spans {
        match positions.get(&span.trace_id) {
            Some(&i) => groups[i].1.push(span),
            None => {
                positions.insert(span.trace_id, groups.len());
                groups.push((span.trace_id, vec![span]));
            },
        }
    }
    groups
}
