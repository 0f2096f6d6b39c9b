//! Reverse index from a span to the spans and logs that reference it.
//!
//! Entries are id-based and never own their sources. They are registered
//! whether or not the target has arrived, and dropped when either the target
//! trace or the source (trace or log record) is evicted. Callers still resolve
//! every entry and skip misses.

use crate::core::types::{SpanId, TraceId};
use dashmap::DashMap;
use std::collections::HashSet;

/// Something that references a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackLink {
    /// A span carrying a link to the target
    Span { trace_id: TraceId, span_id: SpanId },
    /// A log record correlated with the target
    Log { log_id: u64 },
}

type Target = (TraceId, SpanId);

#[derive(Debug, Default)]
pub struct BacklinkIndex {
    links: DashMap<Target, Vec<BackLink>>,
    targets_by_trace: DashMap<TraceId, HashSet<SpanId>>,
    targets_by_source_trace: DashMap<TraceId, HashSet<Target>>,
    targets_by_log: DashMap<u64, Vec<Target>>,
}

impl BacklinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `source` references `(trace_id, span_id)`. The target
    /// does not have to be stored yet.
    pub fn add(&self, trace_id: TraceId, span_id: SpanId, source: BackLink) {
        let target = (trace_id, span_id);
        let mut entry = self.links.entry(target).or_default();
        if entry.contains(&source) {
            return;
        }
        entry.push(source);
        drop(entry);

        self.targets_by_trace.entry(trace_id).or_default().insert(span_id);
        match source {
            BackLink::Span { trace_id: source_trace, .. } => {
                self.targets_by_source_trace.entry(source_trace).or_default().insert(target);
            },
            BackLink::Log { log_id } => {
                self.targets_by_log.entry(log_id).or_default().push(target);
            },
        }
    }

    /// Sources referencing the span, in registration order
    pub fn get(&self, trace_id: TraceId, span_id: SpanId) -> Vec<BackLink> {
        self.links
            .get(&(trace_id, span_id))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Drops every entry whose target or source span lives in `trace_id`
    pub fn remove_trace(&self, trace_id: TraceId) {
        if let Some((_, span_ids)) = self.targets_by_trace.remove(&trace_id) {
            for span_id in span_ids {
                self.links.remove(&(trace_id, span_id));
            }
        }
        if let Some((_, targets)) = self.targets_by_source_trace.remove(&trace_id) {
            for target in targets {
                self.detach(target, |source| {
                    matches!(source, BackLink::Span { trace_id: t, .. } if *t == trace_id)
                });
            }
        }
    }

    /// Drops every entry sourced from the log record `log_id`
    pub fn remove_log(&self, log_id: u64) {
        if let Some((_, targets)) = self.targets_by_log.remove(&log_id) {
            for target in targets {
                self.detach(target, |source| *source == BackLink::Log { log_id });
            }
        }
    }

    fn detach(&self, target: Target, is_source: impl Fn(&BackLink) -> bool) {
        let emptied = match self.links.get_mut(&target) {
            Some(mut sources) => {
                sources.retain(|source| !is_source(source));
                sources.is_empty()
            },
            None => false,
        };
        if !emptied {
            return;
        }

        self.links.remove_if(&target, |_, sources| sources.is_empty());
        if let Some(mut span_ids) = self.targets_by_trace.get_mut(&target.0) {
            if !self.links.contains_key(&target) {
                span_ids.remove(&target.1);
            }
        }
        self.targets_by_trace.remove_if(&target.0, |_, span_ids| span_ids.is_empty());
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&self) {
        self.links.clear();
        self.targets_by_trace.clear();
        self.targets_by_source_trace.clear();
        self.targets_by_log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(trace: u8, span: u8) -> (TraceId, SpanId) {
        (
            TraceId::from_bytes(&[trace; 16]).unwrap(),
            SpanId::from_bytes(&[span; 8]).unwrap(),
        )
    }

    #[test]
    fn test_add_and_get() {
        let index = BacklinkIndex::new();
        let (trace_id, span_id) = ids(1, 1);
        let (source_trace, source_span) = ids(2, 2);

        index.add(trace_id, span_id, BackLink::Log { log_id: 7 });
        index.add(
            trace_id,
            span_id,
            BackLink::Span {
                trace_id: source_trace,
                span_id: source_span,
            },
        );
        index.add(trace_id, span_id, BackLink::Log { log_id: 7 });

        let links = index.get(trace_id, span_id);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], BackLink::Log { log_id: 7 });
    }

    #[test]
    fn test_remove_trace_drops_targets_only() {
        let index = BacklinkIndex::new();
        let (trace_a, span_a) = ids(1, 1);
        let (trace_b, span_b) = ids(2, 2);

        index.add(trace_a, span_a, BackLink::Log { log_id: 1 });
        index.add(trace_b, span_b, BackLink::Log { log_id: 2 });
        index.remove_trace(trace_a);

        assert!(index.get(trace_a, span_a).is_empty());
        assert_eq!(index.get(trace_b, span_b).len(), 1);
    }

    #[test]
    fn test_remove_source_trace() {
        let index = BacklinkIndex::new();
        let (target_trace, target_span) = ids(1, 1);
        let (source_a, span_a) = ids(2, 2);
        let (source_b, span_b) = ids(3, 3);

        for (trace_id, span_id) in [(source_a, span_a), (source_b, span_b)] {
            index.add(target_trace, target_span, BackLink::Span { trace_id, span_id });
        }
        index.remove_trace(source_a);
        assert_eq!(
            index.get(target_trace, target_span),
            vec![BackLink::Span {
                trace_id: source_b,
                span_id: span_b,
            }]
        );

        index.remove_trace(source_b);
        assert!(index.is_empty());
        assert!(index.targets_by_trace.is_empty());
    }

    #[test]
    fn test_remove_log() {
        let index = BacklinkIndex::new();
        let (trace_id, span_id) = ids(1, 1);
        index.add(trace_id, span_id, BackLink::Log { log_id: 1 });
        index.add(trace_id, span_id, BackLink::Log { log_id: 2 });

        index.remove_log(1);
        assert_eq!(index.get(trace_id, span_id), vec![BackLink::Log { log_id: 2 }]);
        index.remove_log(2);
        assert!(index.is_empty());
        assert!(index.targets_by_log.is_empty());
    }
}
