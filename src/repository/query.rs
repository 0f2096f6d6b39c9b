//! Read side of the repository.
//!
//! Every paged query works on an immutable snapshot taken at the start of
//! the call, so concurrent ingestion never shifts the indices of a page
//! being read. Queries fail fast on caller errors and stop promptly when
//! their cancellation token fires.

use crate::core::error::{RepositoryError, Result};
use crate::core::types::{Span, SpanId, Trace, TraceId};
use crate::logs::LogEntry;
use crate::metrics::{InstrumentData, InstrumentKey, InstrumentSummary};
use crate::query::{
    log_matches, trace_matches_filters, trace_matches_text, GetInstrumentContext, GetLogsContext,
    GetTracesContext, PagedResult, TracesResult,
};
use crate::repository::TelemetryRepository;
use crate::resource::{build_resource_views, Resource, ResourceKey, ResourceView};
use crate::storage::{BackLink, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Items scanned between cancellation checks
const CANCELLATION_CHECK_INTERVAL: usize = 256;

/// A resolved reference to a span
#[derive(Debug, Clone)]
pub enum SpanBackLink {
    Span(Arc<Span>),
    Log(Arc<LogEntry>),
}

fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) if token.is_cancelled() => Err(RepositoryError::Cancelled),
        _ => Ok(()),
    }
}

/// Collects the `[start, start + count)` window of matching items and counts
/// every match.
fn paginate<T, I, F>(
    items: I,
    start_index: usize,
    count: usize,
    token: Option<&CancellationToken>,
    mut matches: F,
) -> Result<(Vec<T>, usize)>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> bool,
{
    let mut page = Vec::with_capacity(count.min(1024));
    let mut total = 0;
    for (scanned, item) in items.into_iter().enumerate() {
        if scanned % CANCELLATION_CHECK_INTERVAL == 0 {
            check_cancelled(token)?;
        }
        if !matches(&item) {
            continue;
        }
        if total >= start_index && page.len() < count {
            page.push(item);
        }
        total += 1;
    }
    Ok((page, total))
}

impl TelemetryRepository {
    fn check_page_size(&self, count: usize) -> Result<()> {
        let max = self.config.query.max_page_size;
        if count > max {
            return Err(RepositoryError::invalid_query(format!(
                "count {} exceeds the maximum page size of {}",
                count, max
            )));
        }
        Ok(())
    }

    /// Returns one page of logs, oldest first.
    ///
    /// `count == 0` returns no items but a correct `total_count`.
    pub fn get_logs(&self, ctx: &GetLogsContext) -> Result<PagedResult<Arc<LogEntry>>> {
        self.check_page_size(ctx.count)?;
        let token = ctx.cancellation.as_ref();
        check_cancelled(token)?;

        let snapshot = self.logs.snapshot(ctx.resource.as_ref());
        let (items, total_count) = paginate(
            snapshot.iter().map(Arc::clone),
            ctx.start_index,
            ctx.count,
            token,
            |entry| log_matches(entry, &ctx.filters),
        )?;

        Ok(PagedResult {
            items,
            total_count,
            is_full: self.logs.is_full(ctx.resource.as_ref()),
        })
    }

    /// Returns one page of traces, oldest first, and the longest matching
    /// trace duration.
    pub fn get_traces(&self, ctx: &GetTracesContext) -> Result<TracesResult> {
        self.check_page_size(ctx.count)?;
        let token = ctx.cancellation.as_ref();
        check_cancelled(token)?;

        let mut max_duration = Duration::ZERO;
        let (items, total_count) = paginate(
            self.traces.traces(),
            ctx.start_index,
            ctx.count,
            token,
            |trace| {
                let matched = ctx.resource.as_ref().map_or(true, |key| trace.has_resource(key))
                    && trace_matches_filters(trace, &ctx.filters)
                    && trace_matches_text(trace, &ctx.filter_text);
                if matched {
                    max_duration = max_duration.max(trace.duration());
                }
                matched
            },
        )?;

        Ok(TracesResult {
            page: PagedResult {
                items,
                total_count,
                is_full: self.traces.is_full(),
            },
            max_duration,
        })
    }

    /// Returns the points of one instrument within the requested time range
    pub fn get_instrument(&self, ctx: &GetInstrumentContext) -> Result<Option<InstrumentData>> {
        if ctx.meter_name.is_empty() || ctx.instrument_name.is_empty() {
            return Err(RepositoryError::invalid_query(
                "meter and instrument names are required",
            ));
        }
        if let (Some(start), Some(end)) = (ctx.start_time_unix_nano, ctx.end_time_unix_nano) {
            if start > end {
                return Err(RepositoryError::invalid_query("start time is after end time"));
            }
        }
        check_cancelled(ctx.cancellation.as_ref())?;

        let key = InstrumentKey {
            meter_name: ctx.meter_name.clone(),
            instrument_name: ctx.instrument_name.clone(),
        };
        Ok(self.metrics.get_instrument(
            &ctx.resource,
            &key,
            ctx.start_time_unix_nano,
            ctx.end_time_unix_nano,
        ))
    }

    /// Instrument definitions for a resource (or every instance of a name)
    pub fn get_instruments(&self, key: &ResourceKey) -> Vec<InstrumentSummary> {
        self.metrics.instruments(key)
    }

    /// Every retained point of one instrument
    pub fn metric_data(
        &self,
        key: &ResourceKey,
        instrument: &InstrumentKey,
    ) -> Option<InstrumentData> {
        self.metrics.get_instrument(key, instrument, None, None)
    }

    pub fn get_trace(&self, trace_id: TraceId) -> Option<Trace> {
        self.traces.get_trace(trace_id)
    }

    pub fn get_span(&self, trace_id: TraceId, span_id: SpanId) -> Option<Arc<Span>> {
        self.traces.get_span(trace_id, span_id)
    }

    /// Spans and logs referencing a span. Sources evicted since they were
    /// recorded are skipped.
    pub fn get_span_backlinks(&self, trace_id: TraceId, span_id: SpanId) -> Vec<SpanBackLink> {
        self.traces
            .backlinks()
            .get(trace_id, span_id)
            .into_iter()
            .filter_map(|link| match link {
                BackLink::Span { trace_id, span_id } => {
                    self.traces.get_span(trace_id, span_id).map(SpanBackLink::Span)
                },
                BackLink::Log { log_id } => self.logs.get(log_id).map(SpanBackLink::Log),
            })
            .collect()
    }

    /// Logs correlated with a span, oldest first
    pub fn get_logs_for_span(&self, trace_id: TraceId, span_id: SpanId) -> Vec<Arc<LogEntry>> {
        self.logs
            .snapshot(None)
            .iter()
            .filter(|entry| entry.is_for_span(trace_id, span_id))
            .map(Arc::clone)
            .collect()
    }

    /// Resources classified for display, groupings before their instances
    pub fn get_resources(&self) -> Vec<ResourceView> {
        build_resource_views(&self.resources.all())
    }

    pub fn get_resource(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        self.resources.get(key)
    }

    /// Concrete resources selected by `key`, in order of first sighting
    pub fn matching_resources(&self, key: &ResourceKey) -> Vec<Arc<Resource>> {
        self.resources.matching(key)
    }

    /// Every stored log for `resource` (or all resources), oldest first
    pub fn snapshot_logs(&self, resource: Option<&ResourceKey>) -> Snapshot<LogEntry> {
        self.logs.snapshot(resource)
    }

    /// Spans emitted by resources selected by `key`, oldest trace first
    pub fn spans_for_resource(&self, key: &ResourceKey) -> Vec<Arc<Span>> {
        self.traces
            .traces()
            .iter()
            .flat_map(|trace| trace.spans().iter())
            .filter(|span| key.matches(span.resource_key()))
            .map(Arc::clone)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_window_and_total() {
        let (page, total) = paginate(0..10, 2, 3, None, |v| v % 2 == 0).unwrap();
        assert_eq!(page, vec![4, 6, 8]);
        assert_eq!(total, 5);
    }

    #[test]
    fn test_paginate_zero_count() {
        let (page, total) = paginate(0..10, 0, 0, None, |_| true).unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 10);
    }

    #[test]
    fn test_paginate_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result = paginate(0..10, 0, 5, Some(&token), |_| true);
        assert!(matches!(result, Err(RepositoryError::Cancelled)));
    }
}
