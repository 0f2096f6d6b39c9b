//! Query model: filters, paging contexts and paged results.
//!
//! Filters are conjunctive field/condition/value triples. Known fields map
//! to typed record properties; any other field name is treated as an
//! attribute key.

use crate::core::types::{find_attribute, KeyValue, Span, Trace};
use crate::logs::{LogEntry, LogSeverity};
use crate::resource::ResourceKey;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Well-known filter fields
pub mod fields {
    pub const LOG_MESSAGE: &str = "log.message";
    pub const LOG_CATEGORY: &str = "log.category";
    pub const LOG_SEVERITY: &str = "log.severity";
    pub const TRACE_ID: &str = "trace.id";
    pub const SPAN_ID: &str = "span.id";
    pub const SPAN_NAME: &str = "span.name";
    pub const SPAN_KIND: &str = "span.kind";
    pub const SPAN_STATUS: &str = "span.status";
    pub const RESOURCE_NAME: &str = "resource.name";
}

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterCondition {
    Equals,
    NotEqual,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

/// A single field/condition/value predicate
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFilter {
    pub field: String,
    pub condition: FilterCondition,
    pub value: String,
    pub enabled: bool,
}

impl TelemetryFilter {
    pub fn new<F, V>(field: F, condition: FilterCondition, value: V) -> Self
    where
        F: Into<String>,
        V: Into<String>,
    {
        Self {
            field: field.into(),
            condition,
            value: value.into(),
            enabled: true,
        }
    }

    /// Applies the condition to a field value; `None` means the field is absent.
    ///
    /// Ordering conditions compare numerically when both sides parse as
    /// numbers and fall back to case-insensitive string ordering.
    pub fn apply(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return matches!(
                self.condition,
                FilterCondition::NotEqual | FilterCondition::NotContains
            );
        };

        let actual_lower = actual.to_lowercase();
        let expected_lower = self.value.to_lowercase();
        match self.condition {
            FilterCondition::Equals => actual_lower == expected_lower,
            FilterCondition::NotEqual => actual_lower != expected_lower,
            FilterCondition::Contains => actual_lower.contains(&expected_lower),
            FilterCondition::NotContains => !actual_lower.contains(&expected_lower),
            FilterCondition::GreaterThan
            | FilterCondition::LessThan
            | FilterCondition::GreaterThanOrEqual
            | FilterCondition::LessThanOrEqual => {
                let numbers = (actual.trim().parse::<f64>(), self.value.trim().parse::<f64>());
                let ordering = match numbers {
                    (Ok(a), Ok(b)) => a.partial_cmp(&b),
                    _ => Some(actual_lower.cmp(&expected_lower)),
                };
                let Some(ordering) = ordering else {
                    return false;
                };
                match self.condition {
                    FilterCondition::GreaterThan => ordering.is_gt(),
                    FilterCondition::LessThan => ordering.is_lt(),
                    FilterCondition::GreaterThanOrEqual => ordering.is_ge(),
                    _ => ordering.is_le(),
                }
            },
        }
    }

    /// Evaluates the filter against a log record
    pub fn matches_log(&self, entry: &LogEntry) -> bool {
        match self.field.as_str() {
            fields::LOG_MESSAGE => self.apply(Some(&entry.message())),
            fields::LOG_CATEGORY => self.apply(Some(&entry.scope.name)),
            fields::TRACE_ID => self.apply(entry.trace_id.map(|id| id.to_hex()).as_deref()),
            fields::SPAN_ID => self.apply(entry.span_id.map(|id| id.to_hex()).as_deref()),
            fields::RESOURCE_NAME => self.apply(Some(&entry.resource_key().name)),
            fields::LOG_SEVERITY => self.matches_severity(entry.severity_number),
            key => self.apply_attribute(&entry.attributes, key),
        }
    }

    /// Severity filters accept numbers or labels such as `warn`
    fn matches_severity(&self, severity_number: i32) -> bool {
        let expected = LogSeverity::from_label(&self.value)
            .map(LogSeverity::as_number)
            .map(|n| n.to_string())
            .unwrap_or_else(|| self.value.clone());
        let filter = TelemetryFilter {
            value: expected,
            ..self.clone()
        };
        let actual = match self.condition {
            // Equality on a label means "same band"
            FilterCondition::Equals | FilterCondition::NotEqual
                if LogSeverity::from_label(&self.value).is_some() =>
            {
                LogSeverity::from_otlp(severity_number).as_number()
            },
            _ => severity_number,
        };
        filter.apply(Some(&actual.to_string()))
    }

    /// Evaluates the filter against a span
    pub fn matches_span(&self, span: &Span) -> bool {
        match self.field.as_str() {
            fields::SPAN_NAME => self.apply(Some(&span.name)),
            fields::SPAN_KIND => self.apply(Some(span.kind.as_str())),
            fields::SPAN_STATUS => self.apply(Some(span.status.as_str())),
            fields::TRACE_ID => self.apply(Some(&span.trace_id.to_hex())),
            fields::SPAN_ID => self.apply(Some(&span.span_id.to_hex())),
            fields::RESOURCE_NAME => self.apply(Some(&span.resource_key().name)),
            key => self.apply_attribute(&span.attributes, key),
        }
    }

    fn apply_attribute(&self, attributes: &[KeyValue], key: &str) -> bool {
        self.apply(find_attribute(attributes, key).map(ToString::to_string).as_deref())
    }
}

/// Returns true if the entry satisfies every enabled filter
pub fn log_matches(entry: &LogEntry, filters: &[TelemetryFilter]) -> bool {
    filters
        .iter()
        .filter(|f| f.enabled)
        .all(|f| f.matches_log(entry))
}

/// Returns true if some span satisfies every enabled filter
pub fn trace_matches_filters(trace: &Trace, filters: &[TelemetryFilter]) -> bool {
    let active: Vec<&TelemetryFilter> = filters.iter().filter(|f| f.enabled).collect();
    if active.is_empty() {
        return true;
    }
    trace
        .spans()
        .iter()
        .any(|span| active.iter().all(|f| f.matches_span(span)))
}

/// Case-insensitive match of free text against a trace's display fields
pub fn trace_matches_text(trace: &Trace, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return true;
    }
    let needle = text.to_lowercase();
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    contains(&trace.full_name())
        || trace.spans().iter().any(|span| {
            contains(&span.name)
                || contains(&span.resource_key().name)
                || span.attributes.iter().any(|kv| contains(&kv.value.to_string()))
        })
}

/// Parameters of a log page request
#[derive(Debug, Clone, Default)]
pub struct GetLogsContext {
    /// `None` selects every resource
    pub resource: Option<ResourceKey>,
    pub start_index: usize,
    pub count: usize,
    pub filters: Vec<TelemetryFilter>,
    pub cancellation: Option<CancellationToken>,
}

/// Parameters of a trace page request
#[derive(Debug, Clone, Default)]
pub struct GetTracesContext {
    /// `None` selects every resource
    pub resource: Option<ResourceKey>,
    pub start_index: usize,
    pub count: usize,
    pub filter_text: String,
    pub filters: Vec<TelemetryFilter>,
    pub cancellation: Option<CancellationToken>,
}

/// Parameters of an instrument data request
#[derive(Debug, Clone)]
pub struct GetInstrumentContext {
    pub resource: ResourceKey,
    pub meter_name: String,
    pub instrument_name: String,
    pub start_time_unix_nano: Option<u64>,
    pub end_time_unix_nano: Option<u64>,
    pub cancellation: Option<CancellationToken>,
}

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Number of matching items across all pages
    pub total_count: usize,
    /// The underlying store is at capacity and evicting
    pub is_full: bool,
}

impl<T> PagedResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            is_full: false,
        }
    }
}

/// Trace page plus the longest matching trace duration, used to scale the
/// waterfall timeline
#[derive(Debug, Clone)]
pub struct TracesResult {
    pub page: PagedResult<Trace>,
    pub max_duration: Duration,
}
