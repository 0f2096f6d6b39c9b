//! Export and import of repository contents.
//!
//! A single resource exports to a [`TelemetryDocument`]; the whole
//! repository exports to a zip archive holding one document per resource
//! and signal. Import accepts either form and feeds the contents through
//! the normal ingestion path, so imported data is validated exactly like
//! live data.

pub mod archive;
pub mod document;

pub use archive::{export_archive, import_bytes, import_document, import_file, ImportSummary};
pub use document::TelemetryDocument;

use crate::core::error::Result;
use crate::metrics::InstrumentKey;
use crate::repository::TelemetryRepository;
use crate::resource::{InstrumentationScope, Resource, ResourceKey};
use document::{
    instrument_to_json, log_to_json, resource_to_json, scope_to_json, span_to_json, MetricJson,
    ResourceLogsJson, ResourceMetricsJson, ResourceSpansJson, ScopeLogsJson, ScopeMetricsJson,
    ScopeSpansJson,
};
use std::sync::Arc;

/// Items of one resource, bucketed by scope in first-seen order
struct ResourceGroup<T> {
    resource: Arc<Resource>,
    scopes: Vec<(Arc<InstrumentationScope>, Vec<T>)>,
}

fn group_by_resource_and_scope<T>(
    items: impl IntoIterator<Item = (Arc<Resource>, Arc<InstrumentationScope>, T)>,
) -> Vec<ResourceGroup<T>> {
    let mut groups: Vec<ResourceGroup<T>> = Vec::new();
    for (resource, scope, item) in items {
        let index = match groups.iter().position(|g| g.resource.key() == resource.key()) {
            Some(index) => index,
            None => {
                groups.push(ResourceGroup {
                    resource,
                    scopes: Vec::new(),
                });
                groups.len() - 1
            },
        };
        let scopes = &mut groups[index].scopes;
        match scopes.iter_mut().find(|(s, _)| Arc::ptr_eq(s, &scope)) {
            Some((_, bucket)) => bucket.push(item),
            None => scopes.push((scope, vec![item])),
        }
    }
    groups
}

/// Logs of the resources selected by `key`
pub fn export_logs(repo: &TelemetryRepository, key: &ResourceKey) -> TelemetryDocument {
    let snapshot = repo.snapshot_logs(Some(key));
    let items = snapshot.iter().map(|entry| {
        (
            Arc::clone(&entry.resource),
            Arc::clone(&entry.scope),
            log_to_json(entry),
        )
    });

    let resource_logs = group_by_resource_and_scope(items)
        .into_iter()
        .map(|group| ResourceLogsJson {
            resource: resource_to_json(&group.resource),
            scope_logs: group
                .scopes
                .into_iter()
                .map(|(scope, log_records)| ScopeLogsJson {
                    scope: scope_to_json(&scope),
                    log_records,
                })
                .collect(),
        })
        .collect();

    TelemetryDocument {
        resource_logs,
        ..Default::default()
    }
}

/// Spans emitted by the resources selected by `key`
pub fn export_traces(repo: &TelemetryRepository, key: &ResourceKey) -> TelemetryDocument {
    let items = repo.spans_for_resource(key).into_iter().map(|span| {
        (
            Arc::clone(&span.resource),
            Arc::clone(&span.scope),
            span_to_json(&span),
        )
    });

    let resource_spans = group_by_resource_and_scope(items)
        .into_iter()
        .map(|group| ResourceSpansJson {
            resource: resource_to_json(&group.resource),
            scope_spans: group
                .scopes
                .into_iter()
                .map(|(scope, spans)| ScopeSpansJson {
                    scope: scope_to_json(&scope),
                    spans,
                })
                .collect(),
        })
        .collect();

    TelemetryDocument {
        resource_spans,
        ..Default::default()
    }
}

/// Every retained metric point of the resources selected by `key`
pub fn export_metrics(repo: &TelemetryRepository, key: &ResourceKey) -> TelemetryDocument {
    let mut resource_metrics = Vec::new();

    for resource in repo.matching_resources(key) {
        let mut items: Vec<(Arc<Resource>, Arc<InstrumentationScope>, MetricJson)> = Vec::new();
        for summary in repo.get_instruments(resource.key()) {
            let instrument = InstrumentKey {
                meter_name: summary.scope.name.clone(),
                instrument_name: summary.name.clone(),
            };
            if let Some(data) = repo.metric_data(resource.key(), &instrument) {
                items.push((
                    Arc::clone(&resource),
                    Arc::clone(&summary.scope),
                    instrument_to_json(&data),
                ));
            }
        }

        resource_metrics.extend(group_by_resource_and_scope(items).into_iter().map(|group| {
            ResourceMetricsJson {
                resource: resource_to_json(&group.resource),
                scope_metrics: group
                    .scopes
                    .into_iter()
                    .map(|(scope, metrics)| ScopeMetricsJson {
                        scope: scope_to_json(&scope),
                        metrics,
                    })
                    .collect(),
            }
        }));
    }

    TelemetryDocument {
        resource_metrics,
        ..Default::default()
    }
}

/// Pretty-printed JSON for a document
pub fn to_json(document: &TelemetryDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}
