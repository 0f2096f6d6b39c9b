//! Export/import codec tests.

use pretty_assertions::assert_eq;
use opentelemetry_proto::tonic::common::v1::{any_value::Value, AnyValue, KeyValue};
use std::io::{Cursor, Read, Write};
use telemetry_repository::core::{AttributeValue, SpanId, Trace, TraceId};
use telemetry_repository::export::{
    export_archive, export_logs, export_metrics, export_traces, import_bytes, import_file,
    to_json, TelemetryDocument,
};
use telemetry_repository::query::GetLogsContext;
use telemetry_repository::{AddContext, ResourceKey, TelemetryRepository};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

mod common;
use common::*;

/// A repository holding one trace, two correlated logs and a gauge for `api`
fn populated() -> TelemetryRepository {
    let repo = repository();
    let mut ctx = AddContext::new();

    repo.add_traces(
        &mut ctx,
        &[resource_spans(
            "api",
            Some("1"),
            vec![
                TestSpanBuilder::new(1, 1).name("GET /").start(1_700_000_000_123_456_789).build(),
                TestSpanBuilder::new(1, 2)
                    .parent(1)
                    .name("render")
                    .start(1_700_000_000_123_456_800)
                    .attribute("http.route", "/")
                    .build(),
            ],
        )],
    );

    let mut warn = log_record(1_700_000_000_000_000_001, 14, "cache miss");
    warn.trace_id = trace_id(1);
    warn.span_id = span_id(2);
    let started = log_record(1_700_000_000_000_000_000, 11, "started");
    repo.add_logs(&mut ctx, &[resource_logs("api", Some("1"), vec![started, warn])]);

    let depth = gauge("queue.depth", &[(100, 3.0), (200, 4.5)]);
    repo.add_metrics(&mut ctx, &[resource_metrics("api", Some("1"), vec![depth])]);

    assert_eq!(ctx.failure_count, 0);
    repo
}

fn all_logs(repo: &TelemetryRepository) -> Vec<(u64, i32, Option<TraceId>, Option<SpanId>)> {
    repo.get_logs(&GetLogsContext {
        count: 100,
        ..Default::default()
    })
    .unwrap()
    .items
    .iter()
    .map(|e| (e.time_unix_nano, e.severity_number, e.trace_id, e.span_id))
    .collect()
}

#[test]
fn test_log_document_shape() {
    let repo = populated();
    let document = export_logs(&repo, &ResourceKey::new("api", "1"));
    let json: serde_json::Value = serde_json::from_str(&to_json(&document).unwrap()).unwrap();

    let record = &json["resourceLogs"][0]["scopeLogs"][0]["logRecords"][1];
    assert_eq!(record["severityNumber"], 14);
    assert_eq!(record["severityText"], "WARN");
    assert_eq!(record["timeUnixNano"], 1_700_000_000_000_000_001u64);
    assert_eq!(record["traceId"], hex::encode(trace_id(1)));
    assert_eq!(record["spanId"], hex::encode(span_id(2)));
    assert_eq!(record["body"], serde_json::json!({"stringValue": "cache miss"}));
    assert_eq!(json["resourceLogs"][0]["scopeLogs"][0]["scope"]["name"], SCOPE);
    assert!(json.get("resourceSpans").is_none());
}

#[test]
fn test_round_trip_preserves_ids_times_and_severity() {
    let source = populated();
    let key = ResourceKey::new("api", "1");

    let mut combined = export_traces(&source, &key);
    combined.resource_logs = export_logs(&source, &key).resource_logs;
    combined.resource_metrics = export_metrics(&source, &key).resource_metrics;
    let json = to_json(&combined).unwrap();

    let target = repository();
    let summary = import_bytes(&target, "api.json", json.as_bytes());
    assert_eq!(summary.files_imported, 1);
    assert_eq!(summary.ctx.failure_count, 0);

    assert_eq!(all_logs(&target), all_logs(&source));

    let trace = TraceId::from_bytes(&trace_id(1)).unwrap();
    let original = source.get_trace(trace).unwrap();
    let imported = target.get_trace(trace).unwrap();
    let spans = |t: &Trace| -> Vec<(SpanId, Option<SpanId>, u64, u64)> {
        t.spans()
            .iter()
            .map(|s| {
                (s.span_id, s.parent_span_id, s.start_time_unix_nano, s.end_time_unix_nano)
            })
            .collect()
    };
    assert_eq!(spans(&imported), spans(&original));

    let reexported: TelemetryDocument = export_metrics(&target, &key);
    assert_eq!(reexported, export_metrics(&source, &key));
}

#[test]
fn test_non_finite_doubles_round_trip() {
    let source = repository();
    let mut ctx = AddContext::new();
    let mut ratio = TestSpanBuilder::new(5, 2).parent(1).name("ratio").start(200).build();
    ratio.attributes.push(KeyValue {
        key: "cache.hit_ratio".to_string(),
        value: Some(AnyValue {
            value: Some(Value::DoubleValue(f64::NAN)),
        }),
    });
    let root = TestSpanBuilder::new(5, 1).name("compute").start(100).build();
    source.add_traces(&mut ctx, &[resource_spans("api", Some("1"), vec![root, ratio])]);
    let peak = gauge("queue.peak", &[(100, f64::INFINITY), (200, f64::NEG_INFINITY)]);
    source.add_metrics(&mut ctx, &[resource_metrics("api", Some("1"), vec![peak])]);
    assert_eq!(ctx.failure_count, 0);

    let key = ResourceKey::new("api", "1");
    let mut document = export_traces(&source, &key);
    document.resource_metrics = export_metrics(&source, &key).resource_metrics;
    let json = to_json(&document).unwrap();
    assert!(json.contains("\"NaN\""));

    let target = repository();
    let summary = import_bytes(&target, "api.json", json.as_bytes());
    assert_eq!(summary.files_imported, 1);
    assert_eq!(summary.files_skipped, 0);
    assert_eq!(target.stats().spans, 2);
    assert_eq!(export_metrics(&target, &key), export_metrics(&source, &key));

    let trace = target.get_trace(TraceId::from_bytes(&trace_id(5)).unwrap()).unwrap();
    let ratio = trace.spans().iter().find(|s| s.name == "ratio").unwrap();
    assert!(matches!(ratio.attributes[0].value, AttributeValue::Double(v) if v.is_nan()));
}

#[test]
fn test_severity_numbers_survive_exactly() {
    let repo = repository();
    let mut ctx = AddContext::new();
    let records = [1, 4, 11, 15, 18, 24]
        .iter()
        .enumerate()
        .map(|(i, &severity)| log_record(i as u64 + 1, severity, "x"))
        .collect();
    repo.add_logs(&mut ctx, &[resource_logs("api", Some("1"), records)]);

    let json = to_json(&export_logs(&repo, &ResourceKey::new("api", "1"))).unwrap();
    let target = repository();
    import_bytes(&target, "logs.json", json.as_bytes());

    let severities: Vec<i32> = all_logs(&target).into_iter().map(|(_, s, _, _)| s).collect();
    assert_eq!(severities, vec![1, 4, 11, 15, 18, 24]);
}

#[test]
fn test_archive_layout_and_import() {
    let repo = populated();
    let mut ctx = AddContext::new();
    repo.add_logs(&mut ctx, &[resource_logs("worker", Some("w"), vec![log_record(1, 9, "tick")])]);

    let mut buffer = Cursor::new(Vec::new());
    export_archive(&repo, &mut buffer).unwrap();
    let bytes = buffer.into_inner();

    let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "metrics/api.json",
            "structuredlogs/api.json",
            "structuredlogs/worker.json",
            "traces/api.json",
        ]
    );

    let mut contents = String::new();
    archive
        .by_name("structuredlogs/worker.json")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert!(contents.contains("\"resourceLogs\""));

    let target = repository();
    let summary = import_bytes(&target, "export.zip", &bytes);
    assert_eq!(summary.files_imported, 4);
    assert_eq!(summary.files_skipped, 0);
    assert_eq!(target.stats().logs, 3);
    assert_eq!(target.stats().spans, 2);
}

#[test]
fn test_archive_names_colliding_after_sanitizing_are_kept_apart() {
    let repo = repository();
    let mut ctx = AddContext::new();
    for name in ["my service", "my/service"] {
        repo.add_logs(&mut ctx, &[resource_logs(name, Some("1"), vec![log_record(1, 9, name)])]);
    }

    let mut buffer = Cursor::new(Vec::new());
    export_archive(&repo, &mut buffer).unwrap();
    let bytes = buffer.into_inner();

    let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["structuredlogs/my_service-2.json", "structuredlogs/my_service.json"]);

    let target = repository();
    let summary = import_bytes(&target, "export.zip", &bytes);
    assert_eq!(summary.files_imported, 2);
    assert_eq!(target.stats().logs, 2);
}

#[test]
fn test_bad_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, contents: &[u8]| {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    };

    let good = to_json(&export_logs(&populated(), &ResourceKey::new("api", "1"))).unwrap();
    let paths = [
        write("good.json", good.as_bytes()),
        write("empty.json", b""),
        write("broken.json", b"{\"resourceLogs\": ["),
        write("notes.txt", b"{}"),
        write("mystery", b"\x00\x01\x02"),
    ];

    let repo = repository();
    let mut imported = 0;
    let mut skipped = 0;
    for path in &paths {
        let summary = import_file(&repo, path).unwrap();
        imported += summary.files_imported;
        skipped += summary.files_skipped;
    }

    assert_eq!(imported, 1);
    assert_eq!(skipped, 4);
    assert_eq!(repo.stats().logs, 2);
}

#[test]
fn test_bad_archive_entries_do_not_abort_import() {
    let good = to_json(&export_logs(&populated(), &ResourceKey::new("api", "1"))).unwrap();

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        zip.start_file("structuredlogs/broken.json", FileOptions::default()).unwrap();
        zip.write_all(b"not json").unwrap();
        zip.start_file("README.md", FileOptions::default()).unwrap();
        zip.write_all(b"# export").unwrap();
        zip.start_file("structuredlogs/api.json", FileOptions::default()).unwrap();
        zip.write_all(good.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    let repo = repository();
    let summary = import_bytes(&repo, "mixed.zip", &buffer.into_inner());
    assert_eq!(summary.files_imported, 1);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(repo.stats().logs, 2);
}

#[test]
fn test_invalid_items_in_document_are_counted() {
    let json = r#"{
        "resourceSpans": [{
            "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "api"}}]},
            "scopeSpans": [{
                "scope": {"name": "manual"},
                "spans": [
                    {"traceId": "zz", "spanId": "0102030405060708",
                     "startTimeUnixNano": 1, "endTimeUnixNano": 2},
                    {"traceId": "0102030405060708090a0b0c0d0e0f10", "spanId": "0102030405060708",
                     "name": "ok", "startTimeUnixNano": 1, "endTimeUnixNano": 2}
                ]
            }]
        }]
    }"#;

    let repo = repository();
    let summary = import_bytes(&repo, "spans.json", json.as_bytes());
    assert_eq!(summary.files_imported, 1);
    assert_eq!(summary.ctx.success_count, 1);
    assert_eq!(summary.ctx.failure_count, 1);
}

#[test]
fn test_missing_file_is_an_error() {
    let repo = repository();
    assert!(import_file(&repo, std::path::Path::new("/nonexistent/export.zip")).is_err());
}
