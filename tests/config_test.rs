//! Configuration system tests.

use clap::Parser;
use telemetry_repository::cli::Cli;
use telemetry_repository::core::{Config, ConfigBuilder, LogLevel};
use telemetry_repository::query::GetLogsContext;
use telemetry_repository::{AddContext, RepositoryError, TelemetryRepository};

mod common;
use common::*;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.storage.max_traces, 10_000);
    assert_eq!(config.storage.max_logs_per_resource, 10_000);
    assert_eq!(config.storage.max_metric_points, 1_000);
    assert_eq!(config.query.max_page_size, 10_000);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_full_yaml_config() {
    let yaml = r#"
storage:
  max_traces: 2000
  max_logs_per_resource: 500
  max_metric_points: 50
  max_attribute_count: 16
  max_attribute_length: 256
  max_span_events: 10
query:
  max_page_size: 200
logging:
  level: warn
  file: /tmp/telemetry-repo.log
  structured: true
"#;

    let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

    assert_eq!(config.storage.max_traces, 2000);
    assert_eq!(config.storage.max_logs_per_resource, 500);
    assert_eq!(config.storage.max_metric_points, 50);
    assert_eq!(config.storage.max_attribute_count, 16);
    assert_eq!(config.storage.max_attribute_length, Some(256));
    assert_eq!(config.storage.max_span_events, 10);
    assert_eq!(config.query.max_page_size, 200);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(
        config.logging.file.as_deref(),
        Some(std::path::Path::new("/tmp/telemetry-repo.log"))
    );
    assert!(config.logging.structured);
}

#[test]
fn test_error_handling() {
    let result = ConfigBuilder::new().from_yaml("invalid: yaml: content: [");
    assert!(matches!(result, Err(RepositoryError::Config(_))));

    let result = ConfigBuilder::new().from_yaml("storage:\n  max_traces: many\n");
    assert!(result.is_err());

    let result = ConfigBuilder::new().from_yaml("storage:\n  max_attribute_length: long\n");
    assert!(result.is_err());

    // Parses, but fails validation
    let result = ConfigBuilder::new()
        .from_yaml("query:\n  max_page_size: 0\n")
        .unwrap()
        .build();
    assert!(matches!(result, Err(RepositoryError::Config(_))));
}

#[test]
fn test_repository_applies_limits() {
    let config = ConfigBuilder::new()
        .max_logs_per_resource(3)
        .max_page_size(2)
        .build()
        .unwrap();
    let repo = TelemetryRepository::new(config).unwrap();

    let mut ctx = AddContext::new();
    let records = (1..=5).map(|t| log_record(t, 9, "entry")).collect();
    repo.add_logs(&mut ctx, &[resource_logs("api", Some("1"), records)]);

    let page = repo
        .get_logs(&GetLogsContext {
            count: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total_count, 3);
    assert!(page.is_full);

    let oversized = repo.get_logs(&GetLogsContext {
        count: 3,
        ..Default::default()
    });
    assert!(matches!(oversized, Err(RepositoryError::InvalidQuery(_))));
}

#[test]
fn test_attribute_limits_truncate() {
    let config = ConfigBuilder::new()
        .max_attribute_count(1)
        .max_attribute_length(4)
        .build()
        .unwrap();
    let repo = TelemetryRepository::new(config).unwrap();

    let mut ctx = AddContext::new();
    let span = TestSpanBuilder::new(1, 1)
        .attribute("http.route", "/orders/42")
        .attribute("http.method", "GET")
        .build();
    repo.add_traces(&mut ctx, &[resource_spans("api", Some("1"), vec![span])]);

    let trace_id = telemetry_repository::core::TraceId::from_bytes(&trace_id(1)).unwrap();
    let trace = repo.get_trace(trace_id).unwrap();
    let attributes = &trace.spans()[0].attributes;
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].value.to_string(), "/ord");
}

#[tokio::test]
async fn test_cli_loads_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "storage:\n  max_traces: 42\n").unwrap();

    let cli = Cli::try_parse_from([
        "telemetry-repo",
        "--config",
        path.to_str().unwrap(),
        "--debug",
        "check-config",
    ])
    .unwrap();
    let config = cli.load_config().await.unwrap();

    assert_eq!(config.storage.max_traces, 42);
    assert!(config.debug);
}

#[tokio::test]
async fn test_cli_rejects_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "storage:\n  max_metric_points: 0\n").unwrap();

    let cli = Cli::try_parse_from(["telemetry-repo", "-c", path.to_str().unwrap(), "check-config"])
        .unwrap();
    assert!(matches!(cli.load_config().await, Err(RepositoryError::Config(_))));
}
