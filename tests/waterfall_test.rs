//! Trace waterfall tests against ingested OTLP data.

use pretty_assertions::assert_eq;
use telemetry_repository::core::{SpanId, Trace, TraceId};
use telemetry_repository::resource::Resource;
use telemetry_repository::waterfall::{
    build_waterfall, filter_waterfall, get_ordered_applications, NoPeerResolver,
    StaticPeerResolver, Waterfall,
};
use telemetry_repository::{AddContext, TelemetryRepository};

mod common;
use common::*;

fn app_name(resource: &Resource) -> String {
    resource.key().name.clone()
}

fn load(repo: &TelemetryRepository, n: u8) -> Trace {
    repo.get_trace(TraceId::from_bytes(&trace_id(n)).unwrap()).unwrap()
}

fn last_byte(waterfall: &Waterfall, index: usize) -> u8 {
    waterfall.node(index).span.span_id.as_bytes()[7]
}

/// frontend(1) calls app1(2), which calls app2(3); app2's clock runs early
fn skewed_repository() -> TelemetryRepository {
    let repo = repository();
    let mut ctx = AddContext::new();

    // Child batches arrive before their parents
    repo.add_traces(
        &mut ctx,
        &[resource_spans(
            "app2",
            Some("b"),
            vec![TestSpanBuilder::new(1, 3).parent(2).start(500).name("SELECT orders").build()],
        )],
    );
    repo.add_traces(
        &mut ctx,
        &[resource_spans(
            "app1",
            Some("a"),
            vec![TestSpanBuilder::new(1, 2).parent(1).start(2_000).name("GET /orders").build()],
        )],
    );
    repo.add_traces(
        &mut ctx,
        &[resource_spans(
            "frontend",
            Some("f"),
            vec![
                TestSpanBuilder::new(1, 1).start(1_000).name("page load").build(),
                TestSpanBuilder::new(1, 4).parent(1).start(3_000).name("render").build(),
            ],
        )],
    );
    assert_eq!(ctx.failure_count, 0);
    repo
}

#[test]
fn test_ordered_applications_ignore_clock_skew() {
    let repo = skewed_repository();
    let names: Vec<String> = get_ordered_applications(&load(&repo, 1))
        .iter()
        .map(|r| app_name(r))
        .collect();
    assert_eq!(names, vec!["frontend", "app1", "app2"]);
}

#[test]
fn test_depth_first_order_and_depths() {
    let repo = skewed_repository();
    let waterfall = build_waterfall(&load(&repo, 1));

    let order: Vec<(u8, usize)> = waterfall
        .depth_first()
        .iter()
        .map(|&i| (last_byte(&waterfall, i), waterfall.node(i).depth))
        .collect();
    assert_eq!(order, vec![(1, 0), (2, 1), (3, 2), (4, 1)]);
    assert_eq!(waterfall.roots().len(), 1);
}

#[test]
fn test_orphans_are_roots() {
    let repo = repository();
    let mut ctx = AddContext::new();
    repo.add_traces(
        &mut ctx,
        &[resource_spans(
            "api",
            Some("1"),
            vec![
                TestSpanBuilder::new(2, 1).parent(9).start(200).build(),
                TestSpanBuilder::new(2, 2).start(100).build(),
            ],
        )],
    );

    let waterfall = build_waterfall(&load(&repo, 2));
    let roots: Vec<u8> = waterfall.roots().iter().map(|&i| last_byte(&waterfall, i)).collect();
    assert_eq!(roots, vec![2, 1]);
}

#[test]
fn test_filter_propagation() {
    let repo = skewed_repository();
    let waterfall = build_waterfall(&load(&repo, 1));
    let visible = |text: &str| -> Vec<u8> {
        let mut ids: Vec<u8> = filter_waterfall(&waterfall, text, &app_name, &NoPeerResolver)
            .into_iter()
            .map(|i| last_byte(&waterfall, i))
            .collect();
        ids.sort_unstable();
        ids
    };

    // Direct match on app1 keeps its subtree and its ancestor, not the sibling
    assert_eq!(visible("APP1"), vec![1, 2, 3]);
    // Match deep in the tree shows only the path down to it
    assert_eq!(visible("select"), vec![1, 2, 3]);
    assert_eq!(visible("render"), vec![1, 4]);
    // Root match shows everything
    assert_eq!(visible("frontend"), vec![1, 2, 3, 4]);
    assert_eq!(visible("missing"), Vec::<u8>::new());
}

#[test]
fn test_filter_by_span_id() {
    let repo = skewed_repository();
    let waterfall = build_waterfall(&load(&repo, 1));
    let target = SpanId::from_bytes(&span_id(4)).unwrap().to_hex();

    let visible = filter_waterfall(&waterfall, &target, &app_name, &NoPeerResolver);
    assert_eq!(visible.len(), 2);
}

#[test]
fn test_filter_by_resolved_peer() {
    let repo = repository();
    let mut ctx = AddContext::new();
    repo.add_traces(
        &mut ctx,
        &[resource_spans(
            "api",
            Some("1"),
            vec![
                TestSpanBuilder::new(3, 1).start(100).build(),
                TestSpanBuilder::new(3, 2)
                    .parent(1)
                    .start(200)
                    .attribute("peer.service", "payments-db")
                    .build(),
            ],
        )],
    );

    let waterfall = build_waterfall(&load(&repo, 3));
    let resolver = StaticPeerResolver::new().with_peer("payments-db", "Postgres");
    assert_eq!(filter_waterfall(&waterfall, "postgres", &app_name, &resolver).len(), 2);
    assert!(filter_waterfall(&waterfall, "postgres", &app_name, &NoPeerResolver).is_empty());
}
