//! Column and extra transformers driven through the executor.

mod common;

use chrono::{Duration, FixedOffset};
use common::{create_query_manager, manager_with_runner, options};
use querymeter_engine::{Clock, MetricKind, ServiceCheckStatus, Value};
use querymeter_test_utils::{row, ManualClock, MockRunner, RecordingSink};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

const TAGS: [&str; 3] = ["test:foo", "test:bar", "test:tag1"];

fn single_elapsed_sample(sink: &RecordingSink) -> f64 {
    let samples = sink.metrics();
    assert_eq!(samples.len(), 1, "{:#?}", samples);
    let sample = &samples[0];
    assert_eq!(sample.name, "test.foo");
    assert_eq!(sample.kind, MetricKind::Gauge);
    assert_eq!(sample.tags, TAGS);
    sample.value
}

fn time_elapsed_query(format: Option<&str>) -> JsonValue {
    let mut column = json!({"name": "test.foo", "type": "time_elapsed"});
    if let Some(format) = format {
        column["format"] = json!(format);
    }
    json!({
        "name": "test query",
        "query": "foo",
        "columns": [{"name": "test", "type": "tag"}, column],
        "tags": ["test:bar"],
    })
}

fn run_elapsed(format: Option<&str>, value: impl Fn(&ManualClock) -> Value) -> f64 {
    let clock = Arc::new(ManualClock::fixed());
    let (mut manager, sink) = manager_with_runner(
        time_elapsed_query(format),
        MockRunner::new(vec![vec![Value::from("tag1"), value(&clock)]]),
        options(&["test:foo"]).with_clock(clock.clone()),
    );
    manager.execute(&[]);
    single_elapsed_sample(&sink)
}

// ============================================================================
// COLUMN TRANSFORMERS
// ============================================================================

#[test]
fn test_tag_boolean() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [
                {"name": "affirmative", "type": "tag", "boolean": true},
                {"name": "test.foo", "type": "gauge"},
            ],
            "tags": ["test:bar"],
        }),
        vec![row![1, 5], row![0, 7]],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_metric("test.foo", 5.0, MetricKind::Gauge, &["test:foo", "test:bar", "affirmative:true"]);
    sink.assert_metric("test.foo", 7.0, MetricKind::Gauge, &["test:foo", "test:bar", "affirmative:false"]);
    sink.assert_all_metrics_covered();
}

#[test]
fn test_tag_list() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [
                {"name": "test", "type": "tag"},
                {"name": "foo_tag", "type": "tag_list"},
                {"name": "test.foo", "type": "gauge"},
            ],
            "tags": ["test:bar"],
        }),
        vec![
            row!["tag1", Value::List(vec!["tagA".into(), "tagB".into()]), 5],
            row!["tag2", "tagC, tagD", 7],
            row!["tag3", "tagE,tagF", 9],
        ],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_metric(
        "test.foo",
        5.0,
        MetricKind::Gauge,
        &["test:foo", "test:bar", "test:tag1", "foo_tag:tagA", "foo_tag:tagB"],
    );
    sink.assert_metric(
        "test.foo",
        7.0,
        MetricKind::Gauge,
        &["test:foo", "test:bar", "test:tag2", "foo_tag:tagC", "foo_tag:tagD"],
    );
    sink.assert_metric(
        "test.foo",
        9.0,
        MetricKind::Gauge,
        &["test:foo", "test:bar", "test:tag3", "foo_tag:tagE", "foo_tag:tagF"],
    );
    sink.assert_all_metrics_covered();
}

#[test]
fn test_all_metric_kinds_in_one_row() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [
                {"name": "m.gauge", "type": "gauge"},
                {"name": "m.count", "type": "count"},
                {"name": "m.monotonic_count", "type": "monotonic_count"},
                {"name": "m.rate", "type": "rate"},
                {"name": "m.histogram", "type": "histogram"},
                {"name": "m.historate", "type": "historate"},
                {"name": "animal", "type": "tag"},
                {"name": "label", "type": "tag_list"},
            ],
        }),
        vec![row![1, 1, 1, 1, 1, 1, "dog", Value::List(vec!["t1".into(), "t2".into(), "t3".into()])]],
        &[],
    );
    manager.execute(&[]);

    let tags = ["animal:dog", "label:t1", "label:t2", "label:t3"];
    for kind in MetricKind::ALL {
        sink.assert_metric(&format!("m.{}", kind), 1.0, kind, &tags);
    }
    sink.assert_all_metrics_covered();
}

#[test]
fn test_monotonic_gauge() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [{"name": "test", "type": "tag"}, {"name": "test.foo", "type": "monotonic_gauge"}],
            "tags": ["test:bar"],
        }),
        vec![row!["tag1", 5], row!["tag2", 7]],
        &["test:foo"],
    );
    manager.execute(&[]);

    for (value, tag) in [(5.0, "test:tag1"), (7.0, "test:tag2")] {
        let tags = ["test:foo", "test:bar", tag];
        sink.assert_metric("test.foo.total", value, MetricKind::Gauge, &tags);
        sink.assert_metric("test.foo.count", value, MetricKind::MonotonicCount, &tags);
    }
    sink.assert_all_metrics_covered();
}

#[test]
fn test_temporal_percent() {
    for (scale, value, expected) in [
        (json!("second"), Value::from(5), 500.0),
        (json!(1), Value::from(5), 500.0),
        (json!(1), Value::from("5.2"), 520.0),
        (json!("millisecond"), Value::from(250), 25.0),
    ] {
        let (mut manager, sink) = create_query_manager(
            json!({
                "name": "test query",
                "query": "foo",
                "columns": [
                    {"name": "test", "type": "tag"},
                    {"name": "test.foo", "type": "temporal_percent", "scale": scale},
                ],
                "tags": ["test:bar"],
            }),
            vec![vec![Value::from("tag1"), value]],
            &["test:foo"],
        );
        manager.execute(&[]);

        sink.assert_metric("test.foo", expected, MetricKind::Rate, &TAGS);
        sink.assert_all_metrics_covered();
    }
}

fn match_query() -> JsonValue {
    json!({
        "name": "test query",
        "query": "foo",
        "columns": [
            {
                "name": "columnar",
                "type": "match",
                "items": {
                    "global": {"name": "test.global", "type": "gauge"},
                    "local": {"name": "test.local", "type": "gauge", "source": "test2"},
                },
                "source": "test1",
            },
            {"name": "test1", "type": "source"},
            {"name": "test2", "type": "source"},
        ],
        "tags": ["test:bar"],
    })
}

#[test]
fn test_match_global() {
    let (mut manager, sink) = create_query_manager(match_query(), vec![row!["global", 5, 7]], &["test:foo"]);
    manager.execute(&[]);

    sink.assert_metric("test.global", 5.0, MetricKind::Gauge, &["test:foo", "test:bar"]);
    sink.assert_all_metrics_covered();
}

#[test]
fn test_match_local() {
    let (mut manager, sink) = create_query_manager(match_query(), vec![row!["local", 5, 7]], &["test:foo"]);
    manager.execute(&[]);

    sink.assert_metric("test.local", 7.0, MetricKind::Gauge, &["test:foo", "test:bar"]);
    sink.assert_all_metrics_covered();
}

#[test]
fn test_match_none() {
    let (mut manager, sink) = create_query_manager(match_query(), vec![row!["nonlocal", 5, 7]], &["test:foo"]);
    manager.execute(&[]);

    assert!(sink.metrics().is_empty());
    sink.assert_all_metrics_covered();
}

#[test]
fn test_service_check_known() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [{"name": "test.foo", "type": "service_check", "status_map": {"known": "ok"}}],
            "tags": ["test:bar"],
        }),
        vec![row!["known"]],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_service_check("test.foo", ServiceCheckStatus::Ok, &["test:foo", "test:bar"], None);
    sink.assert_all_metrics_covered();
}

#[test]
fn test_service_check_unknown() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [
                {"name": "test.foo", "type": "service_check", "status_map": {"known": "ok"}, "message": "baz"},
            ],
            "tags": ["test:bar"],
        }),
        vec![row!["unknown"]],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_service_check("test.foo", ServiceCheckStatus::Unknown, &["test:foo", "test:bar"], Some("baz"));
    sink.assert_all_metrics_covered();
}

#[test]
fn test_service_check_unknown_with_message_from_source() {
    let (mut manager, sink) = create_query_manager(
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [
                {"name": "message_source", "type": "source"},
                {
                    "name": "test.foo",
                    "type": "service_check",
                    "status_map": {"known": "ok"},
                    "message": "failed due to {message_source}",
                },
            ],
            "tags": ["test:bar"],
        }),
        vec![row!["crash", "unknown"]],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_service_check(
        "test.foo",
        ServiceCheckStatus::Unknown,
        &["test:foo", "test:bar"],
        Some("failed due to crash"),
    );
    sink.assert_all_metrics_covered();
}

#[test]
fn test_time_elapsed_native() {
    let hour_ago = |clock: &ManualClock| Value::from(clock.now() - Duration::hours(1));
    assert_eq!(run_elapsed(Some("native"), hour_ago), 3600.0);
    assert_eq!(run_elapsed(None, hour_ago), 3600.0);
}

#[test]
fn test_time_elapsed_unix_time() {
    let elapsed = run_elapsed(Some("unix_time"), |clock| {
        Value::Float(clock.now().timestamp() as f64 - 3600.0)
    });
    assert!((elapsed - 3600.0).abs() < 1e-6);
}

#[test]
fn test_time_elapsed_format() {
    let format = "%Y-%m-%dT%H-%M-%S";
    let elapsed = run_elapsed(Some(format), |clock| {
        Value::from((clock.now() - Duration::hours(1)).format(format).to_string())
    });
    assert_eq!(elapsed, 3600.0);
}

#[test]
fn test_time_elapsed_datetime_naive() {
    let elapsed = run_elapsed(Some("native"), |clock| {
        Value::from((clock.now() - Duration::hours(1)).naive_utc())
    });
    assert_eq!(elapsed, 3600.0);
}

#[test]
fn test_time_elapsed_datetime_aware() {
    let elapsed = run_elapsed(Some("native"), |clock| {
        let est = FixedOffset::west_opt(5 * 3600).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Value::from((clock.now() - Duration::hours(1)).with_timezone(&est))
    });
    assert_eq!(elapsed, 3600.0);
}

// ============================================================================
// EXTRA TRANSFORMERS
// ============================================================================

fn extras_query(extras: JsonValue) -> JsonValue {
    json!({
        "name": "test query",
        "query": "foo",
        "columns": [{"name": "test", "type": "tag"}, {"name": "test.foo", "type": "gauge"}],
        "extras": extras,
        "tags": ["test:bar"],
    })
}

#[test]
fn test_expression() {
    for extra in [
        json!({"name": "divide", "type": "expression", "expression": "test.foo / 2", "submit_type": "gauge"}),
        json!({"name": "divide", "expression": "test.foo / 2", "submit_type": "gauge"}),
        json!({"name": "divide", "expression": "SOURCES[\"test.foo\"] / 2", "verbose": true, "submit_type": "gauge"}),
    ] {
        let (mut manager, sink) = create_query_manager(extras_query(json!([extra])), vec![row!["tag1", 5]], &["test:foo"]);
        manager.execute(&[]);

        sink.assert_metric("test.foo", 5.0, MetricKind::Gauge, &TAGS);
        sink.assert_metric("divide", 2.5, MetricKind::Gauge, &TAGS);
        sink.assert_all_metrics_covered();
    }
}

#[test]
fn test_expression_store_source() {
    let (mut manager, sink) = create_query_manager(
        extras_query(json!([
            {"name": "src", "expression": "2 ** 3"},
            {"name": "src.cube", "type": "gauge", "source": "src"},
        ])),
        vec![row!["tag1", 5]],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_metric("test.foo", 5.0, MetricKind::Gauge, &TAGS);
    sink.assert_metric("src.cube", 8.0, MetricKind::Gauge, &TAGS);
    sink.assert_all_metrics_covered();
}

#[test]
fn test_expression_pass_modifiers() {
    let (mut manager, sink) = create_query_manager(
        extras_query(json!([{
            "name": "temp.pct",
            "expression": "test.foo / 2",
            "submit_type": "temporal_percent",
            "scale": "second",
        }])),
        vec![row!["tag1", 10]],
        &["test:foo"],
    );
    manager.execute(&[]);

    sink.assert_metric("test.foo", 10.0, MetricKind::Gauge, &TAGS);
    sink.assert_metric("temp.pct", 500.0, MetricKind::Rate, &TAGS);
    sink.assert_all_metrics_covered();
}

fn percent_query() -> JsonValue {
    json!({
        "name": "test query",
        "query": "foo",
        "columns": [
            {"name": "test", "type": "tag"},
            {"name": "test.part", "type": "gauge"},
            {"name": "test.total", "type": "gauge"},
        ],
        "extras": [{"name": "percent", "type": "percent", "part": "test.part", "total": "test.total"}],
        "tags": ["test:bar"],
    })
}

#[test]
fn test_percent() {
    let (mut manager, sink) = create_query_manager(percent_query(), vec![row!["tag1", 3, 5]], &["test:foo"]);
    manager.execute(&[]);

    sink.assert_metric("test.part", 3.0, MetricKind::Gauge, &TAGS);
    sink.assert_metric("test.total", 5.0, MetricKind::Gauge, &TAGS);
    sink.assert_metric("percent", 60.0, MetricKind::Gauge, &TAGS);
    sink.assert_all_metrics_covered();
}

#[test]
fn test_percent_of_zero_total() {
    let (mut manager, sink) = create_query_manager(percent_query(), vec![row!["tag1", 3, 0]], &["test:foo"]);
    manager.execute(&[]);

    sink.assert_metric("test.part", 3.0, MetricKind::Gauge, &TAGS);
    sink.assert_metric("test.total", 0.0, MetricKind::Gauge, &TAGS);
    assert!(sink.metrics_named("percent").is_empty());
    sink.assert_all_metrics_covered();
}
