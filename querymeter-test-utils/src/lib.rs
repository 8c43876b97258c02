//! querymeter Test Utilities
//!
//! Shared test infrastructure for the querymeter workspace:
//! - `RecordingSink`, a metrics sink that records submissions and asserts on them
//! - Mock query runners
//! - `ManualClock` for collection-interval tests
//! - `LogCapture` for asserting on log lines
//! - Proptest generators and query-definition fixtures

pub use querymeter_core::{
    Clock, MetricKind, MetricSink, QueryError, QueryRunner, Row, RowStream, ServiceCheckStatus,
    Timestamp, Value,
};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sorted(tags: &[impl AsRef<str>]) -> Vec<String> {
    let mut tags: Vec<String> = tags.iter().map(|t| t.as_ref().to_string()).collect();
    tags.sort();
    tags
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ============================================================================
// RECORDING SINK
// ============================================================================

/// One recorded metric submission.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
    pub hostname: Option<String>,
}

/// One recorded service check.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCheckSample {
    pub name: String,
    pub status: ServiceCheckStatus,
    pub tags: Vec<String>,
    pub hostname: Option<String>,
    pub message: Option<String>,
}

/// One recorded metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSample {
    pub entity: String,
    pub name: String,
    pub value: String,
}

/// Metrics sink that keeps everything it receives.
///
/// Tags are compared as sets. `count` submissions sharing name, tags and
/// hostname are summed before comparison, the way an aggregator flushes
/// them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    metrics: Mutex<Vec<MetricSample>>,
    service_checks: Mutex<Vec<ServiceCheckSample>>,
    metadata: Mutex<Vec<MetadataSample>>,
    asserted: Mutex<HashSet<usize>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> Vec<MetricSample> {
        lock(&self.metrics).clone()
    }

    /// Samples recorded under `name`.
    pub fn metrics_named(&self, name: &str) -> Vec<MetricSample> {
        lock(&self.metrics)
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn service_checks(&self) -> Vec<ServiceCheckSample> {
        lock(&self.service_checks).clone()
    }

    pub fn metadata(&self) -> Vec<MetadataSample> {
        lock(&self.metadata).clone()
    }

    pub fn reset(&self) {
        lock(&self.metrics).clear();
        lock(&self.service_checks).clear();
        lock(&self.metadata).clear();
        lock(&self.asserted).clear();
    }

    #[track_caller]
    pub fn assert_metric(&self, name: &str, value: f64, kind: MetricKind, tags: &[&str]) {
        self.assert_metric_inner(name, value, kind, tags, None, false);
    }

    #[track_caller]
    pub fn assert_metric_with_hostname(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        tags: &[&str],
        hostname: Option<&str>,
    ) {
        self.assert_metric_inner(name, value, kind, tags, hostname, true);
    }

    #[track_caller]
    fn assert_metric_inner(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        tags: &[&str],
        hostname: Option<&str>,
        check_hostname: bool,
    ) {
        let expected_tags = sorted(tags);
        let metrics = lock(&self.metrics);
        let candidates: Vec<usize> = metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                m.name == name
                    && m.kind == kind
                    && sorted(&m.tags) == expected_tags
                    && (!check_hostname || m.hostname.as_deref() == hostname)
            })
            .map(|(i, _)| i)
            .collect();

        let matched: Vec<usize> = if kind == MetricKind::Count {
            // aggregate per hostname
            let mut groups: HashMap<Option<&str>, (f64, Vec<usize>)> = HashMap::new();
            for &i in &candidates {
                let entry = groups
                    .entry(metrics[i].hostname.as_deref())
                    .or_insert((0.0, Vec::new()));
                entry.0 += metrics[i].value;
                entry.1.push(i);
            }
            groups
                .into_values()
                .find(|(sum, _)| close(*sum, value))
                .map(|(_, indices)| indices)
                .unwrap_or_default()
        } else {
            candidates
                .iter()
                .copied()
                .filter(|&i| close(metrics[i].value, value))
                .collect()
        };

        if matched.is_empty() {
            panic!(
                "Needed metric {} {} = {} with tags {:?}, got: {:#?}",
                kind,
                name,
                value,
                expected_tags,
                metrics.iter().filter(|m| m.name == name).collect::<Vec<_>>()
            );
        }
        lock(&self.asserted).extend(matched);
    }

    /// Every recorded metric was matched by some `assert_metric*` call.
    #[track_caller]
    pub fn assert_all_metrics_covered(&self) {
        let metrics = lock(&self.metrics);
        let asserted = lock(&self.asserted);
        let missing: Vec<&MetricSample> = metrics
            .iter()
            .enumerate()
            .filter(|(i, _)| !asserted.contains(i))
            .map(|(_, m)| m)
            .collect();
        assert!(missing.is_empty(), "Metrics not asserted: {:#?}", missing);
    }

    #[track_caller]
    pub fn assert_service_check(
        &self,
        name: &str,
        status: ServiceCheckStatus,
        tags: &[&str],
        message: Option<&str>,
    ) {
        let expected_tags = sorted(tags);
        let checks = lock(&self.service_checks);
        let found = checks.iter().any(|c| {
            c.name == name
                && c.status == status
                && sorted(&c.tags) == expected_tags
                && c.message.as_deref() == message
        });
        assert!(
            found,
            "Needed service check {} {:?} with tags {:?} and message {:?}, got: {:#?}",
            name, status, expected_tags, message, *checks
        );
    }

    #[track_caller]
    pub fn assert_metadata(&self, entity: &str, entries: &[(&str, &str)]) {
        let metadata = lock(&self.metadata);
        for (name, value) in entries {
            let found = metadata
                .iter()
                .any(|m| m.entity == entity && m.name == *name && m.value == *value);
            assert!(
                found,
                "Needed metadata {} = {} for {}, got: {:#?}",
                name, value, entity, *metadata
            );
        }
    }

    #[track_caller]
    pub fn assert_metadata_count(&self, count: usize) {
        let recorded = lock(&self.metadata).len();
        assert_eq!(recorded, count, "Unexpected number of metadata entries");
    }
}

impl MetricSink for RecordingSink {
    fn submit_metric(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        tags: &[String],
        hostname: Option<&str>,
    ) {
        lock(&self.metrics).push(MetricSample {
            kind,
            name: name.to_string(),
            value,
            tags: tags.to_vec(),
            hostname: hostname.map(str::to_string),
        });
    }

    fn submit_service_check(
        &self,
        name: &str,
        status: ServiceCheckStatus,
        tags: &[String],
        hostname: Option<&str>,
        message: Option<&str>,
    ) {
        lock(&self.service_checks).push(ServiceCheckSample {
            name: name.to_string(),
            status,
            tags: tags.to_vec(),
            hostname: hostname.map(str::to_string),
            message: message.map(str::to_string),
        });
    }

    fn submit_metadata(&self, entity: &str, name: &str, value: &str) {
        lock(&self.metadata).push(MetadataSample {
            entity: entity.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
    }
}

// ============================================================================
// MOCK RUNNERS
// ============================================================================

/// Runner returning canned rows.
///
/// Rows registered for a specific query string win over the default rows.
#[derive(Debug, Default)]
pub struct MockRunner {
    default_rows: Vec<Row>,
    by_query: HashMap<String, Vec<Row>>,
    calls: Mutex<Vec<JsonValue>>,
}

impl MockRunner {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            default_rows: rows,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>, rows: Vec<Row>) -> Self {
        self.by_query.insert(query.into(), rows);
        self
    }

    /// Query values seen so far, in call order.
    pub fn calls(&self) -> Vec<JsonValue> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl QueryRunner for MockRunner {
    fn run<'a>(&'a self, query: &JsonValue) -> Result<RowStream<'a>, QueryError> {
        lock(&self.calls).push(query.clone());
        let rows = query
            .as_str()
            .and_then(|q| self.by_query.get(q))
            .unwrap_or(&self.default_rows);
        Ok(Box::new(rows.iter().cloned().map(Ok)))
    }
}

/// Runner that fails, either immediately or after yielding some rows.
#[derive(Debug, Clone)]
pub struct FailingRunner {
    message: String,
    rows_before_failure: Option<Vec<Row>>,
}

impl FailingRunner {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rows_before_failure: None,
        }
    }

    /// Yield `rows`, then fail while iterating.
    pub fn mid_stream(rows: Vec<Row>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rows_before_failure: Some(rows),
        }
    }
}

impl QueryRunner for FailingRunner {
    fn run<'a>(&'a self, _query: &JsonValue) -> Result<RowStream<'a>, QueryError> {
        match &self.rows_before_failure {
            None => Err(QueryError::new(self.message.clone())),
            Some(rows) => {
                let failure = std::iter::once(Err(QueryError::new(self.message.clone())));
                Ok(Box::new(rows.iter().cloned().map(Ok).chain(failure)))
            }
        }
    }
}

/// Build a row from anything convertible to [`Value`].
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::Value::from($value)),*]
    };
}

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// A clock starting at a fixed, arbitrary instant.
    pub fn fixed() -> Self {
        Self::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_else(Utc::now))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn advance_millis(&self, millis: i64) {
        self.advance(Duration::milliseconds(millis));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

// ============================================================================
// LOG CAPTURE
// ============================================================================

/// Collects formatted log lines (`LEVEL message`) written while a closure
/// runs under [`LogCapture::capture`].
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

/// Writer handed to the fmt layer.
#[derive(Debug, Clone)]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.buffer).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a subscriber that records every level into this capture.
    pub fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::TRACE)
            .without_time()
            .with_ansi(false)
            .with_target(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&lock(&self.buffer))
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// `(level, message)` pairs.
    pub fn records(&self) -> Vec<(tracing::Level, String)> {
        self.lines()
            .iter()
            .filter_map(|line| {
                let (level, message) = line.trim_start().split_once(' ')?;
                let level = level.parse::<tracing::Level>().ok()?;
                Some((level, message.to_string()))
            })
            .collect()
    }

    /// Number of records at `level` whose message equals `message`.
    pub fn count(&self, level: tracing::Level, message: &str) -> usize {
        self.records()
            .iter()
            .filter(|(l, m)| *l == level && m == message)
            .count()
    }

    /// Number of records at `level` whose message starts with `prefix`.
    pub fn count_starting_with(&self, level: tracing::Level, prefix: &str) -> usize {
        self.records()
            .iter()
            .filter(|(l, m)| *l == level && m.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        lock(&self.buffer).clear();
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for row values and tags.

    use super::*;
    use proptest::prelude::*;

    /// Metric-safe names such as `db.rows_fetched`.
    pub fn arb_metric_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}(\\.[a-z][a-z0-9_]{0,8}){0,2}"
    }

    /// `key:value` tags.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        ("[a-z]{1,6}", "[a-z0-9]{1,6}").prop_map(|(k, v)| format!("{}:{}", k, v))
    }

    pub fn arb_tags() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_tag(), 0..6)
    }

    /// Values a driver could return for a numeric column.
    pub fn arb_numeric_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            (-1_000_000i64..1_000_000).prop_map(Value::Int),
            (-1e6f64..1e6).prop_map(Value::Float),
            (-1_000_000i64..1_000_000).prop_map(|i| Value::Str(i.to_string())),
        ]
    }

    /// Scalar row values of any type.
    pub fn arb_scalar_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1e9f64..1e9).prop_map(Value::Float),
            "[a-zA-Z0-9 ,]{0,12}".prop_map(Value::Str),
        ]
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Query definitions shared by tests.

    use serde_json::{json, Value as JsonValue};

    /// `level` tag, an ignored position, and a metric of `kind`.
    pub fn basic_query(kind: &str) -> JsonValue {
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [{"name": "level", "type": "tag"}, null, {"name": "test.foo", "type": kind}],
            "tags": ["test:bar"],
        })
    }

    /// A count column aggregated per `tag`.
    pub fn aggregation_query() -> JsonValue {
        json!({
            "name": "test query",
            "query": "foo",
            "columns": [{"name": "test.foo", "type": "count"}, {"name": "tag", "type": "tag"}],
            "tags": ["test:bar"],
        })
    }

    /// `basic_query` with a collection interval.
    pub fn throttled_query(seconds: f64) -> JsonValue {
        let mut query = basic_query("gauge");
        query["collection_interval"] = json!(seconds);
        query
    }
}
