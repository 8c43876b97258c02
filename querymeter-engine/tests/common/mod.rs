//! Shared setup for engine integration tests.
#![allow(dead_code)]

use querymeter_engine::{ExecutorOptions, InitConfig, InstanceConfig, QueryManager};
use querymeter_test_utils::{MockRunner, QueryRunner, RecordingSink, Row};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const CHECK_ID: &str = "test:instance";

/// Options carrying `tags` and the test check id.
pub fn options(tags: &[&str]) -> ExecutorOptions {
    ExecutorOptions::new()
        .with_tags(tags.iter().copied())
        .with_check_id(CHECK_ID)
}

/// A compiled manager running `query` against `runner`.
pub fn manager_with_runner(
    query: JsonValue,
    runner: impl QueryRunner + 'static,
    options: ExecutorOptions,
) -> (QueryManager, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let mut manager = QueryManager::new(
        Arc::new(runner),
        sink.clone(),
        vec![query],
        &InitConfig::default(),
        &InstanceConfig::default(),
        options,
    );
    if let Err(e) = manager.compile() {
        panic!("query did not compile: {}", e);
    }
    (manager, sink)
}

/// A compiled manager whose runner returns `rows` for any query.
pub fn create_query_manager(
    query: JsonValue,
    rows: Vec<Row>,
    tags: &[&str],
) -> (QueryManager, Arc<RecordingSink>) {
    manager_with_runner(query, MockRunner::new(rows), options(tags))
}
