//! Query executor
//!
//! Owns a list of raw query definitions, their compiled pipelines and the
//! per-query runtime state. One `execute` call runs every due query once,
//! strictly in declaration order.
//!
//! ```text
//! execute(extra_tags)
//!   for each compiled query
//!     throttle? ── skip
//!     runner.run(query) ── Err → "Error querying …"
//!     for each row
//!       shape check ── "expected N columns" / "empty result"
//!       phase 1: columns → sources, tag columns → tags
//!       phase 2: column transformers
//!       phase 3: extras (results become sources)
//! ```

use crate::options::ExecutorOptions;
use querymeter_compiler::{CompileError, CompileOptions, CompileResult, CompiledQuery, RowContext};
use querymeter_core::{
    MetricKind, MetricSink, QueryIdentity, QueryRunner, Row, Sources, Timestamp,
};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Mutable runtime state of one query, kept across recompilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pub last_execution_time: Option<Timestamp>,
}

/// Runs compiled queries against a runner and submits to a sink.
pub struct QueryExecutor {
    runner: Arc<dyn QueryRunner>,
    sink: Arc<dyn MetricSink>,
    definitions: Vec<JsonValue>,
    options: ExecutorOptions,
    queries: Vec<CompiledQuery>,
    state: HashMap<QueryIdentity, QueryState>,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("queries", &self.queries.len())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl QueryExecutor {
    /// Create an executor. Nothing runs until [`compile`](Self::compile).
    pub fn new(
        runner: Arc<dyn QueryRunner>,
        sink: Arc<dyn MetricSink>,
        definitions: Vec<JsonValue>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            runner,
            sink,
            definitions,
            options,
            queries: Vec::new(),
            state: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn definitions(&self) -> &[JsonValue] {
        &self.definitions
    }

    /// Compiled queries, in execution order.
    pub fn queries(&self) -> &[CompiledQuery] {
        &self.queries
    }

    /// Swap the raw definitions. Takes effect on the next `compile`.
    pub fn replace_definitions(&mut self, definitions: Vec<JsonValue>) {
        self.definitions = definitions;
    }

    /// Compile every definition.
    ///
    /// Either all definitions compile and replace the current pipelines, or
    /// the first error is returned and nothing changes. Runtime state
    /// survives for queries whose identity is unchanged.
    pub fn compile(&mut self) -> CompileResult<()> {
        let options = CompileOptions {
            namespace: self.options.metric_namespace.clone(),
            structured_queries: self.options.structured_queries,
        };

        let mut queries = Vec::with_capacity(self.definitions.len());
        let mut names = HashSet::new();
        for raw in &self.definitions {
            let query = CompiledQuery::compile(raw, &options)?;
            if !names.insert(query.name().to_string()) {
                return Err(CompileError::DuplicateQuery {
                    name: query.name().to_string(),
                });
            }
            queries.push(query);
        }

        let mut state = HashMap::with_capacity(queries.len());
        for query in &queries {
            let identity = query.identity().clone();
            let previous = self.state.remove(&identity).unwrap_or_default();
            state.insert(identity, previous);
        }

        debug!("Compiled {} queries", queries.len());
        self.queries = queries;
        self.state = state;
        Ok(())
    }

    /// When the query named `name` last started executing.
    pub fn last_execution_time(&self, name: &str) -> Option<Timestamp> {
        self.queries
            .iter()
            .find(|q| q.name() == name)
            .and_then(|q| self.state.get(q.identity()))
            .and_then(|s| s.last_execution_time)
    }

    /// Run every due query once.
    pub fn execute(&mut self, extra_tags: &[String]) {
        for query in &self.queries {
            let now = self.options.clock.now();
            let state = self.state.entry(query.identity().clone()).or_default();
            if let Some(interval) = query.collection_interval() {
                if let Some(last) = state.last_execution_time {
                    let elapsed = (now - last).num_milliseconds() as f64 / 1000.0;
                    if elapsed < interval {
                        continue;
                    }
                }
                state.last_execution_time = Some(now);
            }

            let started = Instant::now();
            run_query(
                self.runner.as_ref(),
                self.sink.as_ref(),
                &self.options,
                query,
                extra_tags,
                now,
            );
            if let Some(metric) = &self.options.operation_time_metric {
                let mut tags = self.options.tags.clone();
                tags.push(format!("operation:{}", query.name()));
                self.sink.submit_metric(
                    MetricKind::Gauge,
                    metric,
                    started.elapsed().as_secs_f64() * 1000.0,
                    &tags,
                    self.options.hostname.as_deref(),
                );
            }
        }
    }
}

// ============================================================================
// ROW PIPELINE
// ============================================================================

fn run_query(
    runner: &dyn QueryRunner,
    sink: &dyn MetricSink,
    options: &ExecutorOptions,
    query: &CompiledQuery,
    extra_tags: &[String],
    now: Timestamp,
) {
    let name = query.name();
    let rows = match runner.run(query.query()) {
        Ok(rows) => rows,
        Err(e) => {
            error!("Error querying {}: {}", name, options.handle_error(&e.message));
            return;
        }
    };

    let base_tags = dedup_tags(
        options
            .tags
            .iter()
            .chain(query.tags())
            .chain(extra_tags)
            .cloned(),
    );

    let mut seen = 0usize;
    for row in rows {
        seen += 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                error!("Error querying {}: {}", name, options.handle_error(&e.message));
                return;
            }
        };

        if row.is_empty() {
            debug!("Query {} returned an empty result", name);
            continue;
        }
        let expected = query.column_count();
        if row.len() != expected {
            error!(
                "Query {} expected {} column{}, got {}",
                name,
                expected,
                if expected == 1 { "" } else { "s" },
                row.len()
            );
            continue;
        }

        process_row(sink, options, query, &row, &base_tags, now);
    }

    if seen == 0 {
        debug!("Query {} returned an empty result", name);
    }
}

fn process_row(
    sink: &dyn MetricSink,
    options: &ExecutorOptions,
    query: &CompiledQuery,
    row: &Row,
    base_tags: &[String],
    now: Timestamp,
) {
    let mut sources = Sources::with_capacity(query.columns().len() + query.extras().len());
    let mut tags = base_tags.to_vec();
    for column in query.columns() {
        let value = &row[column.index];
        if column.transformer.is_tag() {
            tags.extend(column.transformer.row_tags(value));
        }
        sources.insert(column.name.clone(), value.clone());
    }
    let tags = dedup_tags(tags.into_iter());

    let hostname = match query.hostname() {
        Some(template) => match template.render(&sources) {
            Ok(hostname) => Some(hostname),
            Err(e) => {
                error!("Error transforming hostname of {}: {}", query.name(), e);
                options.hostname.clone()
            }
        },
        None => options.hostname.clone(),
    };

    {
        let ctx = RowContext {
            sink,
            sources: &sources,
            tags: &tags,
            hostname: hostname.as_deref(),
            check_id: &options.check_id,
            now,
        };
        for column in query.columns() {
            if column.transformer.is_tag() {
                continue;
            }
            if let Err(e) = column.transformer.apply(&ctx, &row[column.index]) {
                error!("Error transforming {}: {}", column.name, e);
            }
        }
    }

    for extra in query.extras() {
        let result = extra.apply(&RowContext {
            sink,
            sources: &sources,
            tags: &tags,
            hostname: hostname.as_deref(),
            check_id: &options.check_id,
            now,
        });
        match result {
            Ok(Some(value)) => {
                sources.insert(extra.name.clone(), value);
            }
            Ok(None) => {}
            Err(e) => error!("Error transforming {}: {}", extra.name, e),
        }
    }
}

/// Drop repeated tags, keeping first occurrences in order.
fn dedup_tags(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.filter(|tag| seen.insert(tag.clone())).collect()
}
