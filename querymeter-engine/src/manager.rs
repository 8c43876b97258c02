//! Query manager
//!
//! Entry point for a check: merges the check's own queries with the
//! configured custom queries and drives one [`QueryExecutor`].

use crate::config::{load_init_config, load_instance_config, GlobalQueryPolicy, InitConfig, InstanceConfig};
use crate::error::EngineResult;
use crate::executor::QueryExecutor;
use crate::options::ExecutorOptions;
use querymeter_compiler::{CompileResult, CompiledQuery};
use querymeter_core::{MetricSink, QueryRunner, Timestamp};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct QueryManager {
    executor: QueryExecutor,
}

impl QueryManager {
    /// Check queries run first, then the merged custom queries. Instance
    /// tags are appended to the static tags of `options`.
    pub fn new(
        runner: Arc<dyn QueryRunner>,
        sink: Arc<dyn MetricSink>,
        check_queries: Vec<JsonValue>,
        init_config: &InitConfig,
        instance: &InstanceConfig,
        mut options: ExecutorOptions,
    ) -> Self {
        let custom = name_custom_queries(merge_custom_queries(
            &instance.custom_queries,
            &init_config.global_custom_queries,
            instance.use_global_custom_queries,
        ));

        let mut definitions = check_queries;
        definitions.extend(custom);
        options.tags.extend(instance.tags.iter().cloned());

        Self {
            executor: QueryExecutor::new(runner, sink, definitions, options),
        }
    }

    /// Build from YAML documents for both scopes and compile.
    pub fn from_yaml(
        runner: Arc<dyn QueryRunner>,
        sink: Arc<dyn MetricSink>,
        check_queries: Vec<JsonValue>,
        init_config: &str,
        instance: &str,
        options: ExecutorOptions,
    ) -> EngineResult<Self> {
        let init_config = load_init_config(init_config)?;
        let instance = load_instance_config(instance)?;
        let mut manager = Self::new(runner, sink, check_queries, &init_config, &instance, options);
        manager.compile()?;
        Ok(manager)
    }

    /// Safe to call repeatedly; throttling state is kept.
    pub fn compile(&mut self) -> CompileResult<()> {
        self.executor.compile()
    }

    pub fn execute(&mut self, extra_tags: &[String]) {
        self.executor.execute(extra_tags)
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn queries(&self) -> &[CompiledQuery] {
        self.executor.queries()
    }

    pub fn last_execution_time(&self, name: &str) -> Option<Timestamp> {
        self.executor.last_execution_time(name)
    }
}

fn query_name(query: &JsonValue) -> Option<&str> {
    query.get("name").and_then(JsonValue::as_str)
}

/// Combine instance and global custom queries under `policy`.
pub fn merge_custom_queries(
    instance: &[JsonValue],
    global: &[JsonValue],
    policy: GlobalQueryPolicy,
) -> Vec<JsonValue> {
    match policy {
        GlobalQueryPolicy::Disabled => instance.to_vec(),
        GlobalQueryPolicy::Default if instance.is_empty() => global.to_vec(),
        GlobalQueryPolicy::Default => instance.to_vec(),
        GlobalQueryPolicy::Extend => {
            let overridden: HashSet<&str> = instance.iter().filter_map(query_name).collect();
            let mut merged = instance.to_vec();
            for query in global {
                if query_name(query).is_some_and(|name| overridden.contains(name)) {
                    continue;
                }
                if merged.contains(query) {
                    continue;
                }
                merged.push(query.clone());
            }
            merged
        }
    }
}

/// Give unnamed queries a positional name, `custom query #<n>`.
pub fn name_custom_queries(queries: Vec<JsonValue>) -> Vec<JsonValue> {
    queries
        .into_iter()
        .enumerate()
        .map(|(i, mut query)| {
            if let JsonValue::Object(map) = &mut query {
                if map.get("name").map_or(true, JsonValue::is_null) {
                    map.insert(
                        "name".to_string(),
                        JsonValue::String(format!("custom query #{}", i + 1)),
                    );
                }
            }
            query
        })
        .collect()
}
