//! Compiled queries
//!
//! A [`CompiledQuery`] is immutable: the validated definition, the column
//! index table and the transformer pipeline. Runtime state such as the last
//! execution time lives with the executor, keyed by [`QueryIdentity`].

use crate::error::{CompileError, CompileResult};
use crate::extra::CompiledExtra;
use crate::schema::{validate, ColumnSpec, QueryDefinition, SchemaOptions};
use crate::template::Template;
use crate::transformer::{compile_transformer, CompileContext, Transformer};
use querymeter_core::QueryIdentity;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Executor-level settings that affect compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub namespace: Option<String>,
    pub structured_queries: bool,
}

/// A named column bound to its row position.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledColumn {
    pub index: usize,
    pub name: String,
    pub transformer: Transformer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    definition: QueryDefinition,
    identity: QueryIdentity,
    hostname: Option<Template>,
    column_count: usize,
    columns: Vec<CompiledColumn>,
    extras: Vec<CompiledExtra>,
}

impl CompiledQuery {
    /// Validate and compile one raw definition.
    pub fn compile(raw: &JsonValue, options: &CompileOptions) -> CompileResult<Self> {
        let schema = SchemaOptions {
            structured_queries: options.structured_queries,
        };
        let definition = validate(raw, schema)?;
        let identity = QueryIdentity::of(&definition.name, raw);

        let mut sources: HashSet<String> = definition
            .columns
            .iter()
            .filter_map(|column| match column {
                ColumnSpec::Defined(spec) => Some(spec.name.clone()),
                ColumnSpec::Placeholder => None,
            })
            .collect();

        let hostname = definition.hostname.as_deref().map(Template::parse);
        if let Some(template) = &hostname {
            if let Some(unknown) = template.references().find(|r| !sources.contains(*r)) {
                return Err(CompileError::UnknownHostnameSource {
                    owner: definition.name.clone(),
                    name: unknown.to_string(),
                });
            }
        }

        let mut columns = Vec::new();
        {
            let cx = CompileContext {
                namespace: options.namespace.as_deref(),
                metric_prefix: definition.metric_prefix.as_deref(),
                sources: &sources,
            };
            for (index, column) in definition.columns.iter().enumerate() {
                let ColumnSpec::Defined(spec) = column else {
                    continue;
                };
                let transformer = compile_transformer(&spec.kind, &spec.name, spec.params(), &cx)
                    .map_err(|source| CompileError::Transformer {
                        kind: spec.kind.clone(),
                        owner: format!("column {} of {}", spec.name, definition.name),
                        source,
                    })?;
                columns.push(CompiledColumn {
                    index,
                    name: spec.name.clone(),
                    transformer,
                });
            }
        }

        let mut extras = Vec::with_capacity(definition.extras.len());
        for spec in &definition.extras {
            let extra = {
                let cx = CompileContext {
                    namespace: options.namespace.as_deref(),
                    metric_prefix: definition.metric_prefix.as_deref(),
                    sources: &sources,
                };
                CompiledExtra::compile(spec, &definition.name, &cx)?
            };
            sources.insert(extra.name.clone());
            extras.push(extra);
        }

        Ok(Self {
            column_count: definition.columns.len(),
            definition,
            identity,
            hostname,
            columns,
            extras,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The value handed to the query runner.
    pub fn query(&self) -> &JsonValue {
        &self.definition.query
    }

    pub fn identity(&self) -> &QueryIdentity {
        &self.identity
    }

    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    pub fn tags(&self) -> &[String] {
        &self.definition.tags
    }

    /// Minimum seconds between two executions.
    pub fn collection_interval(&self) -> Option<f64> {
        self.definition.collection_interval
    }

    pub fn hostname(&self) -> Option<&Template> {
        self.hostname.as_ref()
    }

    /// Expected row length, placeholders included.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn columns(&self) -> &[CompiledColumn] {
        &self.columns
    }

    pub fn extras(&self) -> &[CompiledExtra] {
        &self.extras
    }
}
