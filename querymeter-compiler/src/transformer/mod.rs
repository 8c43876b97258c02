//! Transformer factory and per-type transformers
//!
//! Every value `type` maps to one variant of [`Transformer`]. The factory
//! validates the type's parameters once; applying a transformer to a row
//! value only converts and submits.
//!
//! ```text
//! (type, name, params) → compile_transformer → Transformer
//!                                                 ↓
//!                          apply(RowContext, value) → MetricSink
//! ```

pub mod metadata;
pub mod time;

use crate::error::{TransformError, TransformerError};
use crate::params::{is_affirmative_str, Params};
use crate::schema::SUBMIT_TYPES;
use crate::template::Template;
use chrono::{DateTime, Utc};
use querymeter_core::{MetricKind, MetricSink, ServiceCheckStatus, Sources, Value};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

pub use metadata::VersionScheme;
pub use time::TimeFormat;

// ============================================================================
// CONTEXTS
// ============================================================================

/// Naming and source information available while compiling one query.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    /// Prepended to metric names unless a column sets `raw: true`.
    pub namespace: Option<&'a str>,
    /// The query's `metric_prefix`.
    pub metric_prefix: Option<&'a str>,
    /// Names a transformer may read from.
    pub sources: &'a HashSet<String>,
}

impl CompileContext<'_> {
    /// Full metric name: `<namespace>.<prefix>.<name>`.
    pub fn metric_name(&self, name: &str, raw: bool) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if !raw {
            if let Some(namespace) = self.namespace.filter(|ns| !ns.is_empty()) {
                parts.push(namespace);
            }
        }
        if let Some(prefix) = self.metric_prefix {
            let prefix = prefix.trim_end_matches('.');
            if !prefix.is_empty() {
                parts.push(prefix);
            }
        }
        parts.push(name);
        parts.join(".")
    }

    fn require_source(&self, param: &'static str, name: &str) -> Result<(), TransformerError> {
        if self.sources.contains(name) {
            Ok(())
        } else {
            Err(TransformerError::UnavailableSource {
                param,
                name: name.to_string(),
            })
        }
    }
}

/// Everything a transformer sees while one row is processed.
pub struct RowContext<'a> {
    pub sink: &'a dyn MetricSink,
    pub sources: &'a Sources,
    pub tags: &'a [String],
    pub hostname: Option<&'a str>,
    /// Entity key for metadata submissions.
    pub check_id: &'a str,
    pub now: DateTime<Utc>,
}

impl RowContext<'_> {
    pub fn source(&self, name: &str) -> Result<&Value, TransformError> {
        self.sources
            .get(name)
            .ok_or_else(|| TransformError::MissingSource(name.to_string()))
    }
}

// ============================================================================
// TRANSFORMERS
// ============================================================================

/// Submits one metric under a fixed name.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitter {
    pub kind: MetricKind,
    pub name: String,
    /// Replaces the row tags when set.
    pub tags: Option<Vec<String>>,
}

impl Submitter {
    fn compile(
        kind: MetricKind,
        name: &str,
        params: Params<'_>,
        cx: &CompileContext<'_>,
    ) -> Result<Self, TransformerError> {
        Ok(Self {
            kind,
            name: cx.metric_name(name, params.flag("raw")),
            tags: params.tags()?,
        })
    }

    pub fn submit(&self, ctx: &RowContext<'_>, value: f64) {
        let tags = self.tags.as_deref().unwrap_or(ctx.tags);
        ctx.sink
            .submit_metric(self.kind, &self.name, value, tags, ctx.hostname);
    }
}

/// One branch of a `match` column.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchItem {
    /// Source whose value is submitted.
    pub source: String,
    pub transformer: Transformer,
}

/// A compiled column or submission transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformer {
    /// Registers the value under its name; emits nothing.
    Source,
    Tag {
        name: String,
        boolean: bool,
    },
    TagList {
        name: String,
    },
    Metric(Submitter),
    /// `<name>.total` gauge plus `<name>.count` monotonic count.
    MonotonicGauge {
        total: Submitter,
        count: Submitter,
    },
    /// `value / scale * 100` as a rate.
    TemporalPercent {
        submitter: Submitter,
        scale: f64,
    },
    Match {
        items: HashMap<String, MatchItem>,
    },
    ServiceCheck {
        name: String,
        status_map: HashMap<String, ServiceCheckStatus>,
        message: Option<Template>,
        tags: Option<Vec<String>>,
    },
    TimeElapsed {
        submitter: Submitter,
        format: TimeFormat,
    },
    Metadata {
        name: String,
        version: Option<VersionScheme>,
    },
}

/// Build the transformer for `kind`.
pub fn compile_transformer(
    kind: &str,
    name: &str,
    params: Params<'_>,
    cx: &CompileContext<'_>,
) -> Result<Transformer, TransformerError> {
    if let Some(metric) = MetricKind::parse(kind) {
        return Ok(Transformer::Metric(Submitter::compile(
            metric, name, params, cx,
        )?));
    }

    match kind {
        "source" => Ok(Transformer::Source),
        "tag" => Ok(Transformer::Tag {
            name: name.to_string(),
            boolean: params.flag("boolean"),
        }),
        "tag_list" => Ok(Transformer::TagList {
            name: name.to_string(),
        }),
        "monotonic_gauge" => {
            let base = Submitter::compile(MetricKind::Gauge, name, params, cx)?;
            Ok(Transformer::MonotonicGauge {
                count: Submitter {
                    kind: MetricKind::MonotonicCount,
                    name: format!("{}.count", base.name),
                    tags: base.tags.clone(),
                },
                total: Submitter {
                    name: format!("{}.total", base.name),
                    ..base
                },
            })
        }
        "temporal_percent" => Ok(Transformer::TemporalPercent {
            scale: compile_scale(params)?,
            submitter: Submitter::compile(MetricKind::Rate, name, params, cx)?,
        }),
        "match" => compile_match(params, cx),
        "service_check" => compile_service_check(name, params, cx),
        "time_elapsed" => Ok(Transformer::TimeElapsed {
            format: TimeFormat::from_param(params.optional_str("format")?),
            submitter: Submitter::compile(MetricKind::Gauge, name, params, cx)?,
        }),
        "metadata" => Ok(Transformer::Metadata {
            name: name.to_string(),
            version: if name == "version" {
                Some(VersionScheme::compile(params)?)
            } else {
                None
            },
        }),
        other => Err(TransformerError::UnknownSubmitType(other.to_string())),
    }
}

fn compile_scale(params: Params<'_>) -> Result<f64, TransformerError> {
    match params.required("scale")? {
        JsonValue::String(unit) => match unit.as_str() {
            "second" => Ok(1.0),
            "millisecond" => Ok(1e3),
            "microsecond" => Ok(1e6),
            "nanosecond" => Ok(1e9),
            _ => Err(TransformerError::UnknownScale),
        },
        JsonValue::Number(n) => match n.as_i64() {
            Some(parts) if parts > 0 => Ok(parts as f64),
            _ => Err(TransformerError::InvalidScale),
        },
        _ => Err(TransformerError::InvalidScale),
    }
}

fn compile_match(
    params: Params<'_>,
    cx: &CompileContext<'_>,
) -> Result<Transformer, TransformerError> {
    let raw_items = params.required_mapping("items")?;
    let default_source = params.optional_str("source")?;
    if let Some(source) = default_source {
        cx.require_source("source", source)?;
    }

    let mut items = HashMap::with_capacity(raw_items.len());
    for (key, raw_item) in raw_items {
        let item = raw_item
            .as_object()
            .map(Params::new)
            .ok_or_else(|| TransformerError::ItemNotAMapping(key.clone()))?;
        let item_name = item_str(item, "name", key)?;
        let item_type = item_str(item, "type", key)?;
        if !SUBMIT_TYPES.contains(&item_type) {
            return Err(TransformerError::UnknownItemType {
                kind: item_type.to_string(),
                item: key.clone(),
            });
        }
        let source = match item.get("source") {
            Some(JsonValue::String(source)) => source.as_str(),
            Some(_) => {
                return Err(TransformerError::InvalidItemParameter {
                    param: "source",
                    item: key.clone(),
                })
            }
            None => default_source.ok_or_else(|| TransformerError::MissingItemParameter {
                param: "source",
                item: key.clone(),
            })?,
        };
        cx.require_source("source", source)?;

        let transformer = compile_transformer(item_type, item_name, item, cx).map_err(|e| {
            TransformerError::Item {
                kind: item_type.to_string(),
                item: key.clone(),
                source: Box::new(e),
            }
        })?;
        items.insert(
            key.clone(),
            MatchItem {
                source: source.to_string(),
                transformer,
            },
        );
    }

    Ok(Transformer::Match { items })
}

fn item_str<'a>(
    item: Params<'a>,
    param: &'static str,
    key: &str,
) -> Result<&'a str, TransformerError> {
    match item.get(param) {
        None => Err(TransformerError::MissingItemParameter {
            param,
            item: key.to_string(),
        }),
        Some(value) => value
            .as_str()
            .ok_or_else(|| TransformerError::InvalidItemParameter {
                param,
                item: key.to_string(),
            }),
    }
}

fn compile_service_check(
    name: &str,
    params: Params<'_>,
    cx: &CompileContext<'_>,
) -> Result<Transformer, TransformerError> {
    let raw_map = params.required_mapping("status_map")?;
    if raw_map.is_empty() {
        return Err(TransformerError::EmptyParameter("status_map"));
    }

    let mut status_map = HashMap::with_capacity(raw_map.len());
    for (value, status) in raw_map {
        let status_name = status
            .as_str()
            .ok_or_else(|| TransformerError::StatusNotString {
                status: status.to_string(),
                value: value.clone(),
            })?;
        let status = ServiceCheckStatus::from_name(status_name).ok_or_else(|| {
            TransformerError::InvalidStatus {
                status: status_name.to_string(),
                value: value.clone(),
            }
        })?;
        status_map.insert(value.clone(), status);
    }

    let message = params.optional_str("message")?.map(Template::parse);
    if let Some(template) = &message {
        if let Some(unknown) = template.references().find(|r| !cx.sources.contains(*r)) {
            return Err(TransformerError::UnknownTemplateSource(unknown.to_string()));
        }
    }

    Ok(Transformer::ServiceCheck {
        name: cx.metric_name(name, params.flag("raw")),
        status_map,
        message,
        tags: params.tags()?,
    })
}

impl Transformer {
    /// Tag-producing transformers contribute to the row tags before any
    /// other transformer runs.
    pub fn is_tag(&self) -> bool {
        matches!(self, Transformer::Tag { .. } | Transformer::TagList { .. })
    }

    /// Tags contributed by `value`. Empty for non-tag transformers.
    pub fn row_tags(&self, value: &Value) -> Vec<String> {
        match self {
            Transformer::Tag {
                name,
                boolean: true,
            } => {
                let flag = if is_affirmative(value) { "true" } else { "false" };
                vec![format!("{}:{}", name, flag)]
            }
            Transformer::Tag { name, .. } => vec![format!("{}:{}", name, value)],
            Transformer::TagList { name } => split_tag_list(value)
                .into_iter()
                .map(|item| format!("{}:{}", name, item))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Emit the signals for one value.
    pub fn apply(&self, ctx: &RowContext<'_>, value: &Value) -> Result<(), TransformError> {
        match self {
            Transformer::Source | Transformer::Tag { .. } | Transformer::TagList { .. } => Ok(()),
            Transformer::Metric(submitter) => {
                submitter.submit(ctx, value.as_f64()?);
                Ok(())
            }
            Transformer::MonotonicGauge { total, count } => {
                let value = value.as_f64()?;
                total.submit(ctx, value);
                count.submit(ctx, value);
                Ok(())
            }
            Transformer::TemporalPercent { submitter, scale } => {
                submitter.submit(ctx, value.as_f64()? / scale * 100.0);
                Ok(())
            }
            Transformer::Match { items } => match items.get(&value.to_string()) {
                Some(item) => item.transformer.apply(ctx, ctx.source(&item.source)?),
                None => Ok(()),
            },
            Transformer::ServiceCheck {
                name,
                status_map,
                message,
                tags,
            } => {
                let status = status_map
                    .get(&value.to_string())
                    .copied()
                    .unwrap_or(ServiceCheckStatus::Unknown);
                let message = match message {
                    Some(template) if status != ServiceCheckStatus::Ok => {
                        Some(template.render(ctx.sources)?)
                    }
                    _ => None,
                };
                ctx.sink.submit_service_check(
                    name,
                    status,
                    tags.as_deref().unwrap_or(ctx.tags),
                    ctx.hostname,
                    message.as_deref(),
                );
                Ok(())
            }
            Transformer::TimeElapsed { submitter, format } => {
                submitter.submit(ctx, format.elapsed(value, ctx.now)?);
                Ok(())
            }
            Transformer::Metadata { name, version } => {
                let raw = value.to_string();
                match version {
                    Some(scheme) => metadata::submit_version(ctx.sink, ctx.check_id, scheme, &raw),
                    None => {
                        ctx.sink.submit_metadata(ctx.check_id, name, &raw);
                        Ok(())
                    }
                }
            }
        }
    }
}

fn is_affirmative(value: &Value) -> bool {
    match value {
        Value::Str(text) => is_affirmative_str(text),
        other => other.is_truthy(),
    }
}

/// Lists yield their items; strings are split on commas. Blank items are
/// dropped.
fn split_tag_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::List(items) => items.iter().map(|item| item.to_string()).collect(),
        Value::Str(text) => text.split(',').map(str::to_string).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    };
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
