//! Schema validation for raw query definitions
//!
//! Turns an already-deserialized definition into a [`QueryDefinition`],
//! checking fields in a fixed order so the first problem reported is stable:
//! query fields, then each column, then each extra. Nothing here evaluates
//! expressions or touches a data source.

use crate::error::{CompileError, CompileResult};
use crate::params::Params;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

// ============================================================================
// KNOWN TYPES
// ============================================================================

/// Types accepted for a column.
pub const COLUMN_TYPES: &[&str] = &[
    "source",
    "tag",
    "tag_list",
    "gauge",
    "count",
    "monotonic_count",
    "rate",
    "histogram",
    "historate",
    "monotonic_gauge",
    "temporal_percent",
    "match",
    "service_check",
    "time_elapsed",
    "metadata",
];

/// Types that submit a value. Extras of these types read their value from
/// the `source` parameter; expression extras use them as `submit_type`.
pub const SUBMIT_TYPES: &[&str] = &[
    "gauge",
    "count",
    "monotonic_count",
    "rate",
    "histogram",
    "historate",
    "monotonic_gauge",
    "temporal_percent",
    "service_check",
    "time_elapsed",
    "metadata",
];

/// Types accepted for an extra besides [`SUBMIT_TYPES`].
pub const EXTRA_ONLY_TYPES: &[&str] = &["expression", "percent"];

fn is_extra_type(kind: &str) -> bool {
    EXTRA_ONLY_TYPES.contains(&kind) || SUBMIT_TYPES.contains(&kind)
}

// ============================================================================
// VALIDATED DEFINITIONS
// ============================================================================

/// Validation switches that depend on the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Accept mappings and sequences as `query` values.
    pub structured_queries: bool,
}

/// A named, typed column or extra with its remaining parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: String,
    pub params: Map<String, JsonValue>,
}

impl FieldSpec {
    pub fn params(&self) -> Params<'_> {
        Params::new(&self.params)
    }
}

/// One position of the result row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    /// `null` or `{}`: the value at this position is ignored.
    Placeholder,
    Defined(FieldSpec),
}

/// A validated query definition.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefinition {
    pub name: String,
    pub query: JsonValue,
    pub columns: Vec<ColumnSpec>,
    pub extras: Vec<FieldSpec>,
    pub tags: Vec<String>,
    pub collection_interval: Option<f64>,
    pub metric_prefix: Option<String>,
    pub hostname: Option<String>,
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate one raw definition.
pub fn validate(raw: &JsonValue, options: SchemaOptions) -> CompileResult<QueryDefinition> {
    let map = raw.as_object().ok_or_else(|| CompileError::NotAMapping {
        owner: "query definition".to_string(),
    })?;

    let name = match present(map, "name") {
        None => return Err(CompileError::MissingQueryField { field: "name" }),
        Some(JsonValue::String(name)) => name.clone(),
        Some(_) => {
            return Err(CompileError::InvalidQueryField {
                field: "name",
                expected: "a string",
            })
        }
    };

    let query = match present(map, "query") {
        None => return Err(missing("query", &name)),
        Some(value @ JsonValue::String(_)) => value.clone(),
        Some(value @ (JsonValue::Object(_) | JsonValue::Array(_)))
            if options.structured_queries =>
        {
            value.clone()
        }
        Some(_) => return Err(invalid("query", &name, "a string")),
    };

    let raw_columns = match present(map, "columns") {
        None => return Err(missing("columns", &name)),
        Some(JsonValue::Array(columns)) => columns,
        Some(_) => return Err(invalid("columns", &name, "a list")),
    };

    let tags = match present(map, "tags") {
        None => Vec::new(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| invalid("tags", &name, "a list of strings"))?,
        Some(_) => return Err(invalid("tags", &name, "a list")),
    };

    let collection_interval = match present(map, "collection_interval") {
        None => None,
        Some(value) => match value.as_f64() {
            Some(seconds) if seconds > 0.0 => Some(seconds),
            _ => return Err(invalid("collection_interval", &name, "a positive number")),
        },
    };

    let metric_prefix = match present(map, "metric_prefix") {
        None => None,
        Some(JsonValue::String(prefix)) if prefix.is_empty() => {
            return Err(CompileError::EmptyField {
                field: "metric_prefix",
                owner: name,
            })
        }
        Some(JsonValue::String(prefix)) => Some(prefix.clone()),
        Some(_) => return Err(invalid("metric_prefix", &name, "a string")),
    };

    let hostname = match present(map, "hostname") {
        None => None,
        Some(JsonValue::String(hostname)) => Some(hostname.clone()),
        Some(_) => return Err(invalid("hostname", &name, "a string")),
    };

    // name -> where it was first defined
    let mut defined: HashMap<String, String> = HashMap::new();

    let mut columns = Vec::with_capacity(raw_columns.len());
    for (i, raw_column) in raw_columns.iter().enumerate() {
        let position = i + 1;
        let column = match raw_column {
            JsonValue::Null => ColumnSpec::Placeholder,
            JsonValue::Object(entry) if entry.is_empty() => ColumnSpec::Placeholder,
            JsonValue::Object(entry) => {
                let owner = format!("column #{} of {}", position, name);
                let column_name = field_name(entry, &owner)?;
                let owner = format!("column {} of {}", column_name, name);
                let kind = field_type(entry, &owner, None)?;
                if !COLUMN_TYPES.contains(&kind.as_str()) {
                    return Err(CompileError::UnknownType { kind, owner });
                }
                register(&mut defined, &column_name, &name, format!("column #{}", position))?;
                ColumnSpec::Defined(FieldSpec {
                    params: strip(entry),
                    name: column_name,
                    kind,
                })
            }
            _ => {
                return Err(CompileError::NotAMapping {
                    owner: format!("column #{} of {}", position, name),
                })
            }
        };
        columns.push(column);
    }

    let raw_extras: &[JsonValue] = match present(map, "extras") {
        None => &[],
        Some(JsonValue::Array(extras)) => extras,
        Some(_) => return Err(invalid("extras", &name, "a list")),
    };

    let mut extras = Vec::with_capacity(raw_extras.len());
    for (i, raw_extra) in raw_extras.iter().enumerate() {
        let position = i + 1;
        let entry = raw_extra
            .as_object()
            .ok_or_else(|| CompileError::NotAMapping {
                owner: format!("extra #{} of {}", position, name),
            })?;
        let owner = format!("extra #{} of {}", position, name);
        let extra_name = field_name(entry, &owner)?;
        let owner = format!("extra {} of {}", extra_name, name);
        let inferred = entry.contains_key("expression").then_some("expression");
        let kind = field_type(entry, &owner, inferred)?;
        if !is_extra_type(&kind) {
            return Err(CompileError::UnknownType { kind, owner });
        }
        if SUBMIT_TYPES.contains(&kind.as_str()) {
            match present(entry, "source") {
                None => {
                    return Err(CompileError::MissingField {
                        field: "source",
                        owner,
                    })
                }
                Some(JsonValue::String(_)) => {}
                Some(_) => {
                    return Err(CompileError::InvalidField {
                        field: "source",
                        owner,
                        expected: "a string",
                    })
                }
            }
        }
        register(&mut defined, &extra_name, &name, format!("extra #{}", position))?;
        extras.push(FieldSpec {
            params: strip(entry),
            name: extra_name,
            kind,
        });
    }

    Ok(QueryDefinition {
        name,
        query,
        columns,
        extras,
        tags,
        collection_interval,
        metric_prefix,
        hostname,
    })
}

fn present<'a>(map: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    map.get(key).filter(|value| !value.is_null())
}

fn missing(field: &'static str, query: &str) -> CompileError {
    CompileError::MissingField {
        field,
        owner: query.to_string(),
    }
}

fn invalid(field: &'static str, query: &str, expected: &'static str) -> CompileError {
    CompileError::InvalidField {
        field,
        owner: query.to_string(),
        expected,
    }
}

fn field_name(entry: &Map<String, JsonValue>, owner: &str) -> CompileResult<String> {
    match present(entry, "name") {
        None => Err(CompileError::MissingField {
            field: "name",
            owner: owner.to_string(),
        }),
        Some(JsonValue::String(name)) => Ok(name.clone()),
        Some(_) => Err(CompileError::InvalidField {
            field: "name",
            owner: owner.to_string(),
            expected: "a string",
        }),
    }
}

fn field_type(
    entry: &Map<String, JsonValue>,
    owner: &str,
    inferred: Option<&str>,
) -> CompileResult<String> {
    match (present(entry, "type"), inferred) {
        (None, Some(kind)) => Ok(kind.to_string()),
        (None, None) => Err(CompileError::MissingField {
            field: "type",
            owner: owner.to_string(),
        }),
        (Some(JsonValue::String(kind)), _) => Ok(kind.clone()),
        (Some(_), _) => Err(CompileError::InvalidField {
            field: "type",
            owner: owner.to_string(),
            expected: "a string",
        }),
    }
}

fn register(
    defined: &mut HashMap<String, String>,
    name: &str,
    query: &str,
    location: String,
) -> CompileResult<()> {
    if let Some(previous) = defined.get(name) {
        return Err(CompileError::DuplicateName {
            name: name.to_string(),
            query: query.to_string(),
            previous: previous.clone(),
        });
    }
    defined.insert(name.to_string(), location);
    Ok(())
}

fn strip(entry: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    entry
        .iter()
        .filter(|(key, _)| key.as_str() != "name" && key.as_str() != "type")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
