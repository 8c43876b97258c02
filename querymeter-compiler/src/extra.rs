//! Extras: values derived from columns and earlier extras

use crate::error::{CompileError, TransformError, TransformerError};
use crate::schema::{FieldSpec, SUBMIT_TYPES};
use crate::transformer::{compile_transformer, CompileContext, RowContext, Submitter, Transformer};
use querymeter_core::{MetricKind, Value};
use querymeter_dsl::{CompiledExpr, ResolveOptions};

#[derive(Debug, Clone, PartialEq)]
pub enum ExtraKind {
    /// Submits an existing source through a column transformer.
    Submit {
        source: String,
        transformer: Transformer,
    },
    /// Evaluates an expression; submits it only when `submit_type` is set.
    Expression {
        expr: CompiledExpr,
        submit: Option<Transformer>,
    },
    /// `part / total * 100` as a gauge.
    Percent {
        part: String,
        total: String,
        submitter: Submitter,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExtra {
    pub name: String,
    pub kind: ExtraKind,
}

impl CompiledExtra {
    /// Compile one extra. `cx.sources` holds the column names and the names
    /// of the extras declared before this one.
    pub fn compile(
        spec: &FieldSpec,
        query: &str,
        cx: &CompileContext<'_>,
    ) -> Result<Self, CompileError> {
        let wrap = |source: TransformerError| CompileError::Transformer {
            kind: spec.kind.clone(),
            owner: format!("extra {} of {}", spec.name, query),
            source,
        };
        let params = spec.params();

        let kind = match spec.kind.as_str() {
            "expression" => {
                let text = params.non_empty_str("expression").map_err(wrap)?;
                let options = ResolveOptions {
                    verbose: params.flag("verbose"),
                };
                let expr = CompiledExpr::compile(text, cx.sources, options)
                    .map_err(|e| wrap(TransformerError::Expression(e)))?;
                let submit = match params.optional_str("submit_type").map_err(wrap)? {
                    None => None,
                    Some(submit_type) if SUBMIT_TYPES.contains(&submit_type) => Some(
                        compile_transformer(submit_type, &spec.name, params, cx).map_err(wrap)?,
                    ),
                    Some(other) => {
                        return Err(wrap(TransformerError::UnknownSubmitType(other.to_string())))
                    }
                };
                ExtraKind::Expression { expr, submit }
            }
            "percent" => {
                let part = params.required_str("part").map_err(wrap)?;
                if !cx.sources.contains(part) {
                    return Err(wrap(TransformerError::UnavailableSource {
                        param: "part",
                        name: part.to_string(),
                    }));
                }
                let total = params.required_str("total").map_err(wrap)?;
                if !cx.sources.contains(total) {
                    return Err(wrap(TransformerError::UnavailableSource {
                        param: "total",
                        name: total.to_string(),
                    }));
                }
                ExtraKind::Percent {
                    part: part.to_string(),
                    total: total.to_string(),
                    submitter: Submitter {
                        kind: MetricKind::Gauge,
                        name: cx.metric_name(&spec.name, params.flag("raw")),
                        tags: params.tags().map_err(wrap)?,
                    },
                }
            }
            kind => {
                let source = params.required_str("source").map_err(wrap)?;
                if !cx.sources.contains(source) {
                    return Err(wrap(TransformerError::UnavailableSource {
                        param: "source",
                        name: source.to_string(),
                    }));
                }
                ExtraKind::Submit {
                    source: source.to_string(),
                    transformer: compile_transformer(kind, &spec.name, params, cx).map_err(wrap)?,
                }
            }
        };

        Ok(Self {
            name: spec.name.clone(),
            kind,
        })
    }

    /// Apply to the current row. The returned value, if any, becomes a
    /// source for later extras.
    pub fn apply(&self, ctx: &RowContext<'_>) -> Result<Option<Value>, TransformError> {
        match &self.kind {
            ExtraKind::Submit {
                source,
                transformer,
            } => {
                let value = ctx.source(source)?;
                transformer.apply(ctx, value)?;
                Ok(Some(value.clone()))
            }
            ExtraKind::Expression { expr, submit } => {
                let value = expr.evaluate(ctx.sources)?;
                if let Some(transformer) = submit {
                    transformer.apply(ctx, &value)?;
                }
                Ok(Some(value))
            }
            ExtraKind::Percent {
                part,
                total,
                submitter,
            } => {
                let total = ctx.source(total)?.as_f64()?;
                if total == 0.0 {
                    return Ok(None);
                }
                let percent = ctx.source(part)?.as_f64()? / total * 100.0;
                submitter.submit(ctx, percent);
                Ok(Some(Value::Float(percent)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use querymeter_core::Sources;
    use querymeter_test_utils::RecordingSink;
    use serde_json::{json, Value as JsonValue};
    use std::collections::HashSet;

    fn spec(name: &str, kind: &str, params: JsonValue) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            kind: kind.to_string(),
            params: match params {
                JsonValue::Object(map) => map,
                _ => panic!("not an object"),
            },
        }
    }

    fn compile(spec: &FieldSpec, known: &[&str]) -> Result<CompiledExtra, CompileError> {
        let known: HashSet<String> = known.iter().map(|s| s.to_string()).collect();
        let cx = CompileContext {
            namespace: None,
            metric_prefix: None,
            sources: &known,
        };
        CompiledExtra::compile(spec, "test query", &cx)
    }

    fn apply(extra: &CompiledExtra, sources: &Sources, sink: &RecordingSink) -> Result<Option<Value>, TransformError> {
        let tags = vec!["test:foo".to_string()];
        let ctx = RowContext {
            sink,
            sources,
            tags: &tags,
            hostname: None,
            check_id: "test:instance",
            now: Utc::now(),
        };
        extra.apply(&ctx)
    }

    fn message(result: Result<CompiledExtra, CompileError>) -> String {
        match result {
            Err(e) => e.to_string(),
            Ok(extra) => panic!("compiled: {:?}", extra),
        }
    }

    #[test]
    fn test_expression_errors() {
        assert_eq!(
            message(compile(&spec("foo", "expression", json!({})), &["test.foo"])),
            "error compiling type `expression` for extra foo of test query: the `expression` parameter is required"
        );
        assert_eq!(
            message(compile(&spec("foo", "expression", json!({"expression": 5})), &["test.foo"])),
            "error compiling type `expression` for extra foo of test query: the `expression` parameter must be a string"
        );
        assert_eq!(
            message(compile(&spec("foo", "expression", json!({"expression": ""})), &["test.foo"])),
            "error compiling type `expression` for extra foo of test query: the `expression` parameter must not be empty"
        );
        assert_eq!(
            message(compile(
                &spec("foo", "expression", json!({"expression": "5", "submit_type": "something"})),
                &["test.foo"]
            )),
            "error compiling type `expression` for extra foo of test query: unknown submit_type `something`"
        );
        assert_eq!(
            message(compile(&spec("foo", "expression", json!({"expression": "bar + 1"})), &["test.foo"])),
            "error compiling type `expression` for extra foo of test query: the source `bar` referenced by the expression is not available"
        );
    }

    #[test]
    fn test_expression_rejects_statements() {
        for text in ["import os", "raise Exception", "foo = 5"] {
            let result = compile(&spec("foo", "expression", json!({"expression": text})), &["test.foo"]);
            match result {
                Err(e) => {
                    assert!(e.is_syntax_error(), "{}: {}", text, e);
                    assert!(e
                        .to_string()
                        .starts_with("error compiling type `expression` for extra foo of test query: invalid syntax"));
                }
                Ok(_) => panic!("{} compiled", text),
            }
        }
    }

    #[test]
    fn test_percent_errors() {
        let known = ["test.foo"];
        assert_eq!(
            message(compile(&spec("foo", "percent", json!({})), &known)),
            "error compiling type `percent` for extra foo of test query: the `part` parameter is required"
        );
        assert_eq!(
            message(compile(&spec("foo", "percent", json!({"part": 5})), &known)),
            "error compiling type `percent` for extra foo of test query: the `part` parameter must be a string"
        );
        assert_eq!(
            message(compile(&spec("pct", "percent", json!({"part": "foo"})), &known)),
            "error compiling type `percent` for extra pct of test query: the `part` parameter `foo` is not an available source"
        );
        assert_eq!(
            message(compile(&spec("foo", "percent", json!({"part": "test.foo"})), &known)),
            "error compiling type `percent` for extra foo of test query: the `total` parameter is required"
        );
        assert_eq!(
            message(compile(&spec("foo", "percent", json!({"part": "test.foo", "total": 5})), &known)),
            "error compiling type `percent` for extra foo of test query: the `total` parameter must be a string"
        );
        assert_eq!(
            message(compile(&spec("pct", "percent", json!({"part": "test.foo", "total": "foo"})), &known)),
            "error compiling type `percent` for extra pct of test query: the `total` parameter `foo` is not an available source"
        );
    }

    #[test]
    fn test_percent_of_zero_total_is_silent() -> Result<(), CompileError> {
        let extra = compile(
            &spec("pct", "percent", json!({"part": "part", "total": "total"})),
            &["part", "total"],
        )?;
        let sink = RecordingSink::new();
        let mut sources = Sources::new();
        sources.insert("part".into(), Value::Int(3));
        sources.insert("total".into(), Value::Int(0));
        assert_eq!(apply(&extra, &sources, &sink), Ok(None));
        sink.assert_all_metrics_covered();

        sources.insert("total".into(), Value::Int(5));
        assert_eq!(apply(&extra, &sources, &sink), Ok(Some(Value::Float(60.0))));
        sink.assert_metric("pct", 60.0, MetricKind::Gauge, &["test:foo"]);
        Ok(())
    }

    #[test]
    fn test_expression_without_submit_type_only_stores() -> Result<(), CompileError> {
        let extra = compile(&spec("src", "expression", json!({"expression": "2 ** 3"})), &[])?;
        let sink = RecordingSink::new();
        assert_eq!(apply(&extra, &Sources::new(), &sink), Ok(Some(Value::Int(8))));
        sink.assert_all_metrics_covered();
        Ok(())
    }

    #[test]
    fn test_expression_passes_own_params_to_submit_type() -> Result<(), CompileError> {
        let extra = compile(
            &spec(
                "temp.pct",
                "expression",
                json!({"expression": "test.foo / 2", "submit_type": "temporal_percent", "scale": "second"}),
            ),
            &["test.foo"],
        )?;
        let sink = RecordingSink::new();
        let mut sources = Sources::new();
        sources.insert("test.foo".into(), Value::Int(10));
        assert_eq!(apply(&extra, &sources, &sink), Ok(Some(Value::Float(5.0))));
        sink.assert_metric("temp.pct", 500.0, MetricKind::Rate, &["test:foo"]);
        Ok(())
    }

    #[test]
    fn test_submit_extra_source() {
        assert_eq!(
            message(compile(&spec("src.cube", "gauge", json!({"source": "src"})), &["test.foo"])),
            "error compiling type `gauge` for extra src.cube of test query: the `source` parameter `src` is not an available source"
        );
    }

    #[test]
    fn test_verbose_expression_requires_lookup() {
        let bare = compile(
            &spec("d", "expression", json!({"expression": "test.foo / 2", "verbose": true})),
            &["test.foo"],
        );
        assert!(bare.is_err());
        let lookup = compile(
            &spec("d", "expression", json!({"expression": "SOURCES[\"test.foo\"] / 2", "verbose": true})),
            &["test.foo"],
        );
        assert!(lookup.is_ok());
    }
}
