//! End-to-end expression behaviour: compile against known sources, then
//! evaluate against row values.

use proptest::prelude::*;
use querymeter_core::{Sources, Value};
use querymeter_dsl::{CompiledExpr, EvalError, ExprError, ResolveOptions};
use std::collections::HashSet;

fn row(pairs: &[(&str, Value)]) -> Sources {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn compile(source: &str, sources: &Sources) -> Result<CompiledExpr, ExprError> {
    let known: HashSet<String> = sources.keys().cloned().collect();
    CompiledExpr::compile(source, &known, ResolveOptions::default())
}

#[test]
fn test_sandbox_rejects_side_effects() {
    let sources = row(&[("foo", Value::Int(1))]);
    let rejected = [
        "import os",
        "raise Exception",
        "foo = 5",
        "__import__('os').system('ls')",
        "open('/etc/passwd')",
        "exec('print(1)')",
        "eval('1')",
        "foo.__class__",
        "lambda: 1",
        "[x for x in foo]",
        "del foo",
        "foo; foo",
    ];
    for source in rejected {
        let result = compile(source, &sources);
        assert!(result.is_err(), "{} should not compile", source);
    }
}

#[test]
fn test_statement_forms_are_syntax_errors() {
    let sources = row(&[("foo", Value::Int(1))]);
    for source in ["import os", "raise Exception", "foo = 5"] {
        match compile(source, &sources) {
            Err(err) => assert!(err.is_syntax_error(), "{}: {}", source, err),
            Ok(_) => panic!("{} compiled", source),
        }
    }
}

#[test]
fn test_derived_ratio() -> Result<(), ExprError> {
    let sources = row(&[
        ("hits", Value::Int(30)),
        ("misses", Value::Str("10".into())),
    ]);
    let expr = compile("hits / (hits + float(misses)) * 100", &sources)?;
    assert_eq!(expr.evaluate(&sources), Ok(Value::Float(75.0)));
    Ok(())
}

#[test]
fn test_runtime_errors_surface_as_eval_errors() -> Result<(), ExprError> {
    let sources = row(&[("test.foo", Value::Int(5))]);
    let expr = compile("test.foo / 0", &sources)?;
    assert_eq!(
        expr.evaluate(&sources),
        Err(EvalError::ZeroDivision("division by zero".into()))
    );
    Ok(())
}

#[test]
fn test_source_missing_at_runtime() -> Result<(), ExprError> {
    let known = row(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
    let expr = compile("a + b", &known)?;
    let partial = row(&[("a", Value::Int(1))]);
    assert_eq!(
        expr.evaluate(&partial),
        Err(EvalError::MissingSource("b".into()))
    );
    Ok(())
}

#[test]
fn test_long_operator_chain_is_rejected_at_compile_time() {
    let sources = row(&[("foo", Value::Int(1))]);
    let long = format!("foo{}", "+1".repeat(5000));
    match compile(&long, &sources) {
        Err(err) => {
            assert!(err.is_syntax_error());
            assert!(err.to_string().contains("nested too deeply"), "{}", err);
        }
        Ok(_) => panic!("a 5000-term chain compiled"),
    }
}

#[test]
fn test_metric_names_with_numeric_and_keyword_segments() -> Result<(), ExprError> {
    let sources = row(&[
        ("system.load.1", Value::Float(1.5)),
        ("net.bytes.in", Value::Int(50)),
        ("net.bytes.in.total", Value::Int(100)),
    ]);
    let expr = compile("net.bytes.in / net.bytes.in.total * system.load.1", &sources)?;
    assert_eq!(expr.evaluate(&sources), Ok(Value::Float(0.75)));
    let expected: Vec<String> = ["net.bytes.in", "net.bytes.in.total", "system.load.1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(expr.references().to_vec(), expected);
    Ok(())
}

proptest! {
    #[test]
    fn prop_integer_arithmetic_matches_native(a in -1_000_000i64..1_000_000, b in 1i64..1000) {
        let sources = row(&[("a", Value::Int(a)), ("b", Value::Int(b))]);
        let sum = compile("a + b * 2 - 1", &sources).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(sum.evaluate(&sources), Ok(Value::Int(a + b * 2 - 1)));

        let floor = compile("a // b", &sources).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(floor.evaluate(&sources), Ok(Value::Int(a.div_euclid(b))));

        let modulo = compile("a % b", &sources).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(modulo.evaluate(&sources), Ok(Value::Int(a.rem_euclid(b))));
    }
}
