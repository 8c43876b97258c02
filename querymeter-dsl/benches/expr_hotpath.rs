use criterion::{criterion_group, criterion_main, Criterion};
use querymeter_core::{Sources, Value};
use querymeter_dsl::{CompiledExpr, ResolveOptions};
use std::collections::HashSet;
use std::hint::black_box;

const EXPR: &str = "(db.rows_fetched - db.rows_returned) / max(db.rows_fetched, 1) * 100 \
                    if db.state == 'up' else 0";

fn sources() -> Sources {
    let mut sources = Sources::new();
    sources.insert("db.rows_fetched".to_string(), Value::Int(125_000));
    sources.insert("db.rows_returned".to_string(), Value::Int(98_000));
    sources.insert("db.state".to_string(), Value::Str("up".to_string()));
    sources
}

fn bench_compile(c: &mut Criterion) {
    let known: HashSet<String> = sources().into_keys().collect();
    c.bench_function("expr/compile", |b| {
        b.iter(|| {
            let compiled = CompiledExpr::compile(black_box(EXPR), &known, ResolveOptions::default())
                .expect("compile expression");
            black_box(compiled.references().len());
        });
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let sources = sources();
    let known: HashSet<String> = sources.keys().cloned().collect();
    let compiled =
        CompiledExpr::compile(EXPR, &known, ResolveOptions::default()).expect("compile expression");
    c.bench_function("expr/evaluate", |b| {
        b.iter(|| {
            let value = compiled.evaluate(black_box(&sources)).expect("evaluate expression");
            black_box(value);
        });
    });
}

criterion_group!(benches, bench_compile, bench_evaluate);
criterion_main!(benches);
