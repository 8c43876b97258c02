/// Expression Tracer - Shows the flow through Lexer → Parser → Evaluator
///
/// Usage: cargo run --bin trace_expr '<expression>' [name=value ...]

use querymeter_core::{Sources, Value};
use querymeter_dsl::{pretty_print, CompiledExpr, Lexer, ResolveOptions};
use std::collections::HashSet;

fn parse_binding(binding: &str) -> Option<(String, Value)> {
    let (name, raw) = binding.split_once('=')?;
    let value = if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::Str(raw.to_string())
    };
    Some((name.to_string(), value))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin trace_expr '<expression>' [name=value ...]");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin trace_expr 'test.foo / 2' test.foo=5");
        std::process::exit(1);
    }

    let source = &args[1];
    let mut sources = Sources::new();
    for binding in &args[2..] {
        match parse_binding(binding) {
            Some((name, value)) => {
                sources.insert(name, value);
            }
            None => {
                eprintln!("Ignoring malformed binding {:?} (expected name=value)", binding);
            }
        }
    }

    println!("EXPRESSION: {}", source);
    println!();

    println!("TOKENS:");
    for token in Lexer::new(source).tokenize() {
        println!(
            "  {:>3}:{:<3} {:?}",
            token.span.line, token.span.column, token.kind
        );
    }
    println!();

    let known: HashSet<String> = sources.keys().cloned().collect();
    let compiled = match CompiledExpr::compile(source, &known, ResolveOptions::default()) {
        Ok(compiled) => compiled,
        Err(e) => {
            println!("COMPILE ERROR: {}", e);
            std::process::exit(2);
        }
    };

    println!("AST:");
    println!("{:#?}", compiled.ast());
    println!();

    println!("CANONICAL: {}", pretty_print(compiled.ast()));
    println!("REFERENCES: {:?}", compiled.references());
    println!();

    match compiled.evaluate(&sources) {
        Ok(value) => println!("RESULT: {} ({})", value, value.type_name()),
        Err(e) => println!("EVALUATION ERROR: {}", e),
    }
}
