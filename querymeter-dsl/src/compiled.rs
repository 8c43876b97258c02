//! Compiled expressions
//!
//! Compilation parses the text and resolves every referenced name against
//! the sources that will exist when the expression runs. After that the
//! expression can only fail on runtime values (division by zero, type
//! mismatches), never on unknown names.
//!
//! Outside verbose mode a known source may be written bare even when its
//! name is not a valid identifier (`system.load.1`, `bytes.in`,
//! `rows-read`). Such names are rewritten to `SOURCES["..."]` lookups,
//! longest name first, before the text is tokenized.

use crate::error::{EvalError, ExprError};
use crate::eval::evaluate;
use crate::parser::{parse, Expr, SOURCES_NAME};
use querymeter_core::{Sources, Value};
use std::collections::HashSet;

/// Name-resolution settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Only `SOURCES["..."]` lookups are accepted.
    pub verbose: bool,
}

/// An expression that parsed and resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
    references: Vec<String>,
}

impl CompiledExpr {
    /// Parse `source` and check every reference against `known`.
    pub fn compile(
        source: &str,
        known: &HashSet<String>,
        options: ResolveOptions,
    ) -> Result<Self, ExprError> {
        let ast = if options.verbose {
            parse(source)?
        } else {
            parse(&resolve_source_names(source, known))?
        };
        let mut references: Vec<String> = Vec::new();

        check_references(&ast, known, options)?;
        for name in ast.references() {
            if !references.iter().any(|r| r == name) {
                references.push(name.to_string());
            }
        }

        Ok(Self {
            source: source.to_string(),
            ast,
            references,
        })
    }

    pub fn evaluate(&self, sources: &Sources) -> Result<Value, EvalError> {
        evaluate(&self.ast, sources)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Distinct source names read by the expression.
    pub fn references(&self) -> &[String] {
        &self.references
    }
}

/// Rewrite bare references to known sources as explicit lookups. String
/// literals and comments are copied untouched.
fn resolve_source_names(source: &str, known: &HashSet<String>) -> String {
    let mut names: Vec<&str> = known
        .iter()
        .map(String::as_str)
        .filter(|name| !name.is_empty() && !is_number(name))
        .collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        let taken = match c {
            '"' | '\'' => string_literal_len(rest, c),
            '#' => rest.find('\n').unwrap_or(rest.len()),
            _ if prev.map(continues_name).unwrap_or(false) => c.len_utf8(),
            _ => match names.iter().find(|name| references_at(rest, name)) {
                Some(name) => {
                    push_lookup(&mut out, name);
                    prev = Some(']');
                    rest = &rest[name.len()..];
                    continue;
                }
                None => c.len_utf8(),
            },
        };
        out.push_str(&rest[..taken]);
        prev = rest[..taken].chars().next_back();
        rest = &rest[taken..];
    }

    out
}

fn continues_name(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn is_number(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_digit() || c == '.') && name.parse::<f64>().is_ok()
}

/// `name` starts `rest`, ends at a name boundary and is not a call.
fn references_at(rest: &str, name: &str) -> bool {
    match rest.strip_prefix(name) {
        Some(after) => {
            !after.starts_with(continues_name) && !after.trim_start().starts_with('(')
        }
        None => false,
    }
}

/// Byte length of the string literal opening `rest`, closing quote included.
/// Unterminated literals stop before the line break.
fn string_literal_len(rest: &str, quote: char) -> usize {
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' => return i,
            c if c == quote => return i + c.len_utf8(),
            _ => {}
        }
    }
    rest.len()
}

fn push_lookup(out: &mut String, name: &str) {
    out.push_str(SOURCES_NAME);
    out.push_str("[\"");
    for c in name.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push_str("\"]");
}

fn check_references(
    expr: &Expr,
    known: &HashSet<String>,
    options: ResolveOptions,
) -> Result<(), ExprError> {
    match expr {
        Expr::Name(name) if options.verbose => Err(ExprError::BareName(name.clone())),
        Expr::Name(name) | Expr::Source(name) => {
            if known.contains(name) {
                Ok(())
            } else {
                Err(ExprError::UnknownSource(name.clone()))
            }
        }
        Expr::Literal(_) => Ok(()),
        Expr::Unary { operand, .. } => check_references(operand, known, options),
        Expr::Binary { left, right, .. } | Expr::BoolOp { left, right, .. } => {
            check_references(left, known, options)?;
            check_references(right, known, options)
        }
        Expr::Compare { first, rest } => {
            check_references(first, known, options)?;
            rest.iter()
                .try_for_each(|(_, e)| check_references(e, known, options))
        }
        Expr::Conditional { body, test, orelse } => {
            check_references(body, known, options)?;
            check_references(test, known, options)?;
            check_references(orelse, known, options)
        }
        Expr::Call { args, .. } => args
            .iter()
            .try_for_each(|arg| check_references(arg, known, options)),
    }
}
