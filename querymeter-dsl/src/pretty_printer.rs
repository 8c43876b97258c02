//! Pretty printer for expression ASTs
//!
//! Output is fully parenthesized, so `parse(pretty_print(e)) == e` for every
//! AST the parser can produce.

use crate::parser::*;
use querymeter_core::value::format_float;
use std::fmt::Write;

/// Render an expression back to source text.
pub fn pretty_print(expr: &Expr) -> String {
    let mut out = String::new();
    print_expr(&mut out, expr);
    out
}

fn print_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Literal(literal) => print_literal(out, literal),
        Expr::Name(name) => out.push_str(name),
        Expr::Source(name) => {
            out.push_str(SOURCES_NAME);
            out.push('[');
            print_string(out, name);
            out.push(']');
        }
        Expr::Unary { op, operand } => {
            out.push('(');
            out.push_str(match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Not => "not ",
            });
            print_expr(out, operand);
            out.push(')');
        }
        Expr::Binary { op, left, right } => {
            out.push('(');
            print_expr(out, left);
            let _ = write!(out, " {} ", op.symbol());
            print_expr(out, right);
            out.push(')');
        }
        Expr::Compare { first, rest } => {
            out.push('(');
            print_expr(out, first);
            for (op, expr) in rest {
                let _ = write!(out, " {} ", op.symbol());
                print_expr(out, expr);
            }
            out.push(')');
        }
        Expr::BoolOp { op, left, right } => {
            out.push('(');
            print_expr(out, left);
            out.push_str(match op {
                BoolOp::And => " and ",
                BoolOp::Or => " or ",
            });
            print_expr(out, right);
            out.push(')');
        }
        Expr::Conditional { body, test, orelse } => {
            out.push('(');
            print_expr(out, body);
            out.push_str(" if ");
            print_expr(out, test);
            out.push_str(" else ");
            print_expr(out, orelse);
            out.push(')');
        }
        Expr::Call { func, args } => {
            out.push_str(func.name());
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_expr(out, arg);
            }
            out.push(')');
        }
    }
}

fn print_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Literal::Float(f) => out.push_str(&format_float(*f)),
        Literal::Str(s) => print_string(out, s),
        Literal::Bool(true) => out.push_str("True"),
        Literal::Bool(false) => out.push_str("False"),
        Literal::None => out.push_str("None"),
    }
}

fn print_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_simple() -> Result<(), ParseError> {
        assert_eq!(pretty_print(&parse("test.foo / 2")?), "(test.foo / 2)");
        assert_eq!(pretty_print(&parse("-2 ** 2")?), "(-(2 ** 2))");
        assert_eq!(
            pretty_print(&parse(r#"SOURCES["a b"] * 1.0"#)?),
            r#"(SOURCES["a b"] * 1.0)"#
        );
        assert_eq!(
            pretty_print(&parse("max(a, 1) if not b else None")?),
            "(max(a, 1) if (not b) else None)"
        );
        Ok(())
    }
}
