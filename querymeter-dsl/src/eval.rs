//! Tree-walking evaluator
//!
//! Evaluation only reads the supplied sources. There is no environment,
//! attribute access or callable beyond the fixed builtins, so a compiled
//! expression cannot reach files, processes or the network.

use crate::error::EvalError;
use crate::parser::ast::*;
use querymeter_core::{Sources, Value};
use std::cmp::Ordering;

/// Evaluate an expression against the current row's sources.
pub fn evaluate(expr: &Expr, sources: &Sources) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(literal) => Ok(literal.to_value()),
        Expr::Name(name) | Expr::Source(name) => sources
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::MissingSource(name.clone())),
        Expr::Unary { op, operand } => unary(*op, evaluate(operand, sources)?),
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, sources)?;
            let right = evaluate(right, sources)?;
            binary(*op, left, right)
        }
        Expr::Compare { first, rest } => {
            let mut left = evaluate(first, sources)?;
            for (op, expr) in rest {
                let right = evaluate(expr, sources)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::BoolOp { op, left, right } => {
            let left = evaluate(left, sources)?;
            match (op, left.is_truthy()) {
                (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                _ => evaluate(right, sources),
            }
        }
        Expr::Conditional { body, test, orelse } => {
            if evaluate(test, sources)?.is_truthy() {
                evaluate(body, sources)
            } else {
                evaluate(orelse, sources)
            }
        }
        Expr::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, sources))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, values)
        }
    }
}

// ============================================================================
// NUMERIC MODEL
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!value.is_truthy()));
    }
    let symbol = if op == UnaryOp::Neg { "-" } else { "+" };
    match (op, Num::of(&value)) {
        (UnaryOp::Neg, Some(Num::Int(i))) => Ok(i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(i as f64)))),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        _ => Err(EvalError::Type(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            value.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    if op == BinaryOp::Add {
        match (&left, &right) {
            (Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => {}
        }
    }

    let (a, b) = match (Num::of(&left), Num::of(&right)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(type_error(op.symbol(), &left, &right)),
    };

    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(op, x, y),
        _ => float_op(op, a.as_f64(), b.as_f64()),
    }
}

fn int_op(op: BinaryOp, x: i64, y: i64) -> Result<Value, EvalError> {
    let overflow = || float_op(op, x as f64, y as f64);
    match op {
        BinaryOp::Add => x.checked_add(y).map(Value::Int).map_or_else(overflow, Ok),
        BinaryOp::Sub => x.checked_sub(y).map(Value::Int).map_or_else(overflow, Ok),
        BinaryOp::Mul => x.checked_mul(y).map(Value::Int).map_or_else(overflow, Ok),
        BinaryOp::Div => float_op(op, x as f64, y as f64),
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(EvalError::ZeroDivision(
                    "integer division or modulo by zero".to_string(),
                ));
            }
            match (x.checked_div(y), x.checked_rem(y)) {
                (Some(q), Some(r)) if r != 0 && ((r < 0) != (y < 0)) => Ok(Value::Int(q - 1)),
                (Some(q), Some(_)) => Ok(Value::Int(q)),
                _ => overflow(),
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(EvalError::ZeroDivision(
                    "integer division or modulo by zero".to_string(),
                ));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Value::Int(r + y))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinaryOp::Pow => {
            if y < 0 {
                return float_op(op, x as f64, y as f64);
            }
            u32::try_from(y)
                .ok()
                .and_then(|exp| x.checked_pow(exp))
                .map(Value::Int)
                .map_or_else(overflow, Ok)
        }
    }
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("division by zero".to_string()));
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision(
                    "float floor division by zero".to_string(),
                ));
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision("float modulo".to_string()));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::ZeroDivision(
                    "0.0 cannot be raised to a negative power".to_string(),
                ));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(EvalError::Value(
                    "negative number cannot be raised to a fractional power".to_string(),
                ));
            }
            x.powf(y)
        }
    };
    Ok(Value::Float(result))
}

// ============================================================================
// COMPARISON
// ============================================================================

fn values_equal(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => return a == b,
        (Some(a), Some(b)) => return a.as_f64() == b.as_f64(),
        _ => {}
    }
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => match (left.as_utc(), right.as_utc()) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

fn ordering(symbol: &str, left: &Value, right: &Value) -> Result<Option<Ordering>, EvalError> {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => return Ok(Some(a.cmp(&b))),
        (Some(a), Some(b)) => return Ok(a.as_f64().partial_cmp(&b.as_f64())),
        _ => {}
    }
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(Some(a.cmp(b)));
    }
    if let (Some(a), Some(b)) = (left.as_utc(), right.as_utc()) {
        return Ok(Some(a.cmp(&b)));
    }
    Err(EvalError::Type(format!(
        "'{}' not supported between instances of '{}' and '{}'",
        symbol,
        left.type_name(),
        right.type_name()
    )))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    Ok(match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Lt => ordering(op.symbol(), left, right)? == Some(Ordering::Less),
        CompareOp::Le => matches!(
            ordering(op.symbol(), left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => ordering(op.symbol(), left, right)? == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(op.symbol(), left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
    })
}

// ============================================================================
// BUILTINS
// ============================================================================

fn call(func: Builtin, args: Vec<Value>) -> Result<Value, EvalError> {
    let mut args = args.into_iter();
    let first = args.next().ok_or_else(|| {
        EvalError::Type(format!("{}() expected at least 1 argument", func.name()))
    })?;

    match func {
        Builtin::Abs => match Num::of(&first) {
            Some(Num::Int(i)) => Ok(i
                .checked_abs()
                .map(Value::Int)
                .unwrap_or(Value::Float((i as f64).abs()))),
            Some(Num::Float(f)) => Ok(Value::Float(f.abs())),
            None => Err(EvalError::Type(format!(
                "bad operand type for abs(): '{}'",
                first.type_name()
            ))),
        },
        Builtin::Min | Builtin::Max => {
            let wanted = if func == Builtin::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = first;
            for candidate in args {
                if ordering(if func == Builtin::Min { "<" } else { ">" }, &candidate, &best)?
                    == Some(wanted)
                {
                    best = candidate;
                }
            }
            Ok(best)
        }
        Builtin::Round => {
            let digits = match args.next() {
                None => None,
                Some(Value::Int(d)) => Some(d),
                Some(other) => {
                    return Err(EvalError::Type(format!(
                        "'{}' object cannot be interpreted as an integer",
                        other.type_name()
                    )))
                }
            };
            round(&first, digits)
        }
        Builtin::Float => first
            .as_f64()
            .map(Value::Float)
            .map_err(|e| EvalError::Value(e.to_string())),
        Builtin::Int => to_int(&first),
    }
}

fn float_to_int(f: f64) -> Result<Value, EvalError> {
    if !f.is_finite() {
        return Err(EvalError::Value(format!(
            "cannot convert float {} to integer",
            querymeter_core::value::format_float(f)
        )));
    }
    if f >= -(2f64.powi(63)) && f < 2f64.powi(63) {
        Ok(Value::Int(f as i64))
    } else {
        Ok(Value::Float(f.trunc()))
    }
}

fn round(value: &Value, digits: Option<i64>) -> Result<Value, EvalError> {
    let num = Num::of(value).ok_or_else(|| {
        EvalError::Type(format!(
            "type {} doesn't define __round__ method",
            value.type_name()
        ))
    })?;

    match (num, digits) {
        (Num::Int(i), None) => Ok(Value::Int(i)),
        (Num::Int(i), Some(d)) if d >= 0 => Ok(Value::Int(i)),
        (Num::Float(f), None) => float_to_int(f.round_ties_even()),
        (n, Some(d)) => {
            let factor = 10f64.powi(d.clamp(-308, 308) as i32);
            let rounded = (n.as_f64() * factor).round_ties_even() / factor;
            match n {
                Num::Int(_) => float_to_int(rounded),
                Num::Float(_) => Ok(Value::Float(rounded)),
            }
        }
    }
}

fn to_int(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => float_to_int(f.trunc()),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EvalError::Value(format!(
                "invalid literal for int() with base 10: {}",
                value.repr()
            ))
        }),
        other => Err(EvalError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}
