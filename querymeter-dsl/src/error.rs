//! Expression errors

use crate::parser::ParseError;
use thiserror::Error;

/// Errors raised while compiling an expression against its known sources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("the source `{0}` referenced by the expression is not available")]
    UnknownSource(String),

    #[error("bare name `{0}` is not allowed in verbose mode, use SOURCES[\"{0}\"]")]
    BareName(String),
}

impl ExprError {
    /// Whether this error belongs to the syntax class (as opposed to a
    /// resolution failure).
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, ExprError::Syntax(_))
    }
}

/// Errors raised while evaluating a compiled expression for one row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("{0}")]
    ZeroDivision(String),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Value(String),

    #[error("source `{0}` is not available")]
    MissingSource(String),
}
