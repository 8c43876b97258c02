//! Error types shared across querymeter crates

use thiserror::Error;

/// Failure reported by a raw-query runner.
///
/// Only the message is kept: it is what ends up in the
/// `Error querying <name>: <message>` log line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for QueryError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for QueryError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Value coercion errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("could not convert {kind} to a number: {value}")]
    NotNumeric { kind: &'static str, value: String },
}
