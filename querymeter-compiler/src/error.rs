//! Compiler errors
//!
//! Compile-time errors are configuration feedback: their `Display` text is
//! what the user sees, so every message is fixed wording.

use querymeter_core::ValueError;
use querymeter_dsl::{EvalError, ExprError};
use thiserror::Error;

// ============================================================================
// COMPILE-TIME ERRORS
// ============================================================================

/// A query definition failed validation or one of its transformers failed
/// to compile.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("query field `{field}` is required")]
    MissingQueryField { field: &'static str },

    #[error("query field `{field}` must be {expected}")]
    InvalidQueryField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` for {owner} is required")]
    MissingField { field: &'static str, owner: String },

    #[error("field `{field}` for {owner} must be {expected}")]
    InvalidField {
        field: &'static str,
        owner: String,
        expected: &'static str,
    },

    #[error("field `{field}` for {owner} must not be empty")]
    EmptyField { field: &'static str, owner: String },

    #[error("{owner} is not a mapping")]
    NotAMapping { owner: String },

    #[error("unknown type `{kind}` for {owner}")]
    UnknownType { kind: String, owner: String },

    #[error("the name {name} of {query} was already defined in {previous}")]
    DuplicateName {
        name: String,
        query: String,
        previous: String,
    },

    #[error("error compiling type `{kind}` for {owner}: {source}")]
    Transformer {
        kind: String,
        owner: String,
        source: TransformerError,
    },

    #[error("field `hostname` for {owner} references unknown source `{name}`")]
    UnknownHostnameSource { owner: String, name: String },

    #[error("query name `{name}` is defined more than once")]
    DuplicateQuery { name: String },
}

impl CompileError {
    /// Whether the error comes from an expression that is not valid syntax.
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            CompileError::Transformer {
                source: TransformerError::Expression(e),
                ..
            } if e.is_syntax_error()
        )
    }
}

/// Parameter errors of a single transformer. Wrapped in
/// [`CompileError::Transformer`] to name the column or extra.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformerError {
    #[error("the `{0}` parameter is required")]
    MissingParameter(&'static str),

    #[error("the `{param}` parameter must be {expected}")]
    InvalidParameter {
        param: &'static str,
        expected: &'static str,
    },

    #[error("the `{0}` parameter must not be empty")]
    EmptyParameter(&'static str),

    #[error("the `scale` parameter must be one of: microsecond, millisecond, nanosecond, second")]
    UnknownScale,

    #[error(
        "the `scale` parameter must be an integer representing parts of a second e.g. 1000 for millisecond"
    )]
    InvalidScale,

    #[error("item `{0}` is not a mapping")]
    ItemNotAMapping(String),

    #[error("the `{param}` parameter for item `{item}` is required")]
    MissingItemParameter { param: &'static str, item: String },

    #[error("the `{param}` parameter for item `{item}` must be a string")]
    InvalidItemParameter { param: &'static str, item: String },

    #[error("unknown type `{kind}` for item `{item}`")]
    UnknownItemType { kind: String, item: String },

    #[error("error compiling type `{kind}` for item `{item}`: {source}")]
    Item {
        kind: String,
        item: String,
        source: Box<TransformerError>,
    },

    #[error("unknown submit_type `{0}`")]
    UnknownSubmitType(String),

    #[error("the `{param}` parameter `{name}` is not an available source")]
    UnavailableSource { param: &'static str, name: String },

    #[error("status `{status}` for value `{value}` of parameter `status_map` is not a string")]
    StatusNotString { status: String, value: String },

    #[error("invalid status `{status}` for value `{value}` of parameter `status_map`")]
    InvalidStatus { status: String, value: String },

    #[error("the `message` parameter references unknown source `{0}`")]
    UnknownTemplateSource(String),

    #[error("the `pattern` parameter is not a valid regular expression: {0}")]
    InvalidPattern(String),

    #[error("unknown version scheme `{0}`")]
    UnknownScheme(String),

    #[error(transparent)]
    Expression(#[from] ExprError),
}

// ============================================================================
// RUNTIME ERRORS
// ============================================================================

/// A transformer failed on one row value. Logged and skipped by the executor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("source `{0}` is not available")]
    MissingSource(String),

    #[error("{value} is not a timestamp")]
    NotATimestamp { value: String },

    #[error("could not parse {value} with format `{format}`")]
    Timestamp { value: String, format: String },

    #[error("version {raw} does not match the {scheme} scheme")]
    Version { raw: String, scheme: &'static str },
}

pub type CompileResult<T> = Result<T, CompileError>;
