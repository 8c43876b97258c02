//! querymeter DSL - sandboxed expressions for derived values
//!
//! Extras of type `expression` compute a value from the sources collected
//! for the current row. The language is a small, side-effect free subset of
//! familiar arithmetic syntax:
//!
//! ```text
//! Expression text
//!     ↓
//! Lexer (tokens, statement keywords flagged)
//!     ↓
//! Parser (single expression → AST)
//!     ↓
//! CompiledExpr (names resolved against known sources)
//!     ↓
//! evaluate(sources) → Value
//! ```
//!
//! Anything that is not an expression (imports, assignments, raises,
//! attribute access, arbitrary calls) fails at parse time.

pub mod compiled;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod pretty_printer;

pub use compiled::{CompiledExpr, ResolveOptions};
pub use error::{EvalError, ExprError};
pub use eval::evaluate;
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::*;
pub use pretty_printer::pretty_print;
