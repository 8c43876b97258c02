//! querymeter compiler - query definitions to transformer pipelines
//!
//! ```text
//! raw definition (serde_json::Value)
//!     ↓
//! schema::validate → QueryDefinition
//!     ↓
//! compile_transformer per column, CompiledExtra per extra
//!     ↓
//! CompiledQuery (column index table + pipeline)
//! ```
//!
//! Compilation never touches a data source. Every error it reports is fatal
//! configuration feedback; runtime failures of a compiled transformer are
//! [`TransformError`]s that the executor logs and skips.

pub mod error;
pub mod extra;
pub mod params;
pub mod query;
pub mod schema;
pub mod template;
pub mod transformer;

pub use error::{CompileError, CompileResult, TransformError, TransformerError};
pub use extra::{CompiledExtra, ExtraKind};
pub use params::{is_affirmative_json, is_affirmative_str, Params};
pub use query::{CompileOptions, CompiledColumn, CompiledQuery};
pub use schema::{validate, ColumnSpec, FieldSpec, QueryDefinition, SchemaOptions};
pub use template::Template;
pub use transformer::{compile_transformer, CompileContext, RowContext, Submitter, Transformer};
