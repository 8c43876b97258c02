//! Raw-query runner contract
//!
//! The runner is the only piece that talks to a data source. It receives the
//! opaque `query` value of a definition and yields rows positionally aligned
//! with the declared columns.

use crate::error::QueryError;
use crate::value::Value;

/// One result row.
pub type Row = Vec<Value>;

/// Lazily produced rows. An `Err` item aborts the current query.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row, QueryError>> + 'a>;

/// Executes one raw query.
pub trait QueryRunner: Send + Sync {
    fn run<'a>(&'a self, query: &serde_json::Value) -> Result<RowStream<'a>, QueryError>;
}

/// Plain functions returning fully materialized rows are runners.
impl<F> QueryRunner for F
where
    F: Fn(&serde_json::Value) -> Result<Vec<Row>, QueryError> + Send + Sync,
{
    fn run<'a>(&'a self, query: &serde_json::Value) -> Result<RowStream<'a>, QueryError> {
        let rows = self(query)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}
