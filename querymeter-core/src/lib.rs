//! querymeter core - shared types
//!
//! Pure data types and collaborator contracts. Every other querymeter crate
//! depends on this one; it never performs I/O itself.

pub mod clock;
pub mod error;
pub mod identity;
pub mod runner;
pub mod signal;
pub mod value;

pub use clock::{Clock, SystemClock};
pub use error::{QueryError, ValueError};
pub use identity::{compute_content_hash, ContentHash, QueryIdentity};
pub use runner::{QueryRunner, Row, RowStream};
pub use signal::{MetricKind, MetricSink, ServiceCheckStatus};
pub use value::{Sources, Value};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
