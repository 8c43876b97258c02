//! querymeter engine - run compiled queries, submit their signals
//!
//! ```text
//! InitConfig + InstanceConfig (YAML)
//!     ↓
//! QueryManager: check queries ++ merged custom queries
//!     ↓
//! QueryExecutor::compile → CompiledQuery per definition
//!     ↓
//! QueryExecutor::execute → QueryRunner rows → transformers → MetricSink
//! ```
//!
//! Compile errors are returned to the caller. Everything that goes wrong
//! while executing is logged through `tracing` and skipped at the smallest
//! scope: the query, the row, or the single transformer.

pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod options;
pub mod telemetry;

pub use config::{load_init_config, load_instance_config, GlobalQueryPolicy, InitConfig, InstanceConfig};
pub use error::{ConfigError, EngineError, EngineResult, TelemetryError};
pub use executor::{QueryExecutor, QueryState};
pub use manager::{merge_custom_queries, name_custom_queries, QueryManager};
pub use options::{ErrorHandler, ExecutorOptions};
pub use telemetry::{init_tracing, init_tracing_with};

pub use querymeter_compiler::{CompileError, CompileResult, CompiledQuery};
pub use querymeter_core::{
    Clock, MetricKind, MetricSink, QueryError, QueryRunner, Row, ServiceCheckStatus, SystemClock,
    Value,
};
