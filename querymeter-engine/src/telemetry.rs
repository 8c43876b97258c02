//! Tracing initialization
//!
//! Installs a global `tracing-subscriber` registry with an `EnvFilter` and a
//! fmt layer. Filter directives come from `QUERYMETER_LOG`, then `RUST_LOG`,
//! then default to `info`.

use crate::error::TelemetryError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable read before `RUST_LOG`.
pub const LOG_ENV: &str = "QUERYMETER_LOG";

const DEFAULT_FILTER: &str = "info";

/// Filter directives from the environment.
pub fn filter_directives() -> String {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber. A second call returns
/// [`TelemetryError::AlreadyInitialized`].
pub fn init_tracing() -> Result<(), TelemetryError> {
    init_tracing_with(&filter_directives())
}

/// Install the global subscriber with explicit filter directives.
pub fn init_tracing_with(directives: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(directives).map_err(|e| TelemetryError::InvalidFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter() {
        let err = init_tracing_with("querymeter=notalevel");
        assert!(matches!(err, Err(TelemetryError::InvalidFilter { .. })));
    }

    #[test]
    fn test_second_init_fails() {
        let first = init_tracing_with("debug");
        let second = init_tracing_with("debug");
        // another test may have installed it first
        assert!(first.is_ok() || first == Err(TelemetryError::AlreadyInitialized));
        assert_eq!(second, Err(TelemetryError::AlreadyInitialized));
    }
}
