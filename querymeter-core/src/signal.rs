//! Observability signals and the sink that receives them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric submission primitives of a metrics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Gauge,
    Count,
    MonotonicCount,
    Rate,
    Histogram,
    Historate,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Gauge,
        MetricKind::Count,
        MetricKind::MonotonicCount,
        MetricKind::Rate,
        MetricKind::Histogram,
        MetricKind::Historate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Count => "count",
            MetricKind::MonotonicCount => "monotonic_count",
            MetricKind::Rate => "rate",
            MetricKind::Histogram => "histogram",
            MetricKind::Historate => "historate",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service check status. The numeric codes are part of the sink contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl ServiceCheckStatus {
    /// Parse a status name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ok" => Some(ServiceCheckStatus::Ok),
            "warning" => Some(ServiceCheckStatus::Warning),
            "critical" => Some(ServiceCheckStatus::Critical),
            "unknown" => Some(ServiceCheckStatus::Unknown),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Destination for everything a compiled query emits.
///
/// Implementations are shared by every executor of a check, so all methods
/// take `&self`; sinks that buffer must synchronize internally.
pub trait MetricSink: Send + Sync {
    fn submit_metric(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        tags: &[String],
        hostname: Option<&str>,
    );

    fn submit_service_check(
        &self,
        name: &str,
        status: ServiceCheckStatus,
        tags: &[String],
        hostname: Option<&str>,
        message: Option<&str>,
    );

    /// Metadata goes to a separate store keyed by entity (usually the check id).
    fn submit_metadata(&self, entity: &str, name: &str, value: &str);
}
