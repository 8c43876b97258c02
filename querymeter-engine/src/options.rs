//! Executor-level settings

use querymeter_core::{Clock, SystemClock};
use std::fmt;
use std::sync::Arc;

/// Rewrites a query error message before it is logged.
pub type ErrorHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Settings shared by every query of one executor.
#[derive(Clone)]
pub struct ExecutorOptions {
    /// Added to every signal.
    pub tags: Vec<String>,
    /// Used when a query has no `hostname` of its own.
    pub hostname: Option<String>,
    pub error_handler: Option<ErrorHandler>,
    /// Prepended to metric names unless a column sets `raw: true`.
    pub metric_namespace: Option<String>,
    /// Entity key for metadata submissions.
    pub check_id: String,
    /// When set, each query's wall time is submitted under this name.
    pub operation_time_metric: Option<String>,
    /// Accept mapping and sequence `query` values.
    pub structured_queries: bool,
    pub clock: Arc<dyn Clock>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            hostname: None,
            error_handler: None,
            metric_namespace: None,
            check_id: String::new(),
            operation_time_metric: None,
            structured_queries: false,
            clock: Arc::new(SystemClock::new()),
        }
    }
}

impl fmt::Debug for ExecutorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorOptions")
            .field("tags", &self.tags)
            .field("hostname", &self.hostname)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "<fn>"))
            .field("metric_namespace", &self.metric_namespace)
            .field("check_id", &self.check_id)
            .field("operation_time_metric", &self.operation_time_metric)
            .field("structured_queries", &self.structured_queries)
            .finish_non_exhaustive()
    }
}

impl ExecutorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_metric_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metric_namespace = Some(namespace.into());
        self
    }

    pub fn with_check_id(mut self, check_id: impl Into<String>) -> Self {
        self.check_id = check_id.into();
        self
    }

    pub fn with_operation_time_metric(mut self, name: impl Into<String>) -> Self {
        self.operation_time_metric = Some(name.into());
        self
    }

    pub fn with_structured_queries(mut self, enabled: bool) -> Self {
        self.structured_queries = enabled;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn handle_error(&self, message: &str) -> String {
        match &self.error_handler {
            Some(handler) => handler(message),
            None => message.to_string(),
        }
    }
}
