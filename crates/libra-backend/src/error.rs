//! Backend error types.

use thiserror::Error;

use libra_core::ConfigError;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors returned by backend construction and value queries.
///
/// None of these are fatal: a failed query leaves the backend usable
/// for the next call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The rule is missing a field the backend needs.
    #[error("{0}")]
    InvalidRule(String),

    /// The upstream returned a result shape that cannot be reduced.
    #[error("{0}")]
    WrongResultType(String),

    /// The query matched nothing.
    #[error("{0}")]
    NoData(String),

    /// The query matched more than one series.
    #[error("{0}")]
    Ambiguous(String),

    /// Connection, HTTP, timeout or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered but reported an error.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Backend settings are unusable.
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

impl BackendError {
    /// The rule names no metric.
    pub fn missing_metric_name() -> Self {
        BackendError::InvalidRule("Missing metric_name inside config{} stanza".to_string())
    }

    pub(crate) fn no_data(metric: &str, what: &str) -> Self {
        BackendError::NoData(format!("metric {metric} returned no {what}"))
    }

    pub(crate) fn ambiguous(metric: &str, count: usize, what: &str) -> Self {
        BackendError::Ambiguous(format!(
            "metric {metric} is ambiguous: {count} {what} returned"
        ))
    }
}

/// Errors that abort building the backend registry.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bad configuration for {name}: {source}")]
    BadConfiguration {
        name: String,
        #[source]
        source: BackendError,
    },
}
