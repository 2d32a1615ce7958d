//! Prometheus backend.
//!
//! Runs an instant query for the rule's metric and accepts exactly one
//! sample back:
//!
//! ```text
//! vector, 1 sample   → sample value (NoData if NaN or infinite)
//! vector, 0 samples  → NoData
//! vector, n samples  → Ambiguous
//! matrix/scalar/string → WrongResultType
//! ```

pub mod api;
pub mod value;

use std::fmt;
use std::time::SystemTime;

use tracing::{debug, warn};

use libra_core::{BackendConfig, BackendKind, Rule};

use crate::backender::{BackendInfo, Backender, ValueFuture};
use crate::error::{BackendError, BackendResult};

pub use api::{HttpQueryApi, QueryApi, QueryFuture, Range};
pub use value::{QueryValue, Sample, ScalarPoint, Series, StringPoint};

/// Connection settings for a Prometheus backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrometheusConfig {
    pub kind: String,
    pub name: String,
    pub host: String,
}

impl From<&BackendConfig> for PrometheusConfig {
    fn from(conf: &BackendConfig) -> Self {
        Self {
            kind: conf.kind.clone(),
            name: conf.name.clone(),
            host: conf.host.clone(),
        }
    }
}

pub struct PrometheusBackend {
    name: String,
    kind: String,
    host: String,
    connection: Box<dyn QueryApi>,
}

impl PrometheusBackend {
    /// Wrap an existing query client. `name` identifies the backend even
    /// when the config carries a different one.
    pub fn new(
        name: &str,
        config: PrometheusConfig,
        connection: Box<dyn QueryApi>,
    ) -> BackendResult<Self> {
        let kind = if config.kind.is_empty() {
            BackendKind::Prometheus.to_string()
        } else {
            config.kind
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            host: config.host,
            connection,
        })
    }

    /// Build a backend talking to `conf.host` over HTTP.
    pub fn connect(name: &str, conf: &BackendConfig) -> BackendResult<Self> {
        let api = HttpQueryApi::new(&conf.host, conf.timeout())?;
        Self::new(name, PrometheusConfig::from(conf), Box::new(api))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn fetch_value(&self, rule: &Rule) -> BackendResult<f64> {
        if rule.metric_name.is_empty() {
            return Err(BackendError::missing_metric_name());
        }

        let query = build_query(rule);
        debug!(backend = %self.name, %query, "querying prometheus");

        let value = self.connection.query(&query, SystemTime::now()).await?;
        extract_value(&rule.metric_name, value)
    }
}

/// Label match operators, longest first so `=~` is not read as `=`.
const MATCH_OPERATORS: [&str; 4] = ["=~", "!~", "!=", "="];

/// Render `metric{k="v",...}`.
///
/// A label value may start with a match operator (`=~prod.*`, `!=test`);
/// without one the matcher is an equality. The rest of the value is
/// quoted as a PromQL string.
pub fn build_query(rule: &Rule) -> String {
    if rule.labels.is_empty() {
        return rule.metric_name.clone();
    }
    let matchers: Vec<String> = rule
        .labels
        .iter()
        .map(|(k, v)| {
            let (op, operand) = MATCH_OPERATORS
                .iter()
                .find_map(|op| v.strip_prefix(op).map(|rest| (*op, rest)))
                .unwrap_or(("=", v.as_str()));
            format!("{k}{op}\"{}\"", escape_label_value(operand))
        })
        .collect();
    format!("{}{{{}}}", rule.metric_name, matchers.join(","))
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Reduce a query result to the single value it must contain.
pub fn extract_value(metric: &str, value: QueryValue) -> BackendResult<f64> {
    match value {
        QueryValue::Vector(samples) => match samples.as_slice() {
            [sample] if sample.value.is_finite() => Ok(sample.value),
            [sample] => {
                warn!(metric, value = %sample.value, "prometheus returned a non-finite sample");
                Err(BackendError::NoData(format!(
                    "metric {metric} returned non-finite value {}",
                    sample.value
                )))
            }
            [] => Err(BackendError::no_data(metric, "samples")),
            _ => Err(BackendError::ambiguous(metric, samples.len(), "samples")),
        },
        _ => Err(BackendError::WrongResultType(format!(
            "metric {metric} is not a vector"
        ))),
    }
}

impl Backender for PrometheusBackend {
    fn get_value<'a>(&'a self, rule: &'a Rule) -> ValueFuture<'a> {
        Box::pin(self.fetch_value(rule))
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Debug for PrometheusBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusBackend")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}
