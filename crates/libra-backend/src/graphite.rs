//! Graphite backend.
//!
//! Uses the render API (`/render?format=json`). The target must resolve
//! to a single series; its most recent non-null datapoint is the value.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, warn};

use libra_core::{BackendConfig, BackendKind, Rule, Settings};

use crate::backender::{BackendInfo, Backender, ValueFuture};
use crate::error::{BackendError, BackendResult};
use crate::http::HttpClient;

/// Boxed future returned by [`GraphiteApi::render`].
pub type SeriesFuture<'a> = Pin<Box<dyn Future<Output = BackendResult<Vec<Series>>> + Send + 'a>>;

/// One rendered series. Datapoints are `(value, unix_timestamp)` in
/// ascending time order; gaps are `None`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Series {
    pub target: String,
    pub datapoints: Vec<(Option<f64>, i64)>,
}

impl Series {
    /// Most recent datapoint that carries a value.
    pub fn latest(&self) -> Option<f64> {
        self.datapoints.iter().rev().find_map(|(value, _)| *value)
    }
}

/// The Graphite render endpoint.
pub trait GraphiteApi: Send + Sync {
    fn render<'a>(&'a self, target: &'a str, from: &'a str) -> SeriesFuture<'a>;
}

/// [`GraphiteApi`] over HTTP with optional Basic authentication.
#[derive(Debug, Clone)]
pub struct HttpGraphiteApi {
    http: HttpClient,
}

impl HttpGraphiteApi {
    pub fn new(config: &GraphiteConfig, timeout: std::time::Duration) -> BackendResult<Self> {
        let mut http = HttpClient::new(&config.host, timeout)?;
        if !config.username.is_empty() {
            http = http.with_basic_auth(&config.username, &config.password);
        }
        Ok(Self { http })
    }

    async fn fetch(&self, target: &str, from: &str) -> BackendResult<Vec<Series>> {
        let path = format!(
            "/render?target={}&from={}&format=json",
            urlencoding::encode(target),
            urlencoding::encode(from)
        );
        let (status, body) = self.http.get(&path).await?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(BackendError::Upstream(format!(
                "HTTP {status}: {}",
                text.trim()
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|e| BackendError::Transport(format!("decoding graphite response: {e}")))
    }
}

impl GraphiteApi for HttpGraphiteApi {
    fn render<'a>(&'a self, target: &'a str, from: &'a str) -> SeriesFuture<'a> {
        Box::pin(self.fetch(target, from))
    }
}

/// Connection settings for a Graphite backend, password already resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct GraphiteConfig {
    pub kind: String,
    pub name: String,
    pub host: String,
    pub username: String,
    pub password: String,
}

impl GraphiteConfig {
    /// Take the configured password, or the process-wide fallback when
    /// the configured one is empty.
    pub fn resolve(conf: &BackendConfig, settings: &Settings) -> Self {
        let password = if conf.password.is_empty() {
            settings.graphite_password.clone().unwrap_or_default()
        } else {
            conf.password.clone()
        };
        Self {
            kind: conf.kind.clone(),
            name: conf.name.clone(),
            host: conf.host.clone(),
            username: conf.username.clone(),
            password,
        }
    }
}

impl fmt::Debug for GraphiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphiteConfig")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct GraphiteBackend {
    name: String,
    kind: String,
    host: String,
    connection: Box<dyn GraphiteApi>,
}

impl GraphiteBackend {
    pub fn new(
        name: &str,
        config: GraphiteConfig,
        connection: Box<dyn GraphiteApi>,
    ) -> BackendResult<Self> {
        if config.host.is_empty() {
            return Err(BackendError::InvalidConfig("missing host".to_string()));
        }
        let kind = if config.kind.is_empty() {
            BackendKind::Graphite.to_string()
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
    pub fn connect(name: &str, conf: &BackendConfig, settings: &Settings) -> BackendResult<Self> {
        let config = GraphiteConfig::resolve(conf, settings);
        if !config.username.is_empty() && config.password.is_empty() {
            warn!(backend = %name, "graphite username set without a password");
        }
        let api = HttpGraphiteApi::new(&config, conf.timeout())?;
        Self::new(name, config, Box::new(api))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn fetch_value(&self, rule: &Rule) -> BackendResult<f64> {
        if rule.metric_name.is_empty() {
            return Err(BackendError::missing_metric_name());
        }

        let from = rule.graphite_from();
        debug!(backend = %self.name, target = %rule.metric_name, %from, "querying graphite");

        let series = self.connection.render(&rule.metric_name, from).await?;
        extract_value(&rule.metric_name, &series)
    }
}

/// Reduce render output to the latest value of its only series.
pub fn extract_value(metric: &str, series: &[Series]) -> BackendResult<f64> {
    match series {
        [only] => only
            .latest()
            .ok_or_else(|| BackendError::no_data(metric, "datapoints")),
        [] => Err(BackendError::no_data(metric, "series")),
        _ => Err(BackendError::ambiguous(metric, series.len(), "series")),
    }
}

impl Backender for GraphiteBackend {
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

impl fmt::Debug for GraphiteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphiteBackend")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}
