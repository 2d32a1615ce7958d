//! Prometheus query client.
//!
//! [`QueryApi`] is the seam between the backend and the network; tests
//! inject their own implementation, production uses [`HttpQueryApi`].

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::value::{QueryValue, decode_response};
use crate::error::{BackendError, BackendResult};
use crate::http::HttpClient;

/// Boxed future returned by [`QueryApi`] methods.
pub type QueryFuture<'a> = Pin<Box<dyn Future<Output = BackendResult<QueryValue>> + Send + 'a>>;

/// Time span and resolution of a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: SystemTime,
    pub end: SystemTime,
    pub step: Duration,
}

/// A Prometheus-compatible query endpoint.
pub trait QueryApi: Send + Sync {
    /// Evaluate `query` at a single instant.
    fn query<'a>(&'a self, query: &'a str, time: SystemTime) -> QueryFuture<'a>;

    /// Evaluate `query` over a range of time.
    fn query_range<'a>(&'a self, query: &'a str, range: Range) -> QueryFuture<'a>;
}

/// [`QueryApi`] over the Prometheus HTTP API (`/api/v1/query*`).
#[derive(Debug, Clone)]
pub struct HttpQueryApi {
    http: HttpClient,
}

impl HttpQueryApi {
    pub fn new(host: &str, timeout: Duration) -> BackendResult<Self> {
        Ok(Self {
            http: HttpClient::new(host, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.http.base()
    }

    async fn fetch(&self, path_and_query: String) -> BackendResult<QueryValue> {
        let (status, body) = self.http.get(&path_and_query).await?;

        // Error responses (400, 422, 503) still carry a JSON error body.
        match decode_response(&body) {
            Err(BackendError::Transport(e)) if !status.is_success() => {
                Err(BackendError::Transport(format!("HTTP {status}: {e}")))
            }
            result => {
                if let Ok(value) = &result {
                    debug!(result_type = value.type_name(), "prometheus query answered");
                }
                result
            }
        }
    }
}

impl QueryApi for HttpQueryApi {
    fn query<'a>(&'a self, query: &'a str, time: SystemTime) -> QueryFuture<'a> {
        let path = format!(
            "/api/v1/query?query={}&time={:.3}",
            urlencoding::encode(query),
            unix_secs(time)
        );
        Box::pin(self.fetch(path))
    }

    fn query_range<'a>(&'a self, query: &'a str, range: Range) -> QueryFuture<'a> {
        let path = format!(
            "/api/v1/query_range?query={}&start={:.3}&end={:.3}&step={}",
            urlencoding::encode(query),
            unix_secs(range.start),
            unix_secs(range.end),
            range.step.as_secs_f64()
        );
        Box::pin(self.fetch(path))
    }
}

fn unix_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
