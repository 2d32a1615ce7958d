//! Minimal HTTP GET client shared by the Prometheus and Graphite backends.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{AUTHORIZATION, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::error::{BackendError, BackendResult};

const USER_AGENT_VALUE: &str = concat!("libra/", env!("CARGO_PKG_VERSION"));

/// A pooled HTTP/1 client bound to one upstream base URL.
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Client<HttpConnector, Empty<Bytes>>,
    base: String,
    timeout: Duration,
    authorization: Option<String>,
}

impl HttpClient {
    /// `host` may omit the scheme, in which case `http://` is assumed.
    pub(crate) fn new(host: &str, timeout: Duration) -> BackendResult<Self> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(BackendError::InvalidConfig("missing host".to_string()));
        }
        let base = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        let uri: Uri = base
            .parse()
            .map_err(|e| BackendError::InvalidConfig(format!("invalid host '{host}': {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(BackendError::InvalidConfig(format!(
                "unsupported scheme in host '{host}', only http is supported"
            )));
        }
        if uri.host().is_none() {
            return Err(BackendError::InvalidConfig(format!("invalid host '{host}'")));
        }

        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            client,
            base,
            timeout,
            authorization: None,
        })
    }

    /// Send HTTP Basic credentials with every request.
    pub(crate) fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{username}:{password}"));
        self.authorization = Some(format!("Basic {token}"));
        self
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    /// GET `path_and_query` relative to the base URL.
    ///
    /// The whole exchange, body included, is bounded by the client
    /// timeout. Non-2xx statuses are returned to the caller, which knows
    /// whether the body carries a structured error.
    pub(crate) async fn get(&self, path_and_query: &str) -> BackendResult<(StatusCode, Bytes)> {
        let uri = format!("{}{}", self.base, path_and_query);

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(&uri)
            .header(USER_AGENT, USER_AGENT_VALUE);
        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let req = builder
            .body(Empty::new())
            .map_err(|e| BackendError::Transport(format!("invalid request {uri}: {e}")))?;

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| BackendError::Transport(format!("GET {uri}: {e}")))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| BackendError::Transport(format!("reading body of {uri}: {e}")))?
                .to_bytes();
            Ok((status, body))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                if let Ok((status, body)) = &result {
                    debug!(%uri, %status, bytes = body.len(), "upstream responded");
                }
                result
            }
            Err(_) => Err(BackendError::Transport(format!(
                "GET {uri} timed out after {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base", &self.base)
            .field("timeout", &self.timeout)
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}
