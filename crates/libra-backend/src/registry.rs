//! Backend registry — builds named backends from configuration.
//!
//! Each backend kind maps to a constructor. Construction walks the
//! configured backends in name order and stops at the first failure,
//! so callers either get every backend or an error, never a subset.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use libra_core::{BackendConfig, BackendKind, ConfigError, Settings};

use crate::backender::{Backender, ConfiguredBackends};
use crate::cloudwatch::CloudWatchBackend;
use crate::error::{BackendResult, InitError};
use crate::graphite::GraphiteBackend;
use crate::prometheus::PrometheusBackend;

/// Boxed future returned by a [`Constructor`].
pub type ConstructFuture<'a> =
    Pin<Box<dyn Future<Output = BackendResult<Box<dyn Backender>>> + Send + 'a>>;

/// Builds one backend from its name, parsed config, and process settings.
pub type Constructor = for<'a> fn(&'a str, &'a BackendConfig, &'a Settings) -> ConstructFuture<'a>;

/// Maps backend kind names to constructors.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    constructors: HashMap<String, Constructor>,
}

impl BackendRegistry {
    /// A registry with no kinds registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the Prometheus, CloudWatch and Graphite kinds.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in BackendKind::ALL {
            let constructor: Constructor = match kind {
                BackendKind::CloudWatch => build_cloudwatch,
                BackendKind::Graphite => build_graphite,
                BackendKind::Prometheus => build_prometheus,
            };
            registry.register(kind.as_str(), constructor);
        }
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, constructor: Constructor) -> &mut Self {
        self.constructors.insert(kind.into(), constructor);
        self
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build every configured backend.
    pub async fn initialize(
        &self,
        configs: &BTreeMap<String, BackendConfig>,
        settings: &Settings,
    ) -> Result<ConfiguredBackends, InitError> {
        let mut backends = ConfiguredBackends::new();

        for (name, conf) in configs {
            let constructor = self.resolve(name, &conf.kind)?;

            debug!(backend = %name, kind = %conf.kind, "constructing backend");
            let backend = constructor(name, conf, settings).await.map_err(|source| {
                InitError::BadConfiguration {
                    name: name.clone(),
                    source,
                }
            })?;

            info!(backend = %name, kind = %conf.kind, "backend ready");
            backends.insert(name.clone(), backend);
        }

        Ok(backends)
    }

    fn resolve(&self, name: &str, kind: &str) -> Result<Constructor, ConfigError> {
        if kind.is_empty() {
            return Err(ConfigError::MissingKind(name.to_string()));
        }
        self.constructors
            .get(kind)
            .copied()
            .ok_or_else(|| ConfigError::UnknownKind {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Build every configured backend with the built-in kinds.
pub async fn initialize_backends(
    configs: &BTreeMap<String, BackendConfig>,
    settings: &Settings,
) -> Result<ConfiguredBackends, InitError> {
    BackendRegistry::builtin().initialize(configs, settings).await
}

fn build_prometheus<'a>(
    name: &'a str,
    conf: &'a BackendConfig,
    _settings: &'a Settings,
) -> ConstructFuture<'a> {
    Box::pin(async move {
        let backend = PrometheusBackend::connect(name, conf)?;
        Ok(Box::new(backend) as Box<dyn Backender>)
    })
}

fn build_cloudwatch<'a>(
    name: &'a str,
    conf: &'a BackendConfig,
    _settings: &'a Settings,
) -> ConstructFuture<'a> {
    Box::pin(async move {
        let backend = CloudWatchBackend::connect(name, conf).await?;
        Ok(Box::new(backend) as Box<dyn Backender>)
    })
}

fn build_graphite<'a>(
    name: &'a str,
    conf: &'a BackendConfig,
    settings: &'a Settings,
) -> ConstructFuture<'a> {
    Box::pin(async move {
        let backend = GraphiteBackend::connect(name, conf, settings)?;
        Ok(Box::new(backend) as Box<dyn Backender>)
    })
}
