//! Registry construction from configuration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use libra_backend::registry::ConstructFuture;
use libra_backend::{
    BackendError, BackendInfo, BackendRegistry, Backender, InitError, ValueFuture,
    initialize_backends,
};
use libra_core::{BackendConfig, ConfigError, RootConfig, Rule, Settings};

fn backend(kind: &str, host: &str) -> BackendConfig {
    BackendConfig {
        kind: kind.to_string(),
        host: host.to_string(),
        ..BackendConfig::default()
    }
}

fn configs(entries: &[(&str, BackendConfig)]) -> BTreeMap<String, BackendConfig> {
    entries
        .iter()
        .map(|(name, conf)| (name.to_string(), conf.clone()))
        .collect()
}

#[tokio::test]
async fn builds_backends_from_config() {
    let root = RootConfig::from_toml_str(
        r#"
[backends.prom]
kind = "prometheus"
host = "http://prometheus:9090"

[backends.graphite]
kind = "graphite"
host = "http://graphite:8080"
username = "libra"
"#,
    )
    .unwrap();
    let settings = Settings {
        graphite_password: Some("fallback".to_string()),
        ..Settings::default()
    };

    let backends = initialize_backends(&root.backends, &settings).await.unwrap();

    assert_eq!(backends.len(), 2);
    assert_eq!(
        backends["prom"].info(),
        BackendInfo {
            kind: "prometheus".to_string(),
            name: "prom".to_string()
        }
    );
    assert_eq!(backends["graphite"].info().kind, "graphite");
}

#[tokio::test]
async fn empty_kind_is_a_config_error() {
    let configs = configs(&[("metrics", backend("", "http://localhost:9090"))]);

    let err = initialize_backends(&configs, &Settings::default())
        .await
        .unwrap_err();

    assert!(matches!(err, InitError::Config(ConfigError::MissingKind(_))));
    assert_eq!(err.to_string(), "missing backend type for 'metrics'");
}

#[tokio::test]
async fn unknown_kind_returns_error_instead_of_partial_map() {
    let configs = configs(&[
        ("a-prom", backend("prometheus", "http://localhost:9090")),
        ("b-dd", backend("datadog", "https://api.datadoghq.com")),
    ]);

    let result = initialize_backends(&configs, &Settings::default()).await;

    match result {
        Err(InitError::Config(ConfigError::UnknownKind { kind, name })) => {
            assert_eq!(kind, "datadog");
            assert_eq!(name, "b-dd");
        }
        other => panic!("expected unknown kind error, got {other:?}"),
    }
}

#[tokio::test]
async fn construction_failure_is_wrapped_with_name() {
    let configs = configs(&[("prom", backend("prometheus", ""))]);

    let err = initialize_backends(&configs, &Settings::default())
        .await
        .unwrap_err();

    match &err {
        InitError::BadConfiguration { name, source } => {
            assert_eq!(name, "prom");
            assert!(matches!(source, BackendError::InvalidConfig(_)));
        }
        other => panic!("expected bad configuration, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "bad configuration for prom: invalid backend configuration: missing host"
    );
}

#[tokio::test]
async fn cloudwatch_requires_region() {
    let configs = configs(&[("cw", backend("cloudwatch", ""))]);

    let err = initialize_backends(&configs, &Settings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InitError::BadConfiguration { ref name, .. } if name == "cw"));
}

// ── Custom kinds ───────────────────────────────────────────────────

#[derive(Debug)]
struct FixedBackend {
    name: String,
}

impl Backender for FixedBackend {
    fn get_value<'a>(&'a self, _rule: &'a Rule) -> ValueFuture<'a> {
        Box::pin(async { Ok(42.0) })
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: "fixed".to_string(),
            name: self.name.clone(),
        }
    }
}

static FIXED_BUILDS: AtomicUsize = AtomicUsize::new(0);

fn build_fixed<'a>(
    name: &'a str,
    _conf: &'a BackendConfig,
    _settings: &'a Settings,
) -> ConstructFuture<'a> {
    FIXED_BUILDS.fetch_add(1, Ordering::SeqCst);
    Box::pin(async move {
        Ok(Box::new(FixedBackend {
            name: name.to_string(),
        }) as Box<dyn Backender>)
    })
}

#[tokio::test]
async fn registered_kinds_are_constructed_and_failures_stop_the_walk() {
    let mut registry = BackendRegistry::builtin();
    registry.register("fixed", build_fixed);
    assert_eq!(
        registry.kinds(),
        vec!["cloudwatch", "fixed", "graphite", "prometheus"]
    );

    let good = configs(&[("fixed", backend("fixed", ""))]);
    let backends = registry.initialize(&good, &Settings::default()).await.unwrap();
    assert_eq!(
        backends["fixed"]
            .get_value(&Rule::for_metric("anything"))
            .await
            .unwrap(),
        42.0
    );
    let builds = FIXED_BUILDS.load(Ordering::SeqCst);

    // "a-broken" sorts first; "b-fixed" must never be constructed.
    let bad = configs(&[
        ("a-broken", backend("prometheus", "")),
        ("b-fixed", backend("fixed", "")),
    ]);
    assert!(registry.initialize(&bad, &Settings::default()).await.is_err());
    assert_eq!(FIXED_BUILDS.load(Ordering::SeqCst), builds);
}
