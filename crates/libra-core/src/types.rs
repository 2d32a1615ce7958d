//! Shared types used across Libra crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default CloudWatch statistic period in seconds.
pub const DEFAULT_PERIOD_SECS: u64 = 60;

/// Default Graphite render window.
pub const DEFAULT_GRAPHITE_FROM: &str = "-5min";

// ── Rules ──────────────────────────────────────────────────────────

/// A single metric to sample, as declared inside a group.
///
/// Only `metric_name` is common to every backend; the remaining fields
/// are read by the backend kind that understands them and ignored by
/// the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Stamped from the rule's key in its group.
    pub name: String,
    /// Name of the configured backend this rule is evaluated against.
    pub backend: String,
    pub metric_name: String,

    /// Prometheus label matchers, rendered as `metric{key="value"}`. A
    /// value may start with `=~`, `!~` or `!=` to pick another operator.
    pub labels: BTreeMap<String, String>,

    /// CloudWatch namespace, e.g. `AWS/EC2`.
    pub namespace: String,
    /// CloudWatch dimensions.
    pub dimensions: BTreeMap<String, String>,
    pub statistic: Statistic,
    /// CloudWatch period in seconds.
    pub period: Option<u64>,

    /// Graphite `from` window, e.g. `-10min`.
    pub from: Option<String>,
}

impl Rule {
    /// Shorthand for a rule that only names a metric.
    pub fn for_metric(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            ..Self::default()
        }
    }

    pub fn period_secs(&self) -> u64 {
        self.period.unwrap_or(DEFAULT_PERIOD_SECS)
    }

    pub fn graphite_from(&self) -> &str {
        self.from.as_deref().unwrap_or(DEFAULT_GRAPHITE_FROM)
    }
}

/// CloudWatch aggregation statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    #[default]
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
            Statistic::SampleCount => "SampleCount",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Jobs and groups ────────────────────────────────────────────────

/// A scaling group: instance bounds plus the rules evaluated for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub name: String,
    pub min_count: u32,
    pub max_count: u32,
    pub rules: BTreeMap<String, Rule>,
}

/// A job owns one or more scaling groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub name: String,
    pub groups: BTreeMap<String, Group>,
}
