//! Configuration directory parser.
//!
//! Every `*.toml` file under the configuration directory contributes
//! backends and jobs to a single [`RootConfig`]. Files are read in path
//! order and a key may only be defined once across all of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::types::Job;

/// Default per-query deadline for upstream backends.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    pub backends: BTreeMap<String, BackendConfig>,
    pub jobs: BTreeMap<String, Job>,
}

/// Connection settings for one named backend.
///
/// `kind` selects the implementation; the remaining fields are only
/// meaningful to the kinds that use them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: String,
    pub name: String,
    /// CloudWatch region.
    pub region: String,
    /// Base URL for Prometheus and Graphite.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Per-query deadline in seconds.
    pub timeout: Option<u64>,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// The backend kinds shipped with Libra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    CloudWatch,
    Graphite,
    Prometheus,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::CloudWatch,
        BackendKind::Graphite,
        BackendKind::Prometheus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::CloudWatch => "cloudwatch",
            BackendKind::Graphite => "graphite",
            BackendKind::Prometheus => "prometheus",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RootConfig {
    /// Load and merge every `*.toml` file under `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|source| ConfigError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            let is_toml = entry.path().extension().is_some_and(|ext| ext == "toml");
            if entry.file_type().is_file() && is_toml {
                files.push(entry.into_path());
            }
        }

        for (i, file) in files.iter().enumerate() {
            info!(index = i, path = %file.display(), "config file found");
        }

        let mut root = RootConfig::default();
        for file in &files {
            let content = std::fs::read_to_string(file).map_err(|source| ConfigError::Read {
                path: file.clone(),
                source,
            })?;
            let part: RootConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: file.clone(),
                source,
            })?;
            root.merge(part, file)?;
        }

        root.stamp_names();
        debug!(
            backends = root.backends.len(),
            jobs = root.jobs.len(),
            "configuration loaded"
        );
        Ok(root)
    }

    /// Parse a single TOML document and stamp names.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut root: RootConfig = toml::from_str(content)?;
        root.stamp_names();
        Ok(root)
    }

    fn merge(&mut self, other: RootConfig, path: &Path) -> Result<(), ConfigError> {
        for (key, backend) in other.backends {
            if self.backends.contains_key(&key) {
                return Err(ConfigError::Duplicate {
                    section: "backend",
                    key,
                    path: path.to_path_buf(),
                });
            }
            self.backends.insert(key, backend);
        }
        for (key, job) in other.jobs {
            if self.jobs.contains_key(&key) {
                return Err(ConfigError::Duplicate {
                    section: "job",
                    key,
                    path: path.to_path_buf(),
                });
            }
            self.jobs.insert(key, job);
        }
        Ok(())
    }

    /// Copy each map key into the `name` field of the entry it holds.
    fn stamp_names(&mut self) {
        for (name, backend) in &mut self.backends {
            backend.name.clone_from(name);
        }
        for (job_name, job) in &mut self.jobs {
            job.name.clone_from(job_name);
            for (group_name, group) in &mut job.groups {
                group.name.clone_from(group_name);
                for (rule_name, rule) in &mut group.rules {
                    rule.name.clone_from(rule_name);
                }
            }
        }
    }
}
