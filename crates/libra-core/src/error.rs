//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or resolving backend kinds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing backend type for '{0}'")]
    MissingKind(String),

    #[error("unknown backend type '{kind}' for backend {name}")]
    UnknownKind { kind: String, name: String },

    #[error("failed to detect config files in {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read file ({path}): {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{section} '{key}' defined more than once (again in {path})")]
    Duplicate {
        section: &'static str,
        key: String,
        path: PathBuf,
    },
}
