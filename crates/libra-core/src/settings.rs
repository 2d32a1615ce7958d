//! Process-wide inputs.
//!
//! The environment is read here and nowhere else. Everything downstream
//! (config loading, backend construction) takes a [`Settings`] value.

use std::path::PathBuf;

pub const CONFIG_DIR_ENV: &str = "LIBRA_CONFIG_DIR";
pub const GRAPHITE_PASSWORD_ENV: &str = "GRAPHITE_PASSWORD";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding the `*.toml` configuration files.
    pub config_dir: PathBuf,
    /// Used when a Graphite backend is configured with an empty password.
    pub graphite_password: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            config_dir: non_empty(CONFIG_DIR_ENV).map(PathBuf::from).unwrap_or_default(),
            graphite_password: non_empty(GRAPHITE_PASSWORD_ENV),
        }
    }
}
