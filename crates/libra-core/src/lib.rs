//! libra-core — shared configuration types for Libra.
//!
//! Holds the declarative model (jobs, groups, rules, backend
//! connections), the configuration directory loader, and the
//! process-wide [`Settings`] passed explicitly to backend construction.

pub mod config;
pub mod error;
pub mod settings;
pub mod types;

pub use config::{BackendConfig, BackendKind, RootConfig};
pub use error::ConfigError;
pub use settings::Settings;
pub use types::*;
