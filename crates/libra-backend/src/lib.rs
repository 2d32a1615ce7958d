//! libra-backend — metric value extraction from time-series systems.
//!
//! Each configured backend becomes a [`Backender`]: given a [`Rule`] it
//! runs one upstream query and reduces the result to a single `f64`
//! for the scaling decision.
//!
//! # Architecture
//!
//! ```text
//! RootConfig.backends ──► BackendRegistry::initialize() ──► ConfiguredBackends
//!                              │ kind → constructor
//!                              ├── prometheus  → PrometheusBackend (QueryApi)
//!                              ├── cloudwatch  → CloudWatchBackend (CloudWatchApi)
//!                              └── graphite    → GraphiteBackend   (GraphiteApi)
//!
//! backends[name].get_value(&rule) ──► one query ──► f64 | BackendError
//! ```
//!
//! [`Rule`]: libra_core::Rule

pub mod backender;
pub mod cloudwatch;
pub mod error;
pub mod graphite;
mod http;
pub mod prometheus;
pub mod registry;

pub use backender::{BackendInfo, Backender, ConfiguredBackends, ValueFuture};
pub use cloudwatch::CloudWatchBackend;
pub use error::{BackendError, BackendResult, InitError};
pub use graphite::GraphiteBackend;
pub use prometheus::PrometheusBackend;
pub use registry::{BackendRegistry, initialize_backends};
