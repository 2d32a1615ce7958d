//! The capability every metrics backend exposes.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use libra_core::Rule;

use crate::error::BackendResult;

/// Boxed future returned by [`Backender::get_value`].
pub type ValueFuture<'a> = Pin<Box<dyn Future<Output = BackendResult<f64>> + Send + 'a>>;

/// Identity of a constructed backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub kind: String,
    pub name: String,
}

/// A named handle onto one upstream time-series system.
///
/// Each call to `get_value` performs exactly one upstream query and
/// reduces its result to a single scalar. Nothing is cached or retried.
pub trait Backender: Send + Sync + fmt::Debug {
    /// Query the current value of the metric described by `rule`.
    fn get_value<'a>(&'a self, rule: &'a Rule) -> ValueFuture<'a>;

    /// Kind and name as supplied at construction. Never performs I/O.
    fn info(&self) -> BackendInfo;
}

/// Constructed backends keyed by configured name.
pub type ConfiguredBackends = BTreeMap<String, Box<dyn Backender>>;
