//! CloudWatch backend.
//!
//! `GetMetricStatistics` returns one series with one datapoint per period
//! bucket. The request covers the last few periods, aligned to a period
//! boundary, and the newest bucket's statistic is the value.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use aws_config::BehaviorVersion;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::config::Region;
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Dimension, Statistic as SdkStatistic};
use tracing::debug;

use libra_core::{BackendConfig, BackendKind, Rule, Statistic};

use crate::backender::{BackendInfo, Backender, ValueFuture};
use crate::error::{BackendError, BackendResult};

/// Boxed future returned by [`CloudWatchApi::get_metric_statistics`].
pub type DatapointsFuture<'a> =
    Pin<Box<dyn Future<Output = BackendResult<Vec<Datapoint>>> + Send + 'a>>;

/// Parameters of one `GetMetricStatistics` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRequest {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub statistic: Statistic,
    pub period: Duration,
    pub start: SystemTime,
    pub end: SystemTime,
}

/// Number of periods requested, so a bucket that is not yet published
/// still leaves older ones to fall back on.
pub const LOOKBACK_PERIODS: u64 = 5;

/// Periods CloudWatch accepts below one minute (high-resolution metrics).
const HIGH_RESOLUTION_PERIODS: [u64; 4] = [1, 5, 10, 30];

impl StatisticsRequest {
    /// [`LOOKBACK_PERIODS`] periods ending at `now`, with the start rounded
    /// down to a multiple of the period.
    pub fn for_rule(rule: &Rule, now: SystemTime) -> Self {
        let period = rule.period_secs().max(1);
        let now_secs = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let start = now_secs.saturating_sub(period.saturating_mul(LOOKBACK_PERIODS));
        Self {
            namespace: rule.namespace.clone(),
            metric_name: rule.metric_name.clone(),
            dimensions: rule.dimensions.clone(),
            statistic: rule.statistic,
            period: Duration::from_secs(period),
            start: SystemTime::UNIX_EPOCH + Duration::from_secs(start - start % period),
            end: now,
        }
    }
}

/// Check `rule.period` against what `GetMetricStatistics` accepts.
fn validate_period(rule: &Rule) -> BackendResult<i32> {
    let secs = rule.period_secs();
    let accepted = HIGH_RESOLUTION_PERIODS.contains(&secs) || (secs > 0 && secs % 60 == 0);
    match i32::try_from(secs) {
        Ok(period) if accepted => Ok(period),
        _ => Err(BackendError::InvalidRule(format!(
            "Invalid period {secs} inside config{{}} stanza: expected 1, 5, 10, 30 or a multiple of 60 seconds"
        ))),
    }
}

/// A CloudWatch datapoint; only the requested statistic is populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datapoint {
    /// Unix timestamp in seconds.
    pub timestamp: Option<i64>,
    pub average: Option<f64>,
    pub sum: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub sample_count: Option<f64>,
}

impl Datapoint {
    pub fn statistic(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Average => self.average,
            Statistic::Sum => self.sum,
            Statistic::Minimum => self.minimum,
            Statistic::Maximum => self.maximum,
            Statistic::SampleCount => self.sample_count,
        }
    }
}

/// The CloudWatch metrics endpoint.
pub trait CloudWatchApi: Send + Sync {
    fn get_metric_statistics<'a>(&'a self, request: &'a StatisticsRequest) -> DatapointsFuture<'a>;
}

/// [`CloudWatchApi`] backed by the AWS SDK.
///
/// Credentials come from the default AWS provider chain.
#[derive(Debug, Clone)]
pub struct SdkCloudWatch {
    client: Client,
    timeout: Duration,
}

impl SdkCloudWatch {
    pub async fn new(region: &str, timeout: Duration) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&sdk_config),
            timeout,
        }
    }

    async fn fetch(&self, request: &StatisticsRequest) -> BackendResult<Vec<Datapoint>> {
        let period = i32::try_from(request.period.as_secs()).map_err(|_| {
            BackendError::InvalidRule(format!(
                "period {}s does not fit a CloudWatch request",
                request.period.as_secs()
            ))
        })?;
        let dimensions = request
            .dimensions
            .iter()
            .map(|(name, value)| Dimension::builder().name(name).value(value).build())
            .collect();

        let call = self
            .client
            .get_metric_statistics()
            .namespace(&request.namespace)
            .metric_name(&request.metric_name)
            .set_dimensions(Some(dimensions))
            .start_time(DateTime::from(request.start))
            .end_time(DateTime::from(request.end))
            .period(period)
            .statistics(sdk_statistic(request.statistic))
            .send();

        let output = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                BackendError::Transport(format!(
                    "GetMetricStatistics timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| BackendError::Transport(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .datapoints
            .unwrap_or_default()
            .into_iter()
            .map(|dp| Datapoint {
                timestamp: dp.timestamp.map(|ts| ts.secs()),
                average: dp.average,
                sum: dp.sum,
                minimum: dp.minimum,
                maximum: dp.maximum,
                sample_count: dp.sample_count,
            })
            .collect())
    }
}

impl CloudWatchApi for SdkCloudWatch {
    fn get_metric_statistics<'a>(&'a self, request: &'a StatisticsRequest) -> DatapointsFuture<'a> {
        Box::pin(self.fetch(request))
    }
}

fn sdk_statistic(statistic: Statistic) -> SdkStatistic {
    match statistic {
        Statistic::Average => SdkStatistic::Average,
        Statistic::Sum => SdkStatistic::Sum,
        Statistic::Minimum => SdkStatistic::Minimum,
        Statistic::Maximum => SdkStatistic::Maximum,
        Statistic::SampleCount => SdkStatistic::SampleCount,
    }
}

/// Connection settings for a CloudWatch backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudWatchConfig {
    pub kind: String,
    pub name: String,
    pub region: String,
}

impl From<&BackendConfig> for CloudWatchConfig {
    fn from(conf: &BackendConfig) -> Self {
        Self {
            kind: conf.kind.clone(),
            name: conf.name.clone(),
            region: conf.region.clone(),
        }
    }
}

pub struct CloudWatchBackend {
    name: String,
    kind: String,
    region: String,
    connection: Box<dyn CloudWatchApi>,
}

impl CloudWatchBackend {
    pub fn new(
        name: &str,
        config: CloudWatchConfig,
        connection: Box<dyn CloudWatchApi>,
    ) -> BackendResult<Self> {
        if config.region.is_empty() {
            return Err(BackendError::InvalidConfig("missing region".to_string()));
        }
        let kind = if config.kind.is_empty() {
            BackendKind::CloudWatch.to_string()
        } else {
            config.kind
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            region: config.region,
            connection,
        })
    }

    /// Build a backend using an AWS SDK client for `conf.region`.
    pub async fn connect(name: &str, conf: &BackendConfig) -> BackendResult<Self> {
        if conf.region.is_empty() {
            return Err(BackendError::InvalidConfig("missing region".to_string()));
        }
        let api = SdkCloudWatch::new(&conf.region, conf.timeout()).await;
        Self::new(name, CloudWatchConfig::from(conf), Box::new(api))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn fetch_value(&self, rule: &Rule) -> BackendResult<f64> {
        if rule.metric_name.is_empty() {
            return Err(BackendError::missing_metric_name());
        }
        if rule.namespace.is_empty() {
            return Err(BackendError::InvalidRule(
                "Missing namespace inside config{} stanza".to_string(),
            ));
        }
        validate_period(rule)?;

        let request = StatisticsRequest::for_rule(rule, SystemTime::now());
        debug!(
            backend = %self.name,
            namespace = %request.namespace,
            metric = %request.metric_name,
            statistic = %request.statistic,
            period = request.period.as_secs(),
            "querying cloudwatch"
        );

        let datapoints = self.connection.get_metric_statistics(&request).await?;
        extract_value(&rule.metric_name, rule.statistic, &datapoints)
    }
}

/// The requested statistic of the newest datapoint.
///
/// CloudWatch does not order datapoints. Ones without a timestamp rank
/// below every timestamped one.
pub fn extract_value(
    metric: &str,
    statistic: Statistic,
    datapoints: &[Datapoint],
) -> BackendResult<f64> {
    let newest = datapoints
        .iter()
        .max_by_key(|dp| dp.timestamp)
        .ok_or_else(|| BackendError::no_data(metric, "datapoints"))?;
    newest.statistic(statistic).ok_or_else(|| {
        BackendError::WrongResultType(format!("metric {metric} has no {statistic} statistic"))
    })
}

impl Backender for CloudWatchBackend {
    fn get_value<'a>(&'a self, rule: &'a Rule) -> ValueFuture<'a> {
        Box::pin(self.fetch_value(rule))
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Debug for CloudWatchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudWatchBackend")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
