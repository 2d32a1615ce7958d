//! Prometheus query result shapes and HTTP API decoding.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{BackendError, BackendResult};

/// Label set identifying a series.
pub type Metric = BTreeMap<String, String>;

/// One labeled value at an instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: Metric,
    /// Unix timestamp in seconds.
    pub timestamp: f64,
    pub value: f64,
}

/// A labeled series of `(timestamp, value)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub metric: Metric,
    pub values: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarPoint {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringPoint {
    pub timestamp: f64,
    pub value: String,
}

/// The result of a Prometheus query, tagged by its result type.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Vector(Vec<Sample>),
    Matrix(Vec<Series>),
    Scalar(ScalarPoint),
    String(StringPoint),
}

impl QueryValue {
    /// The `resultType` name used by the HTTP API.
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
            QueryValue::Scalar(_) => "scalar",
            QueryValue::String(_) => "string",
        }
    }
}

// ── Wire format ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<ApiData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ApiData {
    Vector(Vec<RawSample>),
    Matrix(Vec<RawSeries>),
    Scalar(RawPoint),
    String(RawPoint),
}

/// Values are transmitted as strings to carry NaN and infinities.
type RawPoint = (f64, String);

#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(default)]
    metric: Metric,
    value: RawPoint,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    metric: Metric,
    values: Vec<RawPoint>,
}

fn parse_float(raw: &str) -> BackendResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| BackendError::Transport(format!("invalid sample value '{raw}'")))
}

/// Decode a `/api/v1/query` or `/api/v1/query_range` response body.
pub(crate) fn decode_response(body: &[u8]) -> BackendResult<QueryValue> {
    let resp: ApiResponse = serde_json::from_slice(body)
        .map_err(|e| BackendError::Transport(format!("decoding prometheus response: {e}")))?;

    if resp.status != "success" {
        return Err(BackendError::Upstream(format!(
            "{}: {}",
            resp.error_type.as_deref().unwrap_or("unknown"),
            resp.error.as_deref().unwrap_or("query failed"),
        )));
    }

    let data = resp
        .data
        .ok_or_else(|| BackendError::Transport("prometheus response has no data".to_string()))?;

    Ok(match data {
        ApiData::Vector(samples) => QueryValue::Vector(
            samples
                .into_iter()
                .map(|s| -> BackendResult<Sample> {
                    Ok(Sample {
                        metric: s.metric,
                        timestamp: s.value.0,
                        value: parse_float(&s.value.1)?,
                    })
                })
                .collect::<BackendResult<_>>()?,
        ),
        ApiData::Matrix(series) => QueryValue::Matrix(
            series
                .into_iter()
                .map(|s| -> BackendResult<Series> {
                    let values = s
                        .values
                        .iter()
                        .map(|(ts, v)| -> BackendResult<(f64, f64)> {
                            Ok((*ts, parse_float(v)?))
                        })
                        .collect::<BackendResult<_>>()?;
                    Ok(Series {
                        metric: s.metric,
                        values,
                    })
                })
                .collect::<BackendResult<_>>()?,
        ),
        ApiData::Scalar((timestamp, value)) => QueryValue::Scalar(ScalarPoint {
            timestamp,
            value: parse_float(&value)?,
        }),
        ApiData::String((timestamp, value)) => {
            QueryValue::String(StringPoint { timestamp, value })
        }
    })
}
