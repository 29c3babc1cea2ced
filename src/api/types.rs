//! API response and query types.
//!
//! Channel names use the trajectory header convention
//! (`group:component:signal`).

use serde::{Deserialize, Serialize};

use crate::extract::{Channel, TimeSeries};
use crate::sim::metrics::ResponseMetrics;

/// Recorded channels and the simulated horizon.
#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    /// Final simulated time (s).
    pub final_time: f64,
    /// Number of recorded instants.
    pub samples: usize,
    pub channels: Vec<ChannelInfo>,
}

/// Description of one recorded channel.
#[derive(Debug, Serialize)]
pub struct ChannelInfo {
    /// Full name, e.g. `sync:g5:S`.
    pub name: String,
    pub group: String,
    pub component: String,
    pub signal: String,
    pub unit: String,
    pub description: String,
}

impl From<&Channel> for ChannelInfo {
    fn from(c: &Channel) -> Self {
        Self {
            name: c.to_string(),
            group: c.group().to_string(),
            component: c.component.clone(),
            signal: c.signal.code().to_string(),
            unit: c.signal.unit().to_string(),
            description: c.signal.description().to_string(),
        }
    }
}

/// One sample of a series.
#[derive(Debug, Serialize)]
pub struct Point {
    pub time: f64,
    pub value: f64,
}

/// Samples of one channel.
#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub channel: ChannelInfo,
    pub points: Vec<Point>,
}

impl SeriesResponse {
    /// Builds a response keeping samples with `from <= time <= to`.
    pub fn windowed(series: &TimeSeries, from: f64, to: f64) -> Self {
        Self {
            channel: ChannelInfo::from(series.channel()),
            points: series
                .points()
                .iter()
                .filter(|&&(t, _)| t >= from && t <= to)
                .map(|&(time, value)| Point { time, value })
                .collect(),
        }
    }
}

/// Metrics of one plotted signal.
#[derive(Debug, Serialize)]
pub struct MetricsRecord {
    pub channel: String,
    #[serde(flatten)]
    pub metrics: ResponseMetrics,
}

/// Optional time window for the series endpoint (s, inclusive).
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub from: Option<f64>,
    pub to: Option<f64>,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
