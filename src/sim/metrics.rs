//! Post-disturbance response metrics computed from extracted series.

use std::fmt;

use serde::Serialize;

use crate::extract::TimeSeries;

/// Summary of one signal's response over the simulated horizon.
///
/// Computed post-hoc from a [`TimeSeries`] so the reported numbers always
/// match the plotted data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetrics {
    /// Number of samples.
    pub samples: usize,
    /// Value at the first sample (pre-disturbance operating point).
    pub initial: f64,
    /// Value at the last sample.
    pub final_value: f64,
    /// Minimum value (nadir).
    pub min: f64,
    /// Time of the minimum (s).
    pub min_time: f64,
    /// Maximum value (peak).
    pub max: f64,
    /// Time of the maximum (s).
    pub max_time: f64,
    /// Largest absolute departure from `initial`.
    pub max_deviation: f64,
    /// `final_value - initial`.
    pub steady_state_change: f64,
}

impl ResponseMetrics {
    /// Computes all metrics for `series`.
    ///
    /// An empty series yields a zeroed report.
    pub fn from_series(series: &TimeSeries) -> Self {
        let (Some(&(_, initial)), Some(&(_, final_value))) =
            (series.points().first(), series.points().last())
        else {
            return Self {
                samples: 0,
                initial: 0.0,
                final_value: 0.0,
                min: 0.0,
                min_time: 0.0,
                max: 0.0,
                max_time: 0.0,
                max_deviation: 0.0,
                steady_state_change: 0.0,
            };
        };

        let (min_time, min) = series.min().unwrap_or((0.0, initial));
        let (max_time, max) = series.max().unwrap_or((0.0, initial));
        let max_deviation = series
            .values()
            .map(|v| (v - initial).abs())
            .fold(0.0_f64, f64::max);

        Self {
            samples: series.len(),
            initial,
            final_value,
            min,
            min_time,
            max,
            max_time,
            max_deviation,
            steady_state_change: final_value - initial,
        }
    }
}

impl fmt::Display for ResponseMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Initial value:       {:.5}", self.initial)?;
        writeln!(f, "Final value:         {:.5}", self.final_value)?;
        writeln!(f, "Minimum:             {:.5} at t={:.2} s", self.min, self.min_time)?;
        writeln!(f, "Maximum:             {:.5} at t={:.2} s", self.max, self.max_time)?;
        writeln!(f, "Max deviation:       {:.5}", self.max_deviation)?;
        write!(f, "Steady-state change: {:.5}", self.steady_state_change)
    }
}
