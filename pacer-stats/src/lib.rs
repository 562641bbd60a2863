#![warn(missing_docs)]
//! Pacer Statistics
//!
//! Reduces the durations of a batch of attempts into summary metrics:
//! mean, median, min, max, sample standard deviation, and total, plus an
//! aggregate timed-out flag. Attempts that failed never reach this crate;
//! the coordinator filters them out before aggregating.

use std::time::Duration;

/// One successfully timed attempt, as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Wall-clock duration of the attempt.
    pub duration: Duration,
    /// Whether the attempt overran its timeout budget.
    pub timed_out: bool,
}

impl SamplePoint {
    /// Build a sample point.
    pub fn new(duration: Duration, timed_out: bool) -> Self {
        Self {
            duration,
            timed_out,
        }
    }
}

/// Summary metrics over a batch of attempt durations.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    /// Arithmetic mean duration.
    pub mean: Duration,
    /// Median duration.
    pub median: Duration,
    /// Shortest observed duration.
    pub min: Duration,
    /// Longest observed duration.
    pub max: Duration,
    /// Sample standard deviation (zero for a single sample).
    pub std_dev: Duration,
    /// Sum of all durations.
    pub total: Duration,
    /// Whether any aggregated attempt overran its timeout budget.
    pub any_timed_out: bool,
    /// Number of aggregated attempts.
    pub sample_count: usize,
}

/// Reduce a batch of sample points into a [`StatsReport`].
///
/// Returns `None` for an empty batch, which signals that every attempt in
/// the batch failed and no report should be produced.
pub fn aggregate(points: &[SamplePoint]) -> Option<StatsReport> {
    if points.is_empty() {
        return None;
    }

    let secs: Vec<f64> = points.iter().map(|p| p.duration.as_secs_f64()).collect();

    let total: f64 = secs.iter().sum();
    let mean = total / secs.len() as f64;

    let mut sorted = secs.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if sorted.len() % 2 == 0 {
        let mid = sorted.len() / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[sorted.len() / 2]
    };

    let std_dev = if secs.len() < 2 {
        0.0
    } else {
        let variance =
            secs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (secs.len() - 1) as f64;
        variance.sqrt()
    };

    let min = points.iter().map(|p| p.duration).min()?;
    let max = points.iter().map(|p| p.duration).max()?;

    Some(StatsReport {
        mean: Duration::from_secs_f64(mean),
        median: Duration::from_secs_f64(median),
        min,
        max,
        std_dev: Duration::from_secs_f64(std_dev),
        total: Duration::from_secs_f64(total),
        any_timed_out: points.iter().any(|p| p.timed_out),
        sample_count: points.len(),
    })
}
