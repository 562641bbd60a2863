//! Reporter seam.
//!
//! The harness hands timing output to a [`Reporter`] and otherwise knows
//! nothing about presentation. The default implementation renders through
//! `pacer-report` and emits via `tracing`.

use crate::record::TargetInfo;
use pacer_stats::StatsReport;
use std::time::Duration;
use tracing::info;

/// Consumer of harness timing output.
pub trait Reporter: Send + Sync {
    /// Called with the measured duration of a single direct run.
    fn report_single(&self, info: &TargetInfo, duration: Duration, timed_out: bool);

    /// Called once per batch with the aggregated statistics.
    fn report_batch(&self, info: &TargetInfo, runs: usize, workers: usize, report: &StatsReport);
}

/// Default reporter: logs rendered reports at `info` level.
#[derive(Debug, Clone, Default)]
pub struct LogReporter {
    detailed: bool,
}

impl LogReporter {
    /// Build a reporter with the given verbosity.
    pub fn new(detailed: bool) -> Self {
        Self { detailed }
    }
}

impl Reporter for LogReporter {
    fn report_single(&self, info: &TargetInfo, duration: Duration, timed_out: bool) {
        if self.detailed {
            info!(
                target: "pacer",
                "\n{}",
                pacer_report::render_single_detailed(&info.name, &info.args, duration)
            );
        } else {
            info!(
                target: "pacer",
                "{}",
                pacer_report::render_single(&info.name, duration, timed_out)
            );
        }
    }

    fn report_batch(&self, info: &TargetInfo, runs: usize, workers: usize, report: &StatsReport) {
        if self.detailed {
            info!(
                target: "pacer",
                "\n{}",
                pacer_report::render_batch_detailed(&info.name, &info.args, runs, workers, report)
            );
        } else {
            info!(
                target: "pacer",
                "{}",
                pacer_report::render_batch(&info.name, report)
            );
        }
    }
}
