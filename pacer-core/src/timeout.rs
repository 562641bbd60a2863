//! Timeout policy.
//!
//! Two distinct mechanisms sit behind one type. A soft budget measures the
//! attempt and flags the record after completion; the work is never
//! interrupted. An enforced budget races the attempt against the clock and
//! cancels the wait when the clock wins. The racing primitive depends on
//! the coordinator (collection windows for threads, task cancellation for
//! the cooperative scheduler), so the race itself lives with each
//! coordinator and this module owns the policy and the soft bookkeeping.

use crate::config::HarnessConfig;
use crate::record::{AttemptRecord, panic_message};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Per-attempt timeout behavior, derived once from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeoutPolicy {
    /// No budget; attempts run unobserved.
    Unbounded,
    /// Flag attempts that overran the budget, but let them finish.
    Soft(Duration),
    /// Stop waiting for attempts that overrun the budget.
    Enforced(Duration),
}

impl TimeoutPolicy {
    pub(crate) fn from_config(config: &HarnessConfig) -> Self {
        match (config.timeout(), config.enforce_timeout()) {
            (None, _) => TimeoutPolicy::Unbounded,
            (Some(budget), false) => TimeoutPolicy::Soft(budget),
            (Some(budget), true) => TimeoutPolicy::Enforced(budget),
        }
    }

    /// Degrade enforcement for a single direct invocation.
    ///
    /// The fast path holds no concurrency primitive capable of cancelling
    /// anything, so an enforced budget is diagnosed and applied softly.
    /// The same rule holds on both coordinators.
    pub(crate) fn for_fast_path(self, name: &str) -> Self {
        match self {
            TimeoutPolicy::Enforced(budget) => {
                warn!(
                    target: "pacer",
                    "{}: enforce_timeout has no effect on a single direct invocation; applying the timeout softly",
                    name
                );
                TimeoutPolicy::Soft(budget)
            }
            other => other,
        }
    }

    /// Budget for coordinators that race attempts against the clock.
    pub(crate) fn enforced_budget(&self) -> Option<Duration> {
        match self {
            TimeoutPolicy::Enforced(budget) => Some(*budget),
            _ => None,
        }
    }

    /// Budget shipped to process workers, which only flag softly.
    pub(crate) fn soft_budget(&self) -> Option<Duration> {
        match self {
            TimeoutPolicy::Soft(budget) => Some(*budget),
            _ => None,
        }
    }

    /// Check a completed attempt against a soft budget. Logs one warning
    /// per overrunning attempt.
    pub(crate) fn flag_overrun(&self, name: &str, elapsed: Duration) -> bool {
        match self {
            TimeoutPolicy::Soft(budget) if elapsed > *budget => {
                warn!(
                    target: "pacer",
                    "{}: timeout exceeded (took {:?}, budget {:?}), but execution continued",
                    name, elapsed, budget
                );
                true
            }
            _ => false,
        }
    }
}

/// Run one attempt of a blocking callable and produce its record.
///
/// A panic becomes a failed record logged with its attempt index; it never
/// aborts sibling attempts. The enforced race, when configured, happens at
/// collection time in the coordinator, so this only applies the soft check.
pub(crate) fn run_attempt<T, F>(
    index: usize,
    name: &str,
    f: &F,
    policy: &TimeoutPolicy,
) -> AttemptRecord<T>
where
    F: Fn() -> T,
{
    let start = Instant::now();
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => {
            let elapsed = start.elapsed();
            let timed_out = policy.flag_overrun(name, elapsed);
            AttemptRecord::completed(index, elapsed, value, timed_out)
        }
        Err(panic) => {
            error!(
                target: "pacer",
                "{}: attempt {} failed: {}",
                name,
                index,
                panic_message(panic)
            );
            AttemptRecord::failure(index)
        }
    }
}
