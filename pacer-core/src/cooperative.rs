//! Cooperative coordinator.
//!
//! Runs a batch of attempts as futures polled jointly on the caller's own
//! task. Concurrency is bounded by a counting admission gate, not by OS
//! resources; suspension happens at the callable's own await points and at
//! gate acquisition. Enforced cancellation drops the attempt future at its
//! next suspension point.

use crate::config::HarnessConfig;
use crate::guard::TASK_WORKER;
use crate::record::{AttemptRecord, panic_message};
use crate::timeout::TimeoutPolicy;
use futures::FutureExt;
use futures::future::join_all;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Run `config.runs()` attempts of `f` under an admission gate of capacity
/// `config.workers()`. Futures are created in submission order and their
/// records keep that order.
pub(crate) async fn run_batch<T, F, Fut>(
    name: &str,
    f: &F,
    config: &HarnessConfig,
    policy: &TimeoutPolicy,
) -> Vec<AttemptRecord<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = T>,
{
    let runs = config.runs();
    let workers = config.workers();
    debug!(
        target: "pacer",
        "{}: dispatching {} attempts under a gate of capacity {}",
        name, runs, workers
    );

    let gate = Arc::new(Semaphore::new(workers));
    let policy = *policy;

    let attempts = (0..runs).map(|index| {
        let gate = Arc::clone(&gate);
        TASK_WORKER.scope(true, async move {
            let Ok(_permit) = gate.acquire().await else {
                // The gate is never closed while attempts are pending.
                return AttemptRecord::failure(index);
            };
            run_attempt(index, name, f(), policy).await
        })
    });

    let mut records = join_all(attempts).await;
    records.sort_by_key(|r| r.index);
    records
}

/// Run one cooperative attempt under the timeout policy.
async fn run_attempt<T, Fut>(
    index: usize,
    name: &str,
    fut: Fut,
    policy: TimeoutPolicy,
) -> AttemptRecord<T>
where
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    match policy.enforced_budget() {
        Some(budget) => {
            match tokio::time::timeout(budget, AssertUnwindSafe(fut).catch_unwind()).await {
                Ok(Ok(value)) => AttemptRecord::completed(index, start.elapsed(), value, false),
                Ok(Err(panic)) => {
                    error!(
                        target: "pacer",
                        "{}: attempt {} failed: {}",
                        name,
                        index,
                        panic_message(panic)
                    );
                    AttemptRecord::failure(index)
                }
                Err(_elapsed) => {
                    warn!(
                        target: "pacer",
                        "{}: attempt {} exceeded enforced timeout of {:?} and was cancelled",
                        name, index, budget
                    );
                    AttemptRecord::cancelled(index, start.elapsed())
                }
            }
        }
        None => match AssertUnwindSafe(fut).catch_unwind().await {
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
        },
    }
}
