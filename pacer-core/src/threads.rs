//! Thread-pool coordinator.
//!
//! Dispatches a batch of attempts over a fixed number of OS threads.
//! Attempts are sharded round-robin; each worker thread runs its shard
//! sequentially and delivers records over a channel. Threads are detached,
//! never joined: under an enforced timeout the coordinator simply stops
//! waiting, and an abandoned attempt may run to completion in the
//! background, unobserved.

use crate::config::HarnessConfig;
use crate::guard::WorkerScope;
use crate::record::AttemptRecord;
use crate::timeout::{TimeoutPolicy, run_attempt};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Run `config.runs()` attempts of `f` over `config.workers()` threads.
pub(crate) fn run_batch<T, F>(
    name: &str,
    f: Arc<F>,
    config: &HarnessConfig,
    policy: &TimeoutPolicy,
) -> Vec<AttemptRecord<T>>
where
    F: Fn() -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    let runs = config.runs();
    let workers = config.workers();
    debug!(
        target: "pacer",
        "{}: dispatching {} attempts across {} threads",
        name, runs, workers
    );

    let (tx, rx) = mpsc::channel::<AttemptRecord<T>>();
    for worker in 0..workers {
        let shard: Vec<usize> = (worker..runs).step_by(workers).collect();
        let f = Arc::clone(&f);
        let tx = tx.clone();
        let name = name.to_string();
        let policy = *policy;
        thread::spawn(move || {
            let _scope = WorkerScope::enter();
            for index in shard {
                let record = run_attempt(index, &name, f.as_ref(), &policy);
                // The receiver is gone once the coordinator stopped waiting.
                if tx.send(record).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    match policy.enforced_budget() {
        Some(budget) => collect_enforced(name, rx, runs, budget),
        None => collect_all(rx, runs),
    }
}

/// Wait for every record. Worker threads hold no channel senders beyond
/// their shard, so the iterator ends once all shards are drained.
fn collect_all<T>(rx: Receiver<AttemptRecord<T>>, runs: usize) -> Vec<AttemptRecord<T>> {
    rx.into_iter().take(runs).collect()
}

/// Wait for records with a fresh budget window per attempt, in dispatch
/// order. An attempt whose window expires is recorded as cancelled and its
/// eventual result, if any, is dropped on arrival.
fn collect_enforced<T>(
    name: &str,
    rx: Receiver<AttemptRecord<T>>,
    runs: usize,
    budget: Duration,
) -> Vec<AttemptRecord<T>> {
    let mut records: Vec<AttemptRecord<T>> = Vec::with_capacity(runs);
    let mut arrived: HashMap<usize, AttemptRecord<T>> = HashMap::new();

    for index in 0..runs {
        if let Some(record) = arrived.remove(&index) {
            records.push(record);
            continue;
        }

        let deadline = Instant::now() + budget;
        let record = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(record) if record.index == index => break record,
                Ok(record) => {
                    // Out-of-order arrival, or the late result of an
                    // already-abandoned attempt (which stays unobserved).
                    arrived.insert(record.index, record);
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        target: "pacer",
                        "{}: attempt {} exceeded enforced timeout of {:?} and was abandoned",
                        name, index, budget
                    );
                    break AttemptRecord::cancelled(index, budget);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!(
                        target: "pacer",
                        "{}: worker threads exited without a record for attempt {}",
                        name, index
                    );
                    break AttemptRecord::failure(index);
                }
            }
        };
        records.push(record);
    }

    records
}
