//! The harness.
//!
//! [`Harness`] is the wrapping construct: built once from a validated
//! configuration, it runs a callable one or more times, measures each
//! attempt, hands aggregated timing to its [`Reporter`], and returns the
//! first usable value as if the call had been made directly.
//!
//! Three entry points cover the three kinds of callable:
//!
//! - [`Harness::time`] for blocking closures (thread-pool execution),
//! - [`Harness::time_async`] for cooperative callables (gated futures),
//! - [`Harness::run_task`] for registered tasks, which honor
//!   [`ExecMode`] and are the only callables that can cross into worker
//!   processes.

use crate::config::{ExecMode, HarnessConfig};
use crate::cooperative;
use crate::guard;
use crate::record::{AttemptRecord, TargetInfo};
use crate::reporter::{LogReporter, Reporter};
use crate::task::{TaskInput, find_task};
use crate::threads;
use crate::timeout::TimeoutPolicy;
use pacer_ipc::TaskCall;
use pacer_stats::{SamplePoint, aggregate};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by [`Harness::run_task`].
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task with the requested id is registered.
    #[error("no registered task named `{0}`")]
    UnknownTask(String),

    /// The single direct attempt failed. Raised on the fast path only;
    /// batched attempt failures are recorded and logged, never raised.
    #[error("attempt failed: {0}")]
    Attempt(String),

    /// Worker-process machinery failed.
    #[cfg(unix)]
    #[error(transparent)]
    Process(#[from] crate::process::ProcessError),

    /// Process execution requested on a platform without worker support.
    #[cfg(not(unix))]
    #[error("process execution is not supported on this platform")]
    Unsupported,
}

/// The execution harness.
pub struct Harness {
    config: HarnessConfig,
    reporter: Arc<dyn Reporter>,
}

impl Harness {
    /// Build a harness with the default logging reporter.
    pub fn new(config: HarnessConfig) -> Self {
        let reporter = Arc::new(LogReporter::new(config.detailed()));
        Self { config, reporter }
    }

    /// Build a harness with a custom reporter.
    pub fn with_reporter(config: HarnessConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self { config, reporter }
    }

    /// The configuration this harness was built with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run a blocking callable under this harness.
    ///
    /// Returns the value of the first successful attempt in dispatch
    /// order, or `None` when every attempt failed; callers must tolerate
    /// the absent case whenever `runs > 1` or a timeout is configured. On
    /// the single-run fast path a panic in the callable propagates
    /// unchanged; batched attempts catch and record panics instead.
    ///
    /// Closures always execute on the in-process thread pool. Process
    /// execution needs a serializable call and goes through
    /// [`Harness::run_task`].
    pub fn time<T, F>(&self, info: TargetInfo, f: F) -> Option<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        if guard::active() {
            // Already inside a harness worker: behave as the plain callable.
            return Some(f());
        }

        if self.config.is_fast_path() {
            let policy = TimeoutPolicy::from_config(&self.config).for_fast_path(&info.name);
            let start = Instant::now();
            let value = f();
            let elapsed = start.elapsed();
            let timed_out = policy.flag_overrun(&info.name, elapsed);
            self.reporter.report_single(&info, elapsed, timed_out);
            return Some(value);
        }

        let policy = TimeoutPolicy::from_config(&self.config);
        let records = threads::run_batch(&info.name, Arc::new(f), &self.config, &policy);
        self.finish_batch(&info, records)
    }

    /// Run a cooperative callable under this harness.
    ///
    /// Outwardly identical to [`Harness::time`], but attempts are futures
    /// polled jointly on the current scheduler, bounded by an admission
    /// gate of capacity `workers`; no OS threads or processes are spawned.
    pub async fn time_async<T, F, Fut>(&self, info: TargetInfo, f: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = T>,
    {
        if guard::active() {
            return Some(f().await);
        }

        if self.config.is_fast_path() {
            let policy = TimeoutPolicy::from_config(&self.config).for_fast_path(&info.name);
            let start = Instant::now();
            let value = f().await;
            let elapsed = start.elapsed();
            let timed_out = policy.flag_overrun(&info.name, elapsed);
            self.reporter.report_single(&info, elapsed, timed_out);
            return Some(value);
        }

        let policy = TimeoutPolicy::from_config(&self.config);
        let records = cooperative::run_batch(&info.name, &f, &self.config, &policy).await;
        self.finish_batch(&info, records)
    }

    /// Run a registered task under this harness, honoring [`ExecMode`].
    ///
    /// On the fast path an `Err` from the task propagates as
    /// [`TaskError::Attempt`]; in batches it becomes a failed record.
    pub fn run_task(&self, call: &TaskCall) -> Result<Option<Value>, TaskError> {
        let def =
            find_task(&call.task).ok_or_else(|| TaskError::UnknownTask(call.task.clone()))?;
        let info = TargetInfo::for_call(call);

        if guard::active() {
            return match (def.run)(TaskInput::from(call)) {
                Ok(value) => Ok(Some(value)),
                Err(message) => Err(TaskError::Attempt(message)),
            };
        }

        if self.config.is_fast_path() {
            let policy = TimeoutPolicy::from_config(&self.config).for_fast_path(&info.name);
            let start = Instant::now();
            let outcome = (def.run)(TaskInput::from(call));
            let elapsed = start.elapsed();
            return match outcome {
                Ok(value) => {
                    let timed_out = policy.flag_overrun(&info.name, elapsed);
                    self.reporter.report_single(&info, elapsed, timed_out);
                    Ok(Some(value))
                }
                Err(message) => Err(TaskError::Attempt(message)),
            };
        }

        match self.config.mode() {
            ExecMode::Threads => {
                let policy = TimeoutPolicy::from_config(&self.config);
                let run = def.run;
                let task_call = call.clone();
                let f = move || run(TaskInput::from(&task_call));
                let records = threads::run_batch(&info.name, Arc::new(f), &self.config, &policy);
                let records = records
                    .into_iter()
                    .map(|r| flatten_task_record(&info.name, r))
                    .collect();
                Ok(self.finish_batch(&info, records))
            }
            ExecMode::Processes => self.run_task_in_processes(call, &info),
        }
    }

    #[cfg(unix)]
    fn run_task_in_processes(
        &self,
        call: &TaskCall,
        info: &TargetInfo,
    ) -> Result<Option<Value>, TaskError> {
        let policy = TimeoutPolicy::from_config(&self.config);
        let records = crate::process::run_batch(call, &self.config, &policy)?;
        Ok(self.finish_batch(info, records))
    }

    #[cfg(not(unix))]
    fn run_task_in_processes(
        &self,
        _call: &TaskCall,
        _info: &TargetInfo,
    ) -> Result<Option<Value>, TaskError> {
        Err(TaskError::Unsupported)
    }

    /// Aggregate a finished batch, hand the report off, and pick the value
    /// to return: the first record in dispatch order that succeeded with a
    /// value present. Timed-out-but-completed attempts stay eligible; a
    /// cancelled or failed attempt never supplies the caller's value.
    fn finish_batch<T>(&self, info: &TargetInfo, mut records: Vec<AttemptRecord<T>>) -> Option<T> {
        records.sort_by_key(|r| r.index);

        let points: Vec<SamplePoint> = records
            .iter()
            .filter(|r| r.counts_for_stats())
            .filter_map(|r| r.duration.map(|d| SamplePoint::new(d, r.timed_out)))
            .collect();

        match aggregate(&points) {
            Some(report) => {
                self.reporter
                    .report_batch(info, self.config.runs(), self.config.workers(), &report);
            }
            None => {
                error!(target: "pacer", "{}: all attempts failed", info.name);
                return None;
            }
        }

        records
            .into_iter()
            .filter(|r| !r.failed)
            .find_map(|r| r.value)
    }
}

/// Map a task outcome record onto a plain value record; an `Err` outcome
/// is an attempt failure.
fn flatten_task_record(
    name: &str,
    record: AttemptRecord<Result<Value, String>>,
) -> AttemptRecord<Value> {
    match record.value {
        Some(Ok(value)) => AttemptRecord {
            index: record.index,
            duration: record.duration,
            value: Some(value),
            timed_out: record.timed_out,
            failed: record.failed,
        },
        Some(Err(message)) => {
            error!(
                target: "pacer",
                "{}: attempt {} failed: {}",
                name, record.index, message
            );
            AttemptRecord::failure(record.index)
        }
        None => AttemptRecord {
            index: record.index,
            duration: record.duration,
            value: None,
            timed_out: record.timed_out,
            failed: record.failed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDef;
    use serde_json::json;
    use std::time::Duration;

    fn sum_args(input: TaskInput) -> Result<Value, String> {
        let items = input.args.as_array().ok_or("args must be an array")?;
        let total: i64 = items.iter().filter_map(|v| v.as_i64()).sum();
        Ok(json!(total))
    }

    fn failing_task(_input: TaskInput) -> Result<Value, String> {
        Err("task error".to_string())
    }

    fn scaled_sum(input: TaskInput) -> Result<Value, String> {
        let receiver = input.receiver.ok_or("bound call expected")?;
        let scale = receiver["scale"].as_i64().ok_or("receiver needs scale")?;
        let items = input.args.as_array().ok_or("args must be an array")?;
        let total: i64 = items.iter().filter_map(|v| v.as_i64()).sum();
        Ok(json!(total * scale))
    }

    inventory::submit! {
        TaskDef { id: "harness-test.sum", run: sum_args }
    }
    inventory::submit! {
        TaskDef { id: "harness-test.fail", run: failing_task }
    }
    inventory::submit! {
        TaskDef { id: "harness-test.scaled-sum", run: scaled_sum }
    }

    fn harness(runs: usize, workers: usize) -> Harness {
        Harness::new(
            HarnessConfig::builder()
                .runs(runs)
                .workers(workers)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_run_task_unknown_id_is_an_error() {
        let err = harness(1, 1)
            .run_task(&TaskCall::free("harness-test.missing", Value::Null))
            .unwrap_err();
        assert!(matches!(err, TaskError::UnknownTask(_)));
    }

    #[test]
    fn test_run_task_fast_path_returns_value() {
        let value = harness(1, 1)
            .run_task(&TaskCall::free("harness-test.sum", json!([1, 2, 3])))
            .unwrap();
        assert_eq!(value, Some(json!(6)));
    }

    #[test]
    fn test_run_task_fast_path_propagates_failure() {
        let err = harness(1, 1)
            .run_task(&TaskCall::free("harness-test.fail", Value::Null))
            .unwrap_err();
        assert!(matches!(err, TaskError::Attempt(_)));
    }

    #[test]
    fn test_run_task_batched_returns_value() {
        let value = harness(4, 2)
            .run_task(&TaskCall::free("harness-test.sum", json!([2, 3])))
            .unwrap();
        assert_eq!(value, Some(json!(5)));
    }

    #[test]
    fn test_run_task_bound_call_uses_receiver_snapshot() {
        let call = TaskCall::bound("harness-test.scaled-sum", json!({"scale": 10}), json!([1, 2]));
        let value = harness(3, 3).run_task(&call).unwrap();
        assert_eq!(value, Some(json!(30)));
    }

    #[test]
    fn test_run_task_batched_failures_are_absorbed() {
        let value = harness(3, 2)
            .run_task(&TaskCall::free("harness-test.fail", Value::Null))
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_finish_batch_picks_first_valued_record() {
        let h = harness(1, 1);
        let records = vec![
            AttemptRecord::<u32>::cancelled(0, Duration::from_millis(10)),
            AttemptRecord::completed(2, Duration::from_millis(5), 22, false),
            AttemptRecord::completed(1, Duration::from_millis(5), 11, true),
        ];
        let info = TargetInfo::new("pick");
        // Record 0 has no value, record 1 timed out softly but completed,
        // record 2 completed cleanly. Dispatch order wins: record 1.
        assert_eq!(h.finish_batch(&info, records), Some(11));
    }

    #[test]
    fn test_finish_batch_all_failed_returns_none() {
        let h = harness(1, 1);
        let records: Vec<AttemptRecord<u32>> =
            vec![AttemptRecord::failure(0), AttemptRecord::failure(1)];
        assert_eq!(h.finish_batch(&TargetInfo::new("none"), records), None);
    }
}
