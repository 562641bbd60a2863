//! Attempt records and callable identity.

use pacer_ipc::TaskCall;
use std::any::Any;
use std::time::Duration;

/// Identity of the wrapped callable, carried into reports and logs.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    /// Display name of the callable.
    pub name: String,
    /// Rendered call arguments, empty when not known.
    pub args: String,
}

impl TargetInfo {
    /// Identity with a name only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: String::new(),
        }
    }

    /// Identity with a name and rendered arguments.
    pub fn with_args(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }

    /// Identity derived from a registered task call.
    pub fn for_call(call: &TaskCall) -> Self {
        Self {
            name: call.task.clone(),
            args: call.descriptor.args().to_string(),
        }
    }
}

/// Outcome of one attempt in a batch.
///
/// Produced by exactly one worker, immutable afterwards, consumed once by
/// the aggregator. The flag algebra:
///
/// - `failed` set: the attempt raised; `duration` and `value` are absent.
/// - `timed_out` set with a value present: the attempt overran a soft
///   budget but was allowed to finish.
/// - `timed_out` set with `value` absent and `failed` clear: the attempt
///   was cancelled under an enforced budget; `duration` is the elapsed
///   time at cancellation.
#[derive(Debug, Clone)]
pub struct AttemptRecord<T> {
    /// Position of this attempt in dispatch order.
    pub index: usize,
    /// Wall-clock duration, absent on failure.
    pub duration: Option<Duration>,
    /// Return value, absent on failure or cancellation.
    pub value: Option<T>,
    /// Whether the attempt overran its timeout budget.
    pub timed_out: bool,
    /// Whether the attempt raised instead of completing.
    pub failed: bool,
}

impl<T> AttemptRecord<T> {
    /// Record for an attempt that ran to completion.
    pub fn completed(index: usize, duration: Duration, value: T, timed_out: bool) -> Self {
        Self {
            index,
            duration: Some(duration),
            value: Some(value),
            timed_out,
            failed: false,
        }
    }

    /// Record for an attempt that raised.
    pub fn failure(index: usize) -> Self {
        Self {
            index,
            duration: None,
            value: None,
            timed_out: false,
            failed: true,
        }
    }

    /// Record for an attempt abandoned under an enforced timeout.
    pub fn cancelled(index: usize, elapsed: Duration) -> Self {
        Self {
            index,
            duration: Some(elapsed),
            value: None,
            timed_out: true,
            failed: false,
        }
    }

    /// Whether this record contributes a duration sample to the report.
    pub fn counts_for_stats(&self) -> bool {
        !self.failed && self.duration.is_some()
    }
}

/// Best-effort description of a caught panic payload.
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_record_has_no_duration_or_value() {
        let record: AttemptRecord<u32> = AttemptRecord::failure(4);
        assert!(record.failed);
        assert!(record.duration.is_none());
        assert!(record.value.is_none());
        assert!(!record.counts_for_stats());
    }

    #[test]
    fn test_cancelled_record_counts_for_stats() {
        let record: AttemptRecord<u32> = AttemptRecord::cancelled(0, Duration::from_millis(100));
        assert!(record.timed_out);
        assert!(!record.failed);
        assert!(record.value.is_none());
        assert!(record.counts_for_stats());
    }

    #[test]
    fn test_target_info_for_call() {
        let call = TaskCall::free("fetch", json!([1, "x"]));
        let info = TargetInfo::for_call(&call);
        assert_eq!(info.name, "fetch");
        assert_eq!(info.args, "[1,\"x\"]");
    }
}
