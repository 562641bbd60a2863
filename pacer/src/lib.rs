#![warn(missing_docs)]
//! # Pacer
//!
//! A reusable execution harness: run a callable one or more times,
//! optionally in parallel, measure wall-clock duration per invocation,
//! apply an optional per-call timeout, and aggregate timing statistics,
//! while the caller still receives a usable return value as if the call
//! had been made directly.
//!
//! - **Thread pool**: batched attempts of blocking closures across a
//!   bounded pool of OS threads
//! - **Worker processes**: registered tasks in isolated processes, with
//!   calls and records crossing the boundary as framed JSON
//! - **Cooperative scheduling**: async callables under a counting
//!   admission gate, no OS resources spawned
//! - **Timeout policy**: soft (flag and finish) or enforced (stop waiting)
//! - **Reentrancy guard**: a wrapped callable invoked from inside a
//!   harness worker runs plain, so pools never nest
//!
//! ## Quick Start
//!
//! ```ignore
//! use pacer::{Harness, HarnessConfig, TargetInfo};
//!
//! let config = HarnessConfig::builder().runs(10).workers(4).build()?;
//! let harness = Harness::new(config);
//!
//! let value = harness.time(TargetInfo::new("fetch_page"), || fetch_page());
//! ```
//!
//! ## Process Execution
//!
//! ```ignore
//! fn main() {
//!     // Must run first: worker processes re-execute this binary.
//!     pacer::init_worker();
//!     // ...
//! }
//! ```

pub use pacer_core::{
    AttemptRecord, CallDescriptor, ConfigError, ExecMode, Harness, HarnessConfig,
    HarnessConfigBuilder, LogReporter, Reporter, TargetInfo, TaskCall, TaskDef, TaskError,
    TaskInput, WorkerMain, find_task, init_worker,
};

#[cfg(unix)]
pub use pacer_core::ProcessError;

// Statistics types handed to reporters, and the aggregation itself.
pub use pacer_stats::{SamplePoint, StatsReport, aggregate};

// Rendering helpers for custom reporters.
pub use pacer_report::{
    format_duration, render_batch, render_batch_detailed, render_single, render_single_detailed,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{ExecMode, Harness, HarnessConfig, Reporter, TargetInfo, TaskCall};
}
