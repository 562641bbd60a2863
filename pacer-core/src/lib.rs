#![warn(missing_docs)]
//! Pacer Core - Execution Harness
//!
//! This crate provides the harness runtime:
//! - `HarnessConfig` with construction-time validation
//! - `Harness`, the wrapping construct with thread, process, and
//!   cooperative coordinators
//! - The per-attempt timeout policy (soft flagging vs enforced abandonment)
//! - Reentrancy guarding so wrapped callables invoked inside harness
//!   workers run uninstrumented
//! - The worker-process entry point for isolated execution

mod config;
mod cooperative;
mod guard;
mod harness;
#[cfg(unix)]
mod process;
mod record;
mod reporter;
mod task;
mod threads;
mod timeout;
mod worker;

pub use config::{ConfigError, ExecMode, HarnessConfig, HarnessConfigBuilder};
pub use harness::{Harness, TaskError};
#[cfg(unix)]
pub use process::ProcessError;
pub use record::{AttemptRecord, TargetInfo};
pub use reporter::{LogReporter, Reporter};
pub use task::{TaskDef, TaskInput, find_task};
pub use worker::{WorkerMain, init_worker};

// Wire types that appear in the public API.
pub use pacer_ipc::{CallDescriptor, FrameError, TaskCall};
// Report types handed to reporters.
pub use pacer_stats::{SamplePoint, StatsReport};
