//! Reentrancy detection.
//!
//! A wrapped callable may itself be wrapped and invoked from inside a
//! worker. Without a guard every inner call would fan out a fresh pool and
//! resource use would grow without bound. The harness marks worker context
//! explicitly at the boundaries it controls: a thread-local scope on pool
//! threads, a task-local scope around cooperative attempts, and a
//! process-wide flag in worker processes. No thread or process identity
//! probing is involved; [`active`] only reads context the harness set.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once when this whole process runs as a pacer worker.
static PROCESS_WORKER: AtomicBool = AtomicBool::new(false);

thread_local! {
    static THREAD_WORKER: Cell<bool> = const { Cell::new(false) };
}

tokio::task_local! {
    pub(crate) static TASK_WORKER: bool;
}

/// Whether the current execution context is a harness-spawned worker.
pub(crate) fn active() -> bool {
    if PROCESS_WORKER.load(Ordering::Relaxed) {
        return true;
    }
    if THREAD_WORKER.with(|flag| flag.get()) {
        return true;
    }
    TASK_WORKER.try_with(|flag| *flag).unwrap_or(false)
}

/// Mark this process as a worker. Called by the worker entry point.
pub(crate) fn mark_process_worker() {
    PROCESS_WORKER.store(true, Ordering::Relaxed);
}

/// RAII scope marking the current thread as a pool worker.
pub(crate) struct WorkerScope {
    previous: bool,
}

impl WorkerScope {
    pub(crate) fn enter() -> Self {
        let previous = THREAD_WORKER.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for WorkerScope {
    fn drop(&mut self) {
        THREAD_WORKER.with(|flag| flag.set(self.previous));
    }
}
