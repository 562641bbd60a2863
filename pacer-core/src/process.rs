//! Process coordinator.
//!
//! Runs batched attempts of a registered task in isolated worker
//! processes. Workers are spawned by re-executing the current binary with
//! `PACER_WORKER` set (the host binary must call [`crate::init_worker`]
//! first thing in `main`); calls and records cross the boundary as
//! length-prefixed frames over an inherited pipe pair on fd 3/4.
//!
//! Memory isolation costs serialization: only registered tasks with
//! JSON-representable arguments and receivers can run here, and only the
//! soft timeout policy applies because cancellation across a process
//! boundary is not attempted. A crashed worker costs its in-flight attempt
//! and is replaced for the remainder of its shard.

use crate::config::HarnessConfig;
use crate::record::AttemptRecord;
use crate::timeout::TimeoutPolicy;
use crate::worker::{IPC_FD_ENV, WORKER_ENV};
use pacer_ipc::{
    AttemptWire, FrameError, FrameReader, FrameWriter, PROTOCOL_VERSION, TaskCall, WorkerCommand,
    WorkerReply,
};
use rayon::prelude::*;
use serde_json::Value;
use std::env;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Errors from spawning or talking to worker processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The worker binary could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// Frame-level failure on the coordinator/worker pipe.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// The worker process died mid-conversation.
    #[error("worker crashed: {0}")]
    Crashed(String),

    /// The worker replied with something the protocol does not allow here.
    #[error("worker protocol error: expected {expected}, got {got}")]
    Protocol {
        /// What the coordinator was waiting for.
        expected: String,
        /// What actually arrived.
        got: String,
    },
}

impl From<FrameError> for ProcessError {
    fn from(e: FrameError) -> Self {
        ProcessError::Ipc(e.to_string())
    }
}

/// Create a pipe pair, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Close-on-exec on both ends; the child clears it for the two it keeps.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Handle to one spawned worker process.
struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
}

impl WorkerHandle {
    /// Spawn a worker by re-executing the current binary with the worker
    /// environment set and fd 3/4 wired to a fresh pipe pair.
    fn spawn() -> Result<Self, ProcessError> {
        let binary = env::current_exe().map_err(ProcessError::Spawn)?;

        // cmd pipe: coordinator writes commands, worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg pipe: worker writes replies to fd 4, coordinator reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(ProcessError::Spawn(e));
            }
        };

        let mut command = Command::new(&binary);
        command
            .env(WORKER_ENV, "1")
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // In the child: dup cmd_read to 3, msg_write to 4, close originals.
        unsafe {
            command.pre_exec(move || {
                if cmd_read != 3 {
                    libc::dup2(cmd_read, 3);
                    libc::close(cmd_read);
                }
                let flags = libc::fcntl(3, libc::F_GETFD);
                libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                if msg_write != 4 {
                    libc::dup2(msg_write, 4);
                    libc::close(msg_write);
                }
                let flags = libc::fcntl(4, libc::F_GETFD);
                libc::fcntl(4, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                // Close the parent-side ends that leaked into the child
                libc::close(cmd_write);
                libc::close(msg_read);

                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(ProcessError::Spawn(e));
            }
        };

        // Close the child-side ends in the parent
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
        };

        handle.wait_for_hello()?;
        Ok(handle)
    }

    /// Wait for the handshake and validate the protocol version.
    fn wait_for_hello(&mut self) -> Result<(), ProcessError> {
        match self.reader.read::<WorkerReply>()? {
            WorkerReply::Hello { protocol_version } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(ProcessError::Protocol {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", protocol_version),
                    });
                }
                Ok(())
            }
            other => Err(ProcessError::Protocol {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Run one attempt on this worker and wait for its record.
    fn run_call(
        &mut self,
        index: usize,
        call: &TaskCall,
        timeout_nanos: u64,
    ) -> Result<AttemptRecord<Value>, ProcessError> {
        self.writer.write(&WorkerCommand::Run {
            index,
            call: call.clone(),
            timeout_nanos,
        })?;

        match self.reader.read::<WorkerReply>() {
            Ok(WorkerReply::Record(wire)) => {
                if wire.index != index {
                    return Err(ProcessError::Protocol {
                        expected: format!("record for attempt {}", index),
                        got: format!("record for attempt {}", wire.index),
                    });
                }
                if wire.failed {
                    error!(
                        target: "pacer",
                        "{}: attempt {} failed in worker: {}",
                        call.task,
                        index,
                        wire.error.as_deref().unwrap_or("unknown error")
                    );
                }
                Ok(wire_to_record(wire))
            }
            Ok(other) => Err(ProcessError::Protocol {
                expected: "Record".to_string(),
                got: format!("{:?}", other),
            }),
            Err(FrameError::EndOfStream) => Err(ProcessError::Crashed(
                "worker closed connection unexpectedly".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Ask the worker to exit and wait for it.
    fn shutdown(mut self) -> Result<(), ProcessError> {
        self.writer.write(&WorkerCommand::Shutdown)?;
        let _ = self.child.wait();
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(_) => false,
        }
    }

    fn kill(&mut self) -> Result<(), ProcessError> {
        self.child.kill().map_err(ProcessError::Spawn)?;
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn wire_to_record(wire: AttemptWire) -> AttemptRecord<Value> {
    AttemptRecord {
        index: wire.index,
        duration: wire.duration_nanos.map(Duration::from_nanos),
        value: wire.value,
        timed_out: wire.timed_out,
        failed: wire.failed,
    }
}

/// Run `config.runs()` attempts of `call` over `config.workers()` worker
/// processes, sharded round-robin.
pub(crate) fn run_batch(
    call: &TaskCall,
    config: &HarnessConfig,
    policy: &TimeoutPolicy,
) -> Result<Vec<AttemptRecord<Value>>, ProcessError> {
    let runs = config.runs();
    let worker_count = config.workers();
    let timeout_nanos = policy
        .soft_budget()
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    debug!(
        target: "pacer",
        "{}: dispatching {} attempts across {} worker processes",
        call.task, runs, worker_count
    );

    let shards: Vec<Vec<usize>> = (0..worker_count)
        .map(|w| (w..runs).step_by(worker_count).collect())
        .collect();

    let mut records: Vec<AttemptRecord<Value>> = if worker_count == 1 {
        run_shard(call, &shards[0], timeout_nanos)
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| ProcessError::Ipc(format!("failed to build worker pool: {}", e)))?;

        pool.install(|| {
            shards
                .par_iter()
                .map(|shard| run_shard(call, shard, timeout_nanos))
                .collect::<Vec<_>>()
        })
        .into_iter()
        .flatten()
        .collect()
    };

    records.sort_by_key(|r| r.index);
    Ok(records)
}

/// Run one shard on one worker, replacing the worker if it dies.
fn run_shard(call: &TaskCall, indices: &[usize], timeout_nanos: u64) -> Vec<AttemptRecord<Value>> {
    let mut records = Vec::with_capacity(indices.len());
    if indices.is_empty() {
        return records;
    }

    let mut worker = match WorkerHandle::spawn() {
        Ok(w) => Some(w),
        Err(e) => {
            error!(target: "pacer", "{}: failed to spawn worker: {}", call.task, e);
            for &index in indices {
                records.push(AttemptRecord::failure(index));
            }
            return records;
        }
    };

    for &index in indices {
        if worker.is_none() {
            match WorkerHandle::spawn() {
                Ok(w) => worker = Some(w),
                Err(e) => {
                    error!(target: "pacer", "{}: failed to respawn worker: {}", call.task, e);
                    records.push(AttemptRecord::failure(index));
                    continue;
                }
            }
        }

        let outcome = match worker.as_mut() {
            Some(handle) => handle.run_call(index, call, timeout_nanos),
            None => unreachable!("worker exists after spawn check"),
        };

        match outcome {
            Ok(record) => records.push(record),
            Err(e) => {
                error!(
                    target: "pacer",
                    "{}: attempt {} lost to worker error: {}",
                    call.task, index, e
                );
                let worker_alive = worker.as_mut().map(|w| w.is_alive()).unwrap_or(false);
                if !worker_alive {
                    if let Some(mut dead) = worker.take() {
                        let _ = dead.kill();
                    }
                }
                records.push(AttemptRecord::failure(index));
            }
        }
    }

    if let Some(handle) = worker {
        let _ = handle.shutdown();
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shards_cover_all_indices_round_robin() {
        let worker_count = 3;
        let runs = 10;
        let shards: Vec<Vec<usize>> = (0..worker_count)
            .map(|w| (w..runs).step_by(worker_count).collect())
            .collect();

        assert_eq!(shards[0], vec![0, 3, 6, 9]);
        assert_eq!(shards[1], vec![1, 4, 7]);
        assert_eq!(shards[2], vec![2, 5, 8]);

        let mut all: Vec<usize> = shards.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..runs).collect::<Vec<_>>());
    }

    #[test]
    #[ignore] // Requires a built binary that calls init_worker in main
    fn test_spawn_and_shutdown_worker() {
        let worker = WorkerHandle::spawn().unwrap();
        worker.shutdown().unwrap();
    }
}
