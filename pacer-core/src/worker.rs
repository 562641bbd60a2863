//! Worker Process Entry Point
//!
//! Handles the worker side of the process coordinator. On Unix the
//! coordinator passes a pipe pair as fd 3/4 (named in `PACER_IPC_FD`);
//! stdin/stdout serve as a fallback so a worker can also be driven over
//! stdio. The loop answers each `Run` command with exactly one record and
//! exits on `Shutdown` or when the coordinator closes the pipe.

use crate::guard;
use crate::record::panic_message;
use crate::task::{TaskInput, find_task};
use crate::timeout::TimeoutPolicy;
use pacer_ipc::{
    AttemptWire, FrameError, FrameReader, FrameWriter, PROTOCOL_VERSION, TaskCall, WorkerCommand,
    WorkerReply,
};
use std::io::{Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

/// Environment variable marking a process as a pacer worker.
pub(crate) const WORKER_ENV: &str = "PACER_WORKER";

/// Environment variable naming the inherited IPC fd pair as `read,write`.
#[cfg(unix)]
pub(crate) const IPC_FD_ENV: &str = "PACER_IPC_FD";

/// If this process was spawned as a pacer worker, run the worker loop and
/// exit; otherwise return immediately.
///
/// Call this first thing in `main` of any binary that uses
/// [`ExecMode::Processes`](crate::ExecMode::Processes).
pub fn init_worker() {
    if std::env::var_os(WORKER_ENV).is_none() {
        return;
    }
    guard::mark_process_worker();

    let mut worker = WorkerMain::from_env();
    let code = match worker.run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("pacer worker: {e}");
            1
        }
    };
    std::process::exit(code);
}

/// IPC transport: inherited fd pair, or stdin/stdout as a fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        let parts: Vec<&str> = val.split(',').collect();
        if parts.len() == 2 {
            if let (Ok(r), Ok(w)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) {
                return IpcTransport::Fds {
                    read_fd: r,
                    write_fd: w,
                };
            }
        }
        eprintln!(
            "pacer: warning: invalid {IPC_FD_ENV}={val:?} (expected <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    IpcTransport::Stdio
}

/// Worker main loop, generic over its transport so tests can drive it with
/// in-memory streams.
pub struct WorkerMain<R: Read, W: Write> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl WorkerMain<Box<dyn Read>, Box<dyn Write>> {
    /// Build a worker over the transport inherited from the coordinator.
    pub fn from_env() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                use std::os::unix::io::FromRawFd;
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::new(
                    Box::new(read_file) as Box<dyn Read>,
                    Box::new(write_file) as Box<dyn Write>,
                )
            }
            IpcTransport::Stdio => Self::new(
                Box::new(std::io::stdin()) as Box<dyn Read>,
                Box::new(std::io::stdout()) as Box<dyn Write>,
            ),
        }
    }
}

impl<R: Read, W: Write> WorkerMain<R, W> {
    /// Build a worker over explicit streams.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Run the worker loop until shutdown or end of stream.
    pub fn run(&mut self) -> Result<(), FrameError> {
        self.writer.write(&WorkerReply::Hello {
            protocol_version: PROTOCOL_VERSION,
        })?;

        loop {
            let command: WorkerCommand = match self.reader.read() {
                Ok(command) => command,
                // Coordinator hung up; nothing more to do.
                Err(FrameError::EndOfStream) => break,
                Err(e) => return Err(e),
            };

            match command {
                WorkerCommand::Run {
                    index,
                    call,
                    timeout_nanos,
                } => {
                    let record = execute_call(index, &call, timeout_nanos);
                    self.writer.write(&WorkerReply::Record(record))?;
                }
                WorkerCommand::Shutdown => break,
            }
        }

        Ok(())
    }
}

/// Run one attempt of a registered task and produce its wire record.
fn execute_call(index: usize, call: &TaskCall, timeout_nanos: u64) -> AttemptWire {
    let Some(def) = find_task(&call.task) else {
        return AttemptWire::failure(index, format!("no registered task named `{}`", call.task));
    };

    let policy = if timeout_nanos > 0 {
        TimeoutPolicy::Soft(Duration::from_nanos(timeout_nanos))
    } else {
        TimeoutPolicy::Unbounded
    };

    let input = TaskInput::from(call);
    let start = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| (def.run)(input))) {
        Ok(Ok(value)) => {
            let elapsed = start.elapsed();
            let timed_out = policy.flag_overrun(&call.task, elapsed);
            AttemptWire {
                index,
                duration_nanos: Some(elapsed.as_nanos() as u64),
                value: Some(value),
                timed_out,
                failed: false,
                error: None,
            }
        }
        Ok(Err(message)) => AttemptWire::failure(index, message),
        Err(panic) => AttemptWire::failure(index, panic_message(panic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDef;
    use serde_json::{Value, json};
    use std::io::Cursor;

    fn double(input: TaskInput) -> Result<Value, String> {
        let n = input.args.as_i64().ok_or("args must be an integer")?;
        Ok(json!(n * 2))
    }

    fn always_fails(_input: TaskInput) -> Result<Value, String> {
        Err("intentional failure".to_string())
    }

    fn counter_add(input: TaskInput) -> Result<Value, String> {
        let receiver = input.receiver.ok_or("bound call expected")?;
        let count = receiver["count"].as_i64().ok_or("receiver needs count")?;
        let n = input.args.as_i64().ok_or("args must be an integer")?;
        Ok(json!(count + n))
    }

    inventory::submit! {
        TaskDef { id: "worker-test.double", run: double }
    }
    inventory::submit! {
        TaskDef { id: "worker-test.fail", run: always_fails }
    }
    inventory::submit! {
        TaskDef { id: "worker-test.counter-add", run: counter_add }
    }

    fn encode_commands(commands: &[WorkerCommand]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for command in commands {
                writer.write(command).unwrap();
            }
        }
        buffer
    }

    fn decode_replies(buffer: Vec<u8>) -> Vec<WorkerReply> {
        let mut reader = FrameReader::new(Cursor::new(buffer));
        let mut replies = Vec::new();
        while let Ok(reply) = reader.read::<WorkerReply>() {
            replies.push(reply);
        }
        replies
    }

    #[test]
    fn test_worker_answers_run_commands() {
        let input = encode_commands(&[
            WorkerCommand::Run {
                index: 0,
                call: TaskCall::free("worker-test.double", json!(21)),
                timeout_nanos: 0,
            },
            WorkerCommand::Run {
                index: 1,
                call: TaskCall::free("worker-test.fail", Value::Null),
                timeout_nanos: 0,
            },
            WorkerCommand::Shutdown,
        ]);

        let mut output = Vec::new();
        WorkerMain::new(Cursor::new(input), &mut output)
            .run()
            .unwrap();

        let replies = decode_replies(output);
        assert_eq!(replies.len(), 3);
        assert!(matches!(
            replies[0],
            WorkerReply::Hello {
                protocol_version: PROTOCOL_VERSION
            }
        ));

        match &replies[1] {
            WorkerReply::Record(wire) => {
                assert_eq!(wire.index, 0);
                assert_eq!(wire.value, Some(json!(42)));
                assert!(!wire.failed);
                assert!(wire.duration_nanos.is_some());
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        match &replies[2] {
            WorkerReply::Record(wire) => {
                assert_eq!(wire.index, 1);
                assert!(wire.failed);
                assert_eq!(wire.error.as_deref(), Some("intentional failure"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_becomes_failed_record() {
        let input = encode_commands(&[
            WorkerCommand::Run {
                index: 0,
                call: TaskCall::free("worker-test.missing", Value::Null),
                timeout_nanos: 0,
            },
            WorkerCommand::Shutdown,
        ]);

        let mut output = Vec::new();
        WorkerMain::new(Cursor::new(input), &mut output)
            .run()
            .unwrap();

        let replies = decode_replies(output);
        match &replies[1] {
            WorkerReply::Record(wire) => {
                assert!(wire.failed);
                assert!(
                    wire.error
                        .as_deref()
                        .unwrap_or_default()
                        .contains("no registered task")
                );
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_bound_call_reaches_task_with_receiver() {
        let input = encode_commands(&[
            WorkerCommand::Run {
                index: 0,
                call: TaskCall::bound("worker-test.counter-add", json!({"count": 40}), json!(2)),
                timeout_nanos: 0,
            },
            WorkerCommand::Shutdown,
        ]);

        let mut output = Vec::new();
        WorkerMain::new(Cursor::new(input), &mut output)
            .run()
            .unwrap();

        let replies = decode_replies(output);
        match &replies[1] {
            WorkerReply::Record(wire) => {
                assert_eq!(wire.value, Some(json!(42)));
                assert!(!wire.failed);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_worker_exits_on_end_of_stream() {
        let input = encode_commands(&[]);
        let mut output = Vec::new();
        WorkerMain::new(Cursor::new(input), &mut output)
            .run()
            .unwrap();

        let replies = decode_replies(output);
        assert_eq!(replies.len(), 1); // Hello only
    }
}
