//! IPC Message Types
//!
//! The command/reply vocabulary between the process coordinator and a worker,
//! plus the call descriptor that names what a worker should invoke.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a task call is bound, resolved once when the call is built.
///
/// The distinction matters at the process boundary: a bound call has to carry
/// a serializable snapshot of its receiver, because worker processes share no
/// memory with the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDescriptor {
    /// A free function call with its arguments.
    Free {
        /// Arguments for the call, as a JSON document.
        args: Value,
    },
    /// A method call bound to a snapshot of its receiver.
    Bound {
        /// Serialized receiver state, reconstructed inside the worker.
        receiver: Value,
        /// Arguments for the call, as a JSON document.
        args: Value,
    },
}

impl CallDescriptor {
    /// Arguments carried by this descriptor.
    pub fn args(&self) -> &Value {
        match self {
            CallDescriptor::Free { args } => args,
            CallDescriptor::Bound { args, .. } => args,
        }
    }

    /// Receiver snapshot, if this is a bound call.
    pub fn receiver(&self) -> Option<&Value> {
        match self {
            CallDescriptor::Free { .. } => None,
            CallDescriptor::Bound { receiver, .. } => Some(receiver),
        }
    }
}

/// A resolved invocation target: a registered task id plus its descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCall {
    /// Id of the registered task to invoke.
    pub task: String,
    /// How the call is bound and what arguments it carries.
    pub descriptor: CallDescriptor,
}

impl TaskCall {
    /// Build a free call against a registered task.
    pub fn free(task: impl Into<String>, args: Value) -> Self {
        Self {
            task: task.into(),
            descriptor: CallDescriptor::Free { args },
        }
    }

    /// Build a bound call carrying a receiver snapshot.
    pub fn bound(task: impl Into<String>, receiver: Value, args: Value) -> Self {
        Self {
            task: task.into(),
            descriptor: CallDescriptor::Bound { receiver, args },
        }
    }
}

/// One attempt's outcome in wire form.
///
/// Mirrors the coordinator-side attempt record: a failed attempt has neither
/// duration nor value, a soft-timed-out attempt has both plus the flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptWire {
    /// Position of this attempt in the dispatched batch.
    pub index: usize,
    /// Wall-clock duration in nanoseconds, absent when the attempt failed.
    pub duration_nanos: Option<u64>,
    /// Return value of the call, absent on failure.
    pub value: Option<Value>,
    /// Whether the attempt overran its timeout budget.
    pub timed_out: bool,
    /// Whether the attempt raised an error instead of completing.
    pub failed: bool,
    /// Error description when `failed` is set.
    pub error: Option<String>,
}

impl AttemptWire {
    /// Wire record for a failed attempt.
    pub fn failure(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            duration_nanos: None,
            value: None,
            timed_out: false,
            failed: true,
            error: Some(error.into()),
        }
    }
}

/// Commands sent from the coordinator to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerCommand {
    /// Run one attempt of the given call.
    Run {
        /// Position of this attempt in the dispatched batch.
        index: usize,
        /// What to invoke.
        call: TaskCall,
        /// Soft timeout budget in nanoseconds, 0 for none.
        timeout_nanos: u64,
    },

    /// Request graceful shutdown.
    Shutdown,
}

/// Replies sent from a worker to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerReply {
    /// Initial handshake.
    Hello {
        /// Protocol version the worker speaks.
        protocol_version: u32,
    },

    /// Outcome of one `Run` command.
    Record(AttemptWire),
}
