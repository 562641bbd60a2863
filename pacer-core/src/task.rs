//! Registered task definitions.
//!
//! Closures cannot cross a process boundary, so callables that may run in
//! worker processes are registered by id at link time and resolved from
//! this registry on both sides of the boundary. Arguments and receiver
//! snapshots travel as JSON; a receiver that cannot be represented that way
//! cannot run in a worker process. Registered tasks also run on the
//! in-process thread pool, where the registry lookup is the only overhead.

use pacer_ipc::{CallDescriptor, TaskCall};
use serde_json::Value;

/// Input handed to a registered task: its arguments plus, for bound calls,
/// the receiver snapshot to reconstruct.
#[derive(Debug, Clone)]
pub struct TaskInput {
    /// Receiver snapshot for bound calls.
    pub receiver: Option<Value>,
    /// Call arguments.
    pub args: Value,
}

impl From<&TaskCall> for TaskInput {
    fn from(call: &TaskCall) -> Self {
        match &call.descriptor {
            CallDescriptor::Free { args } => Self {
                receiver: None,
                args: args.clone(),
            },
            CallDescriptor::Bound { receiver, args } => Self {
                receiver: Some(receiver.clone()),
                args: args.clone(),
            },
        }
    }
}

/// A callable registered for execution by id.
pub struct TaskDef {
    /// Unique identifier, referenced by [`TaskCall::task`].
    pub id: &'static str,
    /// The callable. An `Err` return is an attempt failure.
    pub run: fn(TaskInput) -> Result<Value, String>,
}

inventory::collect!(TaskDef);

/// Look up a registered task by id.
pub fn find_task(id: &str) -> Option<&'static TaskDef> {
    inventory::iter::<TaskDef>.into_iter().find(|t| t.id == id)
}

/// Anchor to prevent LTO from stripping registry entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<TaskDef> {}
};
