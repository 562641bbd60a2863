#![warn(missing_docs)]
//! Pacer IPC - Coordinator/Worker Wire Protocol
//!
//! Length-prefixed JSON frames exchanged between the process coordinator and
//! its worker processes, plus the message types that cross that boundary.
//! Call payloads and return values are arbitrary user JSON, so frames carry
//! `serde_json` documents rather than a fixed binary layout.

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{AttemptWire, CallDescriptor, TaskCall, WorkerCommand, WorkerReply};

/// Protocol version advertised in the worker handshake.
pub const PROTOCOL_VERSION: u32 = 1;
