//! Structured scheduler trace records.
//!
//! Each scheduling event is offered to an optional [`TraceHook`] as a record
//! id plus a little-endian payload. Every payload starts with the tick
//! (`u64`) and the subject thread id (`u32`):
//!
//! | record            | trailing bytes                               |
//! |-------------------|----------------------------------------------|
//! | `QUEUE_INSERT`    | band index (`u8`)                            |
//! | `QUEUE_REMOVE`    | band index (`u8`)                            |
//! | `PRIORITY_CHANGE` | old priority (`u8`), new priority (`u8`)     |
//! | `PREEMPT_REQUEST` | candidate thread id (`u32`)                  |
//! | `DISPATCH`        | outgoing thread id (`u32`), executed (`u64`) |
//! | `RECLAIM`         | none                                         |
//!
//! Hook failures are ignored; tracing never changes a scheduling decision.

use alloc::sync::Arc;

use thiserror::Error;

use crate::thread::ThreadId;
use crate::time::Tick;

/// Errors a trace sink may report.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("trace sink unavailable")]
    Unavailable,
}

/// Callback receiving `(record, payload, timestamped)`.
pub type TraceHook = Arc<dyn Fn(u8, &[u8], bool) -> Result<(), TraceError> + Send + Sync>;

/// Record identifiers, allocated from the user record range.
pub mod records {
    pub const QUEUE_INSERT: u8 = 100;
    pub const QUEUE_REMOVE: u8 = 101;
    pub const PRIORITY_CHANGE: u8 = 102;
    pub const PREEMPT_REQUEST: u8 = 103;
    pub const DISPATCH: u8 = 104;
    pub const RECLAIM: u8 = 105;
}

const MAX_PAYLOAD: usize = 32;

/// Fixed-capacity payload builder.
pub(crate) struct Payload {
    buf: [u8; MAX_PAYLOAD],
    len: usize,
}

impl Payload {
    /// Starts a payload with the common tick and thread id prefix.
    pub(crate) fn new(now: Tick, thread: ThreadId) -> Self {
        let mut payload = Self {
            buf: [0; MAX_PAYLOAD],
            len: 0,
        };
        payload.extend(&now.raw().to_le_bytes());
        payload.extend(&thread.0.to_le_bytes());
        payload
    }

    fn extend(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    pub(crate) fn u8(mut self, value: u8) -> Self {
        self.extend(&[value]);
        self
    }

    pub(crate) fn u32(mut self, value: u32) -> Self {
        self.extend(&value.to_le_bytes());
        self
    }

    pub(crate) fn u64(mut self, value: u64) -> Self {
        self.extend(&value.to_le_bytes());
        self
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}
