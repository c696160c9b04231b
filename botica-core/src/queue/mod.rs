//! Offline Durable Queue
//!
//! Remote writes that cannot be performed now (no connectivity, transient
//! store failure) are persisted locally and replayed by the sync worker.
//! Delivery is at-least-once: an entry leaves the queue only when the
//! worker confirms the remote write or the user discards it. Refused
//! replays stay queued, flagged with `needs_attention`.

mod operation;
mod storage;

pub use operation::{PendingOperation, PendingPayload, RejectedOperation};
pub use storage::{OfflineQueue, QueueError, QueueResult};
