//! Connectivity-triggered sync of the offline queue

mod connectivity;
mod worker;

pub use connectivity::ConnectivityMonitor;
pub use worker::{
    DEFAULT_PRESCRIPTION_RETRY_BASE, DEFAULT_RETRY_INTERVAL, SyncError, SyncReport, SyncResult,
    SyncTrigger, SyncWorker,
};
