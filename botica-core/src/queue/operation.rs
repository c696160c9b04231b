use serde::{Deserialize, Serialize};
use shared::models::{OrderRequest, PrescriptionUpload};

/// Deferred remote write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingPayload {
    /// Checkout submitted while offline, replayed through order creation
    Order(OrderRequest),
    /// Prescription captured from a tag / photo / PDF, uploaded on replay
    Prescription(PrescriptionUpload),
}

impl PendingPayload {
    /// Identity of the remote document this payload creates
    ///
    /// Used by callers to avoid enqueueing the same order twice.
    pub fn key(&self) -> &str {
        match self {
            PendingPayload::Order(request) => &request.order_id,
            PendingPayload::Prescription(upload) => &upload.prescription_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PendingPayload::Order(_) => "order",
            PendingPayload::Prescription(_) => "prescription",
        }
    }
}

/// Offline queue entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    /// Insertion sequence (FIFO key)
    #[serde(default)]
    pub seq: u64,
    pub id: String,
    pub user_id: String,
    pub payload: PendingPayload,
    pub created_at: i64,
    /// Failed replay attempts so far
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<i64>,
    /// Last replay was refused for a reason retrying alone will not fix
    /// (e.g. stock ran out). The entry stays queued; the UI surfaces it.
    #[serde(default)]
    pub needs_attention: bool,
}

/// Entry the user chose to discard instead of syncing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedOperation {
    pub operation: PendingOperation,
    pub rejected_at: i64,
    pub reason: String,
}
