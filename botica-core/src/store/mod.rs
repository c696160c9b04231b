//! Remote document store client
//!
//! Thin adapter over a hierarchical document store:
//!
//! ```text
//! pharmacies/{pharmacyId}
//! pharmacies/{pharmacyId}/inventory/{itemId}
//! medications/{medicationId}
//! users/{userId}/orders/{orderId}
//! users/{userId}/prescriptions/{prescriptionId}/items/{itemId}
//! ```
//!
//! Every component receives an `Arc<dyn DocumentStore>` handle; there is no
//! process-wide client. Stock mutation relies only on the per-document
//! compare-and-set exposed here (see [`run_transaction`]).

mod http;
mod memory;
pub mod paths;
mod transaction;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use transaction::{MAX_TRANSACTION_ATTEMPTS, run_transaction};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// A stored document with its concurrency version
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Last path segment
    pub id: String,
    /// Full document path
    pub path: String,
    /// Monotonic per-document version, bumped on every write (never 0)
    pub version: u64,
    pub data: Value,
}

impl Document {
    /// Deserialize the document fields into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network down, timeout, or server-side failure. Retryable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Compare-and-set lost against a concurrent writer. Retryable.
    #[error("Concurrent modification on {0}")]
    Conflict(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    /// Session missing or expired. Not retryable until the user signs in
    /// again, but writes made under it are still owed to the store.
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// The store refused the request (permissions, malformed data)
    #[error("Store rejected request: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::with_message(ErrorCode::StoreUnavailable, msg),
            StoreError::Conflict(path) => AppError::new(ErrorCode::StoreConflict).with_detail("path", path),
            StoreError::NotFound(path) => AppError::not_found(path),
            StoreError::Unauthenticated(msg) => {
                AppError::with_message(ErrorCode::NotAuthenticated, msg)
            }
            StoreError::Rejected(msg) => AppError::with_message(ErrorCode::StoreRejected, msg),
            StoreError::Serialization(e) => AppError::internal(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document store operations used by the core
///
/// Documents are never deleted by the core, so no delete operation exists.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document
    async fn get(&self, path: &str) -> StoreResult<Option<Document>>;

    /// Create or replace a document, returning its new version
    async fn set(&self, path: &str, data: Value) -> StoreResult<u64>;

    /// Write only if the current version equals `expected_version`
    ///
    /// `expected_version == 0` means the document must not exist yet.
    /// A mismatch returns [`StoreError::Conflict`].
    async fn compare_and_set(
        &self,
        path: &str,
        expected_version: u64,
        data: Value,
    ) -> StoreResult<u64>;

    /// Documents directly under a collection path, ordered by id
    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("timeout".into()).is_transient());
        assert!(StoreError::Conflict("a/b".into()).is_transient());
        assert!(!StoreError::NotFound("a/b".into()).is_transient());
        assert!(!StoreError::Rejected("denied".into()).is_transient());
        assert!(!StoreError::Unauthenticated("expired".into()).is_transient());
    }

    #[test]
    fn test_into_app_error() {
        let err: AppError = StoreError::Unavailable("offline".into()).into();
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
        assert!(err.is_retryable());

        let err: AppError = StoreError::NotFound("users/u/orders/o".into()).into();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err: AppError = StoreError::Unauthenticated("401".into()).into();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }
}
