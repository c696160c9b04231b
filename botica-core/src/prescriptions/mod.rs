//! Prescriptions
//!
//! - [`PrescriptionRepository`]: reads the prescribed medication list that
//!   feeds the matcher
//! - [`PrescriptionUploader`]: writes a captured prescription (tag, photo
//!   or PDF) and its medication documents

use crate::store::{DocumentStore, StoreError, paths};
use futures::future::join_all;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{PrescribedMedication, PrescriptionSource, PrescriptionUpload};
use shared::util::now_millis;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrescriptionError {
    #[error("No authenticated user")]
    Unauthenticated,

    #[error("Invalid prescription id: {0:?}")]
    InvalidId(String),

    #[error("Prescription has no medications")]
    Empty,

    #[error("Prescription not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PrescriptionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PrescriptionError::Store(e) if e.is_transient())
    }

    /// The store refused the session (expired or revoked token)
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, PrescriptionError::Store(StoreError::Unauthenticated(_)))
    }
}

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::Unauthenticated => AppError::not_authenticated(),
            PrescriptionError::InvalidId(id) => {
                AppError::validation(format!("Invalid prescription id: {id:?}"))
            }
            PrescriptionError::Empty => AppError::new(ErrorCode::PrescriptionEmpty),
            PrescriptionError::NotFound(id) => {
                AppError::new(ErrorCode::PrescriptionNotFound).with_detail("prescription_id", id)
            }
            PrescriptionError::Store(e) => e.into(),
        }
    }
}

pub type PrescriptionResult<T> = Result<T, PrescriptionError>;

/// Header document at `users/{userId}/prescriptions/{prescriptionId}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrescriptionRecord<'a> {
    source: PrescriptionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_at: Option<i64>,
    captured_at: i64,
    item_count: usize,
    uploaded_at: i64,
}

/// Checks that need no remote access
pub(crate) fn validate_upload(user_id: &str, upload: &PrescriptionUpload) -> PrescriptionResult<()> {
    if user_id.trim().is_empty() {
        return Err(PrescriptionError::Unauthenticated);
    }
    if !paths::is_valid_id(&upload.prescription_id) {
        return Err(PrescriptionError::InvalidId(upload.prescription_id.clone()));
    }
    if upload.items.is_empty() {
        return Err(PrescriptionError::Empty);
    }
    Ok(())
}

#[derive(Clone)]
pub struct PrescriptionRepository {
    store: Arc<dyn DocumentStore>,
}

impl PrescriptionRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Medications of a prescription, in document id order
    ///
    /// `NotFound` when the prescription has no medication documents.
    pub async fn list_items(
        &self,
        user_id: &str,
        prescription_id: &str,
    ) -> PrescriptionResult<Vec<PrescribedMedication>> {
        if user_id.trim().is_empty() {
            return Err(PrescriptionError::Unauthenticated);
        }
        let docs = self
            .store
            .list(&paths::prescription_items(user_id, prescription_id))
            .await?;

        let items: Vec<PrescribedMedication> = docs
            .into_iter()
            .filter_map(|doc| match doc.decode::<PrescribedMedication>() {
                Ok(item) => Some(item.with_id(doc.id)),
                Err(e) => {
                    tracing::warn!(path = %doc.path, error = %e, "Skipping malformed prescribed medication");
                    None
                }
            })
            .collect();

        if items.is_empty() {
            return Err(PrescriptionError::NotFound(prescription_id.to_string()));
        }
        Ok(items)
    }
}

#[derive(Clone)]
pub struct PrescriptionUploader {
    store: Arc<dyn DocumentStore>,
}

impl PrescriptionUploader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write the prescription header and one document per medication
    ///
    /// Safe to replay: every write is a plain overwrite of a deterministic
    /// path. Medications without an id are stored as `item-<n>` (1-based
    /// position). Returns the number of medication documents written.
    pub async fn upload(&self, user_id: &str, upload: &PrescriptionUpload) -> PrescriptionResult<usize> {
        validate_upload(user_id, upload)?;

        let record = PrescriptionRecord {
            source: upload.source,
            issuer: upload.issuer.as_deref(),
            issued_at: upload.issued_at,
            captured_at: upload.captured_at,
            item_count: upload.items.len(),
            uploaded_at: now_millis(),
        };
        let header = serde_json::to_value(&record).map_err(StoreError::from)?;
        self.store
            .set(&paths::prescription(user_id, &upload.prescription_id), header)
            .await?;

        let writes = upload.items.iter().enumerate().map(|(index, item)| async move {
            let item_id = if paths::is_valid_id(&item.id) {
                item.id.clone()
            } else {
                format!("item-{}", index + 1)
            };
            let path = paths::prescription_item(user_id, &upload.prescription_id, &item_id);
            let data = serde_json::to_value(item)?;
            self.store.set(&path, data).await
        });
        for result in join_all(writes).await {
            result?;
        }

        tracing::info!(
            prescription_id = %upload.prescription_id,
            source = ?upload.source,
            items = upload.items.len(),
            "Prescription uploaded"
        );
        Ok(upload.items.len())
    }
}
