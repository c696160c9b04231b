//! Prescription Model

use serde::{Deserialize, Serialize};

/// Medication line of an issued prescription
///
/// Stored at `users/{userId}/prescriptions/{prescriptionId}/items/{itemId}`.
/// Read-only once issued.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrescribedMedication {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "medicamentoRef", default)]
    pub medication_ref: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "dosisMg", default)]
    pub dose_mg: u32,
    #[serde(rename = "frecuenciaHoras", default)]
    pub frequency_hours: u32,
    #[serde(rename = "cantidad", default)]
    pub quantity: u32,
}

impl PrescribedMedication {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// How a prescription entered the app
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrescriptionSource {
    /// Read from an NFC tag
    #[default]
    Nfc,
    /// Recognized from a photo
    Photo,
    /// Extracted from a PDF
    Pdf,
}

/// A prescription captured on the device, waiting to be uploaded
///
/// All ingestion modalities produce this same payload and share the offline
/// queue with orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionUpload {
    /// Pre-assigned document id, stable across replays
    pub prescription_id: String,
    pub source: PrescriptionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    pub items: Vec<PrescribedMedication>,
    pub captured_at: i64,
}
