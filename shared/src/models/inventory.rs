//! Inventory Model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inventory record owned by a pharmacy
///
/// Stored at `pharmacies/{pharmacyId}/inventory/{itemId}`. The `id` is the
/// document id and is not part of the stored fields. Catalog attributes
/// (`active_ingredient`, ...) are joined from `medications/{id}` at read
/// time and never written back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    #[serde(skip)]
    pub id: String,
    /// Reference into the global catalog, usually `/medications/{id}`
    #[serde(rename = "medicamentoRef", default)]
    pub medication_ref: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(rename = "precioUnidad", default)]
    pub price_per_unit: u32,
    #[serde(rename = "lote", default)]
    pub batch: String,
    #[serde(rename = "fechaIngreso", default, skip_serializing_if = "Option::is_none")]
    pub received_on: Option<NaiveDate>,
    #[serde(rename = "fechaVencimiento", default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,

    // === Catalog attributes ===
    #[serde(skip)]
    pub active_ingredient: Option<String>,
    #[serde(skip)]
    pub presentation: Option<String>,
    #[serde(skip)]
    pub manufacturer: Option<String>,
    #[serde(skip)]
    pub contraindications: Vec<String>,
}

impl InventoryItem {
    /// Attach the document id after deserializing a stored record
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Copy catalog attributes onto this record
    pub fn apply_catalog(&mut self, entry: &MedicationCatalogEntry) {
        self.active_ingredient = entry.active_ingredient.clone();
        self.presentation = entry.presentation.clone();
        self.manufacturer = entry.manufacturer.clone();
        self.contraindications = entry.contraindications.clone();
    }
}

/// Global medication catalog entry (`medications/{medicationId}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicationCatalogEntry {
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "principioActivo", default, skip_serializing_if = "Option::is_none")]
    pub active_ingredient: Option<String>,
    #[serde(rename = "presentacion", default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,
    #[serde(rename = "laboratorio", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(rename = "contraindicaciones", default)]
    pub contraindications: Vec<String>,
}
