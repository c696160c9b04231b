//! Inventory reads

use crate::store::{DocumentStore, StoreResult, paths};
use futures::future::join_all;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{InventoryItem, MedicationCatalogEntry, Pharmacy};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct InventoryRepository {
    store: Arc<dyn DocumentStore>,
}

impl InventoryRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Pharmacy metadata, `PharmacyNotFound` if the pharmacy does not exist
    pub async fn get_pharmacy(&self, pharmacy_id: &str) -> AppResult<Pharmacy> {
        let doc = self
            .store
            .get(&paths::pharmacy(pharmacy_id))
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::PharmacyNotFound).with_detail("pharmacy_id", pharmacy_id)
            })?;
        Ok(doc.decode::<Pharmacy>()?.with_id(doc.id))
    }

    /// A single inventory record without catalog attributes
    pub async fn get_item(
        &self,
        pharmacy_id: &str,
        item_id: &str,
    ) -> StoreResult<Option<InventoryItem>> {
        let path = paths::inventory_item(pharmacy_id, item_id);
        match self.store.get(&path).await? {
            Some(doc) => Ok(Some(doc.decode::<InventoryItem>()?.with_id(doc.id))),
            None => Ok(None),
        }
    }

    /// Full inventory of a pharmacy, each record joined with its catalog entry
    ///
    /// Catalog lookups are best-effort: a missing or unreadable entry leaves
    /// the attributes empty. Records that fail to decode are skipped.
    pub async fn list_inventory(&self, pharmacy_id: &str) -> StoreResult<Vec<InventoryItem>> {
        let docs = self.store.list(&paths::inventory(pharmacy_id)).await?;

        let mut items = Vec::with_capacity(docs.len());
        for doc in docs {
            match doc.decode::<InventoryItem>() {
                Ok(item) => items.push(item.with_id(doc.id)),
                Err(e) => {
                    tracing::warn!(path = %doc.path, error = %e, "Skipping malformed inventory record");
                }
            }
        }

        let catalog = self.load_catalog(&items).await;
        for item in &mut items {
            if let Some(entry) = catalog.get(paths::last_segment(&item.medication_ref)) {
                item.apply_catalog(entry);
            }
        }

        Ok(items)
    }

    /// Fetch the distinct catalog entries referenced by `items` concurrently
    async fn load_catalog(&self, items: &[InventoryItem]) -> HashMap<String, MedicationCatalogEntry> {
        let mut ids: Vec<&str> = items
            .iter()
            .map(|item| paths::last_segment(&item.medication_ref))
            .filter(|id| paths::is_valid_id(id))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let lookups = ids.into_iter().map(|id| async move {
            let path = paths::medication(id);
            let entry = match self.store.get(&path).await {
                Ok(Some(doc)) => doc.decode::<MedicationCatalogEntry>().ok(),
                Ok(None) => None,
                Err(e) => {
                    tracing::debug!(medication_id = %id, error = %e, "Catalog lookup failed");
                    None
                }
            };
            entry.map(|entry| (id.to_string(), entry))
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}
