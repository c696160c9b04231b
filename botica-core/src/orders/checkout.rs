//! Checkout: entry point of the UI layer
//!
//! ```text
//! build_cart ──► matcher::merge(prescription, inventory)
//! submit_order
//!   ├─ online  → OrdersManager::create_order
//!   │              └─ transient failure → offline queue
//!   └─ offline → offline queue ("saved locally, will sync")
//! ```
//!
//! Validation errors (empty cart, no user, insufficient stock while online)
//! are returned synchronously. Offline-path errors are not: the operation is
//! queued instead.

use super::manager::{CreateOrderOutcome, OrdersManager, validate_request};
use crate::inventory::InventoryRepository;
use crate::matcher::{self, CartCandidate};
use crate::prescriptions::{PrescriptionRepository, PrescriptionUploader, validate_upload};
use crate::queue::{OfflineQueue, PendingPayload};
use crate::store::DocumentStore;
use crate::sync::ConnectivityMonitor;
use shared::error::AppResult;
use shared::models::{CartItem, DeliveryType, OrderRequest, Pharmacy, PrescriptionUpload};
use shared::util::{new_document_id, now_millis};
use std::sync::Arc;

/// Result of a submission that may have been deferred
#[derive(Debug, Clone)]
pub enum SubmitOutcome<T> {
    /// Written to the remote store
    Completed(T),
    /// Stored locally, will sync when connectivity returns
    SavedOffline { operation_id: String, key: String },
}

impl<T> SubmitOutcome<T> {
    pub fn is_saved_offline(&self) -> bool {
        matches!(self, SubmitOutcome::SavedOffline { .. })
    }
}

#[derive(Clone)]
pub struct Checkout {
    orders: OrdersManager,
    inventory: InventoryRepository,
    prescriptions: PrescriptionRepository,
    uploader: PrescriptionUploader,
    queue: OfflineQueue,
    connectivity: ConnectivityMonitor,
}

impl Checkout {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: OfflineQueue,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            orders: OrdersManager::new(store.clone()),
            inventory: InventoryRepository::new(store.clone()),
            prescriptions: PrescriptionRepository::new(store.clone()),
            uploader: PrescriptionUploader::new(store),
            queue,
            connectivity,
        }
    }

    /// Cart candidates for a prescription at a pharmacy
    pub async fn build_cart(
        &self,
        user_id: &str,
        prescription_id: &str,
        pharmacy_id: &str,
    ) -> AppResult<Vec<CartCandidate>> {
        let (prescribed, inventory) = tokio::join!(
            self.prescriptions.list_items(user_id, prescription_id),
            self.inventory.list_inventory(pharmacy_id)
        );
        let candidates = matcher::merge(&prescribed?, &inventory?);
        tracing::debug!(
            prescription_id = %prescription_id,
            pharmacy_id = %pharmacy_id,
            addable = candidates.iter().filter(|c| c.is_addable()).count(),
            total = candidates.len(),
            "Cart built"
        );
        Ok(candidates)
    }

    /// New checkout request with a fresh order id
    pub fn new_request(
        user_id: &str,
        pharmacy: &Pharmacy,
        items: Vec<CartItem>,
        delivery_type: DeliveryType,
    ) -> OrderRequest {
        OrderRequest {
            order_id: new_document_id(),
            user_id: user_id.to_string(),
            pharmacy_id: pharmacy.id.clone(),
            pharmacy_name: pharmacy.name.clone(),
            pharmacy_address: pharmacy.address.clone(),
            items,
            delivery_type,
            delivery_address: None,
            phone_number: None,
            notes: None,
            requested_at: now_millis(),
        }
    }

    /// Create the order now, or queue it when the store cannot be reached
    pub async fn submit_order(
        &self,
        request: OrderRequest,
    ) -> AppResult<SubmitOutcome<CreateOrderOutcome>> {
        validate_request(&request)?;

        if self.connectivity.is_online() {
            match self.orders.create_order(&request).await {
                Ok(outcome) => return Ok(SubmitOutcome::Completed(outcome)),
                Err(e) if e.is_transient() => {
                    tracing::warn!(order_id = %request.order_id, error = %e, "Order creation failed, saving offline");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let user_id = request.user_id.clone();
        self.defer(&user_id, PendingPayload::Order(request))
    }

    /// Upload a captured prescription now, or queue it
    pub async fn submit_prescription(
        &self,
        user_id: &str,
        upload: PrescriptionUpload,
    ) -> AppResult<SubmitOutcome<usize>> {
        validate_upload(user_id, &upload)?;

        if self.connectivity.is_online() {
            match self.uploader.upload(user_id, &upload).await {
                Ok(written) => return Ok(SubmitOutcome::Completed(written)),
                Err(e) if e.is_transient() => {
                    tracing::warn!(prescription_id = %upload.prescription_id, error = %e, "Prescription upload failed, saving offline");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.defer(user_id, PendingPayload::Prescription(upload))
    }

    /// Queue `payload` unless an operation for the same document is pending
    fn defer<T>(&self, user_id: &str, payload: PendingPayload) -> AppResult<SubmitOutcome<T>> {
        let key = payload.key().to_string();
        let operation = match self.queue.find(&key)? {
            Some(existing) => {
                tracing::debug!(key = %key, seq = existing.seq, "Already queued, not enqueueing again");
                existing
            }
            None => self.queue.enqueue(user_id, payload)?,
        };
        Ok(SubmitOutcome::SavedOffline {
            operation_id: operation.id,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, paths};
    use serde_json::json;
    use shared::error::ErrorCode;
    use shared::models::{PrescribedMedication, PrescriptionSource};

    async fn setup(online: bool) -> (Arc<MemoryStore>, OfflineQueue, ConnectivityMonitor, Checkout) {
        let store = Arc::new(MemoryStore::new());
        store
            .set("pharmacies/ph1", json!({ "nombre": "Farmacia Central", "direccion": "Av. Principal 100" }))
            .await
            .unwrap();
        store
            .set(
                &paths::inventory_item("ph1", "amox"),
                json!({ "medicamentoRef": "/medications/amox-500", "nombre": "amoxicillin  500 mg", "stock": 12, "precioUnidad": 300 }),
            )
            .await
            .unwrap();
        store
            .set(
                &paths::inventory_item("ph1", "ibu"),
                json!({ "nombre": "Ibuprofeno", "stock": 3, "precioUnidad": 500 }),
            )
            .await
            .unwrap();
        store
            .set(
                &paths::prescription_item("u1", "rx1", "m1"),
                json!({ "nombre": "Amoxicillin 500mg", "cantidad": 21, "dosisMg": 500, "frecuenciaHoras": 8 }),
            )
            .await
            .unwrap();
        store
            .set(
                &paths::prescription_item("u1", "rx1", "m2"),
                json!({ "medicamentoRef": "/inventory/ibu", "nombre": "Ibuprofen", "cantidad": 2 }),
            )
            .await
            .unwrap();

        let queue = OfflineQueue::open_in_memory().unwrap();
        let connectivity = ConnectivityMonitor::new(online);
        let checkout = Checkout::new(store.clone(), queue.clone(), connectivity.clone());
        (store, queue, connectivity, checkout)
    }

    fn pharmacy() -> Pharmacy {
        Pharmacy {
            id: "ph1".into(),
            name: "Farmacia Central".into(),
            address: "Av. Principal 100".into(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_build_cart_and_submit_online() {
        let (store, queue, _conn, checkout) = setup(true).await;

        let candidates = checkout.build_cart("u1", "rx1", "ph1").await.unwrap();
        assert_eq!(candidates.len(), 2);
        let cart = matcher::addable_items(&candidates);
        assert_eq!(cart.len(), 2);
        // Capped at stock
        assert_eq!(cart[0].quantity, 12);

        let request = Checkout::new_request("u1", &pharmacy(), cart, DeliveryType::StorePickup);
        let order_id = request.order_id.clone();
        let outcome = checkout.submit_order(request).await.unwrap();

        match outcome {
            SubmitOutcome::Completed(created) => {
                assert_eq!(created.order.total_amount, 12 * 300 + 2 * 500);
                assert_eq!(created.order.pharmacy_name, "Farmacia Central");
            }
            other => panic!("expected completed, got {other:?}"),
        }
        assert!(store.get(&paths::order("u1", &order_id)).await.unwrap().is_some());
        assert!(queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_not_deferred() {
        let (_store, queue, _conn, checkout) = setup(true).await;
        let item = CartItem {
            medication_id: "ibu".into(),
            medication_ref: String::new(),
            name: "Ibuprofeno".into(),
            quantity: 5,
            price_per_unit: 500,
            stock: 3,
            active_ingredient: None,
            presentation: None,
            manufacturer: None,
        };
        let request = Checkout::new_request("u1", &pharmacy(), vec![item], DeliveryType::StorePickup);

        let err = checkout.submit_order(request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("3 unidades disponibles"));
        assert!(queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_offline_submission_is_saved_locally_once() {
        let (store, queue, _conn, checkout) = setup(false).await;
        let cart = vec![CartItem {
            medication_id: "ibu".into(),
            medication_ref: String::new(),
            name: "Ibuprofeno".into(),
            quantity: 1,
            price_per_unit: 500,
            stock: 3,
            active_ingredient: None,
            presentation: None,
            manufacturer: None,
        }];
        let request = Checkout::new_request("u1", &pharmacy(), cart, DeliveryType::StorePickup);

        let first = checkout.submit_order(request.clone()).await.unwrap();
        let second = checkout.submit_order(request.clone()).await.unwrap();
        assert!(first.is_saved_offline());
        assert!(second.is_saved_offline());
        assert_eq!(queue.len().unwrap(), 1);
        assert!(
            store
                .get(&paths::order("u1", &request.order_id))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_store_outage_while_online_is_saved_locally() {
        let (store, queue, _conn, checkout) = setup(true).await;
        store.set_available(false);

        let upload = PrescriptionUpload {
            prescription_id: "rx-nfc".into(),
            source: PrescriptionSource::Nfc,
            issuer: None,
            issued_at: None,
            items: vec![PrescribedMedication {
                name: "Loratadina".into(),
                quantity: 10,
                ..Default::default()
            }],
            captured_at: now_millis(),
        };
        let outcome = checkout.submit_prescription("u1", upload).await.unwrap();
        assert!(outcome.is_saved_offline());
        assert!(queue.contains("rx-nfc").unwrap());
    }

    #[tokio::test]
    async fn test_validation_errors_surface_even_offline() {
        let (_store, queue, _conn, checkout) = setup(false).await;
        let request = Checkout::new_request("u1", &pharmacy(), vec![], DeliveryType::StorePickup);
        let err = checkout.submit_order(request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderEmpty);

        let request = Checkout::new_request("", &pharmacy(), vec![], DeliveryType::StorePickup);
        let err = checkout.submit_order(request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
        assert!(queue.is_empty().unwrap());
    }
}
