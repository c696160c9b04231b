//! Core: configuration, background tasks and component wiring
//!
//! - [`Config`] - environment configuration
//! - [`BackgroundTasks`] - panic-catching task registry with graceful shutdown
//! - [`Botica`] - builds every component around one document store handle

pub mod config;
pub mod tasks;

pub use config::Config;
pub use tasks::{BackgroundTasks, TaskKind};

use crate::inventory::{InventoryRepository, ReservationEngine};
use crate::orders::{Checkout, OrdersManager};
use crate::prescriptions::{PrescriptionRepository, PrescriptionUploader};
use crate::queue::OfflineQueue;
use crate::store::{DocumentStore, HttpStore};
use crate::sync::{ConnectivityMonitor, SyncWorker};
use anyhow::Context;
use std::sync::Arc;

/// Wired set of components sharing one store, queue and connectivity state
///
/// | Field | Role |
/// |-------|------|
/// | store | remote document store handle |
/// | queue | redb offline queue under `WORK_DIR` |
/// | connectivity | reachability watch channel |
/// | orders | order lifecycle manager |
/// | checkout | UI entry point (cart, online-or-queued submission) |
/// | sync | offline queue replay worker |
///
/// ```ignore
/// let config = Config::from_env();
/// let botica = Botica::connect(&config)?;
/// let tasks = botica.start();
/// // platform callback
/// botica.connectivity().set_online(false);
/// tasks.shutdown().await;
/// ```
#[derive(Clone)]
pub struct Botica {
    config: Config,
    store: Arc<dyn DocumentStore>,
    queue: OfflineQueue,
    connectivity: ConnectivityMonitor,
    inventory: InventoryRepository,
    reservations: ReservationEngine,
    prescriptions: PrescriptionRepository,
    orders: OrdersManager,
    checkout: Checkout,
    sync: SyncWorker,
}

impl Botica {
    /// Build every component around `store`
    ///
    /// Creates `WORK_DIR` and opens (or creates) the offline queue. The
    /// connectivity state starts online; the first failed remote write
    /// still lands in the queue.
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .with_context(|| format!("Failed to create work directory {}", config.work_dir))?;

        let queue_path = config.queue_db_path();
        let queue = OfflineQueue::open(&queue_path)
            .with_context(|| format!("Failed to open offline queue at {}", queue_path.display()))?;
        let pending = queue.len().context("Failed to read offline queue")?;

        let connectivity = ConnectivityMonitor::new(true);
        let orders = OrdersManager::new(store.clone());
        let checkout = Checkout::new(store.clone(), queue.clone(), connectivity.clone());
        let sync = SyncWorker::new(
            orders.clone(),
            PrescriptionUploader::new(store.clone()),
            queue.clone(),
            connectivity.clone(),
        )
        .with_retry_interval(config.sync_retry_interval())
        .with_prescription_retry_base(config.prescription_retry_base());

        tracing::info!(
            work_dir = %config.work_dir,
            queue = %queue_path.display(),
            pending,
            "Botica core initialized"
        );

        Ok(Self {
            config: config.clone(),
            inventory: InventoryRepository::new(store.clone()),
            reservations: ReservationEngine::new(store.clone()),
            prescriptions: PrescriptionRepository::new(store.clone()),
            store,
            queue,
            connectivity,
            orders,
            checkout,
            sync,
        })
    }

    /// Build against the REST store at `STORE_URL`
    pub fn connect(config: &Config) -> anyhow::Result<Self> {
        let store = HttpStore::new(&config.store_url, config.store_timeout())
            .with_context(|| format!("Failed to create store client for {}", config.store_url))?;
        Self::new(config, Arc::new(store))
    }

    /// Spawn the sync worker and, when configured, the connectivity probe
    pub fn start(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        tasks.spawn(
            "sync_worker",
            TaskKind::Worker,
            self.sync.clone().run(tasks.shutdown_token()),
        );

        if let Some(url) = &self.config.connectivity_probe_url {
            tasks.spawn(
                "connectivity_probe",
                TaskKind::Probe,
                self.connectivity.clone().run_probe(
                    url.clone(),
                    self.config.connectivity_probe_interval(),
                    self.config.store_timeout(),
                    tasks.shutdown_token(),
                ),
            );
        }

        tracing::info!(tasks = tasks.len(), "Background tasks started");
        tasks
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn inventory(&self) -> &InventoryRepository {
        &self.inventory
    }

    pub fn reservations(&self) -> &ReservationEngine {
        &self.reservations
    }

    pub fn prescriptions(&self) -> &PrescriptionRepository {
        &self.prescriptions
    }

    pub fn orders(&self) -> &OrdersManager {
        &self.orders
    }

    pub fn checkout(&self) -> &Checkout {
        &self.checkout
    }

    pub fn sync_worker(&self) -> &SyncWorker {
        &self.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::SubmitOutcome;
    use crate::store::{MemoryStore, paths};
    use serde_json::json;
    use shared::models::{CartItem, DeliveryType, Pharmacy};
    use std::time::Duration;

    fn config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::with_work_dir(dir.path().join("data").to_string_lossy());
        config.connectivity_probe_url = None;
        config.sync_retry_interval_secs = 3600;
        config
    }

    fn request(pharmacy: &Pharmacy) -> shared::models::OrderRequest {
        let items = vec![CartItem {
            medication_id: "ibu".into(),
            medication_ref: String::new(),
            name: "Ibuprofeno".into(),
            quantity: 2,
            price_per_unit: 500,
            stock: 10,
            active_ingredient: None,
            presentation: None,
            manufacturer: None,
        }];
        Checkout::new_request("u1", pharmacy, items, DeliveryType::StorePickup)
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .set("pharmacies/ph1", json!({ "nombre": "Farmacia Central", "direccion": "Av. Principal 100" }))
            .await
            .unwrap();
        store
            .set(
                &paths::inventory_item("ph1", "ibu"),
                json!({ "nombre": "Ibuprofeno", "stock": 10, "precioUnidad": 500 }),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_offline_order_syncs_when_connectivity_returns() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store().await;
        let botica = Botica::new(&config(&dir), store.clone()).unwrap();
        assert!(botica.config().queue_db_path().starts_with(dir.path()));

        botica.connectivity().set_online(false);
        let tasks = botica.start();
        assert_eq!(tasks.len(), 1);

        let pharmacy = botica.inventory().get_pharmacy("ph1").await.unwrap();
        let request = request(&pharmacy);
        let order_id = request.order_id.clone();
        let outcome = botica.checkout().submit_order(request).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::SavedOffline { .. }));
        assert_eq!(botica.queue().len().unwrap(), 1);

        botica.connectivity().set_online(true);
        let synced = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if botica.queue().is_empty().unwrap() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(synced.is_ok(), "queue was not drained");

        let order = botica.orders().get_order("u1", &order_id).await.unwrap();
        assert_eq!(order.pharmacy_name, "Farmacia Central");
        let stock = botica.inventory().get_item("ph1", "ibu").await.unwrap().unwrap().stock;
        assert_eq!(stock, 8);

        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store().await;
        let pharmacy = Pharmacy {
            id: "ph1".into(),
            name: "Farmacia Central".into(),
            address: "Av. Principal 100".into(),
            phone: None,
        };

        {
            let botica = Botica::new(&config(&dir), store.clone()).unwrap();
            botica.connectivity().set_online(false);
            let outcome = botica.checkout().submit_order(request(&pharmacy)).await.unwrap();
            assert!(outcome.is_saved_offline());
        }

        let botica = Botica::new(&config(&dir), store).unwrap();
        assert_eq!(botica.queue().len().unwrap(), 1);
        let report = botica
            .sync_worker()
            .sync_now(crate::sync::SyncTrigger::Manual)
            .await
            .unwrap();
        assert_eq!(report.synced, 1);
    }
}
