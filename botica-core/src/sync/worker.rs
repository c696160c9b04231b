//! SyncWorker: replays the offline queue against the remote store
//!
//! Triggers:
//! 1. connectivity transition offline → online
//! 2. periodic retry job (prescription entries honor linear backoff)
//! 3. manual `sync_now`
//!
//! A run is single-flight: a trigger arriving while a run is in progress is
//! coalesced into it. Entries are removed only after the remote write is
//! confirmed. Every failure leaves the entry queued: transient ones are
//! retried on the next trigger, refusals are flagged `needs_attention` for
//! the UI, and an expired session stops the run until the user signs in.

use super::connectivity::ConnectivityMonitor;
use crate::orders::OrdersManager;
use crate::prescriptions::PrescriptionUploader;
use crate::queue::{OfflineQueue, PendingOperation, PendingPayload, QueueError};
use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default periodic retry interval
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(900);
/// Default linear backoff step for prescription uploads
pub const DEFAULT_PRESCRIPTION_RETRY_BASE: Duration = Duration::from_secs(30);

/// What started a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Connectivity,
    Periodic,
    Manual,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncTrigger::Connectivity => "connectivity",
            SyncTrigger::Periodic => "periodic",
            SyncTrigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Confirmed and removed from the queue
    pub synced: usize,
    /// Refused by the store, still queued and flagged `needs_attention`
    pub needs_attention: usize,
    /// Attempted and failed transiently, still queued
    pub failed: usize,
    /// Skipped because their backoff has not elapsed
    pub deferred: usize,
    /// Another run was in progress; nothing was done
    pub coalesced: bool,
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Entries remain queued; the caller should reschedule
    #[error("Sync incomplete: {remaining} operations still queued")]
    Incomplete { remaining: u64, report: SyncReport },

    #[error("Offline: {remaining} operations queued")]
    Offline { remaining: u64 },

    /// Session expired mid-run; nothing after it was attempted
    #[error("Not authenticated: {remaining} operations still queued")]
    Unauthenticated { remaining: u64, report: SyncReport },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl SyncError {
    /// Every variant is worth retrying on the next trigger except local
    /// storage failures
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::Queue(_))
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Incomplete { remaining, .. } | SyncError::Offline { remaining } => {
                AppError::with_message(ErrorCode::SyncIncomplete, format!("{remaining} operations pending sync"))
                    .with_detail("remaining", remaining)
            }
            SyncError::Unauthenticated { remaining, .. } => AppError::not_authenticated()
                .with_detail("remaining", remaining),
            SyncError::Queue(e) => e.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

enum EntryOutcome {
    Synced,
    NeedsAttention,
    Failed,
    Deferred,
    Unauthenticated,
}

/// Why a replay did not go through
enum ReplayFailure {
    Transient(String),
    Refused(String),
    Unauthenticated(String),
}

impl ReplayFailure {
    fn classify(error: &dyn fmt::Display, unauthenticated: bool, transient: bool) -> Self {
        let message = error.to_string();
        if unauthenticated {
            ReplayFailure::Unauthenticated(message)
        } else if transient {
            ReplayFailure::Transient(message)
        } else {
            ReplayFailure::Refused(message)
        }
    }
}

/// Clears the in-flight flag when a run ends, including by panic
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct SyncWorker {
    orders: OrdersManager,
    uploader: PrescriptionUploader,
    queue: OfflineQueue,
    connectivity: ConnectivityMonitor,
    in_flight: Arc<AtomicBool>,
    retry_interval: Duration,
    prescription_retry_base: Duration,
}

impl SyncWorker {
    pub fn new(
        orders: OrdersManager,
        uploader: PrescriptionUploader,
        queue: OfflineQueue,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            orders,
            uploader,
            queue,
            connectivity,
            in_flight: Arc::new(AtomicBool::new(false)),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            prescription_retry_base: DEFAULT_PRESCRIPTION_RETRY_BASE,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_prescription_retry_base(mut self, base: Duration) -> Self {
        self.prescription_retry_base = base;
        self
    }

    /// Replay every queued operation once
    ///
    /// `Ok` only when the queue is empty afterwards (or the run was
    /// coalesced into one already in progress).
    pub async fn sync_now(&self, trigger: SyncTrigger) -> SyncResult<SyncReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(trigger = %trigger, "Sync already running, trigger coalesced");
            return Ok(SyncReport {
                coalesced: true,
                ..Default::default()
            });
        }
        let _guard = InFlightGuard(self.in_flight.as_ref());

        if !self.connectivity.is_online() {
            let remaining = self.queue.len()?;
            return if remaining == 0 {
                Ok(SyncReport::default())
            } else {
                Err(SyncError::Offline { remaining })
            };
        }

        let entries = self.queue.drain()?;
        if entries.is_empty() {
            return Ok(SyncReport::default());
        }
        tracing::info!(trigger = %trigger, entries = entries.len(), "Sync started");

        let mut report = SyncReport::default();
        let mut unauthenticated = false;
        for entry in &entries {
            match self.replay(entry, trigger).await? {
                EntryOutcome::Synced => report.synced += 1,
                EntryOutcome::NeedsAttention => report.needs_attention += 1,
                EntryOutcome::Failed => report.failed += 1,
                EntryOutcome::Deferred => report.deferred += 1,
                EntryOutcome::Unauthenticated => {
                    unauthenticated = true;
                    break;
                }
            }
        }

        let remaining = self.queue.len()?;
        tracing::info!(
            trigger = %trigger,
            synced = report.synced,
            needs_attention = report.needs_attention,
            failed = report.failed,
            deferred = report.deferred,
            remaining,
            "Sync finished"
        );

        if unauthenticated {
            Err(SyncError::Unauthenticated { remaining, report })
        } else if remaining == 0 {
            Ok(report)
        } else {
            Err(SyncError::Incomplete { remaining, report })
        }
    }

    async fn replay(&self, entry: &PendingOperation, trigger: SyncTrigger) -> SyncResult<EntryOutcome> {
        let result = match &entry.payload {
            PendingPayload::Order(request) => match self.orders.create_order(request).await {
                Ok(outcome) => {
                    if outcome.already_existed {
                        tracing::info!(order_id = %request.order_id, "Queued order already synced");
                    }
                    Ok(())
                }
                Err(e) => Err(ReplayFailure::classify(&e, e.is_unauthenticated(), e.is_transient())),
            },
            PendingPayload::Prescription(upload) => {
                if trigger == SyncTrigger::Periodic && !self.backoff_elapsed(entry) {
                    tracing::debug!(seq = entry.seq, attempts = entry.attempt_count, "Prescription upload backing off");
                    return Ok(EntryOutcome::Deferred);
                }
                match self.uploader.upload(&entry.user_id, upload).await {
                    Ok(_) => Ok(()),
                    Err(e) => Err(ReplayFailure::classify(&e, e.is_unauthenticated(), e.is_transient())),
                }
            }
        };

        match result {
            Ok(()) => {
                self.queue.remove(entry.seq)?;
                Ok(EntryOutcome::Synced)
            }
            Err(ReplayFailure::Transient(error)) => {
                tracing::warn!(
                    seq = entry.seq,
                    kind = entry.payload.kind(),
                    attempts = entry.attempt_count + 1,
                    error = %error,
                    "Replay failed, keeping entry queued"
                );
                self.queue.record_failure(entry.seq, &error, false)?;
                Ok(EntryOutcome::Failed)
            }
            Err(ReplayFailure::Refused(error)) => {
                tracing::error!(
                    seq = entry.seq,
                    kind = entry.payload.kind(),
                    key = %entry.payload.key(),
                    error = %error,
                    "Replay refused, entry kept for user attention"
                );
                self.queue.record_failure(entry.seq, &error, true)?;
                Ok(EntryOutcome::NeedsAttention)
            }
            Err(ReplayFailure::Unauthenticated(error)) => {
                tracing::warn!(
                    seq = entry.seq,
                    error = %error,
                    "Session expired, sync paused until sign-in"
                );
                self.queue.record_failure(entry.seq, &error, false)?;
                Ok(EntryOutcome::Unauthenticated)
            }
        }
    }

    /// Linear backoff: the n-th retry waits `n × base` after the last attempt
    fn backoff_elapsed(&self, entry: &PendingOperation) -> bool {
        let Some(last_attempt) = entry.last_attempt_at else {
            return true;
        };
        let wait_ms = self
            .prescription_retry_base
            .as_millis()
            .saturating_mul(u128::from(entry.attempt_count));
        let wait_ms = i64::try_from(wait_ms).unwrap_or(i64::MAX);
        now_millis().saturating_sub(last_attempt) >= wait_ms
    }

    async fn run_trigger(&self, trigger: SyncTrigger) {
        match self.sync_now(trigger).await {
            Ok(_) => {}
            Err(
                e @ (SyncError::Incomplete { .. }
                | SyncError::Offline { .. }
                | SyncError::Unauthenticated { .. }),
            ) => {
                tracing::info!(trigger = %trigger, "{e}, will retry on next trigger");
            }
            Err(e) => tracing::error!(trigger = %trigger, error = %e, "Sync failed"),
        }
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Syncs once at startup if online, then on every offline → online
    /// transition and on the periodic retry interval.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            retry_interval_secs = self.retry_interval.as_secs(),
            "SyncWorker started"
        );

        let mut online_rx = self.connectivity.subscribe();
        let mut was_online = *online_rx.borrow_and_update();
        if was_online {
            self.run_trigger(SyncTrigger::Connectivity).await;
        }

        let mut retry_interval = tokio::time::interval(self.retry_interval);
        retry_interval.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("SyncWorker shutting down");
                    break;
                }

                changed = online_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("Connectivity channel closed, SyncWorker stopping");
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if online && !was_online {
                        self.run_trigger(SyncTrigger::Connectivity).await;
                    }
                    was_online = online;
                }

                _ = retry_interval.tick() => {
                    if self.connectivity.is_online() {
                        self.run_trigger(SyncTrigger::Periodic).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore, paths};
    use serde_json::json;
    use shared::models::{
        CartItem, DeliveryType, OrderRequest, OrderStatus, PrescribedMedication, PrescriptionSource,
        PrescriptionUpload,
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        queue: OfflineQueue,
        connectivity: ConnectivityMonitor,
        worker: SyncWorker,
    }

    async fn fixture(stock: u32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                &paths::inventory_item("ph1", "ibu"),
                json!({ "nombre": "Ibuprofeno", "stock": stock, "precioUnidad": 500 }),
            )
            .await
            .unwrap();
        let queue = OfflineQueue::open_in_memory().unwrap();
        let connectivity = ConnectivityMonitor::new(true);
        let worker = SyncWorker::new(
            OrdersManager::new(store.clone()),
            PrescriptionUploader::new(store.clone()),
            queue.clone(),
            connectivity.clone(),
        );
        Fixture {
            store,
            queue,
            connectivity,
            worker,
        }
    }

    fn order(order_id: &str, quantity: u32) -> PendingPayload {
        PendingPayload::Order(OrderRequest {
            order_id: order_id.to_string(),
            user_id: "u1".into(),
            pharmacy_id: "ph1".into(),
            pharmacy_name: "Farmacia Central".into(),
            pharmacy_address: String::new(),
            items: vec![CartItem {
                medication_id: "ibu".into(),
                medication_ref: String::new(),
                name: "Ibuprofeno".into(),
                quantity,
                price_per_unit: 500,
                stock: 10,
                active_ingredient: None,
                presentation: None,
                manufacturer: None,
            }],
            delivery_type: DeliveryType::StorePickup,
            delivery_address: None,
            phone_number: None,
            notes: None,
            requested_at: 1,
        })
    }

    fn prescription(id: &str) -> PendingPayload {
        PendingPayload::Prescription(PrescriptionUpload {
            prescription_id: id.to_string(),
            source: PrescriptionSource::Nfc,
            issuer: None,
            issued_at: None,
            items: vec![PrescribedMedication {
                name: "Amoxicilina".into(),
                quantity: 21,
                ..Default::default()
            }],
            captured_at: 1,
        })
    }

    async fn stock(store: &MemoryStore) -> u64 {
        store
            .get(&paths::inventory_item("ph1", "ibu"))
            .await
            .unwrap()
            .unwrap()
            .data["stock"]
            .as_u64()
            .unwrap()
    }

    #[tokio::test]
    async fn test_entry_retried_until_confirmed() {
        let f = fixture(10).await;
        f.queue.enqueue("u1", order("o1", 2)).unwrap();
        f.store.set_available(false);

        for attempt in 1..=3u32 {
            let err = f.worker.sync_now(SyncTrigger::Connectivity).await.unwrap_err();
            assert!(matches!(err, SyncError::Incomplete { remaining: 1, .. }));
            assert!(err.is_retryable());
            assert_eq!(f.queue.drain().unwrap()[0].attempt_count, attempt);
        }

        f.store.set_available(true);
        let report = f.worker.sync_now(SyncTrigger::Connectivity).await.unwrap();
        assert_eq!(report.synced, 1);
        assert!(f.queue.is_empty().unwrap());

        let doc = f.store.get(&paths::order("u1", "o1")).await.unwrap().unwrap();
        assert_eq!(doc.data["status"], json!(OrderStatus::Pending));
        assert_eq!(stock(&f.store).await, 8);
    }

    #[tokio::test]
    async fn test_replay_after_lost_confirmation_reserves_once() {
        let f = fixture(10).await;
        f.queue.enqueue("u1", order("o1", 2)).unwrap();
        // Same order queued twice, as if removal after a successful write was lost
        f.queue.enqueue("u1", order("o1", 2)).unwrap();

        let report = f.worker.sync_now(SyncTrigger::Manual).await.unwrap();
        assert_eq!(report.synced, 2);
        assert_eq!(stock(&f.store).await, 8);
    }

    #[tokio::test]
    async fn test_refused_order_stays_queued_for_attention() {
        let f = fixture(1).await;
        f.queue.enqueue("u1", order("o1", 5)).unwrap();
        f.queue.enqueue("u1", order("o2", 1)).unwrap();

        let err = f.worker.sync_now(SyncTrigger::Manual).await.unwrap_err();
        let (remaining, report) = match err {
            SyncError::Incomplete { remaining, report } => (remaining, report),
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(remaining, 1);
        assert_eq!(report.needs_attention, 1);
        assert_eq!(report.synced, 1);

        let pending = f.queue.drain().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.key(), "o1");
        assert!(pending[0].needs_attention);
        assert!(
            pending[0]
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("1 unidades disponibles"))
        );
        assert!(f.queue.rejected().unwrap().is_empty());
        assert!(f.store.get(&paths::order("u1", "o1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_keeps_every_entry_queued() {
        let f = fixture(10).await;
        f.queue.enqueue("u1", order("o1", 1)).unwrap();
        f.queue.enqueue("u1", order("o2", 2)).unwrap();
        f.store.set_authenticated(false);

        let err = f.worker.sync_now(SyncTrigger::Connectivity).await.unwrap_err();
        assert!(err.is_retryable());
        let (remaining, report) = match err {
            SyncError::Unauthenticated { remaining, report } => (remaining, report),
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(remaining, 2);
        assert_eq!(report.synced, 0);
        assert_eq!(report.needs_attention, 0);

        // Run stopped at the first entry; nothing was discarded
        let pending = f.queue.drain().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].attempt_count, 1);
        assert!(!pending[0].needs_attention);
        assert_eq!(pending[1].attempt_count, 0);
        assert!(f.queue.rejected().unwrap().is_empty());

        let app: AppError = f
            .worker
            .sync_now(SyncTrigger::Manual)
            .await
            .unwrap_err()
            .into();
        assert_eq!(app.code, ErrorCode::NotAuthenticated);

        f.store.set_authenticated(true);
        let report = f.worker.sync_now(SyncTrigger::Manual).await.unwrap();
        assert_eq!(report.synced, 2);
        assert_eq!(stock(&f.store).await, 7);
    }

    #[tokio::test]
    async fn test_offline_does_not_attempt() {
        let f = fixture(10).await;
        f.queue.enqueue("u1", order("o1", 1)).unwrap();
        f.connectivity.set_online(false);

        let err = f.worker.sync_now(SyncTrigger::Manual).await.unwrap_err();
        assert!(matches!(err, SyncError::Offline { remaining: 1 }));
        assert_eq!(f.queue.drain().unwrap()[0].attempt_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_coalesced() {
        let f = fixture(10).await;
        f.queue.enqueue("u1", order("o1", 1)).unwrap();

        f.worker.in_flight.store(true, Ordering::Release);
        let report = f.worker.sync_now(SyncTrigger::Manual).await.unwrap();
        assert!(report.coalesced);
        assert_eq!(f.queue.len().unwrap(), 1);

        f.worker.in_flight.store(false, Ordering::Release);
        let report = f.worker.sync_now(SyncTrigger::Manual).await.unwrap();
        assert!(!report.coalesced);
        assert!(f.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_prescription_backoff_on_periodic_trigger() {
        let f = fixture(10).await;
        let worker = f.worker.clone().with_prescription_retry_base(Duration::from_secs(3600));
        let op = f.queue.enqueue("u1", prescription("rx1")).unwrap();
        f.queue.record_failure(op.seq, "offline", false).unwrap();

        let err = worker.sync_now(SyncTrigger::Periodic).await.unwrap_err();
        match err {
            SyncError::Incomplete { report, .. } => assert_eq!(report.deferred, 1),
            other => panic!("unexpected error: {other:?}"),
        }

        // Connectivity triggers ignore the backoff
        let report = worker.sync_now(SyncTrigger::Connectivity).await.unwrap();
        assert_eq!(report.synced, 1);
        assert!(
            f.store
                .get(&paths::prescription_item("u1", "rx1", "item-1"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_run_syncs_when_connectivity_returns() {
        let f = fixture(10).await;
        f.connectivity.set_online(false);
        f.queue.enqueue("u1", order("o1", 3)).unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(f.worker.clone().run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.queue.len().unwrap(), 1);

        f.connectivity.set_online(true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !f.queue.is_empty().unwrap() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(stock(&f.store).await, 7);

        shutdown.cancel();
        task.await.unwrap();
    }
}
