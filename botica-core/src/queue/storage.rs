//! redb-backed offline queue
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `pending_ops` | `seq` | `PendingOperation` | Operations awaiting upload (FIFO) |
//! | `rejected_ops` | `operation id` | `RejectedOperation` | Entries discarded by the user |
//! | `queue_meta` | `"seq"` | `u64` | Insertion counter |
//!
//! # Durability
//!
//! redb commits are persistent once `commit()` returns, so an entry
//! acknowledged by [`OfflineQueue::enqueue`] survives process restarts and
//! power loss.

use super::{PendingOperation, PendingPayload, RejectedOperation};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::error::{AppError, ErrorCode};
use shared::util::{new_document_id, now_millis};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Pending operations: key = insertion sequence, value = JSON-serialized PendingOperation
const PENDING_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("pending_ops");

/// Discarded operations: key = operation id, value = JSON-serialized RejectedOperation
const REJECTED_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("rejected_ops");

/// Queue metadata: key = "seq", value = last assigned sequence
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("queue_meta");

const SEQUENCE_KEY: &str = "seq";

/// Queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::with_message(ErrorCode::QueueStorageError, err.to_string())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Local durable queue of deferred remote writes
#[derive(Clone)]
pub struct OfflineQueue {
    db: Arc<Database>,
}

impl OfflineQueue {
    /// Open or create the queue database at the given path
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory queue (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> QueueResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> QueueResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PENDING_TABLE)?;
            let _ = write_txn.open_table(REJECTED_TABLE)?;
            let mut meta = write_txn.open_table(META_TABLE)?;
            if meta.get(SEQUENCE_KEY)?.is_none() {
                meta.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn next_sequence(txn: &WriteTransaction) -> QueueResult<u64> {
        let mut table = txn.open_table(META_TABLE)?;
        let current = table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    // ========== Pending ==========

    /// Append an operation at the tail of the queue
    ///
    /// No dedupe by payload identity; check [`contains`](Self::contains)
    /// first when re-enqueueing is possible.
    pub fn enqueue(&self, user_id: &str, payload: PendingPayload) -> QueueResult<PendingOperation> {
        let txn = self.db.begin_write()?;
        let operation = {
            let seq = Self::next_sequence(&txn)?;
            let operation = PendingOperation {
                seq,
                id: new_document_id(),
                user_id: user_id.to_string(),
                payload,
                created_at: now_millis(),
                attempt_count: 0,
                last_error: None,
                last_attempt_at: None,
                needs_attention: false,
            };
            let mut table = txn.open_table(PENDING_TABLE)?;
            let value = serde_json::to_vec(&operation)?;
            table.insert(seq, value.as_slice())?;
            operation
        };
        txn.commit()?;

        tracing::info!(
            seq = operation.seq,
            kind = operation.payload.kind(),
            key = %operation.payload.key(),
            "Operation queued for sync"
        );
        Ok(operation)
    }

    /// Snapshot of every pending operation in insertion order
    ///
    /// Entries stay queued until explicitly removed.
    pub fn drain(&self) -> QueueResult<Vec<PendingOperation>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let mut operation: PendingOperation = serde_json::from_slice(value.value())?;
            operation.seq = key.value();
            entries.push(operation);
        }
        Ok(entries)
    }

    /// Remove a confirmed entry. Returns `false` if it was already gone.
    pub fn remove(&self, seq: u64) -> QueueResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(PENDING_TABLE)?;
            table.remove(seq)?.is_some()
        };
        txn.commit()?;
        tracing::debug!(seq, removed, "Queue entry removed");
        Ok(removed)
    }

    /// Remove every pending entry, returning how many were dropped
    pub fn clear(&self) -> QueueResult<usize> {
        let txn = self.db.begin_write()?;
        let count = {
            let mut table = txn.open_table(PENDING_TABLE)?;
            let mut keys = Vec::new();
            for result in table.iter()? {
                let (key, _) = result?;
                keys.push(key.value());
            }
            for key in &keys {
                table.remove(*key)?;
            }
            keys.len()
        };
        txn.commit()?;
        tracing::info!(count, "Offline queue cleared");
        Ok(count)
    }

    /// Record a failed replay attempt
    ///
    /// The entry stays queued either way. `needs_attention` marks a refusal
    /// that retrying alone will not fix; a later transient failure clears it.
    /// Returns the updated entry, or `None` if it is no longer queued.
    pub fn record_failure(
        &self,
        seq: u64,
        error: &str,
        needs_attention: bool,
    ) -> QueueResult<Option<PendingOperation>> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(PENDING_TABLE)?;

            let existing = match table.get(seq)? {
                Some(value) => Some(serde_json::from_slice::<PendingOperation>(value.value())?),
                None => None,
            };

            match existing {
                Some(mut operation) => {
                    operation.seq = seq;
                    operation.attempt_count += 1;
                    operation.last_error = Some(error.to_string());
                    operation.last_attempt_at = Some(now_millis());
                    operation.needs_attention = needs_attention;
                    let value = serde_json::to_vec(&operation)?;
                    table.insert(seq, value.as_slice())?;
                    Some(operation)
                }
                None => None,
            }
        };
        txn.commit()?;
        Ok(updated)
    }

    /// Oldest pending operation targeting the remote document `key`
    pub fn find(&self, key: &str) -> QueueResult<Option<PendingOperation>> {
        Ok(self.drain()?.into_iter().find(|op| op.payload.key() == key))
    }

    /// Whether an operation for the same remote document is pending
    pub fn contains(&self, key: &str) -> QueueResult<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Pending entries whose last replay was refused, oldest first
    pub fn needing_attention(&self) -> QueueResult<Vec<PendingOperation>> {
        Ok(self
            .drain()?
            .into_iter()
            .filter(|op| op.needs_attention)
            .collect())
    }

    /// Number of pending entries
    pub fn len(&self) -> QueueResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    // ========== Rejected (discarded by the user) ==========

    /// Move a pending entry to the rejected table
    ///
    /// Only called when the user gives up on an entry; the sync worker never
    /// drops unconfirmed writes. Returns `false` if the entry was not pending.
    pub fn reject(&self, seq: u64, reason: &str) -> QueueResult<bool> {
        let txn = self.db.begin_write()?;
        let moved = {
            let mut pending_table = txn.open_table(PENDING_TABLE)?;
            let mut rejected_table = txn.open_table(REJECTED_TABLE)?;

            let existing = match pending_table.get(seq)? {
                Some(value) => Some(serde_json::from_slice::<PendingOperation>(value.value())?),
                None => None,
            };

            match existing {
                Some(mut operation) => {
                    operation.seq = seq;
                    let rejected = RejectedOperation {
                        rejected_at: now_millis(),
                        reason: reason.to_string(),
                        operation,
                    };
                    let value = serde_json::to_vec(&rejected)?;
                    rejected_table.insert(rejected.operation.id.as_str(), value.as_slice())?;
                    pending_table.remove(seq)?;
                    true
                }
                None => false,
            }
        };
        txn.commit()?;

        if moved {
            tracing::warn!(seq, reason = %reason, "Queue entry discarded");
        }
        Ok(moved)
    }

    /// Every rejected entry, oldest first
    pub fn rejected(&self) -> QueueResult<Vec<RejectedOperation>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REJECTED_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let entry: RejectedOperation = serde_json::from_slice(value.value())?;
            entries.push(entry);
        }
        entries.sort_by_key(|entry| entry.operation.seq);
        Ok(entries)
    }

    /// Drop a rejected entry after the user has acknowledged it
    pub fn remove_rejected(&self, id: &str) -> QueueResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(REJECTED_TABLE)?;
            table.remove(id)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{DeliveryType, OrderRequest, PrescriptionSource, PrescriptionUpload};

    fn order_payload(order_id: &str) -> PendingPayload {
        PendingPayload::Order(OrderRequest {
            order_id: order_id.to_string(),
            user_id: "u1".into(),
            pharmacy_id: "ph1".into(),
            pharmacy_name: "Farmacia Central".into(),
            pharmacy_address: String::new(),
            items: vec![],
            delivery_type: DeliveryType::StorePickup,
            delivery_address: None,
            phone_number: None,
            notes: None,
            requested_at: 1,
        })
    }

    fn prescription_payload(id: &str) -> PendingPayload {
        PendingPayload::Prescription(PrescriptionUpload {
            prescription_id: id.to_string(),
            source: PrescriptionSource::Nfc,
            issuer: None,
            issued_at: None,
            items: vec![],
            captured_at: 1,
        })
    }

    #[test]
    fn test_fifo_order() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        assert!(queue.is_empty().unwrap());

        queue.enqueue("u1", order_payload("o1")).unwrap();
        queue.enqueue("u1", prescription_payload("rx1")).unwrap();
        queue.enqueue("u2", order_payload("o2")).unwrap();

        let entries = queue.drain().unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.payload.key()).collect();
        assert_eq!(keys, vec!["o1", "rx1", "o2"]);
        assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
        assert_eq!(queue.len().unwrap(), 3);
    }

    #[test]
    fn test_drain_does_not_remove() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        queue.enqueue("u1", order_payload("o1")).unwrap();

        assert_eq!(queue.drain().unwrap().len(), 1);
        assert_eq!(queue.drain().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        let first = queue.enqueue("u1", order_payload("o1")).unwrap();
        queue.enqueue("u1", order_payload("o2")).unwrap();
        queue.enqueue("u1", order_payload("o3")).unwrap();

        assert!(queue.remove(first.seq).unwrap());
        assert!(!queue.remove(first.seq).unwrap());
        assert_eq!(queue.len().unwrap(), 2);

        assert_eq!(queue.clear().unwrap(), 2);
        assert!(queue.is_empty().unwrap());

        // Sequence keeps growing after clear
        let next = queue.enqueue("u1", order_payload("o4")).unwrap();
        assert!(next.seq > first.seq + 2);
    }

    #[test]
    fn test_clear_after_reopen_counts_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.redb");
        {
            let queue = OfflineQueue::open(&path).unwrap();
            for i in 0..40 {
                queue.enqueue("u1", order_payload(&format!("o{i}"))).unwrap();
            }
        }

        let queue = OfflineQueue::open(&path).unwrap();
        assert_eq!(queue.clear().unwrap(), 40);
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.clear().unwrap(), 0);
    }

    #[test]
    fn test_no_dedupe_at_enqueue() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        assert!(!queue.contains("o1").unwrap());
        queue.enqueue("u1", order_payload("o1")).unwrap();
        queue.enqueue("u1", order_payload("o1")).unwrap();
        assert!(queue.contains("o1").unwrap());
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn test_record_failure() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        let op = queue.enqueue("u1", prescription_payload("rx1")).unwrap();

        queue.record_failure(op.seq, "timeout", false).unwrap();
        let updated = queue.record_failure(op.seq, "offline", false).unwrap().unwrap();
        assert_eq!(updated.attempt_count, 2);
        assert_eq!(updated.last_error.as_deref(), Some("offline"));
        assert!(updated.last_attempt_at.is_some());
        assert!(!updated.needs_attention);

        let entries = queue.drain().unwrap();
        assert_eq!(entries[0].attempt_count, 2);

        assert!(queue.record_failure(999, "x", false).unwrap().is_none());
    }

    #[test]
    fn test_refused_entry_stays_queued_with_attention_flag() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        queue.enqueue("u1", order_payload("o1")).unwrap();
        let op = queue.enqueue("u1", order_payload("o2")).unwrap();

        queue
            .record_failure(op.seq, "Stock insuficiente para Ibuprofeno", true)
            .unwrap();
        assert_eq!(queue.len().unwrap(), 2);
        assert!(queue.rejected().unwrap().is_empty());

        let flagged = queue.needing_attention().unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].payload.key(), "o2");

        // A later transient failure clears the flag
        queue.record_failure(op.seq, "offline", false).unwrap();
        assert!(queue.needing_attention().unwrap().is_empty());
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn test_reject_moves_to_discarded() {
        let queue = OfflineQueue::open_in_memory().unwrap();
        let op = queue.enqueue("u1", order_payload("o1")).unwrap();
        queue.record_failure(op.seq, "offline", false).unwrap();

        assert!(queue.reject(op.seq, "Stock insuficiente").unwrap());
        assert!(!queue.reject(op.seq, "again").unwrap());
        assert!(queue.is_empty().unwrap());

        let rejected = queue.rejected().unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].operation.id, op.id);
        assert_eq!(rejected[0].operation.attempt_count, 1);
        assert_eq!(rejected[0].reason, "Stock insuficiente");

        assert!(queue.remove_rejected(&op.id).unwrap());
        assert!(queue.rejected().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.redb");

        let seq = {
            let queue = OfflineQueue::open(&path).unwrap();
            queue.enqueue("u1", order_payload("o1")).unwrap();
            let op = queue.enqueue("u1", prescription_payload("rx1")).unwrap();
            queue.record_failure(op.seq, "offline", true).unwrap();
            op.seq
        };

        let queue = OfflineQueue::open(&path).unwrap();
        let entries = queue.drain().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].seq, seq);
        assert_eq!(entries[1].attempt_count, 1);
        assert!(entries[1].needs_attention);

        let next = queue.enqueue("u1", order_payload("o2")).unwrap();
        assert!(next.seq > seq);
    }
}
