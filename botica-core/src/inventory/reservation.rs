//! Stock Reservation Engine
//!
//! # Consistency model
//!
//! Every item is adjusted in its own single-document transaction and the
//! items of one cart run concurrently. A cart is therefore NOT reserved
//! atomically: if a later item fails, the earlier ones stay decremented.
//! Callers treat a partial reservation as non-fatal and inspect the
//! returned [`ReservationReport`].
//!
//! Decrement is not idempotent. It must run at most once per order; order
//! creation guarantees this by claiming the order's `stock_reserved` flag
//! in a transaction before reserving.
//!
//! ```text
//! reserve(items)
//!   ├─ item A: get → max(0, stock - qty) → compare_and_set ─┐
//!   ├─ item B: get → max(0, stock - qty) → compare_and_set ─┼─► ReservationReport
//!   └─ item C: ...                                          ─┘
//! ```

use crate::store::{DocumentStore, StoreError, paths, run_transaction};
use futures::future::join_all;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::CartItem;
use std::sync::Arc;
use thiserror::Error;

/// Reservation errors
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("Stock insuficiente para {name}: {available} unidades disponibles")]
    InsufficientStock {
        item_id: String,
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("Inventory item not found: {0}")]
    ItemNotFound(String),

    #[error("Malformed inventory record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReservationError {
    pub fn is_transient(&self) -> bool {
        match self {
            ReservationError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::InsufficientStock {
                name, available, ..
            } => AppError::insufficient_stock(name, available),
            ReservationError::ItemNotFound(id) => {
                AppError::new(ErrorCode::InventoryItemNotFound).with_detail("item_id", id)
            }
            ReservationError::MalformedRecord(path) => {
                AppError::internal(format!("Malformed inventory record: {path}"))
            }
            ReservationError::Store(e) => e.into(),
        }
    }
}

pub type ReservationResult<T> = Result<T, ReservationError>;

/// Stock observed for one requested item during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub item_id: String,
    pub requested: u32,
    pub available: u32,
}

/// Successful validation of a whole cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockValidation {
    pub levels: Vec<StockLevel>,
}

/// Stock change applied to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub item_id: String,
    pub name: String,
    pub requested: u32,
    pub before: u32,
    pub after: u32,
}

impl StockAdjustment {
    /// Decrement that hit the zero floor
    pub fn is_short(&self) -> bool {
        self.after == 0 && self.before < self.requested
    }
}

/// Item whose adjustment could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item_id: String,
    pub name: String,
    pub error: String,
    pub transient: bool,
}

/// Per-item outcome of a reserve / release
///
/// The order (or cancellation) has already been recorded when this is
/// produced; failures here mean inventory is out of sync with it.
///
/// Each item is one [`run_transaction`] of at most
/// [`MAX_TRANSACTION_ATTEMPTS`](crate::store::MAX_TRANSACTION_ATTEMPTS)
/// attempts. An item whose inventory record stays contended for all of
/// them is listed in `failed` with `transient: true` and its stock is left
/// untouched, so until someone reconciles it the pharmacy can sell those
/// units again. Callers must check [`is_complete`](Self::is_complete).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationReport {
    pub applied: Vec<StockAdjustment>,
    pub failed: Vec<ItemFailure>,
}

impl ReservationReport {
    /// Every item was adjusted by its full quantity
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.applied.iter().any(StockAdjustment::is_short)
    }

    /// Human-readable description of every inconsistency
    pub fn warnings(&self) -> Vec<String> {
        let short = self.applied.iter().filter(|a| a.is_short()).map(|a| {
            format!(
                "{}: requested {} but only {} were in stock",
                a.name, a.requested, a.before
            )
        });
        let failed = self
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.name, f.error));
        short.chain(failed).collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Decrement,
    Increment,
}

/// Validates and mutates pharmacy stock through the store's per-document
/// transaction
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn DocumentStore>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Check that every item has enough stock right now
    ///
    /// Reads run concurrently; the result is evaluated in cart order so the
    /// error always names the first short item. A missing inventory record
    /// counts as zero stock. Read-only.
    pub async fn validate_stock(
        &self,
        pharmacy_id: &str,
        items: &[CartItem],
    ) -> ReservationResult<StockValidation> {
        let reads = items.iter().map(|item| self.read_stock(pharmacy_id, &item.medication_id));
        let stocks = join_all(reads).await;

        let mut levels = Vec::with_capacity(items.len());
        for (item, stock) in items.iter().zip(stocks) {
            let available = stock?.unwrap_or(0);
            if item.quantity > available {
                tracing::info!(
                    pharmacy_id = %pharmacy_id,
                    item_id = %item.medication_id,
                    requested = item.quantity,
                    available,
                    "Stock validation failed"
                );
                return Err(ReservationError::InsufficientStock {
                    item_id: item.medication_id.clone(),
                    name: item.name.clone(),
                    requested: item.quantity,
                    available,
                });
            }
            levels.push(StockLevel {
                item_id: item.medication_id.clone(),
                requested: item.quantity,
                available,
            });
        }

        Ok(StockValidation { levels })
    }

    /// Decrement stock for every item, floored at zero
    pub async fn reserve(&self, pharmacy_id: &str, items: &[CartItem]) -> ReservationReport {
        self.adjust_all(pharmacy_id, items, Direction::Decrement).await
    }

    /// Restore stock for every item
    pub async fn release(&self, pharmacy_id: &str, items: &[CartItem]) -> ReservationReport {
        self.adjust_all(pharmacy_id, items, Direction::Increment).await
    }

    async fn read_stock(&self, pharmacy_id: &str, item_id: &str) -> ReservationResult<Option<u32>> {
        let path = paths::inventory_item(pharmacy_id, item_id);
        match self.store.get(&path).await? {
            Some(doc) => Ok(Some(stock_of(&doc.data, &path)?)),
            None => Ok(None),
        }
    }

    async fn adjust_all(
        &self,
        pharmacy_id: &str,
        items: &[CartItem],
        direction: Direction,
    ) -> ReservationReport {
        let adjustments = items
            .iter()
            .map(|item| self.adjust_one(pharmacy_id, item, direction));
        let results = join_all(adjustments).await;

        let mut report = ReservationReport::default();
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(adjustment) => {
                    if adjustment.is_short() {
                        tracing::warn!(
                            pharmacy_id = %pharmacy_id,
                            item_id = %adjustment.item_id,
                            requested = adjustment.requested,
                            available = adjustment.before,
                            "Partial reservation, stock floored at zero"
                        );
                    }
                    report.applied.push(adjustment);
                }
                Err(e) => {
                    tracing::warn!(
                        pharmacy_id = %pharmacy_id,
                        item_id = %item.medication_id,
                        direction = ?direction,
                        error = %e,
                        "Stock adjustment failed"
                    );
                    report.failed.push(ItemFailure {
                        item_id: item.medication_id.clone(),
                        name: item.name.clone(),
                        transient: e.is_transient(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            pharmacy_id = %pharmacy_id,
            direction = ?direction,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "Stock adjustment finished"
        );
        report
    }

    async fn adjust_one(
        &self,
        pharmacy_id: &str,
        item: &CartItem,
        direction: Direction,
    ) -> ReservationResult<StockAdjustment> {
        let path = paths::inventory_item(pharmacy_id, &item.medication_id);
        let quantity = item.quantity;

        let (before, after) = run_transaction(self.store.as_ref(), &path, |doc| {
            let doc = doc.ok_or_else(|| StoreError::NotFound(path.clone()))?;
            let mut data = doc.data.clone();
            let fields = data
                .as_object_mut()
                .ok_or_else(|| StoreError::Rejected(format!("malformed inventory record {path}")))?;
            let before = fields
                .get("stock")
                .and_then(Value::as_u64)
                .map_or(0, |s| u32::try_from(s).unwrap_or(u32::MAX));
            let after = match direction {
                Direction::Decrement => before.saturating_sub(quantity),
                Direction::Increment => before.saturating_add(quantity),
            };
            fields.insert("stock".to_string(), Value::from(after));
            Ok((data, (before, after)))
        })
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ReservationError::ItemNotFound(item.medication_id.clone()),
            other => ReservationError::Store(other),
        })?;

        Ok(StockAdjustment {
            item_id: item.medication_id.clone(),
            name: item.name.clone(),
            requested: quantity,
            before,
            after,
        })
    }
}

/// Read the `stock` field of an inventory record
fn stock_of(data: &Value, path: &str) -> ReservationResult<u32> {
    match data.get("stock") {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .map(|s| u32::try_from(s).unwrap_or(u32::MAX))
            .ok_or_else(|| ReservationError::MalformedRecord(path.to_string())),
    }
}
