//! Order Lifecycle Manager
//!
//! Owns the order state machine (see [`OrderStatus::can_transition_to`])
//! and drives the reservation engine on create and cancel.
//!
//! The order document is the source of truth. Once it has been written
//! (or its status changed to CANCELLED), inventory adjustment is a
//! best-effort side effect: failures are logged and returned in the
//! outcome's [`ReservationReport`], never rolled back.

use super::error::{OrderError, OrderResult};
use crate::inventory::{ReservationEngine, ReservationReport};
use crate::store::{DocumentStore, StoreError, paths, run_transaction};
use shared::models::{DeliveryType, Order, OrderRequest, OrderStatus};
use shared::util::now_millis;
use std::sync::Arc;

/// Result of [`OrdersManager::create_order`]
#[derive(Debug, Clone)]
pub struct CreateOrderOutcome {
    pub order: Order,
    /// Stock decrement per item; empty when another call had already
    /// claimed the reservation
    pub reservation: ReservationReport,
    /// The order document was already present (replayed submission). Stock
    /// is still reserved here if the earlier attempt never got to it.
    pub already_existed: bool,
}

impl CreateOrderOutcome {
    /// Order recorded but inventory may not reflect it
    pub fn inventory_uncertain(&self) -> bool {
        !self.reservation.is_complete()
    }
}

/// Result of [`OrdersManager::cancel_order`]
#[derive(Debug, Clone)]
pub struct CancelOrderOutcome {
    pub order: Order,
    pub release: ReservationReport,
}

impl CancelOrderOutcome {
    pub fn inventory_uncertain(&self) -> bool {
        !self.release.is_complete()
    }
}

/// Checks that need no remote access
pub(crate) fn validate_request(request: &OrderRequest) -> OrderResult<()> {
    if request.user_id.trim().is_empty() {
        return Err(OrderError::Unauthenticated);
    }
    if !paths::is_valid_id(&request.order_id) {
        return Err(OrderError::InvalidRequest(format!(
            "invalid order id {:?}",
            request.order_id
        )));
    }
    if !paths::is_valid_id(&request.pharmacy_id) {
        return Err(OrderError::InvalidRequest(format!(
            "invalid pharmacy id {:?}",
            request.pharmacy_id
        )));
    }
    if request.items.is_empty() {
        return Err(OrderError::EmptyCart);
    }
    for item in &request.items {
        if !paths::is_valid_id(&item.medication_id) {
            return Err(OrderError::InvalidRequest(format!(
                "invalid inventory item id {:?}",
                item.medication_id
            )));
        }
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity(item.name.clone()));
        }
    }
    if request.delivery_type == DeliveryType::HomeDelivery
        && request
            .delivery_address
            .as_deref()
            .is_none_or(|address| address.trim().is_empty())
    {
        return Err(OrderError::DeliveryAddressRequired);
    }
    Ok(())
}

/// Order lifecycle over the remote document store
#[derive(Clone)]
pub struct OrdersManager {
    store: Arc<dyn DocumentStore>,
    reservations: ReservationEngine,
}

impl OrdersManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            reservations: ReservationEngine::new(store.clone()),
            store,
        }
    }

    /// Validate stock, persist the PENDING order, then reserve stock
    ///
    /// Idempotent per order id: if `users/{uid}/orders/{id}` already exists
    /// the stored order is returned and stock is reserved only if no earlier
    /// attempt claimed it (see [`Order::stock_reserved`]).
    pub async fn create_order(&self, request: &OrderRequest) -> OrderResult<CreateOrderOutcome> {
        validate_request(request)?;
        let path = paths::order(&request.user_id, &request.order_id);

        if let Some(existing) = self.load(&path).await? {
            tracing::info!(order_id = %request.order_id, "Order already exists, skipping creation");
            return self.finish_existing(&path, existing).await;
        }

        // 1. Validate
        self.reservations
            .validate_stock(&request.pharmacy_id, &request.items)
            .await?;

        // 2. Persist
        let order = Order::from_request(request, now_millis());
        let data = serde_json::to_value(&order).map_err(StoreError::from)?;
        match self.store.compare_and_set(&path, 0, data).await {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => {
                // Concurrent replay of the same submission won the create
                let existing = self
                    .load(&path)
                    .await?
                    .ok_or_else(|| OrderError::Transient(format!("order {} vanished", order.id)))?;
                return self.finish_existing(&path, existing).await;
            }
            Err(e) => return Err(e.into()),
        }

        // 3. Reserve
        let (order, reservation) = match self.claim_reservation(&path).await? {
            Some(claimed) => {
                let reservation = self.reserve(&claimed).await;
                (claimed, reservation)
            }
            None => (order, ReservationReport::default()),
        };

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            pharmacy_id = %order.pharmacy_id,
            items = order.items.len(),
            total = order.total_amount,
            "Order created"
        );

        Ok(CreateOrderOutcome {
            order,
            reservation,
            already_existed: false,
        })
    }

    /// Replayed create: reserve stock if the earlier attempt stopped before
    /// claiming it
    async fn finish_existing(&self, path: &str, existing: Order) -> OrderResult<CreateOrderOutcome> {
        if existing.stock_reserved || existing.status == OrderStatus::Cancelled {
            return Ok(CreateOrderOutcome {
                order: existing,
                reservation: ReservationReport::default(),
                already_existed: true,
            });
        }

        match self.claim_reservation(path).await? {
            Some(claimed) => {
                tracing::info!(order_id = %claimed.id, "Reserving stock for previously written order");
                let reservation = self.reserve(&claimed).await;
                Ok(CreateOrderOutcome {
                    order: claimed,
                    reservation,
                    already_existed: true,
                })
            }
            None => Ok(CreateOrderOutcome {
                order: self.load(path).await?.unwrap_or(existing),
                reservation: ReservationReport::default(),
                already_existed: true,
            }),
        }
    }

    /// Flip `stock_reserved` to true. `None` if it was already set or the
    /// order was cancelled first.
    async fn claim_reservation(&self, path: &str) -> OrderResult<Option<Order>> {
        let claimed = run_transaction(self.store.as_ref(), path, |doc| {
            let doc = doc.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            let mut order: Order = doc.decode()?;
            if order.stock_reserved || order.status == OrderStatus::Cancelled {
                return Ok((doc.data.clone(), None));
            }
            order.stock_reserved = true;
            Ok((serde_json::to_value(&order)?, Some(order)))
        })
        .await?;
        Ok(claimed)
    }

    async fn reserve(&self, order: &Order) -> ReservationReport {
        let reservation = self.reservations.reserve(&order.pharmacy_id, &order.items).await;
        if !reservation.is_complete() {
            tracing::warn!(
                order_id = %order.id,
                warnings = ?reservation.warnings(),
                "Order created but stock reservation incomplete"
            );
        }
        reservation
    }

    /// Cancel a PENDING or CONFIRMED order and restore its stock
    ///
    /// Any other status yields `InvalidTransition` and changes nothing.
    pub async fn cancel_order(&self, user_id: &str, order_id: &str) -> OrderResult<CancelOrderOutcome> {
        let order = self
            .transition(user_id, order_id, OrderStatus::Cancelled)
            .await?;

        if !order.stock_reserved {
            tracing::info!(order_id = %order.id, "Order cancelled before stock was reserved");
            return Ok(CancelOrderOutcome {
                order,
                release: ReservationReport::default(),
            });
        }

        let release = self.reservations.release(&order.pharmacy_id, &order.items).await;
        if !release.is_complete() {
            tracing::warn!(
                order_id = %order.id,
                warnings = ?release.warnings(),
                "Order cancelled but stock release incomplete"
            );
        }

        tracing::info!(order_id = %order.id, "Order cancelled");
        Ok(CancelOrderOutcome { order, release })
    }

    /// Move an order to `next`, enforcing the transition table
    ///
    /// Cancelling through here also restores stock.
    pub async fn update_status(
        &self,
        user_id: &str,
        order_id: &str,
        next: OrderStatus,
    ) -> OrderResult<Order> {
        if next == OrderStatus::Cancelled {
            return Ok(self.cancel_order(user_id, order_id).await?.order);
        }
        let order = self.transition(user_id, order_id, next).await?;
        tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");
        Ok(order)
    }

    pub async fn get_order(&self, user_id: &str, order_id: &str) -> OrderResult<Order> {
        if user_id.trim().is_empty() {
            return Err(OrderError::Unauthenticated);
        }
        self.load(&paths::order(user_id, order_id))
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// Every order of a user, newest first
    pub async fn list_orders(&self, user_id: &str) -> OrderResult<Vec<Order>> {
        if user_id.trim().is_empty() {
            return Err(OrderError::Unauthenticated);
        }
        let docs = self.store.list(&paths::orders(user_id)).await?;
        let mut orders: Vec<Order> = docs
            .iter()
            .filter_map(|doc| match doc.decode::<Order>() {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::warn!(path = %doc.path, error = %e, "Skipping malformed order");
                    None
                }
            })
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn load(&self, path: &str) -> OrderResult<Option<Order>> {
        match self.store.get(path).await? {
            Some(doc) => Ok(Some(doc.decode::<Order>()?)),
            None => Ok(None),
        }
    }

    /// Transactional status change guarded by the transition table
    async fn transition(
        &self,
        user_id: &str,
        order_id: &str,
        next: OrderStatus,
    ) -> OrderResult<Order> {
        if user_id.trim().is_empty() {
            return Err(OrderError::Unauthenticated);
        }
        let path = paths::order(user_id, order_id);
        let mut refused_from: Option<OrderStatus> = None;

        let result = run_transaction(self.store.as_ref(), &path, |doc| {
            let doc = doc.ok_or_else(|| StoreError::NotFound(path.clone()))?;
            let mut order: Order = doc.decode()?;
            if !order.status.can_transition_to(next, order.delivery_type) {
                refused_from = Some(order.status);
                return Err(StoreError::Rejected(format!(
                    "illegal transition {} -> {next}",
                    order.status
                )));
            }
            order.status = next;
            order.updated_at = now_millis();
            Ok((serde_json::to_value(&order)?, order))
        })
        .await;

        match result {
            Ok(order) => Ok(order),
            Err(_) if refused_from.is_some() => {
                let from = refused_from.unwrap_or_default();
                tracing::info!(order_id = %order_id, from = %from, to = %next, "Status change refused");
                Err(OrderError::InvalidTransition { from, to: next })
            }
            Err(StoreError::NotFound(_)) => Err(OrderError::NotFound(order_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
