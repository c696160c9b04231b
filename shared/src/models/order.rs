//! Order Model

use super::cart::{CartItem, cart_total};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status
///
/// ```text
/// PENDING ──► CONFIRMED ──► IN_TRANSIT ──► DELIVERED / COMPLETED
///    │            │  └───────────────────► DELIVERED / COMPLETED
///    └────────────┴──► CANCELLED
/// ```
///
/// `IN_TRANSIT` is only reachable for home delivery orders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// DELIVERED, COMPLETED and CANCELLED accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// Only PENDING and CONFIRMED orders can be cancelled
    pub fn can_be_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Whether `self → next` is a legal transition for an order with the
    /// given delivery type
    pub fn can_transition_to(&self, next: OrderStatus, delivery: DeliveryType) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, InTransit) => delivery == DeliveryType::HomeDelivery,
            (Confirmed | InTransit, Delivered | Completed) => true,
            (Pending | Confirmed, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    /// Customer picks the order up at the pharmacy
    #[default]
    StorePickup,
    /// Courier delivers to `deliveryAddress`
    HomeDelivery,
}

/// Checkout input - everything needed to create an order
///
/// The `order_id` is assigned when the request is built so that a request
/// replayed from the offline queue creates the same document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: String,
    pub user_id: String,
    pub pharmacy_id: String,
    pub pharmacy_name: String,
    #[serde(default)]
    pub pharmacy_address: String,
    pub items: Vec<CartItem>,
    pub delivery_type: DeliveryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the user placed the order (may precede the remote write)
    pub requested_at: i64,
}

impl OrderRequest {
    pub fn total_amount(&self) -> u64 {
        cart_total(&self.items)
    }
}

/// Order document (`users/{userId}/orders/{orderId}`)
///
/// `total_amount` is the receipt total computed at creation and never
/// recomputed from live prices. Orders are never deleted, only cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub pharmacy_id: String,
    pub pharmacy_name: String,
    #[serde(default)]
    pub pharmacy_address: String,
    pub items: Vec<CartItem>,
    pub total_amount: u64,
    pub status: OrderStatus,
    pub delivery_type: DeliveryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Stock for `items` has been claimed for reservation. Written `false`
    /// with the document and flipped once before reserving, so a replay
    /// after a lost create response still reserves exactly once.
    /// Documents without the field predate it and were reserved on create.
    #[serde(default = "default_stock_reserved")]
    pub stock_reserved: bool,
}

fn default_stock_reserved() -> bool {
    true
}

impl Order {
    /// Build a PENDING order from a checkout request
    pub fn from_request(request: &OrderRequest, now: i64) -> Self {
        Self {
            id: request.order_id.clone(),
            user_id: request.user_id.clone(),
            pharmacy_id: request.pharmacy_id.clone(),
            pharmacy_name: request.pharmacy_name.clone(),
            pharmacy_address: request.pharmacy_address.clone(),
            items: request.items.clone(),
            total_amount: request.total_amount(),
            status: OrderStatus::Pending,
            delivery_type: request.delivery_type,
            delivery_address: request.delivery_address.clone(),
            phone_number: request.phone_number.clone(),
            notes: request.notes.clone(),
            created_at: request.requested_at,
            updated_at: now,
            stock_reserved: false,
        }
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }
}
