use crate::inventory::ReservationError;
use crate::store::StoreError;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use thiserror::Error;

/// Order lifecycle errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Stock insuficiente para {name}: {available} unidades disponibles")]
    InsufficientStock {
        item_id: String,
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Inventory item not found: {0}")]
    ItemNotFound(String),

    #[error("No authenticated user")]
    Unauthenticated,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity for {0}")]
    InvalidQuantity(String),

    #[error("Home delivery requires a delivery address")]
    DeliveryAddressRequired,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store unreachable or contended; retry on the next trigger
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error(transparent)]
    Store(StoreError),
}

impl OrderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderError::Transient(_))
    }

    /// Missing or expired session; the write is still owed once the user
    /// signs in again
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, OrderError::Unauthenticated)
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthenticated(_) => OrderError::Unauthenticated,
            err if err.is_transient() => OrderError::Transient(err.to_string()),
            err => OrderError::Store(err),
        }
    }
}

impl From<ReservationError> for OrderError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::InsufficientStock {
                item_id,
                name,
                requested,
                available,
            } => OrderError::InsufficientStock {
                item_id,
                name,
                requested,
                available,
            },
            ReservationError::ItemNotFound(id) => OrderError::ItemNotFound(id),
            ReservationError::MalformedRecord(path) => {
                OrderError::Store(StoreError::Rejected(format!("malformed inventory record {path}")))
            }
            ReservationError::Store(e) => e.into(),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InsufficientStock {
                item_id,
                name,
                available,
                ..
            } => AppError::insufficient_stock(name, available).with_detail("item_id", item_id),
            OrderError::InvalidTransition { from, to } => {
                AppError::invalid_transition(from.as_str(), to.as_str())
            }
            OrderError::NotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id)
            }
            OrderError::ItemNotFound(id) => {
                AppError::new(ErrorCode::InventoryItemNotFound).with_detail("item_id", id)
            }
            OrderError::Unauthenticated => AppError::not_authenticated(),
            OrderError::EmptyCart => AppError::new(ErrorCode::OrderEmpty),
            OrderError::InvalidQuantity(name) => {
                AppError::new(ErrorCode::InvalidQuantity).with_detail("item", name)
            }
            OrderError::DeliveryAddressRequired => AppError::new(ErrorCode::DeliveryAddressRequired),
            OrderError::InvalidRequest(msg) => AppError::validation(msg),
            OrderError::Transient(msg) => AppError::unavailable(msg),
            OrderError::Store(e) => e.into(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
