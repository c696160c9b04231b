//! Unified error codes for Botica
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 6xxx: Inventory errors
//! - 7xxx: Prescription errors
//! - 9xxx: System errors (store, local queue, sync)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 values so the UI layer can localize messages without
/// parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 1xxx: Auth ====================
    /// No caller identity
    NotAuthenticated = 1001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order cart is empty
    OrderEmpty = 4002,
    /// Status change not allowed from the current status
    InvalidTransition = 4003,
    /// Home delivery order without an address
    DeliveryAddressRequired = 4005,

    // ==================== 6xxx: Inventory ====================
    /// Requested quantity exceeds available stock
    InsufficientStock = 6001,
    /// Inventory item no longer exists
    InventoryItemNotFound = 6002,
    /// Pharmacy not found
    PharmacyNotFound = 6003,
    /// Invalid quantity
    InvalidQuantity = 6004,

    // ==================== 7xxx: Prescription ====================
    /// Prescription not found
    PrescriptionNotFound = 7001,
    /// Prescription has no items
    PrescriptionEmpty = 7002,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Remote store unavailable (retryable)
    StoreUnavailable = 9002,
    /// Remote store rejected the request
    StoreRejected = 9003,
    /// Concurrent modification could not be resolved (retryable)
    StoreConflict = 9004,
    /// Local queue storage error
    QueueStorageError = 9101,
    /// Sync finished with entries still queued (retryable)
    SyncIncomplete = 9201,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether the operation may succeed if retried later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::StoreUnavailable | ErrorCode::StoreConflict | ErrorCode::SyncIncomplete
        )
    }

    /// Get the default message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::InvalidTransition => "Invalid order status transition",
            ErrorCode::DeliveryAddressRequired => "Delivery address is required",

            // Inventory
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::InventoryItemNotFound => "Inventory item not found",
            ErrorCode::PharmacyNotFound => "Pharmacy not found",
            ErrorCode::InvalidQuantity => "Invalid quantity",

            // Prescription
            ErrorCode::PrescriptionNotFound => "Prescription not found",
            ErrorCode::PrescriptionEmpty => "Prescription has no items",

            // System
            ErrorCode::InternalError => "Internal error",
            ErrorCode::StoreUnavailable => "Remote store unavailable, please retry later",
            ErrorCode::StoreRejected => "Remote store rejected the request",
            ErrorCode::StoreConflict => "Concurrent modification, please retry",
            ErrorCode::QueueStorageError => "Local queue storage error",
            ErrorCode::SyncIncomplete => "Some operations are still waiting to sync",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderEmpty),
            4003 => Ok(ErrorCode::InvalidTransition),
            4005 => Ok(ErrorCode::DeliveryAddressRequired),

            // Inventory
            6001 => Ok(ErrorCode::InsufficientStock),
            6002 => Ok(ErrorCode::InventoryItemNotFound),
            6003 => Ok(ErrorCode::PharmacyNotFound),
            6004 => Ok(ErrorCode::InvalidQuantity),

            // Prescription
            7001 => Ok(ErrorCode::PrescriptionNotFound),
            7002 => Ok(ErrorCode::PrescriptionEmpty),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StoreUnavailable),
            9003 => Ok(ErrorCode::StoreRejected),
            9004 => Ok(ErrorCode::StoreConflict),
            9101 => Ok(ErrorCode::QueueStorageError),
            9201 => Ok(ErrorCode::SyncIncomplete),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::InvalidTransition.code(), 4003);
        assert_eq!(ErrorCode::InsufficientStock.code(), 6001);
        assert_eq!(ErrorCode::StoreUnavailable.code(), 9002);
        assert_eq!(ErrorCode::SyncIncomplete.code(), 9201);
    }

    #[test]
    fn test_try_from_roundtrips_every_known_code() {
        let all = [
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::NotAuthenticated,
            ErrorCode::OrderNotFound,
            ErrorCode::OrderEmpty,
            ErrorCode::InvalidTransition,
            ErrorCode::DeliveryAddressRequired,
            ErrorCode::InsufficientStock,
            ErrorCode::InventoryItemNotFound,
            ErrorCode::PharmacyNotFound,
            ErrorCode::InvalidQuantity,
            ErrorCode::PrescriptionNotFound,
            ErrorCode::PrescriptionEmpty,
            ErrorCode::InternalError,
            ErrorCode::StoreUnavailable,
            ErrorCode::StoreRejected,
            ErrorCode::StoreConflict,
            ErrorCode::QueueStorageError,
            ErrorCode::SyncIncomplete,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(0), Err(InvalidErrorCode(0)));
        assert_eq!(ErrorCode::try_from(9999), Err(InvalidErrorCode(9999)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::InsufficientStock).unwrap();
        assert_eq!(json, "6001");
        let parsed: ErrorCode = serde_json::from_str("4003").unwrap();
        assert_eq!(parsed, ErrorCode::InvalidTransition);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::StoreUnavailable.is_retryable());
        assert!(ErrorCode::SyncIncomplete.is_retryable());
        assert!(!ErrorCode::InsufficientStock.is_retryable());
        assert!(!ErrorCode::InvalidTransition.is_retryable());
    }
}
