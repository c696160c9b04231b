//! Pharmacy inventory
//!
//! - [`InventoryRepository`]: reads pharmacy metadata and inventory joined
//!   with the global medication catalog
//! - [`ReservationEngine`]: stock validation and per-item transactional
//!   decrement / restore

mod repository;
mod reservation;

pub use repository::InventoryRepository;
pub use reservation::{
    ItemFailure, ReservationEngine, ReservationError, ReservationReport, ReservationResult,
    StockAdjustment, StockLevel, StockValidation,
};
