//! Data models
//!
//! Documents stored in the remote store keep the field names the store
//! already uses (`nombre`, `precioUnidad`, ...); the Rust side uses English
//! names through serde renames.

pub mod cart;
pub mod inventory;
pub mod order;
pub mod pharmacy;
pub mod prescription;

pub use cart::CartItem;
pub use inventory::{InventoryItem, MedicationCatalogEntry};
pub use order::{DeliveryType, Order, OrderRequest, OrderStatus};
pub use pharmacy::Pharmacy;
pub use prescription::{PrescribedMedication, PrescriptionSource, PrescriptionUpload};
