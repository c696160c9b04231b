//! Orders
//!
//! # Structure
//!
//! ```text
//! orders/
//! ├── manager.rs   # OrdersManager: state machine, create / cancel
//! ├── checkout.rs  # Checkout: cart building, online-or-queued submission
//! └── error.rs     # OrderError
//! ```
//!
//! # Status flow
//!
//! ```text
//! PENDING → CONFIRMED ─┬→ DELIVERED | COMPLETED
//!                      └→ IN_TRANSIT → DELIVERED | COMPLETED   (home delivery only)
//! PENDING | CONFIRMED → CANCELLED                              (stock released)
//! ```

mod checkout;
mod error;
mod manager;

pub use checkout::{Checkout, SubmitOutcome};
pub use error::{OrderError, OrderResult};
pub use manager::{CancelOrderOutcome, CreateOrderOutcome, OrdersManager};
