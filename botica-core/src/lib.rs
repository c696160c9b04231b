//! Botica core - pharmacy ordering client library
//!
//! # Overview
//!
//! Embedded in the mobile/desktop client. Talks to a remote hierarchical
//! document store and keeps working without connectivity:
//!
//! - **Stock reservation** (`inventory`): validate, decrement and restore
//!   pharmacy stock through per-document transactions
//! - **Order lifecycle** (`orders`): order state machine, create / cancel
//!   with reservation side effects, checkout entry point
//! - **Prescription matching** (`matcher`): prescribed medications merged
//!   with a pharmacy's inventory into cart candidates
//! - **Offline queue** (`queue`): redb-backed durable store of pending writes
//! - **Sync** (`sync`): connectivity-triggered replay of the offline queue
//!
//! # Module layout
//!
//! ```text
//! botica-core/src/
//! ├── core/           # Config, BackgroundTasks, Botica wiring
//! ├── store/          # DocumentStore trait, HTTP and in-memory stores
//! ├── inventory/      # inventory reads, reservation engine
//! ├── matcher/        # prescription ↔ inventory matching
//! ├── orders/         # lifecycle manager, checkout
//! ├── prescriptions/  # prescription reads and uploads
//! ├── queue/          # offline durable queue
//! ├── sync/           # connectivity monitor, sync worker
//! └── utils/          # logging
//! ```

pub mod core;
pub mod inventory;
pub mod matcher;
pub mod orders;
pub mod prescriptions;
pub mod queue;
pub mod store;
pub mod sync;
pub mod utils;

// Re-export public types
pub use core::{BackgroundTasks, Botica, Config, TaskKind};
pub use inventory::{InventoryRepository, ReservationEngine, ReservationReport};
pub use orders::{Checkout, OrderError, OrdersManager, SubmitOutcome};
pub use queue::{OfflineQueue, PendingOperation};
pub use store::{DocumentStore, HttpStore, MemoryStore};
pub use sync::{ConnectivityMonitor, SyncReport, SyncTrigger, SyncWorker};

// Re-export unified error types from shared
pub use shared::error::{AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_from_config, init_logger, init_logger_with_file};
