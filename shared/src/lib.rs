//! Shared types for the Botica pharmacy ordering client
//!
//! Data model documents exchanged with the remote store, the order state
//! machine, and the unified error code system used by every crate.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
