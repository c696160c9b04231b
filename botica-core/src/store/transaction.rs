//! Per-document transaction
//!
//! Optimistic read → compute → compare-and-set, retried when another writer
//! got in between. Only one document takes part; there are no
//! multi-document transactions.

use super::{Document, DocumentStore, StoreError, StoreResult};
use serde_json::Value;

/// Attempts before a contended transaction gives up with `Conflict`
///
/// Stock adjustments that exhaust it are not applied; they show up as
/// transient failures in the
/// [`ReservationReport`](crate::inventory::ReservationReport).
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Run `update` against the current state of `path` and write its result
/// back atomically.
///
/// `update` receives the current document (`None` if absent) and returns
/// the new document fields plus a value handed back to the caller. It may
/// run several times and must not have side effects. Returning an error
/// aborts the transaction without writing.
pub async fn run_transaction<T, F>(
    store: &dyn DocumentStore,
    path: &str,
    mut update: F,
) -> StoreResult<T>
where
    F: FnMut(Option<&Document>) -> StoreResult<(Value, T)> + Send,
    T: Send,
{
    for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
        let current = store.get(path).await?;
        let expected_version = current.as_ref().map_or(0, |doc| doc.version);
        let (data, output) = update(current.as_ref())?;

        match store.compare_and_set(path, expected_version, data).await {
            Ok(_) => return Ok(output),
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(path = %path, attempt, "Transaction conflict, retrying");
                tokio::task::yield_now().await;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::warn!(
        path = %path,
        attempts = MAX_TRANSACTION_ATTEMPTS,
        "Transaction gave up after repeated conflicts"
    );
    Err(StoreError::Conflict(path.to_string()))
}
