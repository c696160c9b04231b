//! In-process document store
//!
//! Versioned documents in a `DashMap`; compare-and-set runs under the
//! entry's shard lock so it is atomic per document. Used as the injected
//! store in tests and as an embedded store when no remote backend exists.
//! Outages can be simulated to exercise the offline paths.

use super::{Document, DocumentStore, StoreError, StoreResult, paths};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct MemoryStore {
    /// path -> (version, data)
    docs: DashMap<String, (u64, Value)>,
    available: AtomicBool,
    authenticated: AtomicBool,
    /// Writes under these path prefixes fail with `Unavailable`
    failing_write_prefixes: DashSet<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
            available: AtomicBool::new(true),
            authenticated: AtomicBool::new(true),
            failing_write_prefixes: DashSet::new(),
        }
    }

    /// Simulate the whole store going offline / coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Simulate the session expiring; every operation fails with
    /// `Unauthenticated` until restored
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Make every write under `prefix` fail until cleared
    pub fn fail_writes_under(&self, prefix: impl Into<String>) {
        self.failing_write_prefixes.insert(prefix.into());
    }

    pub fn clear_write_failures(&self) {
        self.failing_write_prefixes.clear();
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn check_available(&self, path: &str) -> StoreResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("store offline ({path})")));
        }
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(StoreError::Unauthenticated(format!("session expired ({path})")));
        }
        Ok(())
    }

    fn check_writable(&self, path: &str) -> StoreResult<()> {
        self.check_available(path)?;
        if self
            .failing_write_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Err(StoreError::Unavailable(format!("write failed ({path})")));
        }
        Ok(())
    }
}

fn to_document(path: &str, version: u64, data: &Value) -> Document {
    Document {
        id: paths::last_segment(path).to_string(),
        path: path.to_string(),
        version,
        data: data.clone(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Document>> {
        self.check_available(path)?;
        Ok(self
            .docs
            .get(path)
            .map(|entry| to_document(path, entry.0, &entry.1)))
    }

    async fn set(&self, path: &str, data: Value) -> StoreResult<u64> {
        self.check_writable(path)?;
        let mut entry = self.docs.entry(path.to_string()).or_insert((0, Value::Null));
        entry.0 += 1;
        entry.1 = data;
        Ok(entry.0)
    }

    async fn compare_and_set(
        &self,
        path: &str,
        expected_version: u64,
        data: Value,
    ) -> StoreResult<u64> {
        self.check_writable(path)?;
        match self.docs.entry(path.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().0;
                if current != expected_version {
                    return Err(StoreError::Conflict(path.to_string()));
                }
                let next = current + 1;
                occupied.insert((next, data));
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                if expected_version != 0 {
                    return Err(StoreError::Conflict(path.to_string()));
                }
                vacant.insert((1, data));
                Ok(1)
            }
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        self.check_available(collection)?;
        let prefix = format!("{}/", collection.trim_end_matches('/'));
        let mut docs: Vec<Document> = self
            .docs
            .iter()
            .filter(|entry| {
                entry
                    .key()
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|entry| to_document(entry.key(), entry.value().0, &entry.value().1))
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }
}
