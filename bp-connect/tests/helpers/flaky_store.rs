//! Store wrapper that injects failures into one collection
//!
//! Wraps a MemoryStore and fails the next N operations touching a chosen
//! collection with `Error::Unavailable`, which is how a lost backend
//! connection surfaces. Everything else passes through.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use bp_common::store::{ChangeNotice, Document, DocumentStore, Filter, MemoryStore, Patch};
use bp_common::{Error, Result};

pub struct FlakyStore {
    inner: MemoryStore,
    fail_collection: String,
    passes_before_failure: AtomicUsize,
    remaining_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, fail_collection: &str) -> Self {
        Self {
            inner,
            fail_collection: fail_collection.to_string(),
            passes_before_failure: AtomicUsize::new(0),
            remaining_failures: AtomicUsize::new(0),
        }
    }

    /// Arm the wrapper: the next `n` operations on the failing collection
    /// return `Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.fail_after(0, n);
    }

    /// Arm the wrapper: let `passes` operations on the failing collection
    /// through, then fail the following `n`.
    pub fn fail_after(&self, passes: usize, n: usize) {
        self.passes_before_failure.store(passes, Ordering::SeqCst);
        self.remaining_failures.store(n, Ordering::SeqCst);
    }

    fn consume(counter: &AtomicUsize) -> bool {
        let mut current = counter.load(Ordering::SeqCst);
        while current > 0 {
            match counter.compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    fn maybe_fail(&self, collection: &str, op: &str) -> Result<()> {
        if collection != self.fail_collection {
            return Ok(());
        }
        if Self::consume(&self.passes_before_failure) {
            return Ok(());
        }
        if Self::consume(&self.remaining_failures) {
            return Err(Error::Unavailable(format!(
                "injected {} failure on '{}'",
                op, collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create(&self, collection: &str, body: Value) -> Result<String> {
        self.maybe_fail(collection, "create")?;
        self.inner.create(collection, body).await
    }

    async fn put(&self, collection: &str, id: &str, body: Value) -> Result<()> {
        self.maybe_fail(collection, "put")?;
        self.inner.put(collection, id, body).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.maybe_fail(collection, "get")?;
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<()> {
        self.maybe_fail(collection, "update")?;
        self.inner.update(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.maybe_fail(collection, "delete")?;
        self.inner.delete(collection, id).await
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        self.maybe_fail(collection, "query")?;
        self.inner.query(collection, filters).await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeNotice> {
        self.inner.changes()
    }
}
