//! Document store abstraction
//!
//! The backing store is modeled the way the platform consumes it: named
//! collections of JSON object documents with store-assigned ids, equality
//! and array-contains queries, field-level patches, and a change feed that
//! drives live query snapshots. Two adapters implement the trait:
//! [`MemoryStore`] (tests, reference semantics) and [`SqliteStore`]
//! (persistent, used by the CLI).

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{Error, Result};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored document: store-assigned id plus the JSON object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

impl Document {
    /// Decode the body into a typed model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Query predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Array field contains value.
    Contains(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains(field.into(), value.into())
    }
}

/// Evaluate filters against a document body (used by the in-memory adapter;
/// the SQLite adapter pushes the same predicates down into SQL).
pub(crate) fn matches_filters(body: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(field, value) => body.get(field) == Some(value),
        Filter::Contains(field, value) => body
            .get(field)
            .and_then(Value::as_array)
            .map_or(false, |items| items.contains(value)),
    })
}

/// A field-level mutation of one document.
#[derive(Debug, Clone)]
enum FieldOp {
    Set(Value),
    ArrayUnion(Vec<Value>),
}

/// An ordered set of field mutations applied to a document in one store
/// write.
///
/// `ArrayUnion` is the atomic set-add: values already present in the target
/// array are skipped, a missing or null field becomes a fresh array, and the
/// whole patch is applied under the adapter's write exclusion so concurrent
/// unions cannot lose elements.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    ops: Vec<(String, FieldOp)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the field with the given value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((field.into(), FieldOp::Set(value.into())));
        self
    }

    /// Add the value to the array field if not already present.
    pub fn array_union(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops
            .push((field.into(), FieldOp::ArrayUnion(vec![value.into()])));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all ops to a document body in order. A non-array field hit by
    /// `ArrayUnion` is replaced by a fresh array of the unioned values.
    pub(crate) fn apply_to(&self, body: &mut Value) {
        let Some(object) = body.as_object_mut() else {
            return;
        };
        for (field, op) in &self.ops {
            match op {
                FieldOp::Set(value) => {
                    object.insert(field.clone(), value.clone());
                }
                FieldOp::ArrayUnion(values) => {
                    let slot = object
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Some(items) = slot.as_array_mut() {
                        for value in values {
                            if !items.contains(value) {
                                items.push(value.clone());
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Broadcast message naming a collection whose contents changed.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    pub collection: String,
}

/// Lossy broadcast feed of collection-level change notices.
///
/// Emission never blocks and never fails: a feed with no subscribers simply
/// drops the notice, and slow subscribers observe `Lagged` (which
/// [`LiveQuery`] treats as "re-run the query", preserving at-least-once
/// snapshot delivery).
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeNotice>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, collection: &str) {
        let _ = self.tx.send(ChangeNotice {
            collection: collection.to_string(),
        });
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        // Small volumes; a modest backlog before subscribers lag
        Self::new(64)
    }
}

/// The document database this workflow runs against.
///
/// Contract notes shared by all adapters:
/// - `create` assigns and returns an opaque id; non-object bodies are
///   rejected as invalid input.
/// - `put` writes a full body at a caller-chosen id, replacing any existing
///   document (keyed entities such as studios use the owner id as their id).
/// - `update` fails with `NotFound` when the document is missing.
/// - `delete` of a missing document is an idempotent no-op.
/// - `query` returns matches in a stable (but otherwise unspecified) order.
/// - Every successful mutation publishes a [`ChangeNotice`] for its
///   collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, body: Value) -> Result<String>;

    async fn put(&self, collection: &str, id: &str, body: Value) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>>;

    /// Subscribe to the store's change feed.
    fn changes(&self) -> broadcast::Receiver<ChangeNotice>;
}

/// Live subscription to a stored query.
///
/// Delivers the full matching result set: once immediately, then again after
/// every change to the watched collection. Dropping the handle unsubscribes
/// from the change feed; that is the only cancellation mechanism.
pub struct LiveQuery {
    store: Arc<dyn DocumentStore>,
    collection: String,
    filters: Vec<Filter>,
    rx: broadcast::Receiver<ChangeNotice>,
    delivered_initial: bool,
}

impl LiveQuery {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        filters: Vec<Filter>,
    ) -> Self {
        let rx = store.changes();
        Self {
            store,
            collection: collection.into(),
            filters,
            rx,
            delivered_initial: false,
        }
    }

    /// Wait for the next full result set.
    ///
    /// The first call resolves immediately with the current matches. Later
    /// calls resolve after the watched collection changes; a lagged feed
    /// re-runs the query rather than erroring, so snapshots are delivered
    /// at least once per change.
    pub async fn next_snapshot(&mut self) -> Result<Vec<Document>> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return self.store.query(&self.collection, &self.filters).await;
        }
        loop {
            match self.rx.recv().await {
                Ok(notice) if notice.collection == self.collection => {
                    return self.store.query(&self.collection, &self.filters).await;
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    return self.store.query(&self.collection, &self.filters).await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::Unavailable("store change feed closed".to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eq_filter_matches_top_level_field() {
        let body = json!({"senderId": "a", "status": "pending"});
        assert!(matches_filters(&body, &[Filter::eq("status", "pending")]));
        assert!(!matches_filters(&body, &[Filter::eq("status", "accepted")]));
        // Missing field never matches
        assert!(!matches_filters(&body, &[Filter::eq("receiverId", "b")]));
    }

    #[test]
    fn test_conjunction_of_filters() {
        let body = json!({"senderId": "a", "receiverId": "b", "status": "pending"});
        let filters = vec![
            Filter::eq("senderId", "a"),
            Filter::eq("receiverId", "b"),
            Filter::eq("status", "pending"),
        ];
        assert!(matches_filters(&body, &filters));

        let wrong = vec![Filter::eq("senderId", "a"), Filter::eq("status", "rejected")];
        assert!(!matches_filters(&body, &wrong));
    }

    #[test]
    fn test_contains_filter_on_array_field() {
        let body = json!({"memberIds": ["u1", "u2"]});
        assert!(matches_filters(&body, &[Filter::contains("memberIds", "u1")]));
        assert!(!matches_filters(&body, &[Filter::contains("memberIds", "u3")]));
        // Non-array field never matches a contains filter
        let scalar = json!({"memberIds": "u1"});
        assert!(!matches_filters(&scalar, &[Filter::contains("memberIds", "u1")]));
    }

    #[test]
    fn test_patch_set_replaces_field() {
        let mut body = json!({"status": "pending"});
        Patch::new()
            .set("status", "accepted")
            .set("acceptedAt", "2024-03-01T12:00:00Z")
            .apply_to(&mut body);
        assert_eq!(body["status"], json!("accepted"));
        assert_eq!(body["acceptedAt"], json!("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn test_array_union_skips_present_values() {
        let mut body = json!({"memberIds": ["u1"]});
        Patch::new().array_union("memberIds", "u1").apply_to(&mut body);
        assert_eq!(body["memberIds"], json!(["u1"]));

        Patch::new().array_union("memberIds", "u2").apply_to(&mut body);
        assert_eq!(body["memberIds"], json!(["u1", "u2"]));
    }

    #[test]
    fn test_array_union_creates_missing_field() {
        let mut body = json!({"ownerId": "p1"});
        Patch::new().array_union("memberIds", "u1").apply_to(&mut body);
        assert_eq!(body["memberIds"], json!(["u1"]));
    }

    #[test]
    fn test_array_union_replaces_non_array_field() {
        let mut body = json!({"memberIds": "corrupt"});
        Patch::new().array_union("memberIds", "u1").apply_to(&mut body);
        assert_eq!(body["memberIds"], json!(["u1"]));
    }

    #[test]
    fn test_change_feed_delivers_to_subscribers() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        feed.notify("connectionRequests");
        let notice = rx.try_recv().expect("subscriber should receive notice");
        assert_eq!(notice.collection, "connectionRequests");
    }

    #[test]
    fn test_change_feed_without_subscribers_does_not_panic() {
        let feed = ChangeFeed::new(8);
        feed.notify("connections");
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_dropping_subscription_detaches_from_feed() {
        let feed = ChangeFeed::new(8);
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(rx);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
