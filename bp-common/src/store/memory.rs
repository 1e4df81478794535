//! In-memory document store adapter
//!
//! Reference implementation of the [`DocumentStore`] contract, used by the
//! test suites. Collections are `BTreeMap`s (stable id order) behind a
//! single `tokio::sync::RwLock`; each mutation holds the write lock for its
//! whole read-patch-write, so patches (array-union included) are atomic
//! with respect to other writers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    matches_filters, ChangeFeed, ChangeNotice, Document, DocumentStore, Filter, Patch,
};
use crate::error::{Error, Result};

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, BTreeMap<String, Value>>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, body: Value) -> Result<String> {
        if !body.is_object() {
            return Err(Error::InvalidInput(format!(
                "document body for '{}' must be a JSON object",
                collection
            )));
        }
        let id = Uuid::new_v4().to_string();
        {
            let mut collections = self.collections.write().await;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), body);
        }
        self.feed.notify(collection);
        Ok(id)
    }

    async fn put(&self, collection: &str, id: &str, body: Value) -> Result<()> {
        if !body.is_object() {
            return Err(Error::InvalidInput(format!(
                "document body for '{}' must be a JSON object",
                collection
            )));
        }
        {
            let mut collections = self.collections.write().await;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), body);
        }
        self.feed.notify(collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|body| Document {
                id: id.to_string(),
                body: body.clone(),
            }))
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<()> {
        {
            let mut collections = self.collections.write().await;
            let body = collections
                .get_mut(collection)
                .and_then(|documents| documents.get_mut(id))
                .ok_or_else(|| Error::NotFound(format!("document {}/{}", collection, id)))?;
            patch.apply_to(body);
        }
        self.feed.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = {
            let mut collections = self.collections.write().await;
            collections
                .get_mut(collection)
                .and_then(|documents| documents.remove(id))
                .is_some()
        };
        if removed {
            self.feed.notify(collection);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .filter(|(_, body)| matches_filters(body, filters))
            .map(|(id, body)| Document {
                id: id.clone(),
                body: body.clone(),
            })
            .collect())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeNotice> {
        self.feed.subscribe()
    }
}
