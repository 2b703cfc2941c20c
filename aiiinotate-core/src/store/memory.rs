//! In-memory document store.
//!
//! Each collection is an insertion-ordered `Vec` guarded by its `DashMap`
//! shard lock, plus an `@id` index enforcing uniqueness. Data is lost on
//! restart.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{
    document_id, DocumentStore, Filter, Projection, StoreError, StoreResult, Update, UpdateOutcome,
};

#[derive(Default)]
struct CollectionData {
    docs: Vec<Value>,
    ids: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, CollectionData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.collections.len())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> StoreResult<()> {
        self.insert_many(collection, vec![doc]).await.map(|_| ())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> StoreResult<u64> {
        let mut data = self.collections.entry(collection.to_string()).or_default();

        // Check the whole batch before writing anything
        let mut batch_ids = HashSet::with_capacity(docs.len());
        for doc in &docs {
            let id = document_id(doc)?;
            if data.ids.contains(id) || !batch_ids.insert(id.to_string()) {
                return Err(StoreError::DuplicateId {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
        }

        let inserted = docs.len() as u64;
        data.ids.extend(batch_ids);
        data.docs.extend(docs);
        Ok(inserted)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        let Some(mut data) = self.collections.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };
        let data = &mut *data;
        let Some(pos) = data.docs.iter().position(|d| filter.matches(d)) else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = data.docs[pos].clone();
        if !update.apply(&mut updated) {
            return Ok(UpdateOutcome { matched: 1, modified: 0 });
        }

        let old_id = document_id(&data.docs[pos])?.to_string();
        let new_id = document_id(&updated)?.to_string();
        if new_id != old_id {
            if data.ids.contains(&new_id) {
                return Err(StoreError::DuplicateId {
                    collection: collection.to_string(),
                    id: new_id,
                });
            }
            data.ids.remove(&old_id);
            data.ids.insert(new_id);
        }
        data.docs[pos] = updated;
        Ok(UpdateOutcome { matched: 1, modified: 1 })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let Some(mut data) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let data = &mut *data;
        let before = data.docs.len();
        let ids = &mut data.ids;
        data.docs.retain(|doc| {
            if filter.matches(doc) {
                if let Ok(id) = document_id(doc) {
                    ids.remove(id);
                }
                false
            } else {
                true
            }
        });
        Ok((before - data.docs.len()) as u64)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Value>> {
        let Some(data) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(data
            .docs
            .iter()
            .filter(|doc| filter.matches(doc))
            .map(|doc| projection.apply(doc.clone()))
            .collect())
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u64>,
    ) -> StoreResult<u64> {
        let Some(data) = self.collections.get(collection) else {
            return Ok(0);
        };
        let matching = data.docs.iter().filter(|doc| filter.matches(doc));
        let count = match limit {
            Some(limit) => matching.take(limit as usize).count(),
            None => matching.count(),
        };
        Ok(count as u64)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
