//! Document store abstraction.
//!
//! The store keeps JSON documents in named collections, each document keyed
//! by its `@id`. Two backends are provided:
//!
//! - [`MemoryStore`]: `DashMap`-backed, for development and tests
//! - [`PostgresStore`]: JSONB documents in PostgreSQL (feature `postgres`)
//!
//! Queries are expressed with [`Filter`]; equality follows document-store
//! array semantics, so `Eq("motivation", "oa:tagging")` matches a document
//! whose `motivation` array contains `"oa:tagging"`.

mod filter;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use filter::{lookup, Filter, Projection};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate '@id' '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("document has no string '@id'")]
    MissingId,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl StoreError {
    /// Machine-readable diagnostics attached to collection errors.
    pub fn info(&self) -> Value {
        match self {
            Self::DuplicateId { collection, id } => {
                json!({ "code": "duplicate_id", "collection": collection, "id": id })
            }
            Self::MissingId => json!({ "code": "missing_id" }),
            Self::InvalidQuery(msg) => json!({ "code": "invalid_query", "detail": msg }),
            Self::Database(msg) => json!({ "code": "database", "detail": msg }),
            Self::Migration(msg) => json!({ "code": "migration", "detail": msg }),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Partial update: top-level fields to set, then top-level fields to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Map<String, Value>,
    pub unset: Vec<String>,
}

impl Update {
    pub fn set(set: Map<String, Value>) -> Self {
        Self { set, unset: Vec::new() }
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Apply to a document in place. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Value) -> bool {
        let Some(obj) = doc.as_object_mut() else {
            return false;
        };
        let mut changed = false;
        for (key, value) in &self.set {
            if obj.get(key) != Some(value) {
                obj.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        for key in &self.unset {
            changed |= obj.remove(key).is_some();
        }
        changed
    }
}

/// Result of a single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Identifier of a stored document.
pub fn document_id(doc: &Value) -> StoreResult<&str> {
    doc.get("@id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(StoreError::MissingId)
}

/// Backend for named JSON document collections.
///
/// Implementations must enforce `@id` uniqueness per collection and
/// return documents in insertion order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_one(&self, collection: &str, doc: Value) -> StoreResult<()>;

    /// Insert all documents or none of them.
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> StoreResult<u64>;

    /// Update the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Value>>;

    async fn count(&self, collection: &str, filter: &Filter, limit: Option<u64>)
        -> StoreResult<u64>;

    /// Backend name, for health reporting.
    fn backend(&self) -> &'static str;

    async fn check_health(&self) -> bool {
        true
    }

    async fn close(&self) {}
}
