//! Schema-validated façade over one named document collection.
//!
//! Every store failure leaving this module is one of the four typed store
//! errors ([`AiiinotateError::Read`], `Insert`, `Update`, `Delete`), tagged
//! with the collection name and the attempted operation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AiiinotateError, Result, StoreErrorContext};
use crate::schema::{DocumentSchema, SchemaViolation};
use crate::store::{document_id, DocumentStore, Filter, Projection, StoreError, Update};

/// Outcome of an insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub inserted_count: usize,
    pub inserted_ids: Vec<String>,
    /// Documents that were already stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_existing_ids: Vec<String>,
    /// Referenced URIs that could not be fetched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch_error_ids: Vec<String>,
    /// Documents that failed validation, with the reason.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rejected_ids: BTreeMap<String, String>,
}

impl InsertResult {
    pub fn inserted(ids: Vec<String>) -> Self {
        Self {
            inserted_count: ids.len(),
            inserted_ids: ids,
            ..Default::default()
        }
    }

    /// Merge another result into this one.
    pub fn absorb(&mut self, other: InsertResult) {
        self.inserted_count += other.inserted_count;
        self.inserted_ids.extend(other.inserted_ids);
        self.pre_existing_ids.extend(other.pre_existing_ids);
        self.fetch_error_ids.extend(other.fetch_error_ids);
        self.rejected_ids.extend(other.rejected_ids);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_count: u64,
}

#[derive(Clone)]
pub struct Collection {
    name: &'static str,
    schema: DocumentSchema,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("schema", &self.schema.name)
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl Collection {
    pub fn new(name: &'static str, schema: DocumentSchema, store: Arc<dyn DocumentStore>) -> Self {
        Self { name, schema, store }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn insert_one(&self, doc: Value) -> Result<InsertResult> {
        let id = self.validated_id(&doc, "insert")?;
        self.store
            .insert_one(self.name, doc)
            .await
            .map_err(|e| self.store_error(AiiinotateError::Insert, "insert", e))?;

        tracing::debug!(collection = self.name, id = %id, "Inserted document");
        Ok(InsertResult::inserted(vec![id]))
    }

    /// Insert a batch atomically: either every document is stored or none is.
    pub async fn insert_many(&self, docs: Vec<Value>) -> Result<InsertResult> {
        if docs.is_empty() {
            return Ok(InsertResult::default());
        }
        let ids = docs
            .iter()
            .map(|doc| self.validated_id(doc, "insert"))
            .collect::<Result<Vec<_>>>()?;

        self.store
            .insert_many(self.name, docs)
            .await
            .map_err(|e| self.store_error(AiiinotateError::Insert, "insert", e))?;

        tracing::debug!(collection = self.name, count = ids.len(), "Inserted documents");
        Ok(InsertResult::inserted(ids))
    }

    /// Insert unless a document with the same `@id` exists.
    ///
    /// Returns `false` when the document was already stored, including when a
    /// concurrent writer inserted it first.
    pub async fn insert_if_absent(&self, doc: Value) -> Result<bool> {
        self.validated_id(&doc, "insert")?;
        match self.store.insert_one(self.name, doc).await {
            Ok(()) => Ok(true),
            Err(StoreError::DuplicateId { id, .. }) => {
                tracing::debug!(collection = self.name, id = %id, "Document already stored");
                Ok(false)
            }
            Err(e) => Err(self.store_error(AiiinotateError::Insert, "insert", e)),
        }
    }

    pub async fn update_one(&self, filter: &Filter, update: Update) -> Result<UpdateResult> {
        if let Err(violations) = self
            .schema
            .validate_set(&update.set)
            .and_then(|_| self.schema.check_unset(&update.unset))
        {
            return Err(self.schema_error(AiiinotateError::Update, "update", violations));
        }

        let outcome = self
            .store
            .update_one(self.name, filter, &update)
            .await
            .map_err(|e| self.store_error(AiiinotateError::Update, "update", e))?;

        Ok(UpdateResult {
            matched_count: outcome.matched,
            modified_count: outcome.modified,
            upserted_count: 0,
            upserted_id: None,
        })
    }

    /// Delete every matching document. Matching nothing is not an error.
    pub async fn delete(&self, filter: &Filter) -> Result<DeleteResult> {
        let deleted_count = self
            .store
            .delete_many(self.name, filter)
            .await
            .map_err(|e| self.store_error(AiiinotateError::Delete, "delete", e))?;

        tracing::debug!(collection = self.name, deleted_count, "Deleted documents");
        Ok(DeleteResult { deleted_count })
    }

    pub async fn find(&self, filter: &Filter, projection: &Projection) -> Result<Vec<Value>> {
        self.store
            .find(self.name, filter, projection)
            .await
            .map_err(|e| self.store_error(AiiinotateError::Read, "read", e))
    }

    pub async fn find_one(&self, filter: &Filter, projection: &Projection) -> Result<Option<Value>> {
        Ok(self.find(filter, projection).await?.into_iter().next())
    }

    pub async fn exists(&self, filter: &Filter) -> Result<bool> {
        self.store
            .count(self.name, filter, Some(1))
            .await
            .map(|n| n > 0)
            .map_err(|e| self.store_error(AiiinotateError::Read, "read", e))
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        self.store
            .count(self.name, filter, None)
            .await
            .map_err(|e| self.store_error(AiiinotateError::Read, "read", e))
    }

    /// Build a projection, reporting invalid combinations as read errors.
    pub fn projection(&self, flags: &[(&str, bool)]) -> Result<Projection> {
        Projection::from_flags(flags).map_err(|e| self.store_error(AiiinotateError::Read, "read", e))
    }

    fn validated_id(&self, doc: &Value, operation: &str) -> Result<String> {
        if let Err(violations) = self.schema.validate(doc) {
            return Err(self.schema_error(AiiinotateError::Insert, operation, violations));
        }
        document_id(doc)
            .map(str::to_string)
            .map_err(|e| self.store_error(AiiinotateError::Insert, operation, e))
    }

    fn store_error(
        &self,
        variant: fn(StoreErrorContext) -> AiiinotateError,
        operation: &str,
        err: StoreError,
    ) -> AiiinotateError {
        tracing::debug!(collection = self.name, operation, error = %err, "Store operation failed");
        variant(StoreErrorContext::new(self.name, operation, err.to_string(), err.info()))
    }

    fn schema_error(
        &self,
        variant: fn(StoreErrorContext) -> AiiinotateError,
        operation: &str,
        violations: Vec<SchemaViolation>,
    ) -> AiiinotateError {
        let message = format!("document failed {} schema validation", self.schema.name);
        variant(StoreErrorContext::new(
            self.name,
            operation,
            message,
            json!({ "code": "schema_validation", "violations": violations }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manifests() -> Collection {
        Collection::new("manifests2", DocumentSchema::manifest2(), Arc::new(MemoryStore::new()))
    }

    fn manifest(id: &str) -> Value {
        json!({ "@id": id, "manifestShortId": "m", "canvasIds": [] })
    }

    #[tokio::test]
    async fn test_insert_and_count() {
        let coll = manifests();
        let res = coll.insert_one(manifest("https://ex.org/m/manifest")).await.unwrap();
        assert_eq!(res.inserted_count, 1);
        assert_eq!(res.inserted_ids, vec!["https://ex.org/m/manifest".to_string()]);
        assert_eq!(coll.count(&Filter::All).await.unwrap(), 1);
        assert!(coll.exists(&Filter::eq("@id", "https://ex.org/m/manifest")).await.unwrap());
        assert!(!coll.exists(&Filter::eq("@id", "nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_schema_rejection_is_insert_error_with_context() {
        let coll = manifests();
        let err = coll.insert_one(json!({ "@id": "x" })).await.unwrap_err();
        let ctx = match &err {
            AiiinotateError::Insert(ctx) => ctx,
            other => panic!("expected insert error, got {other:?}"),
        };
        assert_eq!(ctx.collection, "manifests2");
        assert_eq!(ctx.operation, "insert");
        assert_eq!(ctx.info["code"], "schema_validation");
        assert!(ctx.info["violations"].as_array().is_some_and(|v| !v.is_empty()));
    }

    #[tokio::test]
    async fn test_duplicate_is_insert_error_but_tolerated_by_insert_if_absent() {
        let coll = manifests();
        coll.insert_one(manifest("a")).await.unwrap();

        let err = coll.insert_one(manifest("a")).await.unwrap_err();
        assert!(matches!(err, AiiinotateError::Insert(ref ctx) if ctx.info["code"] == "duplicate_id"));

        assert!(!coll.insert_if_absent(manifest("a")).await.unwrap());
        assert!(coll.insert_if_absent(manifest("b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_zero_matches_is_ok() {
        let coll = manifests();
        let res = coll.delete(&Filter::eq("@id", "nope")).await.unwrap();
        assert_eq!(res, DeleteResult { deleted_count: 0 });
    }

    #[tokio::test]
    async fn test_update_validation_is_update_error() {
        let coll = manifests();
        coll.insert_one(manifest("a")).await.unwrap();

        let mut set = serde_json::Map::new();
        set.insert("canvasIds".into(), json!("not-an-array"));
        let err = coll.update_one(&Filter::eq("@id", "a"), Update::set(set)).await.unwrap_err();
        assert!(matches!(err, AiiinotateError::Update(_)));

        let err = coll
            .update_one(&Filter::eq("@id", "a"), Update::default().unset("@id"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiiinotateError::Update(_)));
    }

    #[tokio::test]
    async fn test_mixed_projection_is_read_error() {
        let coll = manifests();
        let err = coll.projection(&[("@id", true), ("canvasIds", false)]).unwrap_err();
        assert!(matches!(err, AiiinotateError::Read(ref ctx) if ctx.operation == "read"));
    }

    #[test]
    fn test_insert_result_serialization_omits_empty_extras() {
        let res = InsertResult::inserted(vec!["a".into()]);
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            json!({ "insertedCount": 1, "insertedIds": ["a"] })
        );

        let mut res = res;
        res.pre_existing_ids.push("b".into());
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["preExistingIds"], json!(["b"]));
        assert!(v.get("fetchErrorIds").is_none());
    }
}
