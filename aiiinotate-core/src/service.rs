//! The annotation server's operations, independent of any transport.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use url::Url;

use crate::annotation::{
    normalize_annotation, normalize_annotation_array, normalize_annotation_list, Annotation,
    IdPolicy,
};
use crate::collection::{Collection, DeleteResult, InsertResult, UpdateResult};
use crate::config::{CoreConfig, ANNOTATIONS_2, MANIFESTS_2};
use crate::error::{AiiinotateError, Result};
use crate::fetch::ManifestFetcher;
use crate::linkage::{decode_manifest, fetch_manifest, link_manifests, stored_manifest};
use crate::manifest::Manifest;
use crate::schema::DocumentSchema;
use crate::search::{
    canvas_filter, search_filter, AnnotationList, CanvasAnnotations, DeleteKey, ManifestCollection,
    MotivationFilter,
};
use crate::store::{DocumentStore, Filter, Projection, Update};

/// Field kept in storage for indexing but hidden from annotation reads.
const INTERNAL_FIELDS: [(&str, bool); 1] = [("on.manifestShortId", false)];

/// Handle on the annotation and manifest collections.
///
/// Create one per process with [`Aiiinotate::init`] and share it; every
/// method takes `&self`.
pub struct Aiiinotate {
    config: CoreConfig,
    store: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn ManifestFetcher>,
    annotations: Collection,
    manifests: Collection,
}

impl std::fmt::Debug for Aiiinotate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aiiinotate")
            .field("base_url", &self.config.base_url)
            .field("store", &self.store.backend())
            .field("fetcher", &self.fetcher.name())
            .finish()
    }
}

impl Aiiinotate {
    pub fn init(
        config: CoreConfig,
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn ManifestFetcher>,
    ) -> Self {
        tracing::info!(
            base_url = %config.base_url,
            store = store.backend(),
            fetcher = fetcher.name(),
            "Aiiinotate initialized"
        );
        Self {
            annotations: Collection::new(ANNOTATIONS_2, DocumentSchema::annotation2(), store.clone()),
            manifests: Collection::new(MANIFESTS_2, DocumentSchema::manifest2(), store.clone()),
            config,
            store,
            fetcher,
        }
    }

    pub async fn close(&self) {
        self.store.close().await;
        tracing::info!("Aiiinotate closed");
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn check_health(&self) -> bool {
        self.store.check_health().await
    }

    // ---- annotations ----

    pub async fn insert_annotation(&self, raw: Value) -> Result<InsertResult> {
        let mut annotation = normalize_annotation(raw, self.mint())?;
        self.link(std::slice::from_mut(&mut annotation)).await?;
        self.annotations.insert_one(annotation.to_document()?).await
    }

    /// Insert every annotation of an `sc:AnnotationList` in one batch.
    pub async fn insert_annotation_list(&self, raw: Value) -> Result<InsertResult> {
        let annotations = normalize_annotation_list(raw, &self.config.base_url)?;
        self.insert_batch(annotations).await
    }

    /// Insert a bare array of annotations in one batch.
    pub async fn insert_annotations(&self, raw: Vec<Value>) -> Result<InsertResult> {
        let annotations = normalize_annotation_array(raw, &self.config.base_url)?;
        self.insert_batch(annotations).await
    }

    async fn insert_batch(&self, mut annotations: Vec<Annotation>) -> Result<InsertResult> {
        self.link(&mut annotations).await?;
        let docs = annotations
            .iter()
            .map(Annotation::to_document)
            .collect::<Result<Vec<_>>>()?;
        self.annotations.insert_many(docs).await
    }

    /// Replace the fields of the annotation with the same `@id`.
    ///
    /// Fields absent from `raw` are kept, except the body which is removed
    /// when the update carries none.
    pub async fn update_annotation(&self, raw: Value) -> Result<UpdateResult> {
        let mut annotation = normalize_annotation(raw, IdPolicy::Keep)?;
        self.link(std::slice::from_mut(&mut annotation)).await?;

        let set = match annotation.to_document()? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut update = Update::set(set);
        if annotation.body.is_none() {
            update = update.unset("resource");
        }

        let result = self
            .annotations
            .update_one(&Filter::eq("@id", annotation.id.as_str()), update)
            .await?;
        if result.matched_count == 0 {
            tracing::debug!(id = %annotation.id, "No annotation to update");
        }
        Ok(result)
    }

    pub async fn delete_annotations(&self, key: DeleteKey, value: &str) -> Result<DeleteResult> {
        let result = self.annotations.delete(&key.annotation_filter(value)).await?;
        tracing::info!(key = key.as_str(), value, deleted = result.deleted_count, "Annotations deleted");
        Ok(result)
    }

    pub async fn get_annotation(&self, id: &str) -> Result<Value> {
        let projection = self.annotations.projection(&INTERNAL_FIELDS)?;
        self.annotations
            .find_one(&Filter::eq("@id", id), &projection)
            .await?
            .ok_or_else(|| AiiinotateError::NotFound(format!("no annotation with '@id' {id}")))
    }

    /// Annotations of a manifest, wrapped in a list whose `@id` is `query_url`.
    pub async fn search_annotations(
        &self,
        query_url: &str,
        manifest_short_id: &str,
        q: Option<&str>,
        motivation: Option<&str>,
    ) -> Result<AnnotationList> {
        let motivation = motivation.filter(|m| !m.is_empty()).map(MotivationFilter::parse);
        let filter = search_filter(manifest_short_id, q, motivation.as_ref());
        let projection = self.annotations.projection(&INTERNAL_FIELDS)?;
        let resources = self.annotations.find(&filter, &projection).await?;

        Ok(AnnotationList::new(
            query_url,
            Some(format!("search results for query {query_url}")),
            resources,
        ))
    }

    pub async fn find_annotations_by_canvas(
        &self,
        canvas_uri: &str,
        as_list: bool,
    ) -> Result<CanvasAnnotations> {
        let projection = self.annotations.projection(&INTERNAL_FIELDS)?;
        let resources = self.annotations.find(&canvas_filter(canvas_uri), &projection).await?;

        Ok(if as_list {
            CanvasAnnotations::List(AnnotationList::new(
                String::new(),
                Some(format!("annotations targeting canvas {canvas_uri}")),
                resources,
            ))
        } else {
            CanvasAnnotations::Items(resources)
        })
    }

    // ---- manifests ----

    /// Store a full IIIF manifest sent by the caller.
    pub async fn insert_manifest(&self, raw: Value) -> Result<InsertResult> {
        let manifest = Manifest::from_iiif(&raw).map_err(AiiinotateError::InvalidInput)?;
        self.store_manifest(manifest).await
    }

    /// Fetch the manifest at `uri` and store it. Fetch failures are errors.
    pub async fn insert_manifest_from_uri(&self, uri: &str) -> Result<InsertResult> {
        let uri = parse_http_uri(uri)?;
        if stored_manifest(&self.manifests, &uri).await?.is_some() {
            return Ok(InsertResult {
                pre_existing_ids: vec![uri],
                ..Default::default()
            });
        }
        let manifest = fetch_manifest(self.fetcher.as_ref(), &uri, self.config.fetch_timeout).await?;
        self.store_manifest(manifest).await
    }

    /// Insert an array whose items are manifests or manifest URIs.
    ///
    /// Failures of single items are reported in the result, not raised.
    pub async fn insert_manifests(&self, items: Vec<Value>) -> Result<InsertResult> {
        let results = join_all(
            items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| self.insert_manifest_item(idx, item)),
        )
        .await;

        let mut total = InsertResult::default();
        for result in results {
            total.absorb(result?);
        }
        Ok(total)
    }

    async fn insert_manifest_item(&self, idx: usize, item: Value) -> Result<InsertResult> {
        let key = match &item {
            Value::String(uri) => uri.clone(),
            other => other
                .get("@id")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{idx}"), str::to_string),
        };

        let outcome = match item {
            Value::String(uri) => self.insert_manifest_from_uri(&uri).await,
            raw => self.insert_manifest(raw).await,
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(AiiinotateError::Fetch(e)) => {
                tracing::warn!(manifest_uri = %e.uri(), error = %e, "Manifest fetch failed");
                Ok(InsertResult {
                    fetch_error_ids: vec![key],
                    ..Default::default()
                })
            }
            Err(AiiinotateError::InvalidInput(reason)) => {
                tracing::warn!(manifest = %key, reason = %reason, "Manifest rejected");
                let mut result = InsertResult::default();
                result.rejected_ids.insert(key, reason);
                Ok(result)
            }
            Err(e) => Err(e),
        }
    }

    async fn store_manifest(&self, manifest: Manifest) -> Result<InsertResult> {
        let id = manifest.id.clone();
        let doc = serde_json::to_value(&manifest)
            .map_err(|e| AiiinotateError::Normalization(format!("could not serialize manifest: {e}")))?;

        Ok(if self.manifests.insert_if_absent(doc).await? {
            tracing::info!(manifest_uri = %id, canvases = manifest.canvas_ids.len(), "Manifest stored");
            InsertResult::inserted(vec![id])
        } else {
            InsertResult {
                pre_existing_ids: vec![id],
                ..Default::default()
            }
        })
    }

    pub async fn delete_manifest(&self, key: DeleteKey, value: &str) -> Result<DeleteResult> {
        let result = self.manifests.delete(&key.manifest_filter(value)?).await?;
        tracing::info!(key = key.as_str(), value, deleted = result.deleted_count, "Manifests deleted");
        Ok(result)
    }

    /// Every stored manifest as an `sc:Collection`.
    pub async fn list_manifests(&self) -> Result<ManifestCollection> {
        let projection = self.manifests.projection(&[("@id", true)])?;
        let ids = self
            .manifests
            .find(&Filter::All, &projection)
            .await?
            .into_iter()
            .filter_map(|doc| doc.get("@id").and_then(Value::as_str).map(str::to_string));

        Ok(ManifestCollection::new(
            format!("{}/manifests/2", self.config.base_url),
            ids,
        ))
    }

    pub async fn find_manifest_by_short_id(&self, manifest_short_id: &str) -> Result<Manifest> {
        let doc = self
            .manifests
            .find_one(&Filter::eq("manifestShortId", manifest_short_id), &Projection::All)
            .await?
            .ok_or_else(|| {
                AiiinotateError::NotFound(format!("no manifest with short id {manifest_short_id}"))
            })?;
        decode_manifest(doc)
    }

    fn mint(&self) -> IdPolicy<'_> {
        IdPolicy::Mint {
            base_url: &self.config.base_url,
        }
    }

    async fn link(&self, annotations: &mut [Annotation]) -> Result<()> {
        let report = link_manifests(
            &self.manifests,
            self.fetcher.as_ref(),
            self.config.fetch_timeout,
            annotations,
        )
        .await?;
        if !report.unresolved.is_empty() {
            tracing::debug!(unresolved = ?report.unresolved, "Annotations stored without manifest linkage");
        }
        Ok(())
    }
}

fn parse_http_uri(uri: &str) -> Result<String> {
    let parsed = Url::parse(uri)
        .map_err(|e| AiiinotateError::InvalidInput(format!("invalid manifest URI '{uri}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(uri.to_string()),
        scheme => Err(AiiinotateError::InvalidInput(format!(
            "manifest URI must use http or https, got '{scheme}'"
        ))),
    }
}
