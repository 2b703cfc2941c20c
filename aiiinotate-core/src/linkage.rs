//! Links annotations to the manifests holding their target canvas.
//!
//! Distinct manifest URIs of a write are resolved once each, concurrently:
//! a manifest already in `manifests2` is reused, anything else is fetched,
//! reduced to a [`Manifest`] and stored. Fetch failures leave the affected
//! annotations unlinked and never fail the write.
//!
//! A stored manifest is found by `@id` or, since its `@id` need not match the
//! URI derived from a canvas, by `manifestShortId`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use crate::annotation::Annotation;
use crate::collection::Collection;
use crate::error::{AiiinotateError, FetchError, Result};
use crate::fetch::ManifestFetcher;
use crate::ids::canvas_uri_to_manifest_uri;
use crate::manifest::Manifest;
use crate::store::{Filter, Projection};

/// What a linkage pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkageReport {
    /// Manifests fetched and stored during this pass.
    pub fetched: Vec<String>,
    /// Manifest URIs that could not be resolved.
    pub unresolved: Vec<String>,
}

/// Fetch a manifest and reduce it to its canonical form, bounded by `timeout`.
pub async fn fetch_manifest(
    fetcher: &dyn ManifestFetcher,
    uri: &str,
    timeout: Duration,
) -> std::result::Result<Manifest, FetchError> {
    let raw = tokio::time::timeout(timeout, fetcher.fetch(uri))
        .await
        .map_err(|_| FetchError::Timeout {
            uri: uri.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })??;

    Manifest::from_iiif(&raw).map_err(|reason| FetchError::InvalidManifest {
        uri: uri.to_string(),
        reason,
    })
}

/// Set `manifestUri` and `canvasIdx` on every annotation.
///
/// Only store failures are returned as errors.
pub async fn link_manifests(
    manifests: &Collection,
    fetcher: &dyn ManifestFetcher,
    fetch_timeout: Duration,
    annotations: &mut [Annotation],
) -> Result<LinkageReport> {
    let mut groups: BTreeMap<String, ManifestRef<'_>> = BTreeMap::new();
    for annotation in annotations.iter() {
        groups
            .entry(canvas_uri_to_manifest_uri(&annotation.on.full))
            .or_insert_with(|| ManifestRef {
                short_id: &annotation.on.manifest_short_id,
                canvases: BTreeSet::new(),
            })
            .canvases
            .insert(&annotation.on.full);
    }

    let resolutions = join_all(
        groups
            .iter()
            .map(|(uri, target)| resolve_one(manifests, fetcher, fetch_timeout, uri, target)),
    )
    .await;

    let uris: Vec<String> = groups.into_keys().collect();
    let mut report = LinkageReport::default();
    let mut resolved: HashMap<&str, Manifest> = HashMap::with_capacity(uris.len());
    for (uri, resolution) in uris.iter().zip(resolutions) {
        match resolution? {
            Resolution::Stored(manifest) => {
                resolved.insert(uri.as_str(), manifest);
            }
            Resolution::Fetched(manifest) => {
                report.fetched.push(manifest.id.clone());
                resolved.insert(uri.as_str(), manifest);
            }
            Resolution::Unresolved => report.unresolved.push(uri.clone()),
        }
    }

    for annotation in annotations.iter_mut() {
        let uri = canvas_uri_to_manifest_uri(&annotation.on.full);
        match resolved.get(uri.as_str()) {
            Some(manifest) => {
                annotation.on.manifest_uri = Some(manifest.id.clone());
                annotation.on.canvas_idx = manifest.canvas_index(&annotation.on.full);
            }
            None => {
                annotation.on.manifest_uri = None;
                annotation.on.canvas_idx = None;
            }
        }
    }

    tracing::debug!(
        manifests = uris.len(),
        fetched = report.fetched.len(),
        unresolved = report.unresolved.len(),
        "Manifest linkage completed"
    );
    Ok(report)
}

/// Annotations of one write sharing a derived manifest URI.
struct ManifestRef<'a> {
    short_id: &'a str,
    canvases: BTreeSet<&'a str>,
}

enum Resolution {
    Stored(Manifest),
    Fetched(Manifest),
    Unresolved,
}

async fn resolve_one(
    manifests: &Collection,
    fetcher: &dyn ManifestFetcher,
    fetch_timeout: Duration,
    uri: &str,
    target: &ManifestRef<'_>,
) -> Result<Resolution> {
    if let Some(manifest) = stored_manifest(manifests, uri).await? {
        return Ok(Resolution::Stored(manifest));
    }
    if let Some(manifest) = stored_manifest_by_short_id(manifests, target).await? {
        tracing::debug!(manifest_uri = %uri, stored_id = %manifest.id, "Manifest found by short id");
        return Ok(Resolution::Stored(manifest));
    }

    let manifest = match fetch_manifest(fetcher, uri, fetch_timeout).await {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!(manifest_uri = %uri, error = %e, "Manifest fetch failed, leaving annotations unlinked");
            return Ok(Resolution::Unresolved);
        }
    };

    let doc = serde_json::to_value(&manifest)
        .map_err(|e| AiiinotateError::Normalization(format!("could not serialize manifest: {e}")))?;
    if manifests.insert_if_absent(doc).await? {
        tracing::info!(manifest_uri = %manifest.id, canvases = manifest.canvas_ids.len(), "Manifest stored");
    }
    Ok(Resolution::Fetched(manifest))
}

/// Stored manifest with this `@id`, if any.
pub(crate) async fn stored_manifest(manifests: &Collection, uri: &str) -> Result<Option<Manifest>> {
    let Some(doc) = manifests
        .find_one(&Filter::eq("@id", uri), &Projection::All)
        .await?
    else {
        return Ok(None);
    };
    decode_manifest(doc).map(Some)
}

/// Stored manifest sharing the annotations' `manifestShortId`.
///
/// Short ids can collide across hosts, so a manifest listing one of the
/// target canvases wins over the other candidates.
async fn stored_manifest_by_short_id(
    manifests: &Collection,
    target: &ManifestRef<'_>,
) -> Result<Option<Manifest>> {
    let candidates = manifests
        .find(&Filter::eq("manifestShortId", target.short_id), &Projection::All)
        .await?
        .into_iter()
        .map(decode_manifest)
        .collect::<Result<Vec<_>>>()?;

    let holds_target = |m: &Manifest| m.canvas_ids.iter().any(|c| target.canvases.contains(c.as_str()));
    let preferred = candidates.iter().position(holds_target).unwrap_or(0);
    Ok(candidates.into_iter().nth(preferred))
}

pub(crate) fn decode_manifest(doc: Value) -> Result<Manifest> {
    serde_json::from_value(doc)
        .map_err(|e| AiiinotateError::Normalization(format!("stored manifest is malformed: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::annotation::{normalize_annotation, IdPolicy};
    use crate::fetch::StaticManifestFetcher;
    use crate::manifest::fixtures::iiif_manifest;
    use crate::schema::DocumentSchema;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn manifests() -> Collection {
        Collection::new("manifests2", DocumentSchema::manifest2(), Arc::new(MemoryStore::new()))
    }

    fn annotation(target: &str) -> Annotation {
        normalize_annotation(
            json!({ "on": target, "resource": { "chars": "x" } }),
            IdPolicy::Mint { base_url: "http://localhost:3000" },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_distinct_manifests_fetched_once() {
        let coll = manifests();
        let fetcher = StaticManifestFetcher::empty()
            .with_manifest("https://ex.org/m1/manifest.json", iiif_manifest("https://ex.org/m1", 3));

        let mut anns = vec![
            annotation("https://ex.org/m1/canvas/c0#xywh=0,0,1,1"),
            annotation("https://ex.org/m1/canvas/c2"),
        ];
        let report = link_manifests(&coll, &fetcher, TIMEOUT, &mut anns).await.unwrap();

        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(report.fetched, vec!["https://ex.org/m1/manifest.json".to_string()]);
        assert_eq!(anns[0].on.canvas_idx, Some(0));
        assert_eq!(anns[1].on.canvas_idx, Some(2));
        assert_eq!(anns[1].on.manifest_uri.as_deref(), Some("https://ex.org/m1/manifest.json"));
        assert_eq!(coll.count(&Filter::All).await.unwrap(), 1);

        // Second pass reuses the stored manifest
        let mut more = vec![annotation("https://ex.org/m1/canvas/c1")];
        link_manifests(&coll, &fetcher, TIMEOUT, &mut more).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(more[0].on.canvas_idx, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_canvas_has_no_index() {
        let coll = manifests();
        let fetcher = StaticManifestFetcher::empty()
            .with_manifest("https://ex.org/m1/manifest.json", iiif_manifest("https://ex.org/m1", 2));

        let mut anns = vec![annotation("https://ex.org/m1/canvas/c9")];
        link_manifests(&coll, &fetcher, TIMEOUT, &mut anns).await.unwrap();
        assert!(anns[0].on.manifest_uri.is_some());
        assert_eq!(anns[0].on.canvas_idx, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_annotation_unlinked() {
        let coll = manifests();
        let fetcher = StaticManifestFetcher::empty()
            .with_manifest("https://ex.org/bad/manifest.json", json!({ "@id": "https://ex.org/bad/manifest.json" }));

        let mut anns = vec![
            annotation("https://ex.org/gone/canvas/c0"),
            annotation("https://ex.org/bad/canvas/c0"),
        ];
        let report = link_manifests(&coll, &fetcher, TIMEOUT, &mut anns).await.unwrap();

        assert_eq!(report.unresolved.len(), 2);
        assert!(anns.iter().all(|a| a.on.manifest_uri.is_none() && a.on.canvas_idx.is_none()));
        assert_eq!(coll.count(&Filter::All).await.unwrap(), 0);
    }

    /// A manifest served at `{prefix}/manifest.json` whose `@id` is `{prefix}/manifest`.
    fn manifest_with_short_id_only(prefix: &str, canvases: usize) -> Value {
        let mut raw = iiif_manifest(prefix, canvases);
        raw["@id"] = json!(format!("{prefix}/manifest"));
        raw
    }

    #[tokio::test]
    async fn test_manifest_with_other_id_is_not_refetched() {
        let coll = manifests();
        let fetcher = StaticManifestFetcher::empty().with_manifest(
            "https://ex.org/m1/manifest.json",
            manifest_with_short_id_only("https://ex.org/m1", 3),
        );

        for _ in 0..3 {
            let mut anns = vec![annotation("https://ex.org/m1/canvas/c1")];
            link_manifests(&coll, &fetcher, TIMEOUT, &mut anns).await.unwrap();
            assert_eq!(anns[0].on.manifest_uri.as_deref(), Some("https://ex.org/m1/manifest"));
            assert_eq!(anns[0].on.canvas_idx, Some(1));
        }

        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(coll.count(&Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stored_manifest_links_without_fetch() {
        let coll = manifests();
        let manifest = Manifest::from_iiif(&manifest_with_short_id_only("https://ex.org/m1", 2)).unwrap();
        coll.insert_one(serde_json::to_value(&manifest).unwrap()).await.unwrap();
        let fetcher = StaticManifestFetcher::empty();

        let mut anns = vec![annotation("https://ex.org/m1/canvas/c1")];
        let report = link_manifests(&coll, &fetcher, TIMEOUT, &mut anns).await.unwrap();

        assert_eq!(fetcher.fetch_count(), 0);
        assert!(report.fetched.is_empty() && report.unresolved.is_empty());
        assert_eq!(anns[0].on.manifest_uri.as_deref(), Some("https://ex.org/m1/manifest"));
        assert_eq!(anns[0].on.canvas_idx, Some(1));
    }

    #[tokio::test]
    async fn test_short_id_collision_prefers_manifest_holding_canvas() {
        let coll = manifests();
        for prefix in ["https://a.org/m1", "https://b.org/m1"] {
            let manifest = Manifest::from_iiif(&manifest_with_short_id_only(prefix, 2)).unwrap();
            coll.insert_one(serde_json::to_value(&manifest).unwrap()).await.unwrap();
        }

        let mut anns = vec![annotation("https://b.org/m1/canvas/c1")];
        link_manifests(&coll, &StaticManifestFetcher::empty(), TIMEOUT, &mut anns)
            .await
            .unwrap();
        assert_eq!(anns[0].on.manifest_uri.as_deref(), Some("https://b.org/m1/manifest"));
        assert_eq!(anns[0].on.canvas_idx, Some(1));
    }

    struct SlowFetcher;

    #[async_trait]
    impl ManifestFetcher for SlowFetcher {
        async fn fetch(&self, _uri: &str) -> std::result::Result<Value, FetchError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(iiif_manifest("https://ex.org/m1", 1))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_unresolved() {
        let err = fetch_manifest(&SlowFetcher, "https://ex.org/m1/manifest.json", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { timeout_ms: 20, .. }));

        let coll = manifests();
        let mut anns = vec![annotation("https://ex.org/m1/canvas/c0")];
        let report = link_manifests(&coll, &SlowFetcher, Duration::from_millis(20), &mut anns)
            .await
            .unwrap();
        assert_eq!(report.unresolved, vec!["https://ex.org/m1/manifest.json".to_string()]);
        assert!(anns[0].on.manifest_uri.is_none());
    }
}
