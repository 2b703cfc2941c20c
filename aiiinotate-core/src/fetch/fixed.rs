use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::ManifestFetcher;
use crate::error::FetchError;

/// Serves manifests from an in-process map and records every fetch.
///
/// Unknown URIs fail with [`FetchError::Unavailable`], so an empty fetcher
/// leaves every unseen manifest unresolved.
#[derive(Debug, Default)]
pub struct StaticManifestFetcher {
    manifests: DashMap<String, Value>,
    calls: DashMap<String, usize>,
    total: AtomicUsize,
}

impl StaticManifestFetcher {
    /// A fetcher that knows no manifests.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_manifest(self, uri: impl Into<String>, manifest: Value) -> Self {
        self.insert(uri, manifest);
        self
    }

    pub fn insert(&self, uri: impl Into<String>, manifest: Value) {
        self.manifests.insert(uri.into(), manifest);
    }

    /// Total number of fetch calls, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn fetch_count_for(&self, uri: &str) -> usize {
        self.calls.get(uri).map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl ManifestFetcher for StaticManifestFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.entry(uri.to_string()).or_insert(0) += 1;

        self.manifests
            .get(uri)
            .map(|m| m.value().clone())
            .ok_or_else(|| FetchError::Unavailable { uri: uri.to_string() })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_counts_every_call() {
        let fetcher = StaticManifestFetcher::empty().with_manifest("https://ex.org/m", json!({ "@id": "m" }));

        assert_eq!(fetcher.fetch("https://ex.org/m").await.unwrap(), json!({ "@id": "m" }));
        let err = fetcher.fetch("https://ex.org/other").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable { .. }));
        fetcher.fetch("https://ex.org/m").await.unwrap();

        assert_eq!(fetcher.fetch_count(), 3);
        assert_eq!(fetcher.fetch_count_for("https://ex.org/m"), 2);
        assert_eq!(fetcher.fetch_count_for("https://ex.org/nope"), 0);
    }
}
