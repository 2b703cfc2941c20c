//! Retrieval of externally hosted IIIF manifests.
//!
//! Manifest linkage is the only component that reaches out to the network,
//! and it does so through the [`ManifestFetcher`] trait so the transport can
//! be swapped:
//!
//! - [`HttpManifestFetcher`]: `reqwest` with retry and backoff (feature `http`)
//! - [`StaticManifestFetcher`]: an in-process map, for tests and offline imports

mod fixed;
#[cfg(feature = "http")]
mod http;

pub use fixed::StaticManifestFetcher;
#[cfg(feature = "http")]
pub use http::{is_transient_error, is_transient_status, HttpManifestFetcher};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// Source of raw manifest JSON, keyed by manifest URI.
///
/// Implementations must be thread-safe: one fetcher is shared by every
/// request handled by the service.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the JSON representation of the manifest at `uri`.
    ///
    /// The returned value is not validated; callers reduce it with
    /// [`Manifest::from_iiif`](crate::manifest::Manifest::from_iiif).
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError>;

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}
