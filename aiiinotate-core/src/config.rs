//! Runtime configuration handed to [`crate::Aiiinotate::init`].

use std::time::Duration;

/// IIIF Presentation API version served by this crate.
pub const IIIF_PRESENTATION_2: u8 = 2;
/// IIIF Presentation 3 is recognised in routes but not implemented.
pub const IIIF_PRESENTATION_3: u8 = 3;
/// IIIF Search API versions accepted in routes.
pub const IIIF_SEARCH_1: u8 = 1;
pub const IIIF_SEARCH_2: u8 = 2;

pub const IIIF_PRESENTATION_2_CONTEXT: &str = "http://iiif.io/api/presentation/2/context.json";

/// Collection names used in the document store.
pub const ANNOTATIONS_2: &str = "annotations2";
pub const MANIFESTS_2: &str = "manifests2";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Public base URL used to mint annotation identifiers (no trailing slash).
    pub base_url: String,
    /// Upper bound for resolving a single manifest, retries included.
    pub fetch_timeout: Duration,
    /// Retries after the first attempt on transient fetch failures. Every
    /// attempt gets an equal share of `fetch_timeout`.
    pub fetch_max_retries: u32,
    pub fetch_initial_interval: Duration,
    pub fetch_max_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            fetch_timeout: Duration::from_secs(10),
            fetch_max_retries: 2,
            fetch_initial_interval: Duration::from_millis(200),
            fetch_max_interval: Duration::from_secs(2),
        }
    }
}

impl CoreConfig {
    /// Build a config for the given base URL, trailing slashes removed.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}
