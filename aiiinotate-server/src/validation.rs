//! Request validation helpers shared by the handlers.

use aiiinotate_core::config::{IIIF_PRESENTATION_2, IIIF_PRESENTATION_3, IIIF_SEARCH_1, IIIF_SEARCH_2};
use aiiinotate_core::DeleteKey;
use serde::Deserialize;

use crate::error::ApiError;

/// Only IIIF Presentation 2 is served.
pub fn presentation_version(version: u8) -> Result<(), ApiError> {
    match version {
        IIIF_PRESENTATION_2 => Ok(()),
        IIIF_PRESENTATION_3 => Err(ApiError::not_implemented(
            "IIIF Presentation 3 is not supported yet",
        )),
        other => Err(ApiError::bad_request(format!(
            "unknown IIIF Presentation version {other}"
        ))),
    }
}

/// Only IIIF Search 1 is served.
pub fn search_version(version: u8) -> Result<(), ApiError> {
    match version {
        IIIF_SEARCH_1 => Ok(()),
        IIIF_SEARCH_2 => Err(ApiError::not_implemented("IIIF Search 2 is not supported yet")),
        other => Err(ApiError::bad_request(format!("unknown IIIF Search version {other}"))),
    }
}

/// `?uri=` | `?manifestShortId=` | `?canvasUri=` query of delete routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    pub uri: Option<String>,
    pub manifest_short_id: Option<String>,
    pub canvas_uri: Option<String>,
}

impl DeleteQuery {
    /// The single key/value pair given. Zero or several keys are rejected.
    pub fn single_key(self) -> Result<(DeleteKey, String), ApiError> {
        let given: Vec<(DeleteKey, String)> = [
            (DeleteKey::Uri, self.uri),
            (DeleteKey::ManifestShortId, self.manifest_short_id),
            (DeleteKey::CanvasUri, self.canvas_uri),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
        .collect();

        match <[_; 1]>::try_from(given) {
            Ok([pair]) => Ok(pair),
            Err(given) => Err(ApiError::bad_request(format!(
                "expected exactly one of 'uri', 'manifestShortId', 'canvasUri', got {}",
                given.len()
            ))),
        }
    }
}
