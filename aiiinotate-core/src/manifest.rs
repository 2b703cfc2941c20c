//! Canonical manifest: identifier, short id and ordered canvas ids.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::manifest_short_id;

/// Stored manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Manifest {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "manifestShortId")]
    pub short_id: String,
    /// Canvas identifiers in manifest order. The position defines `canvasIdx`.
    #[serde(rename = "canvasIds")]
    pub canvas_ids: Vec<String>,
}

impl Manifest {
    /// Reduce a IIIF Presentation 2.1 manifest to its canonical form.
    ///
    /// The manifest must have an `@id` and a first sequence whose canvases
    /// all carry an `@id`. The error is a human readable reason.
    pub fn from_iiif(raw: &Value) -> Result<Self, String> {
        let id = raw
            .get("@id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or("manifest has no '@id'")?;

        let sequence = raw
            .get("sequences")
            .and_then(Value::as_array)
            .and_then(|sequences| sequences.first())
            .ok_or("manifest has no sequence")?;

        let canvases = sequence
            .get("canvases")
            .and_then(Value::as_array)
            .ok_or("manifest sequence has no 'canvases' array")?;

        let canvas_ids = canvases
            .iter()
            .enumerate()
            .map(|(idx, canvas)| {
                canvas
                    .get("@id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| format!("canvas {idx} has no '@id'"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: id.to_string(),
            short_id: manifest_short_id(id),
            canvas_ids,
        })
    }

    /// Position of a canvas in this manifest.
    pub fn canvas_index(&self, canvas_uri: &str) -> Option<usize> {
        self.canvas_ids.iter().position(|c| c == canvas_uri)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_iiif_keeps_canvas_order() {
        let raw = fixtures::iiif_manifest("https://ex.org/iiif/m1", 3);
        let manifest = Manifest::from_iiif(&raw).unwrap();
        assert_eq!(manifest.id, "https://ex.org/iiif/m1/manifest.json");
        assert_eq!(manifest.short_id, "m1");
        assert_eq!(manifest.canvas_ids.len(), 3);
        assert_eq!(manifest.canvas_index("https://ex.org/iiif/m1/canvas/c2"), Some(2));
        assert_eq!(manifest.canvas_index("https://ex.org/iiif/m1/canvas/c9"), None);
    }

    #[test]
    fn test_from_iiif_rejects_malformed_manifests() {
        let bad = [
            json!({ "sequences": [{ "canvases": [] }] }),
            json!({ "@id": "https://ex.org/m/manifest" }),
            json!({ "@id": "https://ex.org/m/manifest", "sequences": [] }),
            json!({ "@id": "https://ex.org/m/manifest", "sequences": [{}] }),
            json!({ "@id": "https://ex.org/m/manifest", "sequences": [{ "canvases": [{ "label": "x" }] }] }),
        ];
        for raw in bad {
            assert!(Manifest::from_iiif(&raw).is_err(), "should reject {raw}");
        }
    }

    #[test]
    fn test_serialized_shape() {
        let manifest = Manifest::from_iiif(&fixtures::iiif_manifest("https://ex.org/iiif/m1", 1)).unwrap();
        let doc = serde_json::to_value(&manifest).unwrap();
        assert_eq!(doc["@id"], "https://ex.org/iiif/m1/manifest.json");
        assert_eq!(doc["manifestShortId"], "m1");
        assert_eq!(doc["canvasIds"], json!(["https://ex.org/iiif/m1/canvas/c0"]));
    }
}
