//! Query builders and IIIF response envelopes for annotation and manifest reads.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotation::{canonical_motivation, ANNOTATION_LIST, PAINTING};
use crate::config::IIIF_PRESENTATION_2_CONTEXT;
use crate::error::AiiinotateError;
use crate::store::Filter;

pub const COLLECTION: &str = "sc:Collection";
pub const MANIFEST: &str = "sc:Manifest";

/// Restriction on annotation motivation in a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotivationFilter {
    Painting,
    NonPainting,
    /// Any other motivation, stored in canonical namespaced form.
    Other(String),
}

impl MotivationFilter {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "painting" | PAINTING => Self::Painting,
            "non-painting" => Self::NonPainting,
            other => Self::Other(canonical_motivation(other)),
        }
    }

    fn to_filter(&self) -> Filter {
        match self {
            Self::Painting => Filter::eq("motivation", PAINTING),
            Self::NonPainting => Filter::ne("motivation", PAINTING),
            Self::Other(motivation) => Filter::eq("motivation", motivation.as_str()),
        }
    }
}

/// Annotations of a manifest, optionally narrowed by an exact text query and a motivation.
///
/// `q` must equal the annotation `@id`, the body `@id` or the body text.
pub fn search_filter(
    manifest_short_id: &str,
    q: Option<&str>,
    motivation: Option<&MotivationFilter>,
) -> Filter {
    let mut clauses = vec![Filter::eq("on.manifestShortId", manifest_short_id)];
    if let Some(q) = q.filter(|q| !q.is_empty()) {
        clauses.push(Filter::Or(vec![
            Filter::eq("@id", q),
            Filter::eq("resource.@id", q),
            Filter::eq("resource.chars", q),
        ]));
    }
    if let Some(motivation) = motivation {
        clauses.push(motivation.to_filter());
    }
    Filter::and(clauses)
}

/// Annotations whose target is exactly this canvas URI.
pub fn canvas_filter(canvas_uri: &str) -> Filter {
    Filter::eq("on.full", canvas_uri)
}

/// Field selecting the annotations to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKey {
    Uri,
    ManifestShortId,
    CanvasUri,
}

impl DeleteKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::ManifestShortId => "manifestShortId",
            Self::CanvasUri => "canvasUri",
        }
    }

    /// Predicate on stored annotations.
    pub fn annotation_filter(self, value: &str) -> Filter {
        match self {
            Self::Uri => Filter::eq("@id", value),
            Self::ManifestShortId => Filter::eq("on.manifestShortId", value),
            Self::CanvasUri => canvas_filter(value),
        }
    }

    /// Predicate on stored manifests. Canvas URIs do not identify a manifest.
    pub fn manifest_filter(self, value: &str) -> Result<Filter, AiiinotateError> {
        match self {
            Self::Uri => Ok(Filter::eq("@id", value)),
            Self::ManifestShortId => Ok(Filter::eq("manifestShortId", value)),
            Self::CanvasUri => Err(AiiinotateError::InvalidInput(
                "manifests can only be deleted by 'uri' or 'manifestShortId'".into(),
            )),
        }
    }
}

impl FromStr for DeleteKey {
    type Err = AiiinotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uri" => Ok(Self::Uri),
            "manifestShortId" => Ok(Self::ManifestShortId),
            "canvasUri" => Ok(Self::CanvasUri),
            other => Err(AiiinotateError::InvalidInput(format!(
                "unknown delete key '{other}', expected one of 'uri', 'manifestShortId', 'canvasUri'"
            ))),
        }
    }
}

/// `sc:AnnotationList` response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnnotationList {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub resources: Vec<Value>,
}

impl AnnotationList {
    pub fn new(id: impl Into<String>, label: Option<String>, resources: Vec<Value>) -> Self {
        Self {
            context: IIIF_PRESENTATION_2_CONTEXT.to_string(),
            kind: ANNOTATION_LIST.to_string(),
            id: id.into(),
            label,
            resources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CollectionMember {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
}

/// `sc:Collection` listing every stored manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ManifestCollection {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub label: String,
    pub members: Vec<CollectionMember>,
}

impl ManifestCollection {
    pub fn new(id: impl Into<String>, manifest_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            context: IIIF_PRESENTATION_2_CONTEXT.to_string(),
            kind: COLLECTION.to_string(),
            id: id.into(),
            label: "All manifests stored".to_string(),
            members: manifest_ids
                .into_iter()
                .map(|id| CollectionMember {
                    id,
                    kind: MANIFEST.to_string(),
                })
                .collect(),
        }
    }
}

/// Annotations on a canvas, bare or wrapped in an annotation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanvasAnnotations {
    List(AnnotationList),
    Items(Vec<Value>),
}
