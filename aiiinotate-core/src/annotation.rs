//! Canonical IIIF 2.1 annotation model and the normalizer that produces it.
//!
//! Incoming annotations mix Open Annotation and IIIF conventions
//! (`oa:Motivation` vs `motivation`, `cnt:chars` vs `chars`, bare URIs vs
//! `oa:SpecificResource` targets). [`normalize_annotation`] folds all of
//! them into one stored shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::IIIF_PRESENTATION_2_CONTEXT;
use crate::error::{AiiinotateError, Result};
use crate::ids::{annotation_uri, canvas_short_id};
use crate::one_or_many::OneOrMany;
use crate::target::{json_kind, resolve_target, SpecificResource};

pub const ANNOTATION_LIST: &str = "sc:AnnotationList";
pub const PAINTING: &str = "sc:painting";
pub const DEFAULT_MOTIVATION: &str = "oa:commenting";

const NAMESPACES: [&str; 2] = ["oa:", "sc:"];
const EMPTY_HTML_BODY: &str = "<p></p>";

/// Annotation body: a referenced resource (`@id`) or an embedded textual body (`chars`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Body {
    /// A body carrying neither an external id nor meaningful text.
    pub fn is_empty(&self) -> bool {
        self.id.as_deref().map_or(true, str::is_empty)
            && self
                .chars
                .as_deref()
                .map_or(true, |c| c.is_empty() || c == EMPTY_HTML_BODY)
    }
}

/// Stored annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub on: SpecificResource,
    pub motivation: Vec<String>,
    #[serde(rename = "resource", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<OneOrMany<Body>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn to_document(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| AiiinotateError::Normalization(format!("could not serialize annotation: {e}")))
    }
}

/// How the annotation identifier is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy<'a> {
    /// Mint a fresh identifier under this base URL.
    Mint { base_url: &'a str },
    /// Keep the caller-supplied `@id` (updates).
    Keep,
}

/// Normalize a single raw annotation.
pub fn normalize_annotation(raw: Value, ids: IdPolicy<'_>) -> Result<Annotation> {
    let mut map = match raw {
        Value::Object(map) => map,
        other => {
            return Err(AiiinotateError::Normalization(format!(
                "an annotation must be a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let raw_target = map
        .remove("on")
        .ok_or_else(|| AiiinotateError::TargetResolution("annotation has no 'on' field".into()))?;
    let on = resolve_target(&raw_target)?;

    let supplied_id = map.remove("@id");
    let id = match ids {
        IdPolicy::Mint { base_url } => {
            annotation_uri(base_url, &on.manifest_short_id, &canvas_short_id(&on.full))
        }
        IdPolicy::Keep => match supplied_id {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => {
                return Err(AiiinotateError::InvalidInput(
                    "updating an annotation requires its '@id'".into(),
                ))
            }
        },
    };

    map.remove("@context");

    // `oa:Motivation` takes precedence over `motivation` when both are sent
    let raw_motivation = match map.remove("oa:Motivation") {
        Some(m) => {
            map.remove("motivation");
            Some(m)
        }
        None => map.remove("motivation"),
    };
    let motivation = normalize_motivation(raw_motivation)?;

    let body = match map.remove("resource") {
        None | Some(Value::Null) => None,
        Some(raw_body) => normalize_body(raw_body)?,
    };

    Ok(Annotation {
        context: IIIF_PRESENTATION_2_CONTEXT.to_string(),
        id,
        on,
        motivation,
        body,
        extra: map,
    })
}

/// Validate an `sc:AnnotationList` wrapper and normalize every annotation in it.
pub fn normalize_annotation_list(raw: Value, base_url: &str) -> Result<Vec<Annotation>> {
    let resources = match raw {
        Value::Object(mut map) => {
            if map.get("@type").and_then(Value::as_str) != Some(ANNOTATION_LIST) {
                return Err(AiiinotateError::Normalization(format!(
                    "an annotation list must have '@type': '{ANNOTATION_LIST}'"
                )));
            }
            if !map.contains_key("@id") {
                return Err(AiiinotateError::Normalization(
                    "an annotation list must have an '@id'".into(),
                ));
            }
            match map.remove("resources") {
                Some(Value::Array(resources)) => resources,
                _ => {
                    return Err(AiiinotateError::Normalization(
                        "an annotation list must have a 'resources' array".into(),
                    ))
                }
            }
        }
        other => {
            return Err(AiiinotateError::Normalization(format!(
                "an annotation list must be a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    normalize_annotation_array(resources, base_url)
}

/// Normalize a bare array of annotations.
pub fn normalize_annotation_array(raw: Vec<Value>, base_url: &str) -> Result<Vec<Annotation>> {
    raw.into_iter()
        .map(|annotation| normalize_annotation(annotation, IdPolicy::Mint { base_url }))
        .collect()
}

/// Canonical form of one motivation value.
///
/// `oa:` and `sc:` values are kept, bare `painting` becomes `sc:painting`,
/// anything else is placed in the `oa:` namespace.
pub fn canonical_motivation(value: &str) -> String {
    let value = value.trim();
    if NAMESPACES.iter().any(|ns| value.starts_with(ns)) {
        value.to_string()
    } else if value == "painting" {
        PAINTING.to_string()
    } else {
        format!("oa:{value}")
    }
}

fn normalize_motivation(raw: Option<Value>) -> Result<Vec<String>> {
    let values = match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value::<OneOrMany<Value>>(raw)
            .map_err(|e| AiiinotateError::Normalization(format!("invalid motivation: {e}")))?
            .into_vec(),
    };

    let mut motivation: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let text = match value {
            Value::String(s) => s,
            Value::Null => continue,
            other => other.to_string(),
        };
        if text.trim().is_empty() {
            continue;
        }
        let canonical = canonical_motivation(&text);
        if !motivation.contains(&canonical) {
            motivation.push(canonical);
        }
    }

    if motivation.is_empty() {
        motivation.push(DEFAULT_MOTIVATION.to_string());
    }
    Ok(motivation)
}

fn normalize_body(raw: Value) -> Result<Option<OneOrMany<Body>>> {
    let bodies = serde_json::from_value::<OneOrMany<Value>>(raw)
        .map_err(|e| AiiinotateError::Normalization(format!("invalid resource: {e}")))?;
    let bodies = bodies.try_map(canonical_body)?;
    Ok(bodies.retain(|body| !body.is_empty()))
}

fn canonical_body(raw: Value) -> Result<Body> {
    let mut map = match raw {
        Value::Object(map) => map,
        // A bare URI is a referenced body
        Value::String(id) => {
            let mut map = Map::new();
            map.insert("@id".into(), Value::String(id));
            map
        }
        other => {
            return Err(AiiinotateError::Normalization(format!(
                "a resource must be an object or a URI, got {}",
                json_kind(&other)
            )))
        }
    };

    if map.get("@type").and_then(Value::as_str) == Some("cnt:ContentAsText") {
        map.insert("@type".into(), Value::String("dctypes:Text".into()));
    }

    let value = map.remove("value");
    let cnt_chars = map.remove("cnt:chars");
    let chars = map.remove("chars");
    let text = [value, cnt_chars, chars]
        .into_iter()
        .flatten()
        .find(|v| v.as_str().map_or(!v.is_null(), |s| !s.is_empty()));
    if let Some(text) = text {
        map.insert("chars".into(), text);
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|e| AiiinotateError::Normalization(format!("malformed resource: {e}")))
}
