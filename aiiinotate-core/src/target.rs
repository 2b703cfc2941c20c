//! Annotation target resolution.
//!
//! An Open Annotation `on` field is either a bare URI (optionally carrying a
//! media fragment after `#`) or an `oa:SpecificResource` object. Both are
//! resolved into a [`SpecificResource`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AiiinotateError, Result};
use crate::ids::manifest_short_id;

pub const SPECIFIC_RESOURCE: &str = "oa:SpecificResource";
pub const FRAGMENT_SELECTOR: &str = "oa:FragmentSelector";

/// Keys computed by the server; client-supplied values are discarded.
const DERIVED_KEYS: [&str; 3] = ["manifestShortId", "manifestUri", "canvasIdx"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Selector {
    pub fn fragment(value: impl Into<String>) -> Self {
        Self {
            kind: Some(FRAGMENT_SELECTOR.to_string()),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

/// Canonical annotation target: the full canvas URI plus a region selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificResource {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@type")]
    pub kind: String,
    /// Canvas URI, without fragment.
    pub full: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    #[serde(rename = "manifestShortId", default, skip_serializing_if = "String::is_empty")]
    pub manifest_short_id: String,
    #[serde(rename = "manifestUri", default, skip_serializing_if = "Option::is_none")]
    pub manifest_uri: Option<String>,
    #[serde(rename = "canvasIdx", default, skip_serializing_if = "Option::is_none")]
    pub canvas_idx: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resolve a raw `on` value into a [`SpecificResource`]. Never performs I/O.
pub fn resolve_target(raw: &Value) -> Result<SpecificResource> {
    let mut target = match raw {
        Value::String(uri) => from_uri(uri)?,
        Value::Object(map) => from_object(map)?,
        other => {
            return Err(AiiinotateError::TargetResolution(format!(
                "'on' must be a URI or an {SPECIFIC_RESOURCE} object, got {}",
                json_kind(other)
            )))
        }
    };
    target.manifest_short_id = manifest_short_id(&target.full);
    Ok(target)
}

fn from_uri(uri: &str) -> Result<SpecificResource> {
    let (full, fragment) = match uri.split_once('#') {
        Some((full, fragment)) => (full, Some(fragment)),
        None => (uri, None),
    };
    if full.trim().is_empty() {
        return Err(AiiinotateError::TargetResolution(format!(
            "'on' is not a valid canvas URI: '{uri}'"
        )));
    }

    Ok(SpecificResource {
        id: Some(uri.to_string()),
        kind: SPECIFIC_RESOURCE.to_string(),
        full: full.to_string(),
        selector: fragment.filter(|f| !f.is_empty()).map(Selector::fragment),
        manifest_short_id: String::new(),
        manifest_uri: None,
        canvas_idx: None,
        extra: Map::new(),
    })
}

fn from_object(map: &Map<String, Value>) -> Result<SpecificResource> {
    if map.get("@type").and_then(Value::as_str) != Some(SPECIFIC_RESOURCE) {
        return Err(AiiinotateError::TargetResolution(format!(
            "'on' object must have '@type': '{SPECIFIC_RESOURCE}'"
        )));
    }
    match map.get("full").and_then(Value::as_str) {
        Some(full) if !full.trim().is_empty() => {}
        _ => {
            return Err(AiiinotateError::TargetResolution(
                "'on.full' must be a non-empty URI".to_string(),
            ))
        }
    }

    let mut map = map.clone();
    for key in DERIVED_KEYS {
        map.remove(key);
    }
    // Some clients type selectors with `type` instead of `@type`
    if let Some(Value::Object(selector)) = map.get_mut("selector") {
        if let Some(kind) = selector.remove("type") {
            selector.insert("@type".to_string(), kind);
        }
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|e| AiiinotateError::TargetResolution(format!("malformed 'on' object: {e}")))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
