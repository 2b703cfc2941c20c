//! Identifier derivation for IIIF Presentation 2.1 URIs.
//!
//! IIIF 2.1 recommends URI patterns such as
//! `{scheme}://{host}/{prefix}/{identifier}/canvas/{name}`. The helpers here
//! extract `{identifier}` (the manifest short id) and `{name}` (the canvas
//! short id) when a URI follows those patterns, and fall back to a stable
//! numeric hash of the whole URI when it does not.

use uuid::Uuid;

use crate::config::IIIF_PRESENTATION_2;

/// Path segments that follow the manifest identifier, in lookup priority order.
const RESERVED_SEGMENTS: [&str; 9] = [
    "manifest",
    "manifest.json",
    "sequence",
    "canvas",
    "annotation",
    "list",
    "range",
    "layer",
    "res",
];

/// 53-bit two-lane string hash, rendered as a decimal string.
///
/// The hash runs over UTF-16 code units so that the same string always
/// produces the same id regardless of where it was computed. Not suitable
/// for anything security related.
pub fn hash(input: &str) -> String {
    hash_with_seed(input, 0).to_string()
}

fn hash_with_seed(input: &str, seed: u32) -> u64 {
    let mut h1: u32 = 0xdead_beef ^ seed;
    let mut h2: u32 = 0x41c6_ce57 ^ seed;

    for unit in input.encode_utf16() {
        let ch = u32::from(unit);
        h1 = (h1 ^ ch).wrapping_mul(2_654_435_761);
        h2 = (h2 ^ ch).wrapping_mul(1_597_334_677);
    }

    h1 = (h1 ^ (h1 >> 16)).wrapping_mul(2_246_822_507);
    h1 ^= (h2 ^ (h2 >> 13)).wrapping_mul(3_266_489_909);
    h2 = (h2 ^ (h2 >> 16)).wrapping_mul(2_246_822_507);
    h2 ^= (h1 ^ (h1 >> 13)).wrapping_mul(3_266_489_909);

    (u64::from(h2 & 0x1f_ffff) << 32) | u64::from(h1)
}

/// Extract the manifest short id from any IIIF URI.
///
/// Returns the segment right before the first reserved keyword found,
/// otherwise the hash of the full URI.
pub fn manifest_short_id(uri: &str) -> String {
    let segments: Vec<&str> = uri.split('/').collect();

    RESERVED_SEGMENTS
        .iter()
        .find_map(|keyword| {
            let idx = segments.iter().position(|s| s == keyword)?;
            // A keyword in first position wraps around to the last segment
            let prev = idx.checked_sub(1).unwrap_or(segments.len() - 1);
            Some(segments[prev])
        })
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| hash(uri))
}

/// Extract the canvas short id from a canvas URI.
pub fn canvas_short_id(canvas_uri: &str) -> String {
    if canvas_uri.contains("/canvas/") {
        let last = canvas_uri.rsplit('/').next().unwrap_or_default();
        last.replace(".json", "")
    } else {
        hash(canvas_uri)
    }
}

/// Guess a manifest URI from a canvas URI following the IIIF 2.1 patterns.
///
/// `{prefix}/{identifier}/canvas/{name}` becomes `{prefix}/{identifier}/manifest.json`.
pub fn canvas_uri_to_manifest_uri(canvas_uri: &str) -> String {
    let segments: Vec<&str> = canvas_uri.split('/').collect();
    let keep = segments.len().saturating_sub(2);
    format!("{}/manifest.json", segments[..keep].join("/"))
}

/// Mint a fresh annotation identifier.
///
/// `{base_url}/data/2/{manifest_short_id}/annotation/{canvas_short_id}_{uuid}`
pub fn annotation_uri(base_url: &str, manifest_short_id: &str, canvas_short_id: &str) -> String {
    format!(
        "{}/data/{}/{}/annotation/{}_{}",
        base_url.trim_end_matches('/'),
        IIIF_PRESENTATION_2,
        manifest_short_id,
        canvas_short_id,
        Uuid::new_v4()
    )
}
