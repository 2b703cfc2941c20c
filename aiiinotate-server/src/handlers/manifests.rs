//! Manifest handlers

use aiiinotate_core::{DeleteResult, InsertResult, Manifest, ManifestCollection};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{presentation_version, DeleteQuery};

/// Every stored manifest as an `sc:Collection`.
#[utoipa::path(
    get,
    path = "/manifests/{version}",
    tag = "Manifests",
    params(("version" = u8, Path, description = "IIIF Presentation version")),
    responses((status = 200, description = "Stored manifests", body = ManifestCollection))
)]
pub async fn list_manifests_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
) -> Result<Json<ManifestCollection>, ApiError> {
    presentation_version(version)?;
    Ok(Json(state.service.list_manifests().await?))
}

/// The stored canonical manifest with this short id.
#[utoipa::path(
    get,
    path = "/data/{version}/{manifestShortId}/index",
    tag = "Manifests",
    params(
        ("version" = u8, Path, description = "IIIF Presentation version"),
        ("manifestShortId" = String, Path, description = "Manifest short id")
    ),
    responses(
        (status = 200, description = "The manifest", body = Manifest),
        (status = 404, description = "No such manifest")
    )
)]
pub async fn get_manifest_handler(
    State(state): State<AppState>,
    Path((version, manifest_short_id)): Path<(u8, String)>,
) -> Result<Json<Manifest>, ApiError> {
    presentation_version(version)?;
    Ok(Json(state.service.find_manifest_by_short_id(&manifest_short_id).await?))
}

/// Store manifests.
///
/// The body is one of:
/// - `{ "uri": "..." }`: fetch the manifest at that URI
/// - a IIIF 2.1 manifest
/// - an array of manifests and manifest URIs, with per-item outcomes
#[utoipa::path(
    post,
    path = "/manifests/{version}/create",
    tag = "Manifests",
    params(("version" = u8, Path, description = "IIIF Presentation version")),
    responses(
        (status = 200, description = "Insert result", body = InsertResult),
        (status = 400, description = "Invalid manifest or URI"),
        (status = 502, description = "The manifest URI could not be fetched")
    )
)]
pub async fn create_manifest_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InsertResult>, ApiError> {
    presentation_version(version)?;
    let Json(raw) = body?;

    let result = match raw {
        Value::Array(items) => state.service.insert_manifests(items).await?,
        Value::Object(ref map) if !map.contains_key("@id") => {
            let uri = map
                .get("uri")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::bad_request("expected a manifest or a 'uri' field"))?;
            state.service.insert_manifest_from_uri(uri).await?
        }
        manifest => state.service.insert_manifest(manifest).await?,
    };
    Ok(Json(result))
}

/// Delete manifests by `uri` or `manifestShortId`.
#[utoipa::path(
    delete,
    path = "/manifests/{version}/delete",
    tag = "Manifests",
    params(
        ("version" = u8, Path, description = "IIIF Presentation version"),
        ("uri" = Option<String>, Query, description = "Manifest '@id'"),
        ("manifestShortId" = Option<String>, Query, description = "Manifest short id")
    ),
    responses(
        (status = 200, description = "Delete result", body = DeleteResult),
        (status = 400, description = "Zero, several or unsupported keys")
    )
)]
pub async fn delete_manifest_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<DeleteResult>, ApiError> {
    presentation_version(version)?;
    let Query(query) = query?;
    let (key, value) = query.single_key()?;
    Ok(Json(state.service.delete_manifest(key, &value).await?))
}
