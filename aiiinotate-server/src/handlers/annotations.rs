//! Annotation handlers
//!
//! Write routes accept IIIF Presentation 2.1 annotations in any of the
//! shapes the normalizer understands; read routes return stored annotations.

use aiiinotate_core::{CanvasAnnotations, DeleteResult, InsertResult, UpdateResult};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{presentation_version, DeleteQuery};

/// `?uri=&asAnnotationList=` query of the canvas lookup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasQuery {
    /// Canvas URI, matched exactly against the annotation target.
    pub uri: String,
    #[serde(default)]
    pub as_annotation_list: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnnotationQuery {
    pub uri: String,
}

/// Create one annotation. Its `@id` is minted by the server.
#[utoipa::path(
    post,
    path = "/annotations/{version}/create",
    tag = "Annotations",
    params(("version" = u8, Path, description = "IIIF Presentation version")),
    responses(
        (status = 200, description = "Annotation stored", body = InsertResult),
        (status = 400, description = "Malformed annotation or target"),
        (status = 501, description = "IIIF Presentation 3")
    )
)]
pub async fn create_annotation_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InsertResult>, ApiError> {
    presentation_version(version)?;
    let Json(raw) = body?;
    Ok(Json(state.service.insert_annotation(raw).await?))
}

/// Create many annotations from an `sc:AnnotationList` or a JSON array.
///
/// Manifests referenced by the batch are resolved once each.
#[utoipa::path(
    post,
    path = "/annotations/{version}/createMany",
    tag = "Annotations",
    params(("version" = u8, Path, description = "IIIF Presentation version")),
    responses(
        (status = 200, description = "Annotations stored", body = InsertResult),
        (status = 400, description = "Malformed list or annotation"),
        (status = 501, description = "IIIF Presentation 3")
    )
)]
pub async fn create_annotations_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InsertResult>, ApiError> {
    presentation_version(version)?;
    let Json(raw) = body?;
    let result = match raw {
        Value::Array(items) => state.service.insert_annotations(items).await?,
        list => state.service.insert_annotation_list(list).await?,
    };
    Ok(Json(result))
}

/// Update the annotation identified by the body's `@id`.
#[utoipa::path(
    post,
    path = "/annotations/{version}/update",
    tag = "Annotations",
    params(("version" = u8, Path, description = "IIIF Presentation version")),
    responses(
        (status = 200, description = "Update result", body = UpdateResult),
        (status = 400, description = "Malformed annotation or missing '@id'")
    )
)]
pub async fn update_annotation_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdateResult>, ApiError> {
    presentation_version(version)?;
    let Json(raw) = body?;
    Ok(Json(state.service.update_annotation(raw).await?))
}

/// Delete annotations by `uri`, `manifestShortId` or `canvasUri`.
#[utoipa::path(
    delete,
    path = "/annotations/{version}/delete",
    tag = "Annotations",
    params(
        ("version" = u8, Path, description = "IIIF Presentation version"),
        ("uri" = Option<String>, Query, description = "Annotation '@id'"),
        ("manifestShortId" = Option<String>, Query, description = "Short id of the target manifest"),
        ("canvasUri" = Option<String>, Query, description = "Exact target canvas URI")
    ),
    responses(
        (status = 200, description = "Delete result", body = DeleteResult),
        (status = 400, description = "Zero or several keys given")
    )
)]
pub async fn delete_annotations_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<DeleteResult>, ApiError> {
    presentation_version(version)?;
    let Query(query) = query?;
    let (key, value) = query.single_key()?;
    Ok(Json(state.service.delete_annotations(key, &value).await?))
}

/// Annotations targeting a canvas, bare or as an `sc:AnnotationList`.
#[utoipa::path(
    get,
    path = "/annotations/{version}/search",
    tag = "Annotations",
    params(
        ("version" = u8, Path, description = "IIIF Presentation version"),
        ("uri" = String, Query, description = "Canvas URI"),
        ("asAnnotationList" = Option<bool>, Query, description = "Wrap results in an annotation list")
    ),
    responses((status = 200, description = "Annotations on the canvas", body = aiiinotate_core::AnnotationList))
)]
pub async fn annotations_by_canvas_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    query: Result<Query<CanvasQuery>, QueryRejection>,
) -> Result<Json<CanvasAnnotations>, ApiError> {
    presentation_version(version)?;
    let Query(query) = query?;
    let found = state
        .service
        .find_annotations_by_canvas(&query.uri, query.as_annotation_list)
        .await?;
    Ok(Json(found))
}

/// A single annotation by `@id`.
#[utoipa::path(
    get,
    path = "/annotations/{version}/get",
    tag = "Annotations",
    params(
        ("version" = u8, Path, description = "IIIF Presentation version"),
        ("uri" = String, Query, description = "Annotation '@id'")
    ),
    responses(
        (status = 200, description = "The annotation"),
        (status = 404, description = "No such annotation")
    )
)]
pub async fn get_annotation_handler(
    State(state): State<AppState>,
    Path(version): Path<u8>,
    query: Result<Query<AnnotationQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    presentation_version(version)?;
    let Query(query) = query?;
    Ok(Json(state.service.get_annotation(&query.uri).await?))
}
