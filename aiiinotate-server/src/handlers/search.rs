//! IIIF Search API handler

use aiiinotate_core::AnnotationList;
use axum::{
    extract::{rejection::QueryRejection, OriginalUri, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::search_version;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Exact match on annotation `@id`, body `@id` or body text.
    pub q: Option<String>,
    /// `painting`, `non-painting` or any other motivation.
    pub motivation: Option<String>,
}

/// Search the annotations of a manifest.
#[utoipa::path(
    get,
    path = "/search-api/{searchVersion}/manifests/{manifestShortId}/search",
    tag = "Search",
    params(
        ("searchVersion" = u8, Path, description = "IIIF Search version"),
        ("manifestShortId" = String, Path, description = "Manifest short id"),
        ("q" = Option<String>, Query, description = "Exact text, annotation id or body id"),
        ("motivation" = Option<String>, Query, description = "painting, non-painting or a motivation")
    ),
    responses(
        (status = 200, description = "Matching annotations", body = AnnotationList),
        (status = 501, description = "IIIF Search 2")
    )
)]
pub async fn search_handler(
    State(state): State<AppState>,
    Path((version, manifest_short_id)): Path<(u8, String)>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<AnnotationList>, ApiError> {
    search_version(version)?;
    let Query(query) = query?;

    let path = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    let query_url = format!("{}{}", state.config.base_url, path);

    let list = state
        .service
        .search_annotations(
            &query_url,
            &manifest_short_id,
            query.q.as_deref(),
            query.motivation.as_deref(),
        )
        .await?;
    Ok(Json(list))
}
