//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/api-docs/openapi.json`.

use aiiinotate_core::collection::{DeleteResult, InsertResult, UpdateResult};
use aiiinotate_core::search::{AnnotationList, CollectionMember, ManifestCollection};
use aiiinotate_core::Manifest;
use utoipa::OpenApi;

use crate::handlers::HealthResponse;

/// Aiiinotate API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Aiiinotate",
        version = "0.1.0",
        description = r#"
## IIIF annotation server

Stores IIIF Presentation 2.1 annotations and the manifests they point to.

- Annotations are normalized on write: targets become `oa:SpecificResource`,
  motivations and bodies are canonicalized and identifiers are minted.
- Each annotation is linked to its manifest (`manifestUri`) and to the
  position of its canvas in that manifest (`canvasIdx`).
- Annotations of a manifest can be searched through the IIIF Search API 1.

IIIF Presentation 3 routes answer `501 Not Implemented`.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers((url = "http://localhost:3000", description = "Local development server")),
    tags(
        (name = "Annotations", description = "Create, update, delete and read annotations"),
        (name = "Manifests", description = "Store and list IIIF manifests"),
        (name = "Search", description = "IIIF Search API"),
        (name = "Health", description = "Service health")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::annotations::create_annotation_handler,
        crate::handlers::annotations::create_annotations_handler,
        crate::handlers::annotations::update_annotation_handler,
        crate::handlers::annotations::delete_annotations_handler,
        crate::handlers::annotations::annotations_by_canvas_handler,
        crate::handlers::annotations::get_annotation_handler,
        crate::handlers::search::search_handler,
        crate::handlers::manifests::list_manifests_handler,
        crate::handlers::manifests::get_manifest_handler,
        crate::handlers::manifests::create_manifest_handler,
        crate::handlers::manifests::delete_manifest_handler,
    ),
    components(schemas(
        HealthResponse,
        InsertResult,
        UpdateResult,
        DeleteResult,
        AnnotationList,
        ManifestCollection,
        CollectionMember,
        Manifest,
    ))
)]
pub struct ApiDoc;
