//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod annotations;
pub mod health;
pub mod manifests;
pub mod search;

pub use crate::state::AppState;
pub use annotations::{
    create_annotation_handler, create_annotations_handler, delete_annotations_handler,
    get_annotation_handler, annotations_by_canvas_handler, update_annotation_handler,
    AnnotationQuery, CanvasQuery,
};
pub use health::{health, HealthResponse};
pub use manifests::{
    create_manifest_handler, delete_manifest_handler, get_manifest_handler, list_manifests_handler,
};
pub use search::{search_handler, SearchQuery};
