//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method, StatusCode},
    routing::{delete, get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{
    annotations_by_canvas_handler, create_annotation_handler, create_annotations_handler,
    create_manifest_handler, delete_annotations_handler, delete_manifest_handler,
    get_annotation_handler, get_manifest_handler, health, list_manifests_handler, search_handler,
    update_annotation_handler,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router, with middleware configured from `state.config`
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/health", get(health))
        .route("/annotations/{version}/create", post(create_annotation_handler))
        .route("/annotations/{version}/createMany", post(create_annotations_handler))
        .route("/annotations/{version}/update", post(update_annotation_handler))
        .route("/annotations/{version}/delete", delete(delete_annotations_handler))
        .route("/annotations/{version}/search", get(annotations_by_canvas_handler))
        .route("/annotations/{version}/get", get(get_annotation_handler))
        .route(
            "/search-api/{version}/manifests/{manifest_short_id}/search",
            get(search_handler),
        )
        .route("/manifests/{version}", get(list_manifests_handler))
        .route("/manifests/{version}/create", post(create_manifest_handler))
        .route("/manifests/{version}/delete", delete(delete_manifest_handler))
        .route("/data/{version}/{manifest_short_id}/index", get(get_manifest_handler))
        .with_state(state);

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api);

    apply_layers(router, &config)
}

fn apply_layers(router: Router, config: &Config) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!(origins = origins.len(), "CORS: restricting origins");
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let router = router.layer(cors).layer(body_limit).layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting: DISABLED");
        return router.layer(TraceLayer::new_for_http());
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish();

    match governor_conf {
        Some(governor_conf) => {
            tracing::info!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Rate limiting enabled"
            );
            router
                .layer(GovernorLayer::new(Arc::new(governor_conf)))
                .layer(TraceLayer::new_for_http())
        }
        None => {
            tracing::error!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Invalid rate limit settings, rate limiting disabled"
            );
            router.layer(TraceLayer::new_for_http())
        }
    }
}
