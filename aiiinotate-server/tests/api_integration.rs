//! API integration tests for aiiinotate-server.
//!
//! These tests drive the full router with an in-memory store and a static
//! manifest fetcher, exercising each route end to end.

use std::sync::Arc;

use aiiinotate_core::{Aiiinotate, MemoryStore, StaticManifestFetcher};
use aiiinotate_server::{create_router, AppState, Config};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const M1: &str = "https://iiif.example.org/m1/manifest.json";

fn iiif_manifest(prefix: &str, canvases: usize) -> Value {
    json!({
        "@context": "http://iiif.io/api/presentation/2/context.json",
        "@id": format!("{prefix}/manifest.json"),
        "@type": "sc:Manifest",
        "sequences": [{
            "@type": "sc:Sequence",
            "canvases": (0..canvases)
                .map(|i| json!({ "@id": format!("{prefix}/canvas/c{i}"), "@type": "sc:Canvas" }))
                .collect::<Vec<_>>()
        }]
    })
}

fn annotation(canvas: &str, chars: &str) -> Value {
    json!({
        "@type": "oa:Annotation",
        "motivation": ["oa:commenting"],
        "on": format!("https://iiif.example.org/m1/canvas/{canvas}#xywh=10,10,50,50"),
        "resource": { "@type": "dctypes:Text", "format": "text/html", "chars": chars }
    })
}

/// Build the test app and keep a handle on the fetcher to count calls
fn create_test_app() -> (Router, Arc<StaticManifestFetcher>) {
    let fetcher = Arc::new(
        StaticManifestFetcher::empty().with_manifest(M1, iiif_manifest("https://iiif.example.org/m1", 3)),
    );
    let config = Config::default();
    let service = Aiiinotate::init(config.core_config(), Arc::new(MemoryStore::new()), fetcher.clone());
    let app = create_router(AppState::new(Arc::new(service), config));
    (app, fetcher)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (app, _) = create_test_app();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = create_test_app();
    let (status, json) = send(&app, "GET", "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/annotations/{version}/create"].is_object());
}

// ============================================================================
// Annotations
// ============================================================================

#[tokio::test]
async fn test_create_and_get_annotation() {
    let (app, _) = create_test_app();
    let (status, json) = send(&app, "POST", "/annotations/2/create", Some(annotation("c1", "<p>hi</p>"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["insertedCount"], 1);
    let id = json["insertedIds"][0].as_str().unwrap().to_string();
    assert!(id.starts_with("http://localhost:3000/data/2/m1/annotation/c1_"));

    let (status, stored) = send(&app, "GET", &format!("/annotations/2/get?uri={id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["on"]["@type"], "oa:SpecificResource");
    assert_eq!(stored["on"]["full"], "https://iiif.example.org/m1/canvas/c1");
    assert_eq!(stored["on"]["selector"]["value"], "xywh=10,10,50,50");
    assert_eq!(stored["on"]["manifestUri"], M1);
    assert_eq!(stored["on"]["canvasIdx"], 1);
}

#[tokio::test]
async fn test_create_many_batches_manifest_fetches() {
    let (app, fetcher) = create_test_app();
    let list = json!({
        "@id": "https://iiif.example.org/m1/list/c0",
        "@type": "sc:AnnotationList",
        "resources": [annotation("c0", "a"), annotation("c1", "b"), annotation("c2", "c")]
    });

    let (status, json) = send(&app, "POST", "/annotations/2/createMany", Some(list)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["insertedCount"], 3);
    assert_eq!(fetcher.fetch_count(), 1);

    let (status, json) = send(
        &app,
        "POST",
        "/annotations/2/createMany",
        Some(json!([annotation("c0", "d"), annotation("c2", "e")])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["insertedCount"], 2);
    assert_eq!(fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_malformed_input_is_bad_request() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, "POST", "/annotations/2/create", Some(json!({ "on": 42 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "TARGET_RESOLUTION_ERROR");

    let (status, json) = send(
        &app,
        "POST",
        "/annotations/2/createMany",
        Some(json!({ "@type": "sc:Layer", "resources": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NORMALIZATION_ERROR");
}

#[tokio::test]
async fn test_presentation_3_is_not_implemented() {
    let (app, _) = create_test_app();
    let (status, json) = send(&app, "POST", "/annotations/3/create", Some(annotation("c0", "a"))).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json["code"], "NOT_IMPLEMENTED");

    let (status, _) = send(&app, "GET", "/manifests/3", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_update_annotation() {
    let (app, _) = create_test_app();
    let (_, json) = send(&app, "POST", "/annotations/2/create", Some(annotation("c0", "old"))).await;
    let id = json["insertedIds"][0].as_str().unwrap().to_string();

    let mut update = annotation("c0", "new");
    update["@id"] = json!(id);
    let (status, json) = send(&app, "POST", "/annotations/2/update", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matchedCount"], 1);
    assert_eq!(json["modifiedCount"], 1);

    let (_, stored) = send(&app, "GET", &format!("/annotations/2/get?uri={id}"), None).await;
    assert_eq!(stored["resource"]["chars"], "new");

    let (status, _) = send(&app, "POST", "/annotations/2/update", Some(annotation("c0", "x"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_annotations_by_canvas() {
    let (app, _) = create_test_app();
    send(&app, "POST", "/annotations/2/createMany", Some(json!([annotation("c0", "a"), annotation("c1", "b")]))).await;

    let canvas = "https://iiif.example.org/m1/canvas/c0";
    let (status, json) = send(&app, "GET", &format!("/annotations/2/search?uri={canvas}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().map(Vec::len), Some(1));

    let (status, json) = send(
        &app,
        "GET",
        &format!("/annotations/2/search?uri={canvas}&asAnnotationList=true"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["@type"], "sc:AnnotationList");
    assert_eq!(json["resources"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_delete_annotations_requires_one_key() {
    let (app, _) = create_test_app();
    send(&app, "POST", "/annotations/2/createMany", Some(json!([annotation("c0", "a"), annotation("c1", "b")]))).await;

    let (status, _) = send(&app, "DELETE", "/annotations/2/delete", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, "DELETE", "/annotations/2/delete?manifestShortId=m1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deletedCount"], 2);

    let (status, json) = send(&app, "DELETE", "/annotations/2/delete?manifestShortId=m1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deletedCount"], 0);
}

// ============================================================================
// Search API
// ============================================================================

#[tokio::test]
async fn test_search_exact_match() {
    let (app, _) = create_test_app();
    send(
        &app,
        "POST",
        "/annotations/2/createMany",
        Some(json!([annotation("c0", "hello world"), annotation("c1", "hello")])),
    )
    .await;

    let path = "/search-api/1/manifests/m1/search?q=hello";
    let (status, json) = send(&app, "GET", path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["@id"], format!("http://localhost:3000{path}"));
    assert_eq!(json["label"], format!("search results for query http://localhost:3000{path}"));
    assert_eq!(json["resources"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["resources"][0]["resource"]["chars"], "hello");
    assert!(json["resources"][0]["on"].get("manifestShortId").is_none());

    let (_, json) = send(&app, "GET", "/search-api/1/manifests/m1/search?motivation=painting", None).await;
    assert_eq!(json["resources"].as_array().map(Vec::len), Some(0));

    let (status, _) = send(&app, "GET", "/search-api/2/manifests/m1/search", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

// ============================================================================
// Manifests
// ============================================================================

#[tokio::test]
async fn test_manifest_lifecycle() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, "POST", "/manifests/2/create", Some(json!({ "uri": M1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["insertedIds"], json!([M1]));

    let (status, json) = send(
        &app,
        "POST",
        "/manifests/2/create",
        Some(iiif_manifest("https://iiif.example.org/m2", 2)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["insertedCount"], 1);

    let (status, json) = send(&app, "GET", "/manifests/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["@type"], "sc:Collection");
    assert_eq!(json["members"].as_array().map(Vec::len), Some(2));

    let (status, json) = send(&app, "GET", "/data/2/m1/index", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["canvasIds"].as_array().map(Vec::len), Some(3));

    let (status, json) = send(&app, "DELETE", "/manifests/2/delete?manifestShortId=m2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deletedCount"], 1);

    let (status, _) = send(&app, "GET", "/data/2/m2/index", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manifest_fetch_failure_is_bad_gateway() {
    let (app, _) = create_test_app();
    let (status, json) = send(
        &app,
        "POST",
        "/manifests/2/create",
        Some(json!({ "uri": "https://iiif.example.org/missing/manifest.json" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "MANIFEST_FETCH_ERROR");
}

#[tokio::test]
async fn test_manifest_array_reports_per_item() {
    let (app, _) = create_test_app();
    let (status, json) = send(
        &app,
        "POST",
        "/manifests/2/create",
        Some(json!([M1, "https://iiif.example.org/missing/manifest.json"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["insertedIds"], json!([M1]));
    assert_eq!(json["fetchErrorIds"], json!(["https://iiif.example.org/missing/manifest.json"]));
    assert!(json.get("preExistingIds").is_none());
}
