//! Aiiinotate core - IIIF annotation and manifest engine
//!
//! This crate normalizes IIIF Presentation 2.1 annotations and manifests,
//! links annotations to the manifests holding their canvas, and stores and
//! queries both through a pluggable document store.
//!
//! # Features
//!
//! - Target resolution of string and `oa:SpecificResource` targets
//! - Motivation and body canonicalization, with empty-body pruning
//! - Deterministic short ids for manifests and canvases
//! - Batched manifest linkage (`manifestUri`, `canvasIdx`)
//! - In-memory and PostgreSQL (`postgres` feature) document stores
//! - HTTP manifest fetching with retry (`http` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aiiinotate_core::{Aiiinotate, CoreConfig, MemoryStore, StaticManifestFetcher};
//! use serde_json::json;
//!
//! # async fn example() -> aiiinotate_core::Result<()> {
//! let service = Aiiinotate::init(
//!     CoreConfig::with_base_url("http://localhost:3000"),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StaticManifestFetcher::empty()),
//! );
//!
//! let result = service
//!     .insert_annotation(json!({
//!         "on": "https://example.org/iiif/book1/canvas/p1#xywh=0,0,100,100",
//!         "resource": { "@type": "dctypes:Text", "chars": "<p>a note</p>" }
//!     }))
//!     .await?;
//! println!("inserted {:?}", result.inserted_ids);
//! # Ok(())
//! # }
//! ```

pub mod annotation;
pub mod collection;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod linkage;
pub mod manifest;
pub mod one_or_many;
pub mod schema;
pub mod search;
pub mod service;
pub mod store;
pub mod target;

// Re-export main types for convenience
pub use annotation::{normalize_annotation, normalize_annotation_list, Annotation, Body, IdPolicy};
pub use collection::{Collection, DeleteResult, InsertResult, UpdateResult};
pub use config::CoreConfig;
pub use error::{AiiinotateError, FetchError, Result, StoreErrorContext};
pub use fetch::{ManifestFetcher, StaticManifestFetcher};
pub use manifest::Manifest;
pub use one_or_many::OneOrMany;
pub use search::{AnnotationList, CanvasAnnotations, DeleteKey, ManifestCollection};
pub use service::Aiiinotate;
pub use store::{DocumentStore, Filter, MemoryStore, Projection};
pub use target::{resolve_target, Selector, SpecificResource};

#[cfg(feature = "http")]
pub use fetch::HttpManifestFetcher;
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
