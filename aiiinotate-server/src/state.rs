//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use aiiinotate_core::Aiiinotate;

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Annotation and manifest service
    pub service: Arc<Aiiinotate>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: Arc<Aiiinotate>, config: Config) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }
}
