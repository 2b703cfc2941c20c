use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Diagnostic context attached to every store-layer failure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreErrorContext {
    pub collection: String,
    pub operation: String,
    pub message: String,
    pub info: Value,
}

impl StoreErrorContext {
    pub fn new(
        collection: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
        info: Value,
    ) -> Self {
        Self {
            collection: collection.into(),
            operation: operation.into(),
            message: message.into(),
            info,
        }
    }
}

impl std::fmt::Display for StoreErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.collection, self.operation, self.message)
    }
}

#[derive(Error, Debug)]
pub enum AiiinotateError {
    #[error("Target resolution error: {0}")]
    TargetResolution(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("Read error: {0}")]
    Read(StoreErrorContext),

    #[error("Insert error: {0}")]
    Insert(StoreErrorContext),

    #[error("Update error: {0}")]
    Update(StoreErrorContext),

    #[error("Delete error: {0}")]
    Delete(StoreErrorContext),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Manifest fetch error: {0}")]
    Fetch(#[from] FetchError),
}

impl AiiinotateError {
    /// Store diagnostic context, if this is one of the four store errors.
    pub fn store_context(&self) -> Option<&StoreErrorContext> {
        match self {
            Self::Read(ctx) | Self::Insert(ctx) | Self::Update(ctx) | Self::Delete(ctx) => {
                Some(ctx)
            }
            _ => None,
        }
    }
}

/// Failure to retrieve or interpret a remote manifest.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {uri} failed: {message}")]
    Transport { uri: String, message: String },

    #[error("{uri} answered HTTP {status}")]
    Status { uri: String, status: u16 },

    #[error("{uri} did not return JSON: {message}")]
    Json { uri: String, message: String },

    #[error("{uri} is not a valid manifest: {reason}")]
    InvalidManifest { uri: String, reason: String },

    #[error("fetching {uri} timed out after {timeout_ms}ms")]
    Timeout { uri: String, timeout_ms: u64 },

    #[error("no manifest registered for {uri}")]
    Unavailable { uri: String },
}

impl FetchError {
    pub fn uri(&self) -> &str {
        match self {
            Self::Transport { uri, .. }
            | Self::Status { uri, .. }
            | Self::Json { uri, .. }
            | Self::InvalidManifest { uri, .. }
            | Self::Timeout { uri, .. }
            | Self::Unavailable { uri } => uri,
        }
    }
}

pub type Result<T> = std::result::Result<T, AiiinotateError>;
