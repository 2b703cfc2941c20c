//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use aiiinotate_core::AiiinotateError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not implemented - e.g. IIIF Presentation 3 routes
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Error raised by the annotation engine
    #[error(transparent)]
    Core(#[from] AiiinotateError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Core(e) => match e {
                // Caller input defects → 400
                AiiinotateError::TargetResolution(_)
                | AiiinotateError::Normalization(_)
                | AiiinotateError::InvalidInput(_) => StatusCode::BAD_REQUEST,

                AiiinotateError::NotFound(_) => StatusCode::NOT_FOUND,

                // Remote manifest could not be retrieved → 502
                AiiinotateError::Fetch(_) => StatusCode::BAD_GATEWAY,

                // Store failures, schema rejections included → 500
                AiiinotateError::Read(_)
                | AiiinotateError::Insert(_)
                | AiiinotateError::Update(_)
                | AiiinotateError::Delete(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::Core(e) => match e {
                AiiinotateError::TargetResolution(_) => "TARGET_RESOLUTION_ERROR",
                AiiinotateError::Normalization(_) => "NORMALIZATION_ERROR",
                AiiinotateError::InvalidInput(_) => "INVALID_INPUT",
                AiiinotateError::NotFound(_) => "NOT_FOUND",
                AiiinotateError::Fetch(_) => "MANIFEST_FETCH_ERROR",
                AiiinotateError::Read(_) => "READ_ERROR",
                AiiinotateError::Insert(_) => "INSERT_ERROR",
                AiiinotateError::Update(_) => "UPDATE_ERROR",
                AiiinotateError::Delete(_) => "DELETE_ERROR",
            },
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotImplemented(_) => "not_implemented",
            Self::Core(e) if e.store_context().is_some() => "store",
            Self::Core(AiiinotateError::Fetch(_)) => "upstream",
            Self::Core(_) => "client",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let message = self.to_string();

        // Log based on severity
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %message,
                "Client error"
            );
        }

        // Store errors carry their operation and diagnostic payload
        let body = match &self {
            Self::Core(e) => match e.store_context() {
                Some(ctx) => json!({
                    "error": message,
                    "code": code,
                    "operation": format!("{}.{}", ctx.collection, ctx.operation),
                    "info": ctx.info,
                }),
                None => json!({ "error": message, "code": code }),
            },
            _ => json!({ "error": message, "code": code }),
        };

        (status, Json(body)).into_response()
    }
}
