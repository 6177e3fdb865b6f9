use crate::utils::error::OcrError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const PROJECT_ID_REQUIRED: &str = "Project ID is required";
pub const IMAGE_REQUIRED: &str = "Image file is required";

/// Error body in the `{"detail": "..."}` shape the frontend already handles.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<OcrError> for ApiError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::ValidationError { message } => Self::bad_request(message),
            e if e.is_client_error() => Self::bad_request(e.to_string()),
            e => {
                tracing::error!(
                    "❌ Processing failed: {} (Category: {:?})",
                    e,
                    e.category()
                );
                Self::internal(format!("Error processing image: {}", e))
            }
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self {
            status: e.status(),
            detail: format!("Invalid multipart form: {}", e.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            tracing::warn!("Rejected request ({}): {}", self.status, self.detail);
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
