use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Invalid image shape: {0}")]
    InvalidImageShape(String),

    #[error("Image operation `{operator}` failed ({params}): {reason}")]
    ImageOperationFailed {
        operator: &'static str,
        params: String,
        reason: String,
    },

    #[error("OCR engine failed: {0}")]
    EngineError(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Option `{0}` not supported")]
    UnsupportedOption(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    pub(crate) fn operation(
        operator: &'static str,
        params: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        OcrError::ImageOperationFailed {
            operator,
            params: params.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::InvalidImageShape(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE_SHAPE"),
            OcrError::ImageOperationFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "IMAGE_OPERATION_FAILED")
            }
            OcrError::EngineError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR"),
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::UnsupportedOption(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_OPTION"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
