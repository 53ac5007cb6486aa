//! Error handling for the relay's HTTP surface
//!
//! One error type for every HTTP route, with status code mapping via Axum's
//! IntoResponse trait. The websocket layer has its own narrow error types;
//! failures there end a single connection and never reach a response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    // ========== Request Errors ==========
    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid query parameter
    #[error("invalid query parameter '{name}': {reason}")]
    InvalidQueryParam { name: &'static str, reason: String },

    /// Caller may not access the resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    // ========== Audio Errors ==========
    /// Audio file not found or inaccessible
    #[error("audio file not found: {0}")]
    AudioFileNotFound(String),

    /// Reading an audio file failed
    #[error("audio processing error: {0}")]
    AudioProcessing(String),

    /// Range header could not be parsed (416, no `Content-Range`)
    #[error("invalid range request: {0}")]
    InvalidRange(String),

    /// Range lies outside the file (416 Range Not Satisfiable)
    #[error("range not satisfiable")]
    RangeNotSatisfiable { file_size: u64 },

    // ========== Internal Errors ==========
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catch-all for unexpected errors
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            Self::MissingField(_) | Self::InvalidQueryParam { .. } => StatusCode::BAD_REQUEST,

            // 403 Forbidden
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            Self::AudioFileNotFound(_) => StatusCode::NOT_FOUND,

            // 416 Range Not Satisfiable
            Self::InvalidRange(_) | Self::RangeNotSatisfiable { .. } => {
                StatusCode::RANGE_NOT_SATISFIABLE
            }

            // 500 Internal Server Error
            Self::AudioProcessing(_) | Self::Configuration(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidQueryParam { .. } => "INVALID_QUERY_PARAM",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::AudioFileNotFound(_) => "AUDIO_NOT_FOUND",
            Self::AudioProcessing(_) => "AUDIO_PROCESSING_ERROR",
            Self::InvalidRange(_) => "INVALID_RANGE",
            Self::RangeNotSatisfiable { .. } => "RANGE_NOT_SATISFIABLE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Log the error with appropriate severity based on status code
    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::FORBIDDEN {
            tracing::warn!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Access denied"
            );
        } else {
            tracing::debug!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Client error"
            );
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let error_response = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };

        // RFC 7233: a 416 names the current length
        if let Self::RangeNotSatisfiable { file_size } = &self {
            return (
                status,
                [("Content-Range", format!("bytes */{}", file_size))],
                Json(error_response),
            )
                .into_response();
        }

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::MissingField("title").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::AudioFileNotFound("a.mp3".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidRange("bytes=9-1".to_string()).status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            ApiError::RangeNotSatisfiable { file_size: 10 }.status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ApiError::MissingField("title").error_code(), "MISSING_FIELD");
        assert_eq!(
            ApiError::InvalidRange("x".to_string()).error_code(),
            "INVALID_RANGE"
        );
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::MissingField("title");
        assert_eq!(err.to_string(), "missing required field: title");
    }

    #[test]
    fn test_range_not_satisfiable_sets_content_range() {
        let response = ApiError::RangeNotSatisfiable { file_size: 1234 }.into_response();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()["Content-Range"], "bytes */1234");
    }
}
