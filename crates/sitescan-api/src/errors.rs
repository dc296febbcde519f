use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error surface of the audit API, each variant mapped to an HTTP status.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Input validation errors (400 Bad Request).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// URL parsing or format errors (400 Bad Request).
    #[error("Invalid URL: {url} - {message}")]
    InvalidUrl { url: String, message: String },

    /// Unknown audit id (404 Not Found).
    #[error("Audit not found: {audit_id}")]
    NotFound { audit_id: String },

    /// Persistence failures (503 Service Unavailable).
    #[error("Store operation failed: {message}")]
    Store { message: String },

    /// Anything unexpected (500 Internal Server Error).
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_url<S1: Into<String>, S2: Into<String>>(url: S1, message: S2) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(audit_id: S) -> Self {
        Self::NotFound {
            audit_id: audit_id.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_variants() {
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("a1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
