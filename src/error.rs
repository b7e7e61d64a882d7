//! Request-time error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Errors surfaced to API callers.
///
/// Every variant renders as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad client input (wrong file type, missing field).
    #[error("{0}")]
    Validation(String),

    /// The request body exceeded the configured upload limit.
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Extraction failed (unreadable PDF, non-zero OCR exit, missing output).
    #[error("{0}")]
    Processing(String),

    /// The OCR subprocess exceeded its deadline.
    #[error("PDF processing timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The completion endpoint failed or is not configured.
    #[error("{0}")]
    Upstream(String),
}

impl ServiceError {
    /// Map a body/form rejection, keeping the body-limit case distinct.
    pub fn from_rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ServiceError::PayloadTooLarge(message)
        } else {
            ServiceError::Validation(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Processing("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Timeout { secs: 300 }.status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            ServiceError::Upstream("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_keeps_body_limit_distinct() {
        let err = ServiceError::from_rejection(
            StatusCode::PAYLOAD_TOO_LARGE,
            "length limit exceeded".into(),
        );
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_string(), "Upload too large: length limit exceeded");

        let err = ServiceError::from_rejection(StatusCode::BAD_REQUEST, "no boundary".into());
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_timeout_message() {
        let err = ServiceError::Timeout { secs: 300 };
        assert_eq!(err.to_string(), "PDF processing timed out after 300s");
    }
}
