use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// Internal sentinels for statuses other than 500
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP status through the `anyhow::Error` chain.
/// Anything that is not one of these renders as 500.
#[derive(Debug, thiserror::Error)]
enum Rejected {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    DeadlineExceeded(String),
}

impl Rejected {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Renders as `{"error": "..."}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(Rejected::BadRequest(msg.into()).into())
    }

    /// Construct a 413 Payload Too Large error.
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self(Rejected::PayloadTooLarge(msg.into()).into())
    }

    /// Construct a 504 Gateway Timeout error for an exhausted processing
    /// deadline.
    pub fn deadline_exceeded(msg: impl Into<String>) -> Self {
        Self(Rejected::DeadlineExceeded(msg.into()).into())
    }

    /// Map an extractor or multipart stream failure, keeping 413 for size
    /// limits and treating everything else as a malformed request.
    pub fn from_rejection(status: StatusCode, body_text: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::payload_too_large(body_text)
        } else {
            Self::bad_request(body_text)
        }
    }

    pub fn status(&self) -> StatusCode {
        self.0
            .downcast_ref::<Rejected>()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, Rejected::status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = format!("{:#}", self.0);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "request rejected");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::from_rejection(err.status(), err.body_text())
    }
}

impl From<axum::extract::multipart::MultipartRejection> for AppError {
    fn from(err: axum::extract::multipart::MultipartRejection) -> Self {
        Self::from_rejection(err.status(), err.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl From<ifcmeta_core::IfcError> for AppError {
    fn from(err: ifcmeta_core::IfcError) -> Self {
        Self(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self(err.into())
    }
}

impl From<axum::http::header::InvalidHeaderValue> for AppError {
    fn from(err: axum::http::header::InvalidHeaderValue) -> Self {
        Self(err.into())
    }
}
