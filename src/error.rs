use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Faults raised by a tracking store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    // The backend could not serve the operation.
    #[error("tracking store unavailable: {0}")]
    Unavailable(String),
}

// Faults raised while talking to the counting service.
#[derive(Error, Debug)]
pub enum LimiterError {
    #[error("rate counter backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("rate counter did not answer within {0:?}")]
    Timeout(Duration),

    // The backend answered with something other than a decision.
    #[error("rate counter returned a malformed reply: {0}")]
    Protocol(String),
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid {flag}: {message}")]
    Invalid { flag: &'static str, message: String },

    #[error("failed to connect to counting service: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    #[must_use]
    pub fn invalid(flag: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            flag,
            message: message.into(),
        }
    }
}

// Errors surfaced at the HTTP boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return (status, "internal server error").into_response();
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_maps_to_500() {
        let err: AppError = StoreError::Unavailable("connection reset".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn server_errors_hide_detail() {
        let response = AppError::Internal("secret table name".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"internal server error");
    }

    #[test]
    fn client_errors_keep_message() {
        let err = AppError::BadRequest("recipient is required".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("recipient is required"));
    }

    #[test]
    fn limiter_timeout_display() {
        let err = LimiterError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn invalid_config_names_flag() {
        let err = ServerError::invalid("rate-window", "must be at least 1 second");
        assert_eq!(err.to_string(), "invalid rate-window: must be at least 1 second");
    }
}
