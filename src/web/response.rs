use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

/// Failure body shared by every JSON route
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Convert a crate error, prefixing upstream failures with `context`
    pub fn from_error(context: &str, err: Error) -> Self {
        match err {
            Error::Config(message) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, message),
            Error::NotConnected => Self::new(StatusCode::UNAUTHORIZED, "Not connected"),
            Error::ProviderStatus {
                service,
                status,
                details,
            } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}: {} API error: HTTP {}", context, service, status),
            )
            .with_details(details),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{}: {}", context, other)),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.error,
        });
        if let Some(details) = &self.details {
            body["details"] = json!(details);
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {} {:?}", self.error, self.details);
        }
        (self.status, Json(self.body())).into_response()
    }
}

/// Attach route context to a fallible result
pub trait ApiContext<T> {
    fn context(self, context: &str) -> Result<T, ApiError>;
}

impl<T> ApiContext<T> for Result<T, Error> {
    fn context(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::from_error(context, e))
    }
}
