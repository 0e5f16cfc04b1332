//! HTTP rendering of pipeline errors.
//!
//! Every failure becomes `{"error": "...", "details"?: ...}` with a status
//! that reflects its category.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{DispatchError, DraftError, LlmError};

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl DraftError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Llm(LlmError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Llm(LlmError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Llm(LlmError::Upstream { status, .. }) => upstream_status(*status),
            Self::Llm(
                LlmError::RequestFailed { .. }
                | LlmError::InvalidResponse { .. }
                | LlmError::EmptyResponse,
            ) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Relay the provider's own error status; anything outside 4xx/5xx is
/// reported as a bad gateway.
fn upstream_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

impl IntoResponse for DraftError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::NoValidRecipients => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Send(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TransportConnect(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Validation(violations) => ErrorBody::new("Invalid request")
                .with_details(serde_json::to_value(violations).unwrap_or_default()),
            Self::Config(e) => ErrorBody::new("Email service is not configured")
                .with_details(serde_json::Value::String(e.to_string())),
            Self::NoValidRecipients => ErrorBody::new(self.to_string()),
            Self::TransportConnect(detail) => ErrorBody::new("Could not connect to the mail server")
                .with_details(serde_json::Value::String(detail.clone())),
            Self::Send(detail) => ErrorBody::new("Failed to send email")
                .with_details(serde_json::Value::String(detail.clone())),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
