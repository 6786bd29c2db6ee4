//! HTTP error mapping.
//!
//! Configuration and selector failures are the caller's to fix (`422`) and a
//! store outage is transient (`503`). An exhausted race or a counter at its
//! maximum is a server-side failure (`500`). Bodies are `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use autonumber::StoreError;
use serde_json::json;

use crate::server::telemetry::increment_errors;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Autonumber(#[from] autonumber::Error),

    /// The request was well-formed JSON but not a usable request.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl ApiError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Autonumber(autonumber::Error::Config { .. })
            | Self::Autonumber(autonumber::Error::Selector { .. })
            | Self::InvalidRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Autonumber(autonumber::Error::Store(StoreError::Exhausted)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Autonumber(autonumber::Error::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Autonumber(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        increment_errors();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
