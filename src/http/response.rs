//! Error responses.
//!
//! Every handler error becomes `{"error": "<message>"}` with a status chosen
//! here, so status mapping lives in one place.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::payments::PaymentValidationError;

/// Error returned by the gateway's handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidPayment(#[from] PaymentValidationError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("payment {0} was already processed")]
    Conflict(String),

    #[error(transparent)]
    Unavailable(#[from] DispatchError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayment(_) | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
