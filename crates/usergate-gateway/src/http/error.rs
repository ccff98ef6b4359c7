use crate::client::ClientError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use usergate_core::{Error, call::CallOutcome, types::epoch_millis};

/// Body of every failed HTTP call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub status: u16,
    pub error: String,
    pub message: String,
}

/// Any failure of a gateway route. Always answered with 500.
#[derive(Debug)]
pub struct ApiError {
    message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Unwraps a completed streaming call; a failed or timed-out call becomes
    /// an error naming `operation`.
    pub fn settle<T>(outcome: CallOutcome<T>, operation: &str) -> Result<T, ApiError> {
        match outcome {
            CallOutcome::Completed(value) => Ok(value),
            CallOutcome::Failed { status, .. } => Err(ApiError::new(format!(
                "{operation} failed: {}",
                status.message()
            ))),
            CallOutcome::TimedOut { .. } => Err(ApiError::new(format!(
                "{operation} timed out; outcome unknown"
            ))),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rpc(status) => ApiError::new(status.message()),
            ClientError::Aborted(e) => ApiError::new(e.to_string()),
        }
    }
}

/// A request rejected before any call was made.
impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::new(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        tracing::error!(message = %self.message, "Request failed");
        let body = ErrorBody {
            timestamp: epoch_millis(),
            status: status.as_u16(),
            error: status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}
