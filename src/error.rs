//! API error type and its JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success response (for delete)
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ApiError::Conflict(message),
            other => ApiError::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NotFound(_) => ErrorResponse {
                error: "Not found".to_string(),
                message: Some(self.to_string()),
            },
            ApiError::Validation(message) => ErrorResponse {
                error: "Validation failed".to_string(),
                message: Some(message.clone()),
            },
            ApiError::Conflict(message) => ErrorResponse {
                error: "Conflict".to_string(),
                message: Some(message.clone()),
            },
            ApiError::Persistence(message) => {
                tracing::error!(error = %message, "persistence failure");
                ErrorResponse {
                    error: "Persistence failure".to_string(),
                    message: Some(message.clone()),
                }
            }
            ApiError::Unavailable(message) => ErrorResponse {
                error: "Service unavailable".to_string(),
                message: Some(message.clone()),
            },
        };

        (status, Json(body)).into_response()
    }
}
