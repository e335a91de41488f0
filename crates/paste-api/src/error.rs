use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use paste_db::StoreError;
use paste_types::api::ErrorResponse;

pub const NOT_FOUND_MESSAGE: &str = "Paste not found or unavailable";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client input rejected before any storage call.
    #[error("{0}")]
    Validation(String),
    /// Missing, expired and exhausted pastes all look the same to callers.
    #[error("paste not found or unavailable")]
    NotFound,
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => json_error(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => json_error(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
            err => {
                error!("Request failed: {}", err);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
