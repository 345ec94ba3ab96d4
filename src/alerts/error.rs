//! Alert domain error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not authorized to modify this alert")]
    NotAuthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sea_orm::DbErr> for AlertError {
    fn from(err: sea_orm::DbErr) -> Self {
        AlertError::Storage(err.to_string())
    }
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        let status = match &self {
            AlertError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertError::NotAuthorized => StatusCode::FORBIDDEN,
            AlertError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AlertError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let AlertError::Storage(detail) = &self {
            tracing::error!("storage error: {detail}");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
