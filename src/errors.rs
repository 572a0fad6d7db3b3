use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::approval::Status;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("approval not found")]
    NotFound,

    #[error("cannot act: approval is already '{current}'")]
    InvalidState { current: Status },

    #[error("asset unavailable")]
    AssetUnavailable,

    #[error("no valid session")]
    Unauthorized,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "approval_not_found",
                "approval not found".to_string(),
            ),
            AppError::InvalidState { current } => (
                StatusCode::CONFLICT,
                "invalid_state_error",
                "invalid_state",
                format!("cannot act: approval is already '{}'", current),
            ),
            AppError::AssetUnavailable => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "asset_unavailable",
                "asset unavailable".to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_session",
                "invalid or missing session".to_string(),
            ),
            AppError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "bad_request",
                reason.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = AppError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_state_maps_to_409_and_names_current_status() {
        let err = AppError::InvalidState {
            current: Status::Sent,
        };
        assert!(format!("{}", err).contains("'sent'"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn asset_unavailable_maps_to_404() {
        let resp = AppError::AssetUnavailable.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let resp = AppError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = AppError::Internal(anyhow::anyhow!("postgres password was 'hunter2'"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
