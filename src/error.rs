use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Request-level failures. Dependency degradation inside the identity
/// resolver never surfaces here; it is absorbed into the placeholder tier.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Rating 1..5")]
    BadRating,

    #[error("{0}")]
    Validation(String),

    #[error("Token requerido")]
    MissingToken,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Necesitás haber contactado al proveedor (últimos 30 días)")]
    NoContactIntent,

    #[error("Ya publicaste una reseña reciente para este proveedor")]
    WindowLimit,

    #[error("No existe")]
    ContactIntentNotFound,

    #[error("No existe")]
    ReviewNotFound,

    #[error("No autorizado")]
    Forbidden,

    #[error("Internal error: {0}")]
    Storage(#[from] StoreError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRating => "REVIEW.BAD_RATING",
            AppError::Validation(_) => "REVIEW.VALIDATION",
            AppError::MissingToken => "AUTH.MISSING_TOKEN",
            AppError::InvalidToken => "AUTH.INVALID_TOKEN",
            AppError::NoContactIntent => "REVIEW.NO_CONTACT_INTENT",
            AppError::WindowLimit => "REVIEW.WINDOW_LIMIT",
            AppError::ContactIntentNotFound => "CONTACT_INTENT.NOT_FOUND",
            AppError::ReviewNotFound => "REVIEW.NOT_FOUND",
            AppError::Forbidden => "REVIEW.FORBIDDEN",
            AppError::Storage(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRating | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MissingToken | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::NoContactIntent | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::WindowLimit => StatusCode::CONFLICT,
            AppError::ContactIntentNotFound | AppError::ReviewNotFound => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(code = self.code(), "request failed: {self}");
        }

        let body = json!({
            "error": { "code": self.code(), "message": self.to_string() }
        });

        (status, Json(body)).into_response()
    }
}
