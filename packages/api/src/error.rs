//! HTTP error type. Every handler returns `Result<_, AppError>`; the
//! [`IntoResponse`] impl turns it into the `{ success: false, message }` envelope
//! and logs it at a level matching its severity.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
    /// A bad request that also lists per-item problems.
    #[error("{message}")]
    Rejected { message: String, errors: Vec<String> },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, AppError>;

impl AppError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Store(err) => match err {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
                StoreError::Validation(_)
                | StoreError::InvalidReference(_)
                | StoreError::Conflict(_)
                | StoreError::NotReady
                | StoreError::Duplicate(_) => StatusCode::BAD_REQUEST,
            },
            AppError::BadRequest(_) | AppError::Rejected { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    tracing::warn!(%status, error = %self, "request refused")
                }
                _ => tracing::debug!(%status, error = %self, "request rejected"),
            }
            self.to_string()
        };

        let body = match self {
            AppError::Rejected { errors, .. } => json!({
                "success": false,
                "message": message,
                "errors": errors,
            }),
            _ => json!({ "success": false, "message": message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(StoreError::NotFound("Contact")), StatusCode::NOT_FOUND),
            (AppError::from(StoreError::NotReady), StatusCode::BAD_REQUEST),
            (AppError::from(StoreError::Forbidden("no".into())), StatusCode::FORBIDDEN),
            (AppError::from(StoreError::Backend("boom".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::NotImplemented("off".into()), StatusCode::NOT_IMPLEMENTED),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_error_is_server_error() {
        let err = AppError::internal("signing key rejected");
        assert_eq!(err.to_string(), "signing key rejected");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::from(StoreError::NotFound("Contact"));
        assert_eq!(err.to_string(), "Contact not found");
    }
}
