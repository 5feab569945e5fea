// 🚦 Request-level error taxonomy
//
// Validation -> 400, NotFound -> 404, Conflict -> 409, Internal -> 500.
// Internal details are logged where the error is classified and never
// reach the caller.

use crate::db::StoreError;
use crate::reconciliation::ReconcileError;
use crate::schema::{self, ValidationError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Detail is for the log only
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail = %detail, "internal error");
        Self::Internal(detail)
    }

    /// Storage failure where a constraint violation means `message`
    pub fn from_store_conflict(err: StoreError, message: &str) -> Self {
        if err.is_constraint_violation() {
            Self::conflict(message)
        } else {
            err.into()
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg) => msg.clone(),
            Self::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateRental(key) => Self::conflict(format!(
                "house {} is already rented by client {}",
                key.house, key.client
            )),
            e if e.is_constraint_violation() => Self::conflict("resource already exists"),
            e if e.is_foreign_key_violation() => {
                Self::conflict("resource is referenced by rental records")
            }
            e => Self::internal(e.to_string()),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::StaleVersion { .. } => Self::conflict(err.to_string()),
            ReconcileError::FieldRejected { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<Vec<ValidationError>> for AppError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(schema::summarize(&errors))
    }
}

#[cfg(feature = "server")]
mod http {
    use super::AppError;
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use serde::Serialize;

    #[derive(Serialize)]
    struct ErrorBody {
        success: bool,
        error: String,
    }

    impl AppError {
        pub fn status(&self) -> StatusCode {
            match self {
                AppError::Validation(_) => StatusCode::BAD_REQUEST,
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                AppError::Conflict(_) => StatusCode::CONFLICT,
                AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let body = ErrorBody {
                success: false,
                error: self.public_message(),
            };
            (self.status(), Json(body)).into_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
