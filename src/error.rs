use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{envelope::ApiResponse, repository::RepositoryError};

/// AppError
///
/// Handler-level failure. Every variant renders as an error envelope, so a handler
/// can return `Result<ApiResponse, AppError>` and use `?` freely.
#[derive(Debug, Error)]
pub enum AppError {
    /// A failure with a status and message chosen by the handler.
    #[error("{message}")]
    Failure { status: StatusCode, message: String },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Failure {
            status,
            message: message.into(),
        }
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Failure { status, message } => (*status, message.clone()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message.clone()),
            AppError::Repository(e) if e.is_client_error() => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Repository(e) => {
                tracing::error!("repository failure: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("internal failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        ApiResponse::failure(status, message).into_response()
    }
}

pub type AppResult = Result<ApiResponse, AppError>;

/// OrFail
///
/// Replaces a repository error with a fixed status and message, logging the
/// underlying error so it is not lost.
pub trait OrFail<T> {
    fn or_fail(self, status: StatusCode, message: impl Into<String>) -> Result<T, AppError>;
}

impl<T> OrFail<T> for Result<T, RepositoryError> {
    fn or_fail(self, status: StatusCode, message: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| {
            if e.is_client_error() {
                tracing::warn!("request rejected by repository: {}", e);
            } else {
                tracing::error!("repository failure: {:?}", e);
            }
            AppError::failure(status, message)
        })
    }
}
