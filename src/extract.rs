use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

use crate::{envelope::ApiResponse, error::AppError};

/// AppJson
///
/// `Json<T>` whose rejection is an error envelope instead of axum's plain-text body,
/// so malformed request bodies keep the uniform response shape.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                tracing::debug!("request body rejected: {}", rejection.body_text());
                Err(ApiResponse::failure(
                    rejection.status(),
                    rejection.body_text(),
                ))
            }
        }
    }
}

/// AppPath
///
/// `Path<T>` with the same envelope treatment as `AppJson`. Segments that cannot be
/// percent-decoded or deserialized are answered with the rejection's status.
pub struct AppPath<T>(pub T);

impl<S, T> FromRequestParts<S> for AppPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(AppPath(value)),
            Err(rejection) => {
                tracing::debug!("path rejected: {}", rejection.body_text());
                Err(ApiResponse::failure(
                    rejection.status(),
                    rejection.body_text(),
                ))
            }
        }
    }
}

/// Parses a path id, answering a malformed one with 400 and `message`.
pub fn parse_id(raw: &str, message: impl Into<String>) -> Result<Uuid, AppError> {
    parse_id_or(raw, StatusCode::BAD_REQUEST, message)
}

/// Same as `parse_id` for routes that report a malformed id with another status.
pub fn parse_id_or(
    raw: &str,
    status: StatusCode,
    message: impl Into<String>,
) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::failure(status, message))
}
