use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::AdminUser,
    envelope::{ApiResponse, Envelope},
    error::{AppError, AppResult, OrFail},
    extract::{AppJson, AppPath, parse_id, parse_id_or},
    models::{CategoryRequest, NewCategory, Success},
    repository::RepositoryError,
};

/// list_categories
///
/// [Public Route] Lists every category. An empty catalogue is still a success, just
/// with a different message and no body.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "All categories", body = Envelope))
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult {
    let categories = state
        .repo
        .list_categories()
        .await
        .or_fail(StatusCode::NOT_FOUND, "No Category found")?;

    let message = if categories.is_empty() {
        "No Categories Created!"
    } else {
        "Categories retrieved successfully!"
    };
    Ok(ApiResponse::data(StatusCode::OK, &categories, message))
}

/// get_category
///
/// [Public Route] A malformed id and an unknown id are reported the same way.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = String, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Envelope),
        (status = 500, description = "Not found", body = Envelope)
    )
)]
pub async fn get_category(State(state): State<AppState>, AppPath(raw_id): AppPath<String>) -> AppResult {
    let not_found = format!("Category with the given id: {raw_id} was not found.");
    let id = parse_id_or(&raw_id, StatusCode::INTERNAL_SERVER_ERROR, not_found.clone())?;

    match state.repo.get_category(id).await? {
        Some(category) => Ok(ApiResponse::data(
            StatusCode::OK,
            &category,
            "Category retrived successfully",
        )),
        None => Err(AppError::failure(StatusCode::INTERNAL_SERVER_ERROR, not_found)),
    }
}

/// create_category
///
/// [Admin Route] `name` is the only required field.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Created", body = Envelope),
        (status = 404, description = "Rejected", body = Envelope)
    )
)]
pub async fn create_category(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CategoryRequest>,
) -> AppResult {
    let cannot_create = || AppError::failure(StatusCode::NOT_FOUND, "Category cannot be created!");

    let name = payload
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(cannot_create)?;

    let category = state
        .repo
        .create_category(NewCategory {
            name,
            color: payload.color,
            icon: payload.icon,
        })
        .await
        .or_fail(StatusCode::NOT_FOUND, "Category cannot be created!")?;

    tracing::info!("category {} created by {}", category.id, admin.id);
    Ok(ApiResponse::data(
        StatusCode::OK,
        &category,
        "A new category was created successfully",
    ))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = String, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Envelope),
        (status = 500, description = "Unknown category", body = Envelope)
    )
)]
pub async fn update_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
    AppJson(payload): AppJson<CategoryRequest>,
) -> AppResult {
    let id = parse_id_or(
        &raw_id,
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Category with id {raw_id} doesn't exist."),
    )?;

    let updated = state
        .repo
        .update_category(id, payload)
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, "Category was not updated!")?;

    match updated {
        Some(category) => Ok(ApiResponse::data(
            StatusCode::OK,
            &category,
            "Category updated successfully",
        )),
        None => Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Category was not updated!",
        )),
    }
}

/// delete_category
///
/// [Admin Route] Refuses with 400 while products still belong to the category.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = String, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Deleted", body = Envelope),
        (status = 400, description = "Category in use", body = Envelope),
        (status = 404, description = "Not found", body = Envelope)
    )
)]
pub async fn delete_category(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("Category with id {raw_id} doesn't exist."))?;

    match state.repo.delete_category(id).await {
        Ok(true) => {
            tracing::info!("category {} deleted by {}", id, admin.id);
            Ok(ApiResponse::data(
                StatusCode::OK,
                &Success { success: true },
                "Category succesfully Deleted",
            ))
        }
        Ok(false) => Err(AppError::failure(StatusCode::NOT_FOUND, "Category Not Found")),
        Err(e @ RepositoryError::StillReferenced(_)) => Err(AppError::BadRequest(e.to_string())),
        Err(e) => {
            tracing::error!("category delete failed: {:?}", e);
            Err(AppError::BadRequest("Category cannot be deleted!".to_string()))
        }
    }
}
