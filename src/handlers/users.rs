use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser, hash_password, verify_password},
    envelope::{ApiResponse, Envelope},
    error::{AppError, AppResult, OrFail},
    extract::{AppJson, AppPath, parse_id},
    models::{
        LoginRequest, LoginResponse, NewUser, ProfileUpdateRequest, RegisterRequest, Success,
        UserChanges, UserCount, is_valid_email,
    },
    repository::RepositoryError,
};

use super::not_blank;

const ALREADY_REGISTERED: &str = "User Already exist with this email";

/// list_users
///
/// [Admin Route] Every registered user, without password hashes.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 201, description = "All users", body = Envelope))
)]
pub async fn list_users(_admin: AdminUser, State(state): State<AppState>) -> AppResult {
    let users = state
        .repo
        .list_users()
        .await
        .or_fail(StatusCode::BAD_REQUEST, "Users Not retrieved successfully")?;

    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &users,
        "User List retrieved successfully",
    ))
}

/// get_user
///
/// [Authenticated Route] Any signed-in user may look up any profile.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 201, description = "Found", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 404, description = "Not found", body = Envelope)
    )
)]
pub async fn get_user(
    _caller: AuthUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
) -> AppResult {
    let id = parse_id(&raw_id, "User doesn't exist")?;

    match state.repo.find_user(id).await? {
        Some(user) => Ok(ApiResponse::data(
            StatusCode::CREATED,
            &user,
            "User retrieved successfully.",
        )),
        None => Err(AppError::failure(StatusCode::NOT_FOUND, "User doesn't exist")),
    }
}

/// register_user
///
/// [Public Route] Creates a customer account. New accounts are never administrators;
/// admins are provisioned directly in the database.
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = Envelope),
        (status = 400, description = "Email taken", body = Envelope),
        (status = 422, description = "Invalid email or password", body = Envelope)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult {
    let invalid = payload.invalid_fields();
    if !invalid.is_empty() {
        return Err(AppError::Validation(format!(
            "Invalid value: {}",
            invalid.join(", ")
        )));
    }

    if state.repo.find_credentials(&payload.email).await?.is_some() {
        return Err(AppError::BadRequest(ALREADY_REGISTERED.to_string()));
    }

    let cannot_create = || AppError::BadRequest("User cannot be created!".to_string());
    let name = not_blank(Some(payload.name)).ok_or_else(cannot_create)?;
    let phone = not_blank(Some(payload.phone)).ok_or_else(cannot_create)?;

    let password_hash = hash_password(payload.password).await?;
    let new_user = NewUser {
        name,
        email: payload.email,
        password_hash,
        phone,
        is_admin: false,
        street: payload.street,
        apartment: payload.apartment,
        city: payload.city,
        zip: payload.zip,
        country: payload.country,
    };

    match state.repo.create_user(new_user).await {
        Ok(user) => {
            tracing::info!("user {} registered", user.id);
            Ok(ApiResponse::data(
                StatusCode::CREATED,
                &user,
                "User Created Successfully",
            ))
        }
        Err(RepositoryError::Duplicate(_)) => {
            Err(AppError::BadRequest(ALREADY_REGISTERED.to_string()))
        }
        Err(e) => Err(e).or_fail(StatusCode::BAD_REQUEST, "User cannot be created!"),
    }
}

/// login_user
///
/// [Public Route] Exchanges email and password for a signed credential.
///
/// The response data is `{user, user_id, token}` where `user` is the email address.
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = Envelope),
        (status = 400, description = "Wrong password", body = Envelope),
        (status = 422, description = "Invalid email", body = Envelope),
        (status = 500, description = "Empty body or unknown user", body = Envelope)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult {
    if payload.email.is_empty() && payload.password.is_empty() {
        return Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Body fields cannot be empty.",
        ));
    }
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Invalid value: email".to_string()));
    }

    let Some(credentials) = state.repo.find_credentials(&payload.email).await? else {
        return Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "User doesn't exist.Provide correct credentials or register yourself if you are not already registered.",
        ));
    };

    if !verify_password(payload.password, credentials.password_hash).await? {
        tracing::warn!("failed login for {}", credentials.user.id);
        return Err(AppError::BadRequest(
            "Please enter correct credentials".to_string(),
        ));
    }

    let user = credentials.user;
    let token = state
        .tokens
        .issue(user.id)
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    tracing::info!("user {} logged in", user.id);
    Ok(ApiResponse::data(
        StatusCode::OK,
        &LoginResponse {
            user: user.email,
            user_id: user.id,
            token,
        },
        "User Logged In successfully!",
    ))
}

#[utoipa::path(
    get,
    path = "/users/get/count",
    responses(
        (status = 201, description = "Count", body = Envelope),
        (status = 500, description = "No users", body = Envelope)
    )
)]
pub async fn count_users(_admin: AdminUser, State(state): State<AppState>) -> AppResult {
    let user_count = state
        .repo
        .count_users()
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, "No users found in the database")?;

    if user_count == 0 {
        return Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "No users found in the database",
        ));
    }
    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &UserCount { user_count },
        "Count of users fetched successfully",
    ))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 201, description = "Deleted", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 500, description = "Not deleted", body = Envelope)
    )
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("User with id {raw_id} doesn't exist."))?;

    let deleted = state
        .repo
        .delete_user(id)
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, "User cannot be deleted!")?;

    if !deleted {
        return Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "User cannot be deleted!",
        ));
    }
    tracing::info!("user {} deleted by {}", id, admin.id);
    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &Success { success: true },
        "user deleted succesffully!",
    ))
}

/// update_profile
///
/// [Authenticated Route] Blank or absent fields keep their stored value; a new
/// password is re-hashed before it is stored.
#[utoipa::path(
    put,
    path = "/users/profile/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body = ProfileUpdateRequest,
    responses(
        (status = 201, description = "Updated", body = Envelope),
        (status = 400, description = "Malformed id or email taken", body = Envelope),
        (status = 500, description = "Not updated", body = Envelope)
    )
)]
pub async fn update_profile(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
    AppJson(payload): AppJson<ProfileUpdateRequest>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("User with id {raw_id} doesn't exist"))?;

    let password_hash = match not_blank(payload.password) {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };
    let changes = UserChanges {
        name: not_blank(payload.name),
        email: not_blank(payload.email),
        password_hash,
        phone: not_blank(payload.phone),
        street: not_blank(payload.street),
        apartment: not_blank(payload.apartment),
        city: not_blank(payload.city),
        zip: not_blank(payload.zip),
        country: not_blank(payload.country),
    };

    let not_updated = "Error occured while updating user information.";
    match state.repo.update_user(id, changes).await {
        Ok(Some(user)) => {
            tracing::info!("profile {} updated by {}", user.id, caller.id);
            Ok(ApiResponse::data(
                StatusCode::CREATED,
                &user,
                "user Updated successfully!",
            ))
        }
        Ok(None) => Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            not_updated,
        )),
        Err(RepositoryError::Duplicate(_)) => {
            Err(AppError::BadRequest(ALREADY_REGISTERED.to_string()))
        }
        Err(e) => Err(e).or_fail(StatusCode::INTERNAL_SERVER_ERROR, not_updated),
    }
}
