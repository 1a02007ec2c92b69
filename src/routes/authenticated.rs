use crate::{
    AppState,
    handlers::{orders, users},
};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. `create_router` layers `auth_middleware` over this
/// router, so handlers here only run once the caller's identity is attached.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/{id}
        .route("/users/{id}", get(users::get_user))
        // PUT /users/profile/{id}
        // Blank fields keep their value; a new password is re-hashed.
        .route("/users/profile/{id}", put(users::update_profile))
        // GET /orders/get/userorders/{id}
        .route("/orders/get/userorders/{id}", get(orders::user_orders))
}
