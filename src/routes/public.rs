use crate::{
    AppState,
    handlers::{categories, orders, products, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Catalogue browsing, account creation, login and order placement. No credential
/// is inspected on these routes.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // --- Categories ---
        .route("/categories", get(categories::list_categories))
        .route("/categories/{id}", get(categories::get_category))
        // --- Products ---
        // GET /products?categories=<id>,<id>
        .route("/products", get(products::list_products))
        .route("/products/{id}", get(products::get_product))
        // GET /products/get/featured/{count}
        // `0` returns every featured product.
        .route(
            "/products/get/featured/{count}",
            get(products::featured_products),
        )
        // --- Users ---
        .route("/users/register", post(users::register_user))
        // POST /users/login
        // The only place a credential is issued.
        .route("/users/login", post(users::login_user))
        // --- Orders ---
        .route(
            "/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/orders/{id}", get(orders::get_order))
}
