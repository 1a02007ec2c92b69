use crate::{
    AppState,
    handlers::{categories, orders, products, users},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Catalogue management, user administration, order fulfilment and shop
/// statistics. `create_router` layers `admin_middleware` over this router: the
/// caller must present a valid credential and carry the admin flag.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Categories ---
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        // --- Products ---
        .route("/products", post(products::create_product))
        .route(
            "/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        // PUT /products/gallery-images/{id}
        // Replaces the gallery with the submitted image URLs.
        .route(
            "/products/gallery-images/{id}",
            put(products::update_product_gallery),
        )
        .route("/products/get/count", get(products::count_products))
        // --- Users ---
        .route("/users", get(users::list_users))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/get/count", get(users::count_users))
        // --- Orders ---
        .route(
            "/orders/{id}",
            put(orders::update_order_status).delete(orders::delete_order),
        )
        .route("/orders/get/totalsales", get(orders::total_sales))
        .route("/orders/get/totalorders", get(orders::total_orders))
}
