use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Status given to an order when the client does not send one.
pub const DEFAULT_ORDER_STATUS: &str = "Pending";

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The Identity record as every other component sees it. The password hash is
/// not a field here: it only exists on `UserCredentials`, so a `User`
/// can be serialized into any response without leaking the secret.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    // The role flag: administrators pass the Authorization Gate.
    pub is_admin: bool,
    pub street: String,
    pub apartment: String,
    pub city: String,
    pub zip: String,
    pub country: String,
}

/// UserCredentials
///
/// Internal row used only by the login flow. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Minimal user projection embedded in orders (`{id, name}`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Product
///
/// A catalogue entry. `category_id` is the stored reference; `category` is the
/// populated record attached by the repository on every read.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub rich_description: String,
    // Main image URL.
    pub image: String,
    // Gallery image URLs.
    pub images: Vec<String>,
    pub brand: String,
    pub price: f64,
    #[serde(skip)]
    #[ts(skip)]
    pub category_id: Uuid,
    #[sqlx(skip)]
    pub category: Option<Category>,
    pub count_in_stock: i32,
    pub rating: f64,
    pub num_reviews: i32,
    pub is_featured: bool,
    #[ts(type = "string")]
    pub date_created: DateTime<Utc>,
}

/// OrderItem
///
/// A line of an order. `product` is `None` when the referenced product has since
/// been deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct OrderItem {
    pub id: Uuid,
    pub quantity: i32,
    pub product: Option<Product>,
}

/// Order
///
/// Fully populated order: items carry their product (and its category), `user`
/// carries the buyer's id and name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    pub order_items: Vec<OrderItem>,
    pub shipping_address1: String,
    pub shipping_address2: Option<String>,
    pub city: String,
    pub zip: Option<String>,
    pub country: String,
    pub phone: String,
    pub status: String,
    pub total_price: f64,
    pub user: Option<UserRef>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CategoryRequest
///
/// Body of POST and PUT /categories. On update, absent fields keep their value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Validated category input handed to the repository on create.
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// ProductRequest
///
/// Body of POST and PUT /products. `category` arrives as a raw string so a malformed
/// id can be answered with "Invalid Category" instead of a generic body error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rich_description: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub count_in_stock: Option<i32>,
    pub rating: Option<f64>,
    pub num_reviews: Option<i32>,
    pub is_featured: Option<bool>,
}

/// Validated product input handed to the repository on create.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub rich_description: String,
    pub image: String,
    pub brand: String,
    pub price: f64,
    pub category_id: Uuid,
    pub count_in_stock: i32,
    pub rating: f64,
    pub num_reviews: i32,
    pub is_featured: bool,
}

/// Partial product update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rich_description: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<Uuid>,
    pub count_in_stock: Option<i32>,
    pub rating: Option<f64>,
    pub num_reviews: Option<i32>,
    pub is_featured: Option<bool>,
}

/// Body of PUT /products/gallery-images/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GalleryRequest {
    #[serde(default)]
    pub images: Vec<String>,
}

/// RegisterRequest
///
/// Body of POST /users/register. The password is hashed before it reaches the
/// repository and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub street: String,
    pub apartment: String,
    pub city: String,
    pub zip: String,
    pub country: String,
}

impl RegisterRequest {
    /// Names of the fields that fail validation, in body order. Empty when the
    /// request is acceptable.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut invalid = Vec::new();
        if !is_valid_email(&self.email) {
            invalid.push("email");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            invalid.push("password");
        }
        invalid
    }
}

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Syntactic email check: one `@`, a non-empty local part and a dotted domain made
/// of non-empty alphanumeric (or `-`) labels.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Validated registration handed to the repository.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub is_admin: bool,
    pub street: String,
    pub apartment: String,
    pub city: String,
    pub zip: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginResponse
///
/// Field names are part of the storefront client contract (`user_id`, not camelCase).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    // The user's email address.
    pub user: String,
    pub user_id: Uuid,
    pub token: String,
}

/// ProfileUpdateRequest
///
/// Body of PUT /users/profile/{id}. Absent or empty fields keep their value; a new
/// password is re-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub apartment: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

/// Partial user update handed to the repository.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub apartment: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderItemRequest {
    pub quantity: i32,
    pub product: Uuid,
}

/// OrderRequest
///
/// Body of POST /orders. The total is never taken from the client; it is computed
/// from stored product prices.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderRequest {
    pub order_items: Vec<OrderItemRequest>,
    pub shipping_address1: String,
    #[serde(default)]
    pub shipping_address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub zip: Option<String>,
    pub country: String,
    pub phone: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderStatusRequest {
    pub status: String,
}

// --- Statistics & Confirmation Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductCount {
    pub product_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCount {
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCount {
    pub total_orders: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TotalSales {
    pub total_sales: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedProducts {
    pub featured_products: Vec<Product>,
    pub count: usize,
}

/// `{ "success": true }`, the data carried by delete confirmations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
pub struct Success {
    pub success: bool,
}
