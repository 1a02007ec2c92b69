use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Category, CategoryRequest, NewCategory, NewProduct, NewUser, Order, OrderRequest, Product,
    ProductChanges, User, UserChanges, UserCredentials,
};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Everything the persistence layer can report. Handlers decide which of these are
/// the client's fault (unknown references, duplicates) and which are internal.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("product {0} does not exist")]
    UnknownProduct(Uuid),
    #[error("referenced {0} does not exist")]
    UnknownReference(&'static str),
    #[error("an order needs at least one item")]
    EmptyOrder,
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),
    #[error("{0} already exists")]
    Duplicate(&'static str),
    #[error("{0} is still referenced and cannot be deleted")]
    StillReferenced(&'static str),
}

impl RepositoryError {
    /// True when the failure was caused by the request's content rather than by the
    /// store itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Migration(_))
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations, so handlers and the
/// authentication gate never know whether Postgres or the in-memory store sits
/// behind them.
///
/// **Send + Sync + async_trait** are required to share the trait object
/// (`Arc<dyn Repository>`) across Axum's task boundaries.
///
/// Every read that returns a product attaches its category; every read that returns
/// an order attaches its items (with products) and its buyer.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> RepoResult<Category>;
    // Partial update; `None` fields are left untouched.
    async fn update_category(
        &self,
        id: Uuid,
        changes: CategoryRequest,
    ) -> RepoResult<Option<Category>>;
    // Fails with `StillReferenced` while products point at the category.
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;

    // --- Products ---
    // `categories = Some(ids)` restricts the listing to those categories.
    async fn list_products(&self, categories: Option<Vec<Uuid>>) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn create_product(&self, product: NewProduct) -> RepoResult<Product>;
    async fn update_product(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> RepoResult<Option<Product>>;
    // Replaces the gallery wholesale.
    async fn set_product_images(
        &self,
        id: Uuid,
        images: Vec<String>,
    ) -> RepoResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> RepoResult<bool>;
    async fn count_products(&self) -> RepoResult<i64>;
    // `limit = None` returns every featured product.
    async fn featured_products(&self, limit: Option<i64>) -> RepoResult<Vec<Product>>;

    // --- Users / Identity store ---
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Identity lookup used by the authentication gate. Never returns the password hash.
    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>>;
    // Fails with `Duplicate` when the email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;
    async fn count_users(&self) -> RepoResult<i64>;

    // --- Orders ---
    // Newest first.
    async fn list_orders(&self) -> RepoResult<Vec<Order>>;
    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;
    async fn orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>>;
    /// Creates the order items, prices them from the stored products and creates the
    /// order, all or nothing.
    async fn create_order(&self, order: OrderRequest) -> RepoResult<Order>;
    async fn update_order_status(&self, id: Uuid, status: String) -> RepoResult<Option<Order>>;
    // Removes the order together with its items.
    async fn delete_order(&self, id: Uuid) -> RepoResult<bool>;
    async fn count_orders(&self) -> RepoResult<i64>;
    async fn total_sales(&self) -> RepoResult<f64>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
