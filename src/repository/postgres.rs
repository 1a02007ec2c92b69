use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Category, CategoryRequest, DEFAULT_ORDER_STATUS, NewCategory, NewProduct, NewUser, Order,
    OrderItem, OrderRequest, Product, ProductChanges, User, UserChanges, UserCredentials, UserRef,
};

const CATEGORY_COLUMNS: &str = "id, name, color, icon";
const PRODUCT_COLUMNS: &str = "id, name, description, rich_description, image, images, brand, \
     price, category_id, count_in_stock, rating, num_reviews, is_featured, date_created";
const USER_COLUMNS: &str = "id, name, email, phone, is_admin, street, apartment, city, zip, country";
const ORDER_SELECT: &str = "SELECT o.id, o.shipping_address1, o.shipping_address2, o.city, \
     o.zip, o.country, o.phone, o.status, o.total_price, o.user_id, u.name AS user_name, \
     o.created_at FROM orders o LEFT JOIN users u ON u.id = o.user_id";

/// Order header row, joined with the buyer's name.
#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    shipping_address1: String,
    shipping_address2: Option<String>,
    city: String,
    zip: Option<String>,
    country: String,
    phone: String,
    status: String,
    total_price: f64,
    user_id: Option<Uuid>,
    user_name: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Option<Uuid>,
    quantity: i32,
}

/// Maps constraint violations raised by a write onto the domain errors handlers
/// understand. `entity` names what the violated foreign key points at.
fn write_error(e: sqlx::Error, entity: &'static str) -> RepositoryError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return RepositoryError::Duplicate(entity);
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::UnknownReference(entity);
        }
    }
    RepositoryError::Database(e)
}

fn delete_error(e: sqlx::Error, entity: &'static str) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => RepositoryError::StillReferenced(entity),
        _ => RepositoryError::Database(e),
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations under `migrations/`.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Populates `category` on every product with one extra query.
    async fn attach_categories(&self, mut products: Vec<Product>) -> RepoResult<Vec<Product>> {
        if products.is_empty() {
            return Ok(products);
        }
        let ids: Vec<Uuid> = products.iter().map(|p| p.category_id).collect();
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1)");
        let categories: HashMap<Uuid, Category> = sqlx::query_as::<_, Category>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        for product in products.iter_mut() {
            product.category = categories.get(&product.category_id).cloned();
        }
        Ok(products)
    }

    async fn attach_category(&self, product: Option<Product>) -> RepoResult<Option<Product>> {
        match product {
            Some(product) => Ok(self.attach_categories(vec![product]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Turns order header rows into fully populated orders, keeping the row order.
    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let order_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, quantity FROM order_items \
             WHERE order_id = ANY($1) ORDER BY position",
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let product_ids: Vec<Uuid> = items.iter().filter_map(|i| i.product_id).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&product_ids)
            .fetch_all(&self.pool)
            .await?;
        let products: HashMap<Uuid, Product> = self
            .attach_categories(products)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItem {
                    id: item.id,
                    quantity: item.quantity,
                    product: item.product_id.and_then(|id| products.get(&id).cloned()),
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| Order {
                id: row.id,
                order_items: items_by_order.remove(&row.id).unwrap_or_default(),
                shipping_address1: row.shipping_address1,
                shipping_address2: row.shipping_address2,
                city: row.city,
                zip: row.zip,
                country: row.country,
                phone: row.phone,
                status: row.status,
                total_price: row.total_price,
                user: match (row.user_id, row.user_name) {
                    (Some(id), Some(name)) => Some(UserRef { id, name }),
                    _ => None,
                },
                created_at: row.created_at,
            })
            .collect())
    }

    async fn fetch_orders(&self, user_id: Option<Uuid>) -> RepoResult<Vec<Order>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ORDER_SELECT);
        if let Some(user_id) = user_id {
            builder.push(" WHERE o.user_id = ");
            builder.push_bind(user_id);
        }
        builder.push(" ORDER BY o.created_at DESC");

        let rows = builder
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_orders(rows).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        let sql = format!(
            "INSERT INTO categories (name, color, icon) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(category.name)
            .bind(category.color)
            .bind(category.icon)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Uses COALESCE so absent fields keep their stored value.
    async fn update_category(
        &self,
        id: Uuid,
        changes: CategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let sql = format!(
            "UPDATE categories SET name = COALESCE($2, name), color = COALESCE($3, color), \
             icon = COALESCE($4, icon) WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.color)
            .bind(changes.icon)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error(e, "category"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Builds the optional category filter with QueryBuilder so the id list is bound,
    /// never interpolated.
    async fn list_products(&self, categories: Option<Vec<Uuid>>) -> RepoResult<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        if let Some(ids) = categories {
            builder.push(" WHERE category_id = ANY(");
            builder.push_bind(ids);
            builder.push(")");
        }
        builder.push(" ORDER BY date_created, id");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;
        self.attach_categories(products).await
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_category(product).await
    }

    async fn create_product(&self, product: NewProduct) -> RepoResult<Product> {
        let sql = format!(
            "INSERT INTO products (name, description, rich_description, image, brand, price, \
             category_id, count_in_stock, rating, num_reviews, is_featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {PRODUCT_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Product>(&sql)
            .bind(product.name)
            .bind(product.description)
            .bind(product.rich_description)
            .bind(product.image)
            .bind(product.brand)
            .bind(product.price)
            .bind(product.category_id)
            .bind(product.count_in_stock)
            .bind(product.rating)
            .bind(product.num_reviews)
            .bind(product.is_featured)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "category"))?;
        let created = self.attach_category(Some(created)).await?;
        created.ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> RepoResult<Option<Product>> {
        let sql = format!(
            "UPDATE products SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                rich_description = COALESCE($4, rich_description), \
                image = COALESCE($5, image), \
                brand = COALESCE($6, brand), \
                price = COALESCE($7, price), \
                category_id = COALESCE($8, category_id), \
                count_in_stock = COALESCE($9, count_in_stock), \
                rating = COALESCE($10, rating), \
                num_reviews = COALESCE($11, num_reviews), \
                is_featured = COALESCE($12, is_featured) \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.description)
            .bind(changes.rich_description)
            .bind(changes.image)
            .bind(changes.brand)
            .bind(changes.price)
            .bind(changes.category_id)
            .bind(changes.count_in_stock)
            .bind(changes.rating)
            .bind(changes.num_reviews)
            .bind(changes.is_featured)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "category"))?;
        self.attach_category(updated).await
    }

    async fn set_product_images(
        &self,
        id: Uuid,
        images: Vec<String>,
    ) -> RepoResult<Option<Product>> {
        let sql = format!("UPDATE products SET images = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");
        let updated = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(images)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_category(updated).await
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_products(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?)
    }

    /// `LIMIT NULL` is "no limit" in Postgres, so `None` binds straight through.
    async fn featured_products(&self, limit: Option<i64>) -> RepoResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_featured \
             ORDER BY date_created, id LIMIT $1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        self.attach_categories(products).await
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, phone, is_admin, street, apartment, \
             city, zip, country) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.phone)
            .bind(user.is_admin)
            .bind(user.street)
            .bind(user.apartment)
            .bind(user.city)
            .bind(user.zip)
            .bind(user.country)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "user"))
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                password_hash = COALESCE($4, password_hash), \
                phone = COALESCE($5, phone), \
                street = COALESCE($6, street), \
                apartment = COALESCE($7, apartment), \
                city = COALESCE($8, city), \
                zip = COALESCE($9, zip), \
                country = COALESCE($10, country) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.phone)
            .bind(changes.street)
            .bind(changes.apartment)
            .bind(changes.city)
            .bind(changes.zip)
            .bind(changes.country)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "user"))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        self.fetch_orders(None).await
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE o.id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        self.fetch_orders(Some(user_id)).await
    }

    /// Prices the items from stored products and writes the order with its items in a
    /// single transaction. Dropping `tx` on an early return rolls everything back.
    async fn create_order(&self, order: OrderRequest) -> RepoResult<Order> {
        if order.order_items.is_empty() {
            return Err(RepositoryError::EmptyOrder);
        }
        if let Some(item) = order.order_items.iter().find(|i| i.quantity <= 0) {
            return Err(RepositoryError::InvalidQuantity(item.quantity));
        }

        let mut tx = self.pool.begin().await?;

        let product_ids: Vec<Uuid> = order.order_items.iter().map(|i| i.product).collect();
        let prices: HashMap<Uuid, f64> =
            sqlx::query_as::<_, (Uuid, f64)>("SELECT id, price FROM products WHERE id = ANY($1)")
                .bind(&product_ids)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        let mut total_price = 0.0;
        for item in &order.order_items {
            let price = prices
                .get(&item.product)
                .ok_or(RepositoryError::UnknownProduct(item.product))?;
            total_price += price * f64::from(item.quantity);
        }

        let order_id: Uuid = sqlx::query_scalar(
            "INSERT INTO orders (shipping_address1, shipping_address2, city, zip, country, \
             phone, status, total_price, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        )
        .bind(&order.shipping_address1)
        .bind(&order.shipping_address2)
        .bind(&order.city)
        .bind(&order.zip)
        .bind(&order.country)
        .bind(&order.phone)
        .bind(order.status.as_deref().unwrap_or(DEFAULT_ORDER_STATUS))
        .bind(total_price)
        .bind(order.user)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| write_error(e, "user"))?;

        for (position, item) in order.order_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, position) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(item.product)
            .bind(item.quantity)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "product"))?;
        }

        tx.commit().await?;

        self.get_order(order_id)
            .await?
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_order_status(&self, id: Uuid, status: String) -> RepoResult<Option<Order>> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_order(id).await
    }

    /// Items go with the order via ON DELETE CASCADE.
    async fn delete_order(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_orders(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn total_sales(&self) -> RepoResult<f64> {
        Ok(sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(total_price), 0)::DOUBLE PRECISION FROM orders",
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
