use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Category, CategoryRequest, DEFAULT_ORDER_STATUS, NewCategory, NewProduct, NewUser, Order,
    OrderItem, OrderRequest, Product, ProductChanges, User, UserChanges, UserCredentials, UserRef,
};

struct OrderRecord {
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
    created_at: DateTime<Utc>,
}

struct OrderItemRecord {
    id: Uuid,
    order_id: Uuid,
    // Cleared when the product is deleted.
    product_id: Option<Uuid>,
    quantity: i32,
}

#[derive(Default)]
struct Store {
    categories: Vec<Category>,
    // Stored with `category: None`; populated on the way out.
    products: Vec<Product>,
    users: Vec<UserCredentials>,
    orders: Vec<OrderRecord>,
    order_items: Vec<OrderItemRecord>,
}

impl Store {
    fn populate_product(&self, product: &Product) -> Product {
        let mut product = product.clone();
        product.category = self
            .categories
            .iter()
            .find(|c| c.id == product.category_id)
            .cloned();
        product
    }

    fn product(&self, id: Uuid) -> Option<Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| self.populate_product(p))
    }

    fn populate_order(&self, record: &OrderRecord) -> Order {
        let order_items = self
            .order_items
            .iter()
            .filter(|item| item.order_id == record.id)
            .map(|item| OrderItem {
                id: item.id,
                quantity: item.quantity,
                product: item.product_id.and_then(|id| self.product(id)),
            })
            .collect();

        let user = record.user_id.and_then(|id| {
            self.users.iter().find(|c| c.user.id == id).map(|c| UserRef {
                id: c.user.id,
                name: c.user.name.clone(),
            })
        });

        Order {
            id: record.id,
            order_items,
            shipping_address1: record.shipping_address1.clone(),
            shipping_address2: record.shipping_address2.clone(),
            city: record.city.clone(),
            zip: record.zip.clone(),
            country: record.country.clone(),
            phone: record.phone.clone(),
            status: record.status.clone(),
            total_price: record.total_price,
            user,
            created_at: record.created_at,
        }
    }

    fn orders_newest_first<'a>(&self, records: impl Iterator<Item = &'a OrderRecord>) -> Vec<Order> {
        let mut orders: Vec<Order> = records.map(|r| self.populate_order(r)).collect();
        // Later insertions first on equal timestamps.
        orders.reverse();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

/// InMemoryRepository
///
/// A `Repository` backed by process memory, used by the test-suite and for local
/// experiments without Postgres. Mirrors the Postgres implementation's referential
/// rules: deleting a product clears it from order items, deleting a user clears it
/// from orders, and a category in use cannot be deleted.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(self.store.read().await.categories.clone())
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let store = self.store.read().await;
        Ok(store.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            name: category.name,
            color: category.color,
            icon: category.icon,
        };
        self.store.write().await.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: CategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let mut store = self.store.write().await;
        let Some(category) = store.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            category.name = name;
        }
        if changes.color.is_some() {
            category.color = changes.color;
        }
        if changes.icon.is_some() {
            category.icon = changes.icon;
        }
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.products.iter().any(|p| p.category_id == id) {
            return Err(RepositoryError::StillReferenced("category"));
        }
        let before = store.categories.len();
        store.categories.retain(|c| c.id != id);
        Ok(store.categories.len() < before)
    }

    async fn list_products(&self, categories: Option<Vec<Uuid>>) -> RepoResult<Vec<Product>> {
        let store = self.store.read().await;
        Ok(store
            .products
            .iter()
            .filter(|p| {
                categories
                    .as_ref()
                    .is_none_or(|wanted| wanted.contains(&p.category_id))
            })
            .map(|p| store.populate_product(p))
            .collect())
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self.store.read().await.product(id))
    }

    async fn create_product(&self, product: NewProduct) -> RepoResult<Product> {
        let mut store = self.store.write().await;
        if !store.categories.iter().any(|c| c.id == product.category_id) {
            return Err(RepositoryError::UnknownReference("category"));
        }
        let stored = Product {
            id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            rich_description: product.rich_description,
            image: product.image,
            images: Vec::new(),
            brand: product.brand,
            price: product.price,
            category_id: product.category_id,
            category: None,
            count_in_stock: product.count_in_stock,
            rating: product.rating,
            num_reviews: product.num_reviews,
            is_featured: product.is_featured,
            date_created: Utc::now(),
        };
        let populated = store.populate_product(&stored);
        store.products.push(stored);
        Ok(populated)
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> RepoResult<Option<Product>> {
        let mut store = self.store.write().await;
        if let Some(category_id) = changes.category_id {
            if !store.categories.iter().any(|c| c.id == category_id) {
                return Err(RepositoryError::UnknownReference("category"));
            }
        }
        let Some(product) = store.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(description) = changes.description {
            product.description = description;
        }
        if let Some(rich_description) = changes.rich_description {
            product.rich_description = rich_description;
        }
        if let Some(image) = changes.image {
            product.image = image;
        }
        if let Some(brand) = changes.brand {
            product.brand = brand;
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(category_id) = changes.category_id {
            product.category_id = category_id;
        }
        if let Some(count_in_stock) = changes.count_in_stock {
            product.count_in_stock = count_in_stock;
        }
        if let Some(rating) = changes.rating {
            product.rating = rating;
        }
        if let Some(num_reviews) = changes.num_reviews {
            product.num_reviews = num_reviews;
        }
        if let Some(is_featured) = changes.is_featured {
            product.is_featured = is_featured;
        }
        Ok(store.product(id))
    }

    async fn set_product_images(
        &self,
        id: Uuid,
        images: Vec<String>,
    ) -> RepoResult<Option<Product>> {
        let mut store = self.store.write().await;
        let Some(product) = store.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        product.images = images;
        Ok(store.product(id))
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.products.len();
        store.products.retain(|p| p.id != id);
        if store.products.len() == before {
            return Ok(false);
        }
        for item in store.order_items.iter_mut() {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
        Ok(true)
    }

    async fn count_products(&self) -> RepoResult<i64> {
        Ok(self.store.read().await.products.len() as i64)
    }

    async fn featured_products(&self, limit: Option<i64>) -> RepoResult<Vec<Product>> {
        let store = self.store.read().await;
        let limit = limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(store
            .products
            .iter()
            .filter(|p| p.is_featured)
            .take(limit)
            .map(|p| store.populate_product(p))
            .collect())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().map(|c| c.user.clone()).collect())
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .find(|c| c.user.id == id)
            .map(|c| c.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|c| c.user.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.users.iter().any(|c| c.user.email == user.email) {
            return Err(RepositoryError::Duplicate("user"));
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            is_admin: user.is_admin,
            street: user.street,
            apartment: user.apartment,
            city: user.city,
            zip: user.zip,
            country: user.country,
        };
        store.users.push(UserCredentials {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        if let Some(email) = &changes.email {
            if store
                .users
                .iter()
                .any(|c| c.user.id != id && &c.user.email == email)
            {
                return Err(RepositoryError::Duplicate("user"));
            }
        }
        let Some(credentials) = store.users.iter_mut().find(|c| c.user.id == id) else {
            return Ok(None);
        };
        let user = &mut credentials.user;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(phone) = changes.phone {
            user.phone = phone;
        }
        if let Some(street) = changes.street {
            user.street = street;
        }
        if let Some(apartment) = changes.apartment {
            user.apartment = apartment;
        }
        if let Some(city) = changes.city {
            user.city = city;
        }
        if let Some(zip) = changes.zip {
            user.zip = zip;
        }
        if let Some(country) = changes.country {
            user.country = country;
        }
        if let Some(password_hash) = changes.password_hash {
            credentials.password_hash = password_hash;
        }
        Ok(Some(credentials.user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.users.len();
        store.users.retain(|c| c.user.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        for order in store.orders.iter_mut() {
            if order.user_id == Some(id) {
                order.user_id = None;
            }
        }
        Ok(true)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.store.read().await.users.len() as i64)
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        let store = self.store.read().await;
        Ok(store.orders_newest_first(store.orders.iter()))
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let store = self.store.read().await;
        Ok(store
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| store.populate_order(o)))
    }

    async fn orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        let store = self.store.read().await;
        Ok(store.orders_newest_first(
            store.orders.iter().filter(|o| o.user_id == Some(user_id)),
        ))
    }

    async fn create_order(&self, order: OrderRequest) -> RepoResult<Order> {
        // A single write guard covers pricing and both inserts.
        let mut store = self.store.write().await;
        if order.order_items.is_empty() {
            return Err(RepositoryError::EmptyOrder);
        }
        if let Some(user_id) = order.user {
            if !store.users.iter().any(|c| c.user.id == user_id) {
                return Err(RepositoryError::UnknownReference("user"));
            }
        }

        let mut total_price = 0.0;
        for item in &order.order_items {
            if item.quantity <= 0 {
                return Err(RepositoryError::InvalidQuantity(item.quantity));
            }
            let price = store
                .products
                .iter()
                .find(|p| p.id == item.product)
                .map(|p| p.price)
                .ok_or(RepositoryError::UnknownProduct(item.product))?;
            total_price += price * f64::from(item.quantity);
        }

        let order_id = Uuid::new_v4();
        for item in &order.order_items {
            store.order_items.push(OrderItemRecord {
                id: Uuid::new_v4(),
                order_id,
                product_id: Some(item.product),
                quantity: item.quantity,
            });
        }
        store.orders.push(OrderRecord {
            id: order_id,
            shipping_address1: order.shipping_address1,
            shipping_address2: order.shipping_address2,
            city: order.city,
            zip: order.zip,
            country: order.country,
            phone: order.phone,
            status: order
                .status
                .unwrap_or_else(|| DEFAULT_ORDER_STATUS.to_string()),
            total_price,
            user_id: order.user,
            created_at: Utc::now(),
        });

        let created = store
            .orders
            .last()
            .map(|o| store.populate_order(o))
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))?;
        Ok(created)
    }

    async fn update_order_status(&self, id: Uuid, status: String) -> RepoResult<Option<Order>> {
        let mut store = self.store.write().await;
        let Some(order) = store.orders.iter_mut().find(|o| o.id == id) else {
            return Ok(None);
        };
        order.status = status;
        Ok(store
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| store.populate_order(o)))
    }

    async fn delete_order(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.orders.len();
        store.orders.retain(|o| o.id != id);
        if store.orders.len() == before {
            return Ok(false);
        }
        store.order_items.retain(|item| item.order_id != id);
        Ok(true)
    }

    async fn count_orders(&self) -> RepoResult<i64> {
        Ok(self.store.read().await.orders.len() as i64)
    }

    async fn total_sales(&self) -> RepoResult<f64> {
        let store = self.store.read().await;
        Ok(store.orders.iter().map(|o| o.total_price).sum())
    }
}
