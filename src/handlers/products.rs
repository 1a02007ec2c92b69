use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AdminUser,
    envelope::{ApiResponse, Envelope},
    error::{AppError, AppResult, OrFail},
    extract::{AppJson, AppPath, parse_id},
    models::{
        FeaturedProducts, GalleryRequest, NewProduct, ProductChanges, ProductCount,
        ProductRequest, Success,
    },
    repository::RepositoryError,
};

use super::not_blank;

/// Inclusive bounds for `countInStock`.
const STOCK_RANGE: std::ops::RangeInclusive<i32> = 0..=255;

/// ProductFilter
///
/// Query parameters for GET /products.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ProductFilter {
    /// Comma separated category ids, e.g. `?categories=<id>,<id>`.
    pub categories: Option<String>,
}

fn invalid_category() -> AppError {
    AppError::BadRequest("Invalid Category".to_string())
}

/// Parses the `categories` filter. An empty value means "no filter".
fn parse_category_filter(raw: Option<&str>) -> Result<Option<Vec<Uuid>>, AppError> {
    let ids = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Uuid::parse_str(part).map_err(|_| invalid_category()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(if ids.is_empty() { None } else { Some(ids) })
}

fn parse_category(raw: Option<&str>) -> Result<Uuid, AppError> {
    raw.and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(invalid_category)
}

/// `0` or anything unparsable means "all featured products".
fn featured_limit(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n.checked_abs().unwrap_or(i64::MAX)),
    }
}

/// list_products
///
/// [Public Route] Lists products, optionally restricted to a set of categories.
/// Each product carries its populated category.
#[utoipa::path(
    get,
    path = "/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Products", body = Envelope),
        (status = 400, description = "Malformed category filter", body = Envelope)
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult {
    let categories = parse_category_filter(filter.categories.as_deref())?;
    let products = state.repo.list_products(categories).await.or_fail(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Cannot retrieve products from database",
    )?;

    Ok(ApiResponse::data(
        StatusCode::OK,
        &products,
        "Products retrieved sucsessfully!",
    ))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 201, description = "Found", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 500, description = "Not found", body = Envelope)
    )
)]
pub async fn get_product(State(state): State<AppState>, AppPath(raw_id): AppPath<String>) -> AppResult {
    let id = parse_id(&raw_id, format!("Product with id {raw_id} doesn't exist"))?;

    match state.repo.get_product(id).await? {
        Some(product) => Ok(ApiResponse::data(
            StatusCode::CREATED,
            &product,
            "Product retrived successfully!",
        )),
        None => Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Product Not Found",
        )),
    }
}

/// create_product
///
/// [Admin Route] Creates a product. The category must be a well-formed id of an
/// existing category and a main image URL is mandatory.
#[utoipa::path(
    post,
    path = "/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Created", body = Envelope),
        (status = 400, description = "Invalid category or missing image", body = Envelope),
        (status = 500, description = "Rejected", body = Envelope)
    )
)]
pub async fn create_product(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ProductRequest>,
) -> AppResult {
    let category_id = parse_category(payload.category.as_deref())?;
    let image = not_blank(payload.image)
        .ok_or_else(|| AppError::BadRequest("No Image File Uploaded".to_string()))?;

    let cannot_create =
        || AppError::failure(StatusCode::INTERNAL_SERVER_ERROR, "The product cannot be Created!");
    let name = not_blank(payload.name).ok_or_else(cannot_create)?;
    let count_in_stock = payload
        .count_in_stock
        .filter(|count| STOCK_RANGE.contains(count))
        .ok_or_else(cannot_create)?;

    let product = NewProduct {
        name,
        description: payload.description.unwrap_or_default(),
        rich_description: payload.rich_description.unwrap_or_default(),
        image,
        brand: payload.brand.unwrap_or_default(),
        price: payload.price.unwrap_or_default(),
        category_id,
        count_in_stock,
        rating: payload.rating.unwrap_or_default(),
        num_reviews: payload.num_reviews.unwrap_or_default(),
        is_featured: payload.is_featured.unwrap_or_default(),
    };

    match state.repo.create_product(product).await {
        Ok(product) => {
            tracing::info!("product {} created by {}", product.id, admin.id);
            Ok(ApiResponse::data(
                StatusCode::CREATED,
                &product,
                "Product was created sucessfully!",
            ))
        }
        Err(RepositoryError::UnknownReference(_)) => Err(invalid_category()),
        Err(e) => Err(e).or_fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "The product cannot be Created!",
        ),
    }
}

/// update_product_gallery
///
/// [Admin Route] Replaces the product's gallery with the given image URLs.
#[utoipa::path(
    put,
    path = "/products/gallery-images/{id}",
    params(("id" = String, Path, description = "Product ID")),
    request_body = GalleryRequest,
    responses(
        (status = 201, description = "Gallery replaced", body = Envelope),
        (status = 500, description = "Not found", body = Envelope)
    )
)]
pub async fn update_product_gallery(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
    AppJson(payload): AppJson<GalleryRequest>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("Product with id {raw_id} doesn't exist"))?;

    let updated = state
        .repo
        .set_product_images(id, payload.images)
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, "Gallery Images not Uploaded!")?;

    match updated {
        Some(product) => Ok(ApiResponse::data(
            StatusCode::CREATED,
            &product,
            "Gallery Images were uploaded successfully!",
        )),
        None => Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Gallery Images not Uploaded!",
        )),
    }
}

/// update_product
///
/// [Admin Route] Partial update. A valid `category` must accompany every update.
#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product ID")),
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Updated", body = Envelope),
        (status = 400, description = "Malformed id or invalid category", body = Envelope),
        (status = 500, description = "Not updated", body = Envelope)
    )
)]
pub async fn update_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
    AppJson(payload): AppJson<ProductRequest>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("Product with id {raw_id} doesn't exist"))?;
    let category_id = parse_category(payload.category.as_deref())?;

    let not_updated =
        || AppError::failure(StatusCode::INTERNAL_SERVER_ERROR, "Product was not updated!");
    if payload
        .count_in_stock
        .is_some_and(|count| !STOCK_RANGE.contains(&count))
    {
        return Err(not_updated());
    }

    let changes = ProductChanges {
        name: payload.name,
        description: payload.description,
        rich_description: payload.rich_description,
        image: payload.image,
        brand: payload.brand,
        price: payload.price,
        category_id: Some(category_id),
        count_in_stock: payload.count_in_stock,
        rating: payload.rating,
        num_reviews: payload.num_reviews,
        is_featured: payload.is_featured,
    };

    match state.repo.update_product(id, changes).await {
        Ok(Some(product)) => Ok(ApiResponse::data(
            StatusCode::CREATED,
            &product,
            "Product was updated successfully!",
        )),
        Ok(None) => Err(not_updated()),
        Err(RepositoryError::UnknownReference(_)) => Err(invalid_category()),
        Err(e) => Err(e).or_fail(StatusCode::INTERNAL_SERVER_ERROR, "Product was not updated!"),
    }
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 201, description = "Deleted", body = Envelope),
        (status = 500, description = "Not deleted", body = Envelope)
    )
)]
pub async fn delete_product(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("Product with id {raw_id} doesn't exist"))?;

    let deleted = state
        .repo
        .delete_product(id)
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, "Product Cannot be Deleted!")?;

    if !deleted {
        return Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Product Cannot be Deleted!",
        ));
    }
    tracing::info!("product {} deleted by {}", id, admin.id);
    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &Success { success: true },
        "Product Deleted Successfully",
    ))
}

/// count_products
///
/// [Admin Route] An empty catalogue is reported as a failure.
#[utoipa::path(
    get,
    path = "/products/get/count",
    responses(
        (status = 201, description = "Count", body = Envelope),
        (status = 500, description = "Nothing to count", body = Envelope)
    )
)]
pub async fn count_products(_admin: AdminUser, State(state): State<AppState>) -> AppResult {
    let product_count = state
        .repo
        .count_products()
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, "Error while counting products!")?;

    if product_count == 0 {
        return Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error while counting products!",
        ));
    }
    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &ProductCount { product_count },
        "Product Count retrieved successfully!",
    ))
}

/// featured_products
///
/// [Public Route] Up to `count` featured products; `0` returns all of them.
#[utoipa::path(
    get,
    path = "/products/get/featured/{count}",
    params(("count" = String, Path, description = "Maximum number of products, 0 for all")),
    responses((status = 201, description = "Featured products", body = Envelope))
)]
pub async fn featured_products(
    State(state): State<AppState>,
    AppPath(count): AppPath<String>,
) -> AppResult {
    let featured_products = state
        .repo
        .featured_products(featured_limit(&count))
        .await
        .or_fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot retrieve featured products from database",
        )?;

    let count = featured_products.len();
    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &FeaturedProducts {
            featured_products,
            count,
        },
        "Retrieves featured products successfully!",
    ))
}

