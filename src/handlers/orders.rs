use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    envelope::{ApiResponse, Envelope},
    error::{AppError, AppResult, OrFail},
    extract::{AppJson, AppPath, parse_id, parse_id_or},
    models::{OrderCount, OrderRequest, OrderStatusRequest, Success, TotalSales},
};

/// list_orders
///
/// [Public Route] Every order, newest first, with items and buyer populated.
#[utoipa::path(
    get,
    path = "/orders",
    responses((status = 201, description = "All orders", body = Envelope))
)]
pub async fn list_orders(State(state): State<AppState>) -> AppResult {
    let orders = state
        .repo
        .list_orders()
        .await
        .or_fail(StatusCode::BAD_REQUEST, "Orders not retrieved")?;

    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &orders,
        "Orders Succesfully Retrieved!",
    ))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 201, description = "Found", body = Envelope),
        (status = 500, description = "Not found", body = Envelope)
    )
)]
pub async fn get_order(State(state): State<AppState>, AppPath(raw_id): AppPath<String>) -> AppResult {
    let not_found = format!("Order with {raw_id} not Found");
    let id = parse_id_or(&raw_id, StatusCode::INTERNAL_SERVER_ERROR, not_found.clone())?;

    match state.repo.get_order(id).await? {
        Some(order) => Ok(ApiResponse::data(
            StatusCode::CREATED,
            &order,
            "Order Retrieved Successfully!",
        )),
        None => Err(AppError::failure(StatusCode::INTERNAL_SERVER_ERROR, not_found)),
    }
}

/// create_order
///
/// [Public Route] Places an order. The total is computed from the stored product
/// prices; items, total and order are written together or not at all.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderRequest,
    responses(
        (status = 201, description = "Created", body = Envelope),
        (status = 400, description = "Unknown product, user or empty order", body = Envelope)
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<OrderRequest>,
) -> AppResult {
    match state.repo.create_order(payload).await {
        Ok(order) => {
            tracing::info!(
                "order {} created, {} item(s), total {}",
                order.id,
                order.order_items.len(),
                order.total_price
            );
            Ok(ApiResponse::data(
                StatusCode::CREATED,
                &order,
                "Order Successfully Created!",
            ))
        }
        Err(e) if e.is_client_error() => {
            tracing::warn!("order rejected: {}", e);
            Err(AppError::BadRequest("Order cannot be Created!".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(("id" = String, Path, description = "Order ID")),
    request_body = OrderStatusRequest,
    responses(
        (status = 201, description = "Status updated", body = Envelope),
        (status = 500, description = "Not updated", body = Envelope)
    )
)]
pub async fn update_order_status(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
    AppJson(payload): AppJson<OrderStatusRequest>,
) -> AppResult {
    let not_updated = "Order Status Cannot be Updated.";
    let id = parse_id_or(&raw_id, StatusCode::INTERNAL_SERVER_ERROR, not_updated)?;

    let updated = state
        .repo
        .update_order_status(id, payload.status)
        .await
        .or_fail(StatusCode::INTERNAL_SERVER_ERROR, not_updated)?;

    match updated {
        Some(order) => {
            tracing::info!("order {} set to {:?} by {}", order.id, order.status, admin.id);
            Ok(ApiResponse::data(
                StatusCode::CREATED,
                &order,
                "Order Status Updated Succssfully",
            ))
        }
        None => Err(AppError::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            not_updated,
        )),
    }
}

/// delete_order
///
/// [Admin Route] Removes the order together with its items.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Deleted", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope),
        (status = 404, description = "Not found", body = Envelope)
    )
)]
pub async fn delete_order(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
) -> AppResult {
    let id = parse_id(&raw_id, format!("Order with id {raw_id} doesn't exist."))?;

    let deleted = state
        .repo
        .delete_order(id)
        .await
        .or_fail(StatusCode::BAD_REQUEST, "Order cannot be deleted!")?;

    if !deleted {
        return Err(AppError::failure(StatusCode::NOT_FOUND, "Order Not Found"));
    }
    tracing::info!("order {} deleted by {}", id, admin.id);
    Ok(ApiResponse::data(
        StatusCode::OK,
        &Success { success: true },
        "Order succesfully Deleted",
    ))
}

/// total_sales
///
/// [Admin Route] Sum of every order's total. No orders means a total of zero.
#[utoipa::path(
    get,
    path = "/orders/get/totalsales",
    responses((status = 200, description = "Total sales", body = Envelope))
)]
pub async fn total_sales(_admin: AdminUser, State(state): State<AppState>) -> AppResult {
    let total_sales = state
        .repo
        .total_sales()
        .await
        .or_fail(StatusCode::BAD_REQUEST, "Total Sales Cannot be Generated.")?;

    Ok(ApiResponse::data(
        StatusCode::OK,
        &TotalSales { total_sales },
        "Total Sales Generated Sucessfully!",
    ))
}

#[utoipa::path(
    get,
    path = "/orders/get/totalorders",
    responses(
        (status = 200, description = "Order count", body = Envelope),
        (status = 400, description = "No orders", body = Envelope)
    )
)]
pub async fn total_orders(_admin: AdminUser, State(state): State<AppState>) -> AppResult {
    let cannot_count = "Cannot fetched total Orders...";
    let total_orders = state
        .repo
        .count_orders()
        .await
        .or_fail(StatusCode::BAD_REQUEST, cannot_count)?;

    if total_orders == 0 {
        return Err(AppError::BadRequest(cannot_count.to_string()));
    }
    Ok(ApiResponse::data(
        StatusCode::OK,
        &OrderCount { total_orders },
        "Total Number of Orders fetched.",
    ))
}

/// user_orders
///
/// [Authenticated Route] Order history of one user, newest first.
#[utoipa::path(
    get,
    path = "/orders/get/userorders/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 201, description = "Orders of the user", body = Envelope),
        (status = 400, description = "Malformed id", body = Envelope)
    )
)]
pub async fn user_orders(
    _caller: AuthUser,
    State(state): State<AppState>,
    AppPath(raw_id): AppPath<String>,
) -> AppResult {
    let not_retrieved = "User OrderList not retrieved";
    let user_id = parse_id(&raw_id, not_retrieved)?;

    let orders = state
        .repo
        .orders_for_user(user_id)
        .await
        .or_fail(StatusCode::BAD_REQUEST, not_retrieved)?;

    Ok(ApiResponse::data(
        StatusCode::CREATED,
        &orders,
        "User OrderList Succesfully Retrieved!",
    ))
}
