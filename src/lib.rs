use std::{any::Any, sync::Arc};

use axum::{
    Router,
    extract::{FromRef, OriginalUri},
    http::{HeaderName, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use utoipa::{OpenApi, openapi::Server};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::{TokenIssuer, TokenState, admin_middleware, auth_middleware};
use envelope::ApiResponse;
use handlers::{categories, orders, products, users};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::{AppConfig, ConfigError};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every documented handler and wire schema into the OpenAPI document
/// served at `/api-docs/openapi.json`. Paths are relative to the API prefix, which
/// `api_doc` publishes as the document's server URL.
#[derive(OpenApi)]
#[openapi(
    paths(
        categories::list_categories, categories::get_category, categories::create_category,
        categories::update_category, categories::delete_category,
        products::list_products, products::get_product, products::create_product,
        products::update_product_gallery, products::update_product, products::delete_product,
        products::count_products, products::featured_products,
        users::list_users, users::get_user, users::register_user, users::login_user,
        users::count_users, users::delete_user, users::update_profile,
        orders::list_orders, orders::get_order, orders::create_order,
        orders::update_order_status, orders::delete_order, orders::total_sales,
        orders::total_orders, orders::user_orders
    ),
    components(
        schemas(
            envelope::Envelope, envelope::Header, envelope::Body,
            models::User, models::UserRef, models::Category, models::Product,
            models::OrderItem, models::Order, models::CategoryRequest, models::ProductRequest,
            models::GalleryRequest, models::RegisterRequest, models::LoginRequest,
            models::LoginResponse, models::ProfileUpdateRequest, models::OrderItemRequest,
            models::OrderRequest, models::OrderStatusRequest, models::ProductCount,
            models::UserCount, models::OrderCount, models::TotalSales,
            models::FeaturedProducts, models::Success,
        )
    ),
    tags(
        (name = "commerce-cart", description = "Storefront REST API")
    )
)]
struct ApiDoc;

/// The OpenAPI document with its server URL set to the configured prefix.
fn api_doc(api_prefix: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let url = if api_prefix.is_empty() { "/" } else { api_prefix };
    doc.servers = Some(vec![Server::new(url)]);
    doc
}

/// AppState
///
/// The single, immutable container holding every shared service. Cloned per request;
/// each field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Identity and entity store.
    pub repo: RepositoryState,
    /// Credential signer and verifier, keyed by `JWT_SECRET`.
    pub tokens: TokenState,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state, deriving the token issuer from `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, ConfigError> {
        let tokens = Arc::new(TokenIssuer::from_config(&config)?);
        Ok(Self {
            repo,
            tokens,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

// Lets the gates and handlers pull single components out of the shared state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the three route tiers under the configured API prefix, adds the
/// operational routes, and wraps everything in the observability stack.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Entity routes. Each gated tier carries its own route_layer, so the gate only
    // runs for routes that matched in that tier.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        );

    // 3. Base Router Assembly
    let prefix = state.config.api_prefix.clone();
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc(&prefix)))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }));

    // axum refuses to nest at "" or "/", so an empty prefix merges instead.
    let base_router = if prefix.is_empty() {
        base_router.merge(api)
    } else {
        base_router.nest(&prefix, api)
    };

    // Unsupported methods on a known path get the same 404 as unknown paths, and
    // skip the gates of the tier that owns the path.
    let base_router = base_router
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state);

    // 4. Observability and Correlation Layers (outermost first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing, with the request id in the span.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // 4d. A panicking handler still answers with an envelope.
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// Catch-all for unmatched routes.
async fn not_found(OriginalUri(uri): OriginalUri) -> ApiResponse {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    ApiResponse::failure(StatusCode::NOT_FOUND, format!("Not Found - {target}"))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!("handler panicked: {}", detail);
    ApiResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        .into_response()
}

/// trace_span_logger
///
/// Builds the per-request tracing span so every log line of one request carries
/// the same `req_id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
