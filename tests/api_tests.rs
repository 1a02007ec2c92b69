use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use commerce_cart::{
    AppConfig, AppState, InMemoryRepository, create_router,
    auth::{Claims, hash_password},
    models::{NewUser, User},
    repository::{Repository, RepositoryState},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    state: AppState,
    admin: User,
    customer: User,
}

impl TestApp {
    fn token_for(&self, user: &User) -> String {
        self.state.tokens.issue(user.id).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

async fn seed_user(repo: &InMemoryRepository, email: &str, is_admin: bool) -> User {
    repo.create_user(NewUser {
        name: email.split('@').next().unwrap().to_string(),
        email: email.to_string(),
        password_hash: hash_password("secret-pass".to_string()).await.unwrap(),
        phone: "0300-1234567".to_string(),
        is_admin,
        ..NewUser::default()
    })
    .await
    .unwrap()
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let admin = seed_user(&repo, "admin@shop.test", true).await;
    let customer = seed_user(&repo, "customer@shop.test", false).await;

    let state = AppState::new(repo as RepositoryState, AppConfig::default()).unwrap();
    let router = create_router(state.clone());
    TestApp {
        router,
        state,
        admin,
        customer,
    }
}

fn error_envelope(message: &str) -> Value {
    json!({"header": {"error": 1, "message": message}})
}

// --- Operational routes ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_unknown_route_gets_not_found_envelope() {
    let app = spawn_app().await;
    let (status, body) = app.send(Method::GET, "/api/v1/nope?x=1", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, error_envelope("Not Found - /api/v1/nope?x=1"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

// --- Gates through the router ---

#[tokio::test]
async fn test_expired_token_on_admin_route() {
    let app = spawn_app().await;
    let now = Utc::now().timestamp();
    let expired = app
        .state
        .tokens
        .sign(&Claims {
            id: app.admin.id,
            iat: now - 3600,
            exp: now - 1,
        })
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/users", Some(&expired), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_envelope("Not authorized, token failed"));
}

#[tokio::test]
async fn test_non_admin_on_admin_route() {
    let app = spawn_app().await;
    let token = app.token_for(&app.customer);

    let (status, body) = app
        .send(Method::GET, "/api/v1/users", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_envelope("Not authorized as an admin"));
}

#[tokio::test]
async fn test_admin_lists_users_without_password_hashes() {
    let app = spawn_app().await;
    let token = app.token_for(&app.admin);

    let (status, body) = app
        .send(Method::GET, "/api/v1/users", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["header"]["error"], 0);
    let users = body["body"]["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
    assert_eq!(users[0]["isAdmin"], true);
}

#[tokio::test]
async fn test_missing_token_never_reaches_handler() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/categories",
            None,
            Some(json!({"name": "Sneaky"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_envelope("Not authorized, no token"));

    // Nothing was created behind the gate.
    assert!(app.state.repo.list_categories().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authenticated_route_accepts_any_signed_in_user() {
    let app = spawn_app().await;
    let token = app.token_for(&app.customer);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/users/{}", app.customer.id),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["header"]["message"], "User retrieved successfully.");
    assert_eq!(body["body"]["data"]["email"], "customer@shop.test");

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/v1/users/{}", app.customer.id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_and_admin_methods_share_a_path() {
    let app = spawn_app().await;
    let admin_token = app.token_for(&app.admin);
    let missing = Uuid::new_v4();

    // GET is public.
    let (status, body) = app
        .send(Method::GET, &format!("/api/v1/products/{missing}"), None, None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, error_envelope("Product Not Found"));

    // DELETE on the same path is admin only.
    let (status, body) = app
        .send(Method::DELETE, &format!("/api/v1/products/{missing}"), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_envelope("Not authorized, no token"));

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/products/{missing}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, error_envelope("Product Cannot be Deleted!"));
}

// --- End-to-end storefront flow ---

#[tokio::test]
async fn test_catalogue_and_order_flow() {
    let app = spawn_app().await;
    let admin_token = app.token_for(&app.admin);

    // Empty catalogue: success without a body.
    let (status, body) = app.send(Method::GET, "/api/v1/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"header": {"error": 0, "message": "No Categories Created!"}})
    );

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/categories",
            Some(&admin_token),
            Some(json!({"name": "Shoes", "color": "#ff0000"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let category_id = body["body"]["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/products",
            Some(&admin_token),
            Some(json!({
                "name": "Runner",
                "image": "https://cdn.shop.test/runner.png",
                "price": 40.0,
                "category": category_id,
                "countInStock": 10,
                "isFeatured": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["body"]["data"]["category"]["name"], "Shoes");
    let product_id = body["body"]["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/products?categories={category_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["header"]["message"], "Products retrieved sucsessfully!");
    assert_eq!(body["body"]["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(Method::GET, "/api/v1/products/get/featured/0", None, None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["body"]["data"]["count"], 1);

    // Order totals come from stored prices, not the client.
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/orders",
            None,
            Some(json!({
                "orderItems": [{"quantity": 3, "product": product_id}],
                "shippingAddress1": "1 Main St",
                "city": "Lahore",
                "country": "PK",
                "phone": "0300-1234567",
                "totalPrice": 1.0,
                "user": app.customer.id
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["body"]["data"]["totalPrice"], 120.0);
    assert_eq!(body["body"]["data"]["status"], "Pending");
    assert_eq!(body["body"]["data"]["user"]["name"], "customer");

    let (status, body) = app
        .send(Method::GET, "/api/v1/orders/get/totalsales", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"]["data"], json!({"totalSales": 120.0}));

    let customer_token = app.token_for(&app.customer);
    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/orders/get/userorders/{}", app.customer.id),
            Some(&customer_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["body"]["data"].as_array().unwrap().len(), 1);

    // A category with products cannot be deleted.
    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/categories/{category_id}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["header"]["error"], 1);
}

#[tokio::test]
async fn test_login_issues_working_token() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({"email": "admin@shop.test", "password": "secret-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["header"]["message"], "User Logged In successfully!");
    assert_eq!(body["body"]["data"]["user"], "admin@shop.test");
    assert_eq!(body["body"]["data"]["user_id"], app.admin.id.to_string());

    let token = body["body"]["data"]["token"].as_str().unwrap();
    let (status, body) = app
        .send(Method::GET, "/api/v1/users/get/count", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["body"]["data"], json!({"userCount": 2}));
}

#[tokio::test]
async fn test_malformed_json_body_gets_error_envelope() {
    let app = spawn_app().await;
    let request = Request::post("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["header"]["error"], 1);
    assert!(body.get("body").is_none());
}

#[tokio::test]
async fn test_empty_prefix_mounts_routes_at_root() {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let config = AppConfig {
        api_prefix: String::new(),
        ..AppConfig::default()
    };
    let router = create_router(AppState::new(repo, config).unwrap());

    let response = router
        .oneshot(Request::get("/categories").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Unsupported methods and malformed paths ---

#[tokio::test]
async fn test_unsupported_method_is_not_found_without_gate() {
    let app = spawn_app().await;

    // The path exists in the public and admin tiers, but not for PATCH.
    let (status, body) = app
        .send(Method::PATCH, "/api/v1/categories", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, error_envelope("Not Found - /api/v1/categories"));

    let admin_token = app.token_for(&app.admin);
    let (status, body) = app
        .send(Method::PATCH, "/api/v1/categories", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, error_envelope("Not Found - /api/v1/categories"));
}

#[tokio::test]
async fn test_unsupported_method_on_public_path() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(Method::PATCH, "/api/v1/products/get/featured/3", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        error_envelope("Not Found - /api/v1/products/get/featured/3")
    );
}

#[tokio::test]
async fn test_undecodable_path_segment_gets_error_envelope() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/api/v1/products/%FF")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["header"]["error"], 1);
    assert!(body["header"]["message"].as_str().is_some());
    assert!(body.get("body").is_none());
}

// --- API documentation ---

async fn openapi_server_url(router: Router) -> String {
    let response = router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    doc["servers"][0]["url"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_openapi_server_follows_configured_prefix() {
    let app = spawn_app().await;
    assert_eq!(openapi_server_url(app.router.clone()).await, "/api/v1");

    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let config = AppConfig {
        api_prefix: "/shop".to_string(),
        ..AppConfig::default()
    };
    let router = create_router(AppState::new(repo, config).unwrap());
    assert_eq!(openapi_server_url(router).await, "/shop");

    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let config = AppConfig {
        api_prefix: String::new(),
        ..AppConfig::default()
    };
    let router = create_router(AppState::new(repo, config).unwrap());
    assert_eq!(openapi_server_url(router).await, "/");
}
