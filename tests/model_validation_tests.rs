use chrono::Utc;
use commerce_cart::models::{
    Category, LoginResponse, MIN_PASSWORD_LEN, Order, OrderRequest, Product, RegisterRequest,
    User, UserRef, is_valid_email,
};
use serde_json::json;
use uuid::Uuid;

// --- Email and registration checks ---

#[test]
fn test_email_syntax() {
    for good in ["a@b.co", "first.last@shop.test", "x-y@mail.example-host.org"] {
        assert!(is_valid_email(good), "{good} should be accepted");
    }
    for bad in [
        "",
        "plain",
        "@shop.test",
        "user@",
        "user@localhost",
        "user@shop..test",
        "us er@shop.test",
        "user@sh_op.test",
    ] {
        assert!(!is_valid_email(bad), "{bad} should be rejected");
    }
}

#[test]
fn test_register_request_reports_each_invalid_field() {
    let mut request = RegisterRequest {
        name: "Zara".to_string(),
        email: "zara@shop.test".to_string(),
        password: "x".repeat(MIN_PASSWORD_LEN),
        phone: "123".to_string(),
        ..RegisterRequest::default()
    };
    assert!(request.invalid_fields().is_empty());

    request.password = "x".repeat(MIN_PASSWORD_LEN - 1);
    assert_eq!(request.invalid_fields(), vec!["password"]);

    request.email = "zara".to_string();
    assert_eq!(request.invalid_fields(), vec!["email", "password"]);
}

#[test]
fn test_register_request_tolerates_missing_fields() {
    let request: RegisterRequest =
        serde_json::from_value(json!({"email": "a@b.co", "password": "secret1"})).unwrap();
    assert!(request.name.is_empty());
    assert!(request.invalid_fields().is_empty());
}

// --- Wire shapes ---

#[test]
fn test_user_json_never_carries_a_password() {
    let user = User {
        id: Uuid::new_v4(),
        name: "Zara".to_string(),
        email: "zara@shop.test".to_string(),
        is_admin: true,
        ..User::default()
    };

    let value = serde_json::to_value(&user).unwrap();
    assert_eq!(value["isAdmin"], true);
    assert!(value.get("passwordHash").is_none());
    assert!(value.get("password_hash").is_none());
    assert!(value.get("is_admin").is_none());
}

#[test]
fn test_login_response_keeps_snake_case_user_id() {
    let id = Uuid::new_v4();
    let value = serde_json::to_value(LoginResponse {
        user: "zara@shop.test".to_string(),
        user_id: id,
        token: "t".to_string(),
    })
    .unwrap();

    assert_eq!(
        value,
        json!({"user": "zara@shop.test", "user_id": id.to_string(), "token": "t"})
    );
}

#[test]
fn test_product_hides_raw_category_id() {
    let category = Category {
        id: Uuid::new_v4(),
        name: "Shoes".to_string(),
        color: None,
        icon: None,
    };
    let product = Product {
        id: Uuid::new_v4(),
        name: "Runner".to_string(),
        category_id: category.id,
        category: Some(category.clone()),
        count_in_stock: 4,
        date_created: Utc::now(),
        ..Product::default()
    };

    let value = serde_json::to_value(&product).unwrap();
    assert!(value.get("categoryId").is_none());
    assert_eq!(value["category"]["id"], category.id.to_string());
    assert_eq!(value["countInStock"], 4);
    assert!(value.get("richDescription").is_some());
    assert!(value.get("dateCreated").is_some());
}

#[test]
fn test_order_json_shape() {
    let order = Order {
        id: Uuid::new_v4(),
        shipping_address1: "1 Main St".to_string(),
        status: "Pending".to_string(),
        total_price: 9.5,
        user: Some(UserRef {
            id: Uuid::new_v4(),
            name: "Zara".to_string(),
        }),
        ..Order::default()
    };

    let value = serde_json::to_value(&order).unwrap();
    assert_eq!(value["shippingAddress1"], "1 Main St");
    assert_eq!(value["totalPrice"], 9.5);
    assert_eq!(value["user"]["name"], "Zara");
    assert!(value["orderItems"].as_array().unwrap().is_empty());
}

#[test]
fn test_order_request_accepts_storefront_body() {
    let product = Uuid::new_v4();
    let request: OrderRequest = serde_json::from_value(json!({
        "orderItems": [{"quantity": 2, "product": product}],
        "shippingAddress1": "1 Main St",
        "city": "Lahore",
        "country": "PK",
        "phone": "0300",
        "totalPrice": 9999
    }))
    .unwrap();

    assert_eq!(request.order_items.len(), 1);
    assert_eq!(request.order_items[0].product, product);
    assert!(request.status.is_none());
    assert!(request.user.is_none());
}
