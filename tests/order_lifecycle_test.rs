mod common;

use axum::http::{Method, StatusCode};
use common::{assert_success_flag, body_json, shipping_address, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn place_order(app: &TestApp, token: &str, product: Uuid, quantity: i32) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [{"product_id": product, "quantity": quantity}],
                "shipping_address": shipping_address(),
                "payment_method": "cash_on_delivery"
            })),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

async fn set_status(app: &TestApp, admin_token: &str, order_id: &str, status: &str) -> StatusCode {
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/admin/{order_id}/status"),
            Some(json!({"status": status})),
            Some(admin_token),
        )
        .await;
    response.status()
}

#[tokio::test]
async fn cancelling_a_pending_order_restores_stock_and_cascades() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let token = app.customer_token(user_id);
    let product = app.seed_product("Widget", dec!(40.00), 10).await;

    let order = place_order(&app, &token, product, 4).await;
    let order_id = order["id"].as_str().unwrap();

    let after_place = app
        .state
        .services
        .products
        .get_product(product)
        .await
        .unwrap();
    assert_eq!(after_place.stock, 6);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(json!({"reason": "ordered by mistake"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_success_flag(&body, true);
    assert_eq!(body["data"]["status"], json!("cancelled"));
    assert_eq!(
        body["data"]["cancellation_reason"],
        json!("ordered by mistake")
    );

    // Exactly the decremented quantities come back
    let after_cancel = app
        .state
        .services
        .products
        .get_product(product)
        .await
        .unwrap();
    assert_eq!(after_cancel.stock, 10);

    // Every line follows the order into cancelled
    for item in body["data"]["order_items"].as_array().unwrap() {
        assert_eq!(item["status"], json!("cancelled"));
    }
}

#[tokio::test]
async fn cancellation_is_rejected_once_shipped() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let token = app.customer_token(user_id);
    let admin_token = app.admin_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(40.00), 10).await;

    let order = place_order(&app, &token, product, 1).await;
    let order_id = order["id"].as_str().unwrap();

    for status in ["confirmed", "processing", "shipped"] {
        assert_eq!(
            set_status(&app, &admin_token, order_id, status).await,
            StatusCode::OK
        );
    }

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(json!({"reason": "too late"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("cannot be cancelled"));

    // Stock stays committed
    let after = app
        .state
        .services
        .products
        .get_product(product)
        .await
        .unwrap();
    assert_eq!(after.stock, 9);
}

#[tokio::test]
async fn status_advancement_follows_the_transition_table() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(40.00), 10).await;

    let order = place_order(&app, &token, product, 1).await;
    let order_id = order["id"].as_str().unwrap();

    // Skipping straight from pending to shipped is not in the table
    assert_eq!(
        set_status(&app, &admin_token, order_id, "shipped").await,
        StatusCode::BAD_REQUEST
    );

    // The legal path succeeds step by step
    for status in ["confirmed", "processing", "shipped", "delivered"] {
        assert_eq!(
            set_status(&app, &admin_token, order_id, status).await,
            StatusCode::OK,
            "transition to {status} should be permitted"
        );
    }

    // Delivered is terminal except for refund
    assert_eq!(
        set_status(&app, &admin_token, order_id, "processing").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn delivery_stamps_actual_date_and_cascades_to_items() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(40.00), 10).await;

    let order = place_order(&app, &token, product, 2).await;
    let order_id = order["id"].as_str().unwrap();
    assert!(order["actual_delivery_date"].is_null());

    for status in ["confirmed", "processing", "shipped", "delivered"] {
        set_status(&app, &admin_token, order_id, status).await;
    }

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&token),
        )
        .await;
    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["status"], json!("delivered"));
    assert!(data["actual_delivery_date"].is_string());
    for item in data["order_items"].as_array().unwrap() {
        assert_eq!(item["status"], json!("delivered"));
    }
}

#[tokio::test]
async fn admin_routes_reject_non_admin_callers() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_only = [
        (Method::GET, "/api/v1/orders/admin/all".to_string()),
        (Method::GET, "/api/v1/orders/admin/stats".to_string()),
        (
            Method::PATCH,
            format!("/api/v1/orders/admin/{}/status", Uuid::new_v4()),
        ),
        (
            Method::PATCH,
            format!("/api/v1/orders/admin/{}/payment", Uuid::new_v4()),
        ),
    ];

    for (method, uri) in admin_only {
        let body = (method == Method::PATCH).then(|| json!({"status": "confirmed"}));
        let response = app.request(method, &uri, body, Some(&token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_success_flag(&body, false);
}

#[tokio::test]
async fn payment_status_moves_independently_of_order_status() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(40.00), 10).await;

    let order = place_order(&app, &token, product, 1).await;
    let order_id = order["id"].as_str().unwrap();

    // Refund before payment is not in the payment table
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/admin/{order_id}/payment"),
            Some(json!({"payment_status": "refunded"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/admin/{order_id}/payment"),
            Some(json!({"payment_status": "paid", "payment_id": "pay_123"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["payment_status"], json!("paid"));
    assert_eq!(body["data"]["payment_id"], json!("pay_123"));
    // The order status axis is untouched
    assert_eq!(body["data"]["status"], json!("pending"));
}

#[tokio::test]
async fn order_listing_filters_and_paginates() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let token = app.customer_token(user_id);
    let admin_token = app.admin_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(10.00), 100).await;

    let mut first_order_id = String::new();
    for i in 0..3 {
        let order = place_order(&app, &token, product, i + 1).await;
        if i == 0 {
            first_order_id = order["id"].as_str().unwrap().to_string();
        }
    }
    set_status(&app, &admin_token, &first_order_id, "confirmed").await;

    // Another user's order must not show up
    let other_token = app.customer_token(Uuid::new_v4());
    place_order(&app, &other_token, product, 1).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/orders?page=1&per_page=2",
            None,
            Some(&token),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["pagination"]["total"], json!(3));
    assert_eq!(body["pagination"]["total_pages"], json!(2));
    assert_eq!(body["pagination"]["has_next_page"], json!(true));

    let response = app
        .request(
            Method::GET,
            "/api/v1/orders?status=confirmed",
            None,
            Some(&token),
        )
        .await;
    let body = body_json(response).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_str().unwrap(), first_order_id);

    // Admin sees everything
    let response = app
        .request(
            Method::GET,
            "/api/v1/orders/admin/all",
            None,
            Some(&admin_token),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], json!(4));
}

#[tokio::test]
async fn order_is_retrievable_by_number_for_its_owner_only() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(10.00), 10).await;

    let order = place_order(&app, &token, product, 1).await;
    let order_number = order["order_number"].as_str().unwrap();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/number/{order_number}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["order_number"], json!(order_number));

    let stranger = app.customer_token(Uuid::new_v4());
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/number/{order_number}"),
            None,
            Some(&stranger),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_aggregate_revenue_and_status_counts() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let product = app.seed_product("Widget", dec!(100.00), 100).await;

    // Two orders: 1 x 100 and 2 x 100 (both below free shipping)
    let order = place_order(&app, &token, product, 1).await;
    place_order(&app, &token, product, 2).await;
    set_status(
        &app,
        &admin_token,
        order["id"].as_str().unwrap(),
        "confirmed",
    )
    .await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/orders/admin/stats",
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let overview = &body["data"]["overview"];
    assert_eq!(overview["total_orders"], json!(2));
    assert_eq!(overview["pending_orders"], json!(1));
    assert_eq!(overview["confirmed_orders"], json!(1));

    let monthly = body["data"]["monthly_stats"].as_array().unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0]["orders"], json!(2));
}
