mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{assert_success_flag, body_json, shipping_address, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use storefront_api::entities::order_item;
use uuid::Uuid;

/// Place a one-line order and walk it to delivered; returns (order id, order
/// item id).
async fn delivered_order(app: &TestApp, token: &str, admin_token: &str) -> (String, String) {
    let product = app.seed_product("Returnable widget", dec!(30.00), 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [{"product_id": product, "quantity": 1}],
                "shipping_address": shipping_address(),
                "payment_method": "credit_card"
            })),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let data = body_json(response).await["data"].clone();
    let order_id = data["id"].as_str().unwrap().to_string();
    let item_id = data["order_items"][0]["id"].as_str().unwrap().to_string();

    for status in ["confirmed", "processing", "shipped", "delivered"] {
        let response = app
            .request(
                Method::PATCH,
                &format!("/api/v1/orders/admin/{order_id}/status"),
                Some(json!({"status": status})),
                Some(admin_token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    (order_id, item_id)
}

async fn request_return(app: &TestApp, token: &str, item_id: &str, reason: &str) -> (StatusCode, Value) {
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/order-items/{item_id}/return"),
            Some(json!({"reason": reason})),
            Some(token),
        )
        .await;
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn delivered_item_can_be_returned_within_window() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;

    let (status, body) = request_return(&app, &token, &item_id, "wrong size").await;
    assert_eq!(status, StatusCode::OK);
    assert_success_flag(&body, true);
    assert_eq!(body["data"]["return_requested"], json!(true));
    assert_eq!(body["data"]["return_status"], json!("requested"));
    assert_eq!(body["data"]["return_reason"], json!("wrong size"));

    // A second request on the same line is rejected
    let (status, body) = request_return(&app, &token, &item_id, "still wrong").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("already requested"));
}

#[tokio::test]
async fn undelivered_items_cannot_be_returned() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let product = app.seed_product("Fresh widget", dec!(30.00), 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [{"product_id": product, "quantity": 1}],
                "shipping_address": shipping_address(),
                "payment_method": "upi"
            })),
            Some(&token),
        )
        .await;
    let data = body_json(response).await["data"].clone();
    let item_id = data["order_items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = request_return(&app, &token, &item_id, "changed my mind").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Only delivered items"));
}

#[tokio::test]
async fn return_window_expires_after_thirty_days() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;

    // Backdate the delivery far beyond the window
    let item_uuid = Uuid::parse_str(&item_id).unwrap();
    let stale = order_item::Entity::find_by_id(item_uuid)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut stale: order_item::ActiveModel = stale.into();
    stale.updated_at = Set(Utc::now() - Duration::days(31));
    stale.update(&*app.state.db).await.unwrap();

    let (status, body) = request_return(&app, &token, &item_id, "too slow").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("window has expired"));
}

#[tokio::test]
async fn blank_reason_is_rejected() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;

    let (status, _) = request_return(&app, &token, &item_id, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strangers_cannot_return_someone_elses_item() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;

    let stranger = app.customer_token(Uuid::new_v4());
    let (status, _) = request_return(&app, &stranger, &item_id, "not mine").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approval_then_completion_marks_item_returned() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;
    request_return(&app, &token, &item_id, "defective").await;

    // Completion without approval is not in the table
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/order-items/admin/{item_id}/return-status"),
            Some(json!({"return_status": "completed"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for (return_status, expected_item_status) in
        [("approved", "delivered"), ("completed", "returned")]
    {
        let response = app
            .request(
                Method::PATCH,
                &format!("/api/v1/order-items/admin/{item_id}/return-status"),
                Some(json!({"return_status": return_status})),
                Some(&admin_token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["return_status"], json!(return_status));
        assert_eq!(body["data"]["status"], json!(expected_item_status));
    }
}

#[tokio::test]
async fn rejected_returns_are_terminal() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;
    request_return(&app, &token, &item_id, "scratched").await;

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/order-items/admin/{item_id}/return-status"),
            Some(json!({"return_status": "rejected"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/order-items/admin/{item_id}/return-status"),
            Some(json!({"return_status": "completed"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn return_status_updates_require_an_existing_request() {
    let app = TestApp::new().await;
    let token = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());
    let (_, item_id) = delivered_order(&app, &token, &admin_token).await;

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/order-items/admin/{item_id}/return-status"),
            Some(json!({"return_status": "approved"})),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No return request"));
}

#[tokio::test]
async fn return_listings_are_scoped() {
    let app = TestApp::new().await;
    let user_a = Uuid::new_v4();
    let token_a = app.customer_token(user_a);
    let token_b = app.customer_token(Uuid::new_v4());
    let admin_token = app.admin_token(Uuid::new_v4());

    let (_, item_a) = delivered_order(&app, &token_a, &admin_token).await;
    let (_, item_b) = delivered_order(&app, &token_b, &admin_token).await;
    request_return(&app, &token_a, &item_a, "reason a").await;
    request_return(&app, &token_b, &item_b, "reason b").await;

    // Each user sees only their own requests
    let response = app
        .request(
            Method::GET,
            "/api/v1/order-items/returns",
            None,
            Some(&token_a),
        )
        .await;
    let body = body_json(response).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_str().unwrap(), item_a);

    // Admin sees both, and can filter by return status
    let response = app
        .request(
            Method::GET,
            "/api/v1/order-items/admin/returns",
            None,
            Some(&admin_token),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], json!(2));

    let response = app
        .request(
            Method::GET,
            "/api/v1/order-items/admin/returns?return_status=approved",
            None,
            Some(&admin_token),
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], json!(0));
}
