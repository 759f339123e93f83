use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_api::{
    auth::Claims,
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    services::products::CreateProductInput,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application backed by an in-memory
/// SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        // A single connection keeps the in-memory database alive and shared.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Mint a bearer token for an ordinary customer.
    pub fn customer_token(&self, user_id: Uuid) -> String {
        self.token_with_roles(user_id, vec!["customer".to_string()])
    }

    /// Mint a bearer token carrying the admin role.
    pub fn admin_token(&self, user_id: Uuid) -> String {
        self.token_with_roles(user_id, vec!["admin".to_string()])
    }

    fn token_with_roles(&self, user_id: Uuid, roles: Vec<String>) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            name: Some("Test User".to_string()),
            email: Some("test@example.com".to_string()),
            roles,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.state.config.jwt_secret.as_bytes()),
        )
        .expect("encode access token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Seed a catalog product directly through the service layer.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> Uuid {
        self.seed_product_with_activity(name, price, stock, true)
            .await
    }

    pub async fn seed_product_with_activity(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        is_active: bool,
    ) -> Uuid {
        let product = self
            .state
            .services
            .products
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: Some(format!("{} seeded for integration tests", name)),
                price,
                stock,
                is_active,
                category_ids: vec![],
                brand: None,
                image: None,
            })
            .await
            .expect("seed product for tests");
        product.id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Decode a response body into JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Standard shipping address payload used across tests.
pub fn shipping_address() -> Value {
    json!({
        "full_name": "Asha Rao",
        "phone_number": "+91-9876543210",
        "street_address": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "postal_code": "560001",
        "country": "India"
    })
}

/// Assert the envelope `{success: ...}` flag on a JSON body.
pub fn assert_success_flag(body: &Value, expected: bool) {
    assert_eq!(
        body["success"],
        Value::Bool(expected),
        "unexpected success flag in body: {body}"
    );
}

#[allow(dead_code)]
pub fn expect_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
