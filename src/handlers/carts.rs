use crate::handlers::common::{parse_id, success_response, success_with_message, validate_input};
use crate::{
    auth::AuthUser, errors::ServiceError, services::carts::AddToCartInput, AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Cart routes, all scoped to the calling user's single cart.
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/summary", get(cart_summary))
        .route("/validate", post(validate_cart))
        .route("/items", post(add_to_cart))
        .route(
            "/items/{product_id}",
            axum::routing::patch(update_cart_item).delete(remove_cart_item),
        )
}

/// Get the caller's cart, creating it on first access
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "Get cart",
    responses(
        (status = 200, description = "Cart retrieved successfully"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.get_cart(user.user_id).await?;
    Ok(success_response(cart))
}

/// Add an item to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    summary = "Add item to cart",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Item added to cart successfully"),
        (status = 400, description = "Inactive product or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .add_item(
            user.user_id,
            AddToCartInput {
                product_id: payload.product_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(success_with_message("Item added to cart successfully", cart))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<String>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_id = parse_id(&product_id, "product")?;
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .update_item_quantity(user.user_id, product_id, payload.quantity)
        .await?;

    Ok(success_with_message("Cart item updated successfully", cart))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_id = parse_id(&product_id, "product")?;

    let cart = state
        .services
        .carts
        .remove_item(user.user_id, product_id)
        .await?;

    Ok(success_with_message(
        "Item removed from cart successfully",
        cart,
    ))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.clear_cart(user.user_id).await?;
    Ok(success_with_message("Cart cleared successfully", cart))
}

pub async fn cart_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.carts.summary(user.user_id).await?;
    Ok(success_response(summary))
}

/// Reconcile the cart against the live catalog, repairing stale lines.
pub async fn validate_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let validation = state.services.carts.validate_cart(user.user_id).await?;
    Ok(success_response(validation))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be greater than 0"))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, message = "Quantity must be greater than 0"))]
    pub quantity: i32,
}
