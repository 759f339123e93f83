use crate::handlers::common::{
    created_response, paginated_response, parse_id, success_response, success_with_message,
    validate_input, PaginationParams,
};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::order::{OrderStatus, PaymentMethod, PaymentStatus},
    errors::ServiceError,
    services::orders::{
        Address, AdminOrderListQuery, OrderLineInput, OrderListQuery, PlaceOrderInput,
        UpdateOrderStatusInput, UpdatePaymentStatusInput,
    },
    services::Requester,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Order routes: placement, the owner's read surface and the admin lifecycle
/// surface.
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/from-cart", post(create_order_from_cart))
        .route("/number/{order_number}", get(get_order_by_number))
        .route("/admin/all", get(admin_list_orders))
        .route("/admin/stats", get(admin_order_stats))
        .route("/admin/{id}/status", patch(admin_update_status))
        .route("/admin/{id}/payment", patch(admin_update_payment))
        .route("/{id}", get(get_order))
        .route("/{id}/items", get(get_order_items))
        .route("/{id}/cancel", patch(cancel_order))
}

fn requester_for(user: &AuthUser) -> Requester {
    if user.is_admin() {
        Requester::Admin
    } else {
        Requester::Owner(user.user_id)
    }
}

/// Place an order from the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/orders/from-cart",
    summary = "Place order from cart",
    request_body = CreateOrderFromCartRequest,
    responses(
        (status = 201, description = "Order created successfully"),
        (status = 400, description = "Empty cart, inactive product or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderFromCartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .place_from_cart(
            user.user_id,
            PlaceOrderInput {
                shipping_address: payload.shipping_address,
                billing_address: payload.billing_address,
                payment_method: payload.payment_method,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(created_response("Order created successfully", order))
}

/// Place an order from an explicit item list
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Place order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully"),
        (status = 400, description = "Invalid items, inactive product or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .place_direct(
            user.user_id,
            payload.items,
            PlaceOrderInput {
                shipping_address: payload.shipping_address,
                billing_address: payload.billing_address,
                payment_method: payload.payment_method,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(created_response("Order created successfully", order))
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_by" = Option<String>, Query, description = "created_at | total_amount"),
        ("sort_order" = Option<String>, Query, description = "asc | desc"),
    ),
    responses((status = 200, description = "Orders retrieved successfully")),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (orders, total) = state
        .services
        .orders
        .list_orders(user.user_id, query, pagination.page, pagination.per_page)
        .await?;

    Ok(paginated_response(
        orders,
        pagination.page,
        pagination.per_page,
        total,
    ))
}

/// Get one order with its items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state
        .services
        .orders
        .get_order(id, requester_for(&user))
        .await?;
    Ok(success_response(order))
}

pub async fn get_order_by_number(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_by_number(&order_number, requester_for(&user))
        .await?;
    Ok(success_response(order))
}

pub async fn get_order_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let items = state
        .services
        .order_items
        .list_for_order(id, requester_for(&user))
        .await?;
    Ok(success_response(items))
}

/// Cancel a pending or confirmed order
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    params(("id" = String, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled successfully"),
        (status = 400, description = "Order is not cancellable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<CancelOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state
        .services
        .orders
        .cancel_order(user.user_id, id, payload.reason)
        .await?;
    Ok(success_with_message("Order cancelled successfully", order))
}

pub async fn admin_list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<AdminOrderListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (orders, total) = state
        .services
        .orders
        .list_all_orders(query, pagination.page, pagination.per_page)
        .await?;

    Ok(paginated_response(
        orders,
        pagination.page,
        pagination.per_page,
        total,
    ))
}

/// Advance an order through its lifecycle
#[utoipa::path(
    patch,
    path = "/api/v1/orders/admin/{id}/status",
    summary = "Update order status",
    params(("id" = String, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated successfully"),
        (status = 400, description = "Transition not permitted", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn admin_update_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state
        .services
        .orders
        .update_order_status(
            id,
            UpdateOrderStatusInput {
                status: payload.status,
                tracking_number: payload.tracking_number,
                expected_delivery_date: payload.expected_delivery_date,
            },
        )
        .await?;
    Ok(success_with_message(
        "Order status updated successfully",
        order,
    ))
}

pub async fn admin_update_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePaymentStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order")?;
    let order = state
        .services
        .orders
        .update_payment_status(
            id,
            UpdatePaymentStatusInput {
                payment_status: payload.payment_status,
                payment_id: payload.payment_id,
            },
        )
        .await?;
    Ok(success_with_message(
        "Payment status updated successfully",
        order,
    ))
}

pub async fn admin_order_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.orders.order_stats().await?;
    Ok(success_response(stats))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderFromCartRequest {
    #[validate]
    pub shipping_address: Address,
    #[validate]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order items are required"))]
    pub items: Vec<OrderLineInput>,
    #[validate]
    pub shipping_address: Address,
    #[validate]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
}
