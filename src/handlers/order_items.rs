use crate::handlers::common::{
    paginated_response, parse_id, success_response, success_with_message, validate_input,
    PaginationParams,
};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::order_item::{OrderItemStatus, ReturnStatus},
    errors::ServiceError,
    services::order_items::ReturnListQuery,
    services::Requester,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Order item routes: per-line reads, the customer return flow and the admin
/// return workflow.
pub fn order_items_routes() -> Router<AppState> {
    Router::new()
        .route("/returns", get(list_my_return_requests))
        .route("/admin/returns", get(admin_list_return_requests))
        .route("/admin/{id}/status", patch(admin_update_item_status))
        .route("/admin/{id}/return-status", patch(admin_update_return_status))
        .route("/{id}", get(get_order_item))
        .route("/{id}/return", post(request_return))
}

fn requester_for(user: &AuthUser) -> Requester {
    if user.is_admin() {
        Requester::Admin
    } else {
        Requester::Owner(user.user_id)
    }
}

pub async fn get_order_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order item")?;
    let item = state
        .services
        .order_items
        .get_order_item(id, requester_for(&user))
        .await?;
    Ok(success_response(item))
}

/// Request a return for a delivered item
#[utoipa::path(
    post,
    path = "/api/v1/order-items/{id}/return",
    summary = "Request return",
    params(("id" = String, Path, description = "Order item ID")),
    request_body = RequestReturnRequest,
    responses(
        (status = 200, description = "Return request submitted successfully"),
        (status = 400, description = "Item not delivered, window expired or already requested", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn request_return(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<RequestReturnRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order item")?;
    validate_input(&payload)?;

    let item = state
        .services
        .order_items
        .request_return(user.user_id, id, payload.reason)
        .await?;

    Ok(success_with_message(
        "Return request submitted successfully",
        item,
    ))
}

pub async fn list_my_return_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<ReturnListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state
        .services
        .order_items
        .list_user_return_requests(user.user_id, query, pagination.page, pagination.per_page)
        .await?;

    Ok(paginated_response(
        items,
        pagination.page,
        pagination.per_page,
        total,
    ))
}

pub async fn admin_list_return_requests(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<ReturnListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state
        .services
        .order_items
        .list_return_requests(query, pagination.page, pagination.per_page)
        .await?;

    Ok(paginated_response(
        items,
        pagination.page,
        pagination.per_page,
        total,
    ))
}

pub async fn admin_update_item_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateItemStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order item")?;
    let item = state
        .services
        .order_items
        .update_item_status(id, payload.status)
        .await?;
    Ok(success_with_message(
        "Order item status updated successfully",
        item,
    ))
}

pub async fn admin_update_return_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateReturnStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "order item")?;
    let item = state
        .services
        .order_items
        .update_return_status(id, payload.return_status)
        .await?;
    Ok(success_with_message(
        "Return status updated successfully",
        item,
    ))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestReturnRequest {
    #[validate(length(min = 1, message = "Return reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemStatusRequest {
    pub status: OrderItemStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReturnStatusRequest {
    pub return_status: ReturnStatus,
}
