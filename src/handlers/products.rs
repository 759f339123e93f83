use crate::handlers::common::{
    created_response, paginated_response, parse_id, success_response, success_with_message,
    validate_input, PaginationParams,
};
use crate::{
    auth::AdminUser,
    errors::ServiceError,
    services::products::{CreateProductInput, ProductListQuery, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

/// Catalog routes. Reads are public storefront surface; mutations are
/// admin-gated.
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

/// List products with filters and pagination
#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("is_active" = Option<bool>, Query, description = "Filter by availability"),
        ("search" = Option<String>, Query, description = "Name search term"),
        ("sort_by" = Option<String>, Query, description = "name | price | created_at"),
        ("sort_order" = Option<String>, Query, description = "asc | desc"),
    ),
    responses(
        (status = 200, description = "Products retrieved successfully"),
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (products, total) = state
        .services
        .products
        .list_products(query, pagination.page, pagination.per_page)
        .await?;

    Ok(paginated_response(
        products,
        pagination.page,
        pagination.per_page,
        total,
    ))
}

/// Get a single product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved successfully"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "product")?;
    let product = state.services.products.get_product(id).await?;
    Ok(success_response(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let product = state.services.products.create_product(payload).await?;
    Ok(created_response("Product created successfully", product))
}

pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "product")?;
    validate_input(&payload)?;
    let product = state.services.products.update_product(id, payload).await?;
    Ok(success_with_message("Product updated successfully", product))
}

/// Soft delete: the product is deactivated, never removed, so order history
/// keeps resolving.
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "product")?;
    let product = state.services.products.deactivate_product(id).await?;
    Ok(success_with_message(
        "Product deactivated successfully",
        product,
    ))
}
