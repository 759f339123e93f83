use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{cart, cart_item, order, order_item, product};
use crate::handlers;
use crate::services::{carts as cart_svc, orders as order_svc, products as product_svc};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Catalog, cart, order placement and order/return lifecycle management",
    ),
    paths(
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::carts::get_cart,
        handlers::carts::add_to_cart,
        handlers::orders::create_order_from_cart,
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::cancel_order,
        handlers::orders::admin_update_status,
        handlers::order_items::request_return,
    ),
    components(schemas(
        product::Model,
        cart::Model,
        cart_item::Model,
        order::Model,
        order::OrderStatus,
        order::PaymentStatus,
        order::PaymentMethod,
        order_item::Model,
        order_item::OrderItemStatus,
        order_item::ReturnStatus,
        order_svc::Address,
        order_svc::OrderLineInput,
        cart_svc::CartWithItems,
        cart_svc::CartSummary,
        product_svc::CreateProductInput,
        product_svc::UpdateProductInput,
        handlers::carts::AddItemRequest,
        handlers::carts::UpdateQuantityRequest,
        handlers::orders::CreateOrderFromCartRequest,
        handlers::orders::CreateOrderRequest,
        handlers::orders::CancelOrderRequest,
        handlers::orders::UpdateOrderStatusRequest,
        handlers::orders::UpdatePaymentStatusRequest,
        handlers::order_items::RequestReturnRequest,
        crate::errors::ErrorResponse,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI mounted at /docs, serving the spec at /api-docs/openapi.json.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
