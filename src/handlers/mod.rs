use crate::events::EventSender;
use crate::services::{CartService, OrderItemService, OrderService, ProductService};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod carts;
pub mod common;
pub mod order_items;
pub mod orders;
pub mod products;

/// Aggregated services shared by the HTTP handlers through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub order_items: Arc<OrderItemService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            products: Arc::new(ProductService::new(db.clone(), event_sender.clone())),
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            order_items: Arc::new(OrderItemService::new(db, event_sender)),
        }
    }
}
