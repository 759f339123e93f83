use uuid::Uuid;

pub mod carts;
pub mod order_items;
pub mod orders;
pub mod products;

pub use carts::CartService;
pub use order_items::OrderItemService;
pub use orders::OrderService;
pub use products::ProductService;

/// Scope under which owner-gated queries run: either a specific user, or an
/// administrator who can see everything.
#[derive(Debug, Clone, Copy)]
pub enum Requester {
    Owner(Uuid),
    Admin,
}

impl Requester {
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        match self {
            Requester::Owner(user_id) => *user_id == owner_id,
            Requester::Admin => true,
        }
    }
}
