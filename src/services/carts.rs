use crate::{
    entities::{
        cart::{self, Entity as Cart},
        cart_item::{self, Entity as CartItem},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Derives the cart aggregate totals from its items. This is the only place
/// totals are computed; the stored columns are a cache of this result.
pub fn cart_totals(items: &[cart_item::Model]) -> (Decimal, i32) {
    let total_price = items.iter().map(|item| item.line_total).sum();
    let total_quantity = items.iter().map(|item| item.quantity).sum();
    (total_price, total_quantity)
}

/// Per-user shopping cart service. Every user has at most one cart, created
/// lazily on first access. Mutations are last-write-wins per line with totals
/// recomputed from scratch after each change.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart with its lines
#[derive(Debug, Serialize, ToSchema)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    pub items_count: usize,
    pub total_quantity: i32,
    #[schema(value_type = f64)]
    pub total_price: Decimal,
}

/// A problem found while reconciling the cart against the live catalog.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartIssue {
    #[serde(rename = "type")]
    pub kind: CartIssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartIssueKind {
    ProductDeleted,
    ProductInactive,
    OutOfStock,
    QuantityAdjusted,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartValidation {
    pub valid: bool,
    pub issues: Vec<CartIssue>,
    pub has_changes: bool,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches the user's cart, creating an empty one on first access.
    pub async fn get_or_create_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let created = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_price: Set(Decimal::ZERO),
            total_quantity: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        info!(cart_id = %created.id, user_id = %user_id, "Created cart");
        Ok(created)
    }

    /// Cart plus items, creating the cart if the user has none yet.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_cart(&*self.db, user_id).await?;
        let items = self.load_items(&*self.db, cart.id).await?;
        Ok(CartWithItems { cart, items })
    }

    /// Adds a product to the cart or merges with an existing line. The line is
    /// re-priced at the current product price on every touch.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than 0".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = self.get_or_create_cart(&txn, user_id).await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product".to_string()))?;

        if !product.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "Product {} is not available",
                product.name
            )));
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        let new_quantity = existing.as_ref().map_or(0, |item| item.quantity) + input.quantity;
        if product.stock < new_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "{} has {} available, requested {}",
                product.name, product.stock, new_quantity
            )));
        }

        let now = Utc::now();
        if let Some(item) = existing {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(new_quantity);
            item.unit_price = Set(product.price);
            item.line_total = Set(product.price * Decimal::from(new_quantity));
            item.updated_at = Set(now);
            item.update(&txn).await?;
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                unit_price: Set(product.price),
                line_total: Set(product.price * Decimal::from(input.quantity)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        let updated = self.apply_totals(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: updated.cart.id,
                product_id: input.product_id,
            })
            .await;

        Ok(updated)
    }

    /// Replaces the quantity of an existing line (last-write-wins).
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than 0".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, user_id).await?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item".to_string()))?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product".to_string()))?;

        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "{} has {} available, requested {}",
                product.name, product.stock, quantity
            )));
        }

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.unit_price = Set(product.price);
        item.line_total = Set(product.price * Decimal::from(quantity));
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let updated = self.apply_totals(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: updated.cart.id,
                product_id,
            })
            .await;

        Ok(updated)
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, user_id).await?;

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if deleted.rows_affected == 0 {
            return Err(ServiceError::NotFound("Cart item".to_string()));
        }

        let updated = self.apply_totals(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: updated.cart.id,
                product_id,
            })
            .await;

        Ok(updated)
    }

    /// Deletes every line and zeroes the totals.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.find_cart(&txn, user_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cleared = self.apply_totals(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cleared.cart.id))
            .await;

        info!(cart_id = %cleared.cart.id, "Cleared cart");
        Ok(cleared.cart)
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        match cart {
            Some(cart) => {
                let items = self.load_items(&*self.db, cart.id).await?;
                Ok(CartSummary {
                    items_count: items.len(),
                    total_quantity: cart.total_quantity,
                    total_price: cart.total_price,
                })
            }
            None => Ok(CartSummary {
                items_count: 0,
                total_quantity: 0,
                total_price: Decimal::ZERO,
            }),
        }
    }

    /// Reconciles the cart against the live catalog: drops lines whose product
    /// vanished, went inactive or out of stock, clamps over-stock quantities,
    /// and persists the repaired cart.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn validate_cart(&self, user_id: Uuid) -> Result<CartValidation, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = match Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            Some(cart) => cart,
            None => {
                return Ok(CartValidation {
                    valid: true,
                    issues: vec![],
                    has_changes: false,
                })
            }
        };

        let items = self.load_items(&txn, cart.id).await?;
        let mut issues = Vec::new();
        let mut has_changes = false;

        for item in items {
            let product = Product::find_by_id(item.product_id).one(&txn).await?;

            match product {
                None => {
                    CartItem::delete_by_id(item.id).exec(&txn).await?;
                    has_changes = true;
                    issues.push(CartIssue {
                        kind: CartIssueKind::ProductDeleted,
                        product_name: None,
                        message: "Product no longer exists and was removed from cart".to_string(),
                    });
                }
                Some(product) if !product.is_active => {
                    CartItem::delete_by_id(item.id).exec(&txn).await?;
                    has_changes = true;
                    issues.push(CartIssue {
                        kind: CartIssueKind::ProductInactive,
                        message: format!(
                            "{} is no longer available and was removed from cart",
                            product.name
                        ),
                        product_name: Some(product.name),
                    });
                }
                Some(product) if product.stock == 0 && item.quantity > 0 => {
                    CartItem::delete_by_id(item.id).exec(&txn).await?;
                    has_changes = true;
                    issues.push(CartIssue {
                        kind: CartIssueKind::OutOfStock,
                        message: format!(
                            "{} is out of stock and was removed from cart",
                            product.name
                        ),
                        product_name: Some(product.name),
                    });
                }
                Some(product) if product.stock < item.quantity => {
                    let mut active: cart_item::ActiveModel = item.into();
                    active.quantity = Set(product.stock);
                    active.line_total = Set(product.price * Decimal::from(product.stock));
                    active.unit_price = Set(product.price);
                    active.updated_at = Set(Utc::now());
                    active.update(&txn).await?;
                    has_changes = true;
                    issues.push(CartIssue {
                        kind: CartIssueKind::QuantityAdjusted,
                        message: format!(
                            "{} quantity adjusted to available stock ({})",
                            product.name, product.stock
                        ),
                        product_name: Some(product.name),
                    });
                }
                Some(_) => {}
            }
        }

        if has_changes {
            self.apply_totals(&txn, cart).await?;
        }
        txn.commit().await?;

        Ok(CartValidation {
            valid: issues.is_empty(),
            issues,
            has_changes,
        })
    }

    async fn find_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart".to_string()))
    }

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<Vec<cart_item::Model>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(conn)
            .await?)
    }

    /// Recomputes the stored totals from the current items and writes them
    /// back alongside the items just read.
    async fn apply_totals<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: cart::Model,
    ) -> Result<CartWithItems, ServiceError> {
        let items = self.load_items(conn, cart.id).await?;
        let (total_price, total_quantity) = cart_totals(&items);

        let mut active: cart::ActiveModel = cart.into();
        active.total_price = Set(total_price);
        active.total_quantity = Set(total_quantity);
        active.updated_at = Set(Utc::now());
        let cart = active.update(conn).await?;

        Ok(CartWithItems { cart, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: i32, unit_price: Decimal) -> cart_item::Model {
        cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn totals_of_empty_cart_are_zero() {
        let (price, quantity) = cart_totals(&[]);
        assert_eq!(price, Decimal::ZERO);
        assert_eq!(quantity, 0);
    }

    #[test]
    fn totals_sum_line_totals_and_quantities() {
        let items = vec![item(2, dec!(19.99)), item(1, dec!(5.00)), item(3, dec!(0.01))];
        let (price, quantity) = cart_totals(&items);
        assert_eq!(price, dec!(45.01));
        assert_eq!(quantity, 6);
    }

    #[test]
    fn issue_kind_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&CartIssueKind::ProductDeleted).unwrap(),
            "\"PRODUCT_DELETED\""
        );
        assert_eq!(
            serde_json::to_string(&CartIssueKind::QuantityAdjusted).unwrap(),
            "\"QUANTITY_ADJUSTED\""
        );
    }
}
