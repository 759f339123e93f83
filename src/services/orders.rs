use crate::{
    entities::{
        cart::{self, Entity as Cart},
        cart_item::{self, Entity as CartItem},
        order::{self, Entity as Order, OrderStatus, PaymentMethod, PaymentStatus},
        order_item::{self, Entity as OrderItem, OrderItemStatus, ReturnStatus},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{products, Requester},
};
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Orders above this subtotal ship free; everything else pays the flat fee.
const FREE_SHIPPING_THRESHOLD: Decimal = dec!(500);
const FLAT_SHIPPING_FEE: Decimal = dec!(50);
/// 18% GST
const TAX_RATE: Decimal = dec!(0.18);
const DELIVERY_LEAD_DAYS: i64 = 7;

/// Address snapshot embedded into orders at placement time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct Address {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone_number: String,
    #[validate(length(min = 1, message = "Street address is required"))]
    pub street_address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

/// Billing address snapshot; defaults to a copy of the shipping address with
/// `same_as_shipping` set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillingAddress {
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    pub same_as_shipping: bool,
}

/// Checkout parameters shared by cart and direct placement.
#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// One requested line for direct placement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A line that passed validation, carrying the product snapshot used for the
/// order items.
#[derive(Debug, Clone)]
struct ValidatedLine {
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
    product_name: String,
    product_image: Option<String>,
}

/// Derived monetary aggregates for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
}

/// Computes the monetary aggregates from a subtotal: free shipping above the
/// threshold, 18% tax rounded to cents, discount reserved at zero.
pub fn compute_pricing(subtotal: Decimal) -> Pricing {
    let shipping_fee = if subtotal > FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_FEE
    };
    let tax = (subtotal * TAX_RATE).round_dp(2);
    let discount = Decimal::ZERO;
    let total_amount = subtotal + shipping_fee + tax - discount;

    Pricing {
        subtotal,
        shipping_fee,
        tax,
        discount,
        total_amount,
    }
}

/// Order together with its line rows.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub order_items: Vec<order_item::Model>,
}

/// Listing filters for a user's own orders
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Listing filters for the admin view
#[derive(Debug, Default, Deserialize)]
pub struct AdminOrderListQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UpdatePaymentStatusInput {
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatsOverview {
    pub total_orders: u64,
    #[schema(value_type = f64)]
    pub total_revenue: Decimal,
    #[schema(value_type = f64)]
    pub avg_order_value: Decimal,
    pub pending_orders: u64,
    pub confirmed_orders: u64,
    pub processing_orders: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyOrderStats {
    pub year: i32,
    pub month: u32,
    pub orders: u64,
    #[schema(value_type = f64)]
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub overview: OrderStatsOverview,
    pub monthly_stats: Vec<MonthlyOrderStats>,
}

/// Order placement workflow and lifecycle manager.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Places an order from the user's cart. The cart is emptied if and only
    /// if the order commits.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn place_from_cart(
        &self,
        user_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let cart = match cart {
            Some(cart) => cart,
            None => return Err(ServiceError::InvalidOperation("Cart is empty".to_string())),
        };

        let cart_items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        if cart_items.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let requested: Vec<(Uuid, i32)> = cart_items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        // All business validation happens before the transaction starts.
        let lines = self.validate_lines(&requested, true).await?;

        let placed = self
            .commit_order(user_id, lines, &input, Some(cart.id))
            .await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(placed.order.id))
            .await;
        self.event_sender
            .send_or_log(Event::CartCleared(cart.id))
            .await;

        info!(
            order_id = %placed.order.id,
            order_number = %placed.order.order_number,
            "Order placed from cart"
        );
        Ok(placed)
    }

    /// Places an order from an explicit item list, bypassing the cart.
    #[instrument(skip(self, items, input), fields(user_id = %user_id))]
    pub async fn place_direct(
        &self,
        user_id: Uuid,
        items: Vec<OrderLineInput>,
        input: PlaceOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order items are required".to_string(),
            ));
        }

        let requested: Vec<(Uuid, i32)> = items
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();

        let lines = self.validate_lines(&requested, false).await?;

        let placed = self.commit_order(user_id, lines, &input, None).await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(placed.order.id))
            .await;

        info!(
            order_id = %placed.order.id,
            order_number = %placed.order.order_number,
            "Order placed"
        );
        Ok(placed)
    }

    /// Validates the requested lines against the catalog, in request order,
    /// failing fast on the first violation. `from_cart` only changes how a
    /// vanished product is reported.
    async fn validate_lines(
        &self,
        requested: &[(Uuid, i32)],
        from_cart: bool,
    ) -> Result<Vec<ValidatedLine>, ServiceError> {
        let mut lines = Vec::with_capacity(requested.len());

        for &(product_id, quantity) in requested {
            if quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Quantity must be at least 1".to_string(),
                ));
            }

            let product = Product::find_by_id(product_id).one(&*self.db).await?;
            let product = match product {
                Some(product) => product,
                None if from_cart => {
                    return Err(ServiceError::ValidationError(
                        "Product in cart no longer exists".to_string(),
                    ))
                }
                None => {
                    return Err(ServiceError::NotFound(format!("Product {}", product_id)));
                }
            };

            if !product.is_active {
                return Err(ServiceError::InvalidOperation(format!(
                    "Product {} is not available",
                    product.name
                )));
            }

            if product.stock < quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} has {} available, requested {}",
                    product.name, product.stock, quantity
                )));
            }

            let line_total = product.price * Decimal::from(quantity);
            lines.push(ValidatedLine {
                product_id,
                quantity,
                unit_price: product.price,
                line_total,
                product_name: product.name,
                product_image: product.image,
            });
        }

        Ok(lines)
    }

    /// The placement transaction: order insert, item inserts, conditional
    /// stock decrements and cart clear commit or roll back as one unit.
    async fn commit_order(
        &self,
        user_id: Uuid,
        lines: Vec<ValidatedLine>,
        input: &PlaceOrderInput,
        clear_cart: Option<Uuid>,
    ) -> Result<OrderWithItems, ServiceError> {
        let pricing = compute_pricing(lines.iter().map(|line| line.line_total).sum());
        let total_quantity: i32 = lines.iter().map(|line| line.quantity).sum();
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let billing = match &input.billing_address {
            Some(address) => BillingAddress {
                address: address.clone(),
                same_as_shipping: false,
            },
            None => BillingAddress {
                address: input.shipping_address.clone(),
                same_as_shipping: true,
            },
        };

        let shipping_json = serde_json::to_value(&input.shipping_address)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        let billing_json = serde_json::to_value(&billing)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(input.payment_method),
            payment_id: Set(None),
            subtotal: Set(pricing.subtotal),
            shipping_fee: Set(pricing.shipping_fee),
            tax: Set(pricing.tax),
            discount: Set(pricing.discount),
            total_amount: Set(pricing.total_amount),
            total_quantity: Set(total_quantity),
            shipping_address: Set(shipping_json),
            billing_address: Set(billing_json),
            notes: Set(input.notes.clone()),
            cancellation_reason: Set(None),
            tracking_number: Set(None),
            expected_delivery_date: Set(now + Duration::days(DELIVERY_LEAD_DAYS)),
            actual_delivery_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut order_items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.line_total),
                product_name: Set(line.product_name.clone()),
                product_image: Set(line.product_image.clone()),
                status: Set(OrderItemStatus::Pending),
                return_requested: Set(false),
                return_reason: Set(None),
                return_status: Set(ReturnStatus::None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            order_items.push(item);
        }

        // Conditional decrement: a concurrent checkout may have taken the
        // stock since validation, in which case the whole transaction aborts.
        for line in &lines {
            let decremented =
                products::decrement_stock(&txn, line.product_id, line.quantity).await?;
            if !decremented {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} sold out while placing the order",
                    line.product_name
                )));
            }
        }

        if let Some(cart_id) = clear_cart {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(cart_id))
                .exec(&txn)
                .await?;

            Cart::update_many()
                .col_expr(cart::Column::TotalPrice, Expr::value(Decimal::ZERO))
                .col_expr(cart::Column::TotalQuantity, Expr::value(0))
                .col_expr(cart::Column::UpdatedAt, Expr::value(now))
                .filter(cart::Column::Id.eq(cart_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        Ok(OrderWithItems { order, order_items })
    }

    /// Fetches one order with its items, scoped to the requester.
    pub async fn get_order(
        &self,
        order_id: Uuid,
        requester: Requester,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|order| requester.can_access(order.user_id))
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        let order_items = self.load_items(&*self.db, order.id).await?;
        Ok(OrderWithItems { order, order_items })
    }

    pub async fn get_order_by_number(
        &self,
        order_number: &str,
        requester: Requester,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .filter(|order| requester.can_access(order.user_id))
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        let order_items = self.load_items(&*self.db, order.id).await?;
        Ok(OrderWithItems { order, order_items })
    }

    /// Lists the user's own orders.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        query: OrderListQuery,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut select = Order::find().filter(order::Column::UserId.eq(user_id));

        if let Some(status) = query.status {
            select = select.filter(order::Column::Status.eq(status));
        }

        select = apply_order_sort(select, query.sort_by.as_deref(), query.sort_order.as_deref());

        let paginator = select.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Admin listing across all users.
    #[instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        query: AdminOrderListQuery,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut select = Order::find();

        if let Some(status) = query.status {
            select = select.filter(order::Column::Status.eq(status));
        }
        if let Some(payment_status) = query.payment_status {
            select = select.filter(order::Column::PaymentStatus.eq(payment_status));
        }
        if let Some(user_id) = query.user_id {
            select = select.filter(order::Column::UserId.eq(user_id));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            select = select.filter(order::Column::OrderNumber.contains(search.trim()));
        }

        select = apply_order_sort(select, query.sort_by.as_deref(), query.sort_order.as_deref());

        let paginator = select.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Cancels an order while it is still pending or confirmed: restores the
    /// decremented stock and cascades the cancellation to every item, all in
    /// one transaction.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        if !order.status.is_cancellable() {
            return Err(ServiceError::InvalidOperation(
                "Order cannot be cancelled in current status".to_string(),
            ));
        }

        let old_status = order.status;
        let now = Utc::now();

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.cancellation_reason = Set(reason);
        active.updated_at = Set(now);
        let order = active.update(&txn).await?;

        let items = self.load_items(&txn, order.id).await?;
        for item in &items {
            products::restore_stock(&txn, item.product_id, item.quantity).await?;
        }

        OrderItem::update_many()
            .col_expr(
                order_item::Column::Status,
                Expr::value(OrderItemStatus::Cancelled),
            )
            .col_expr(order_item::Column::UpdatedAt, Expr::value(now))
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order.id))
            .await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: OrderStatus::Cancelled.to_string(),
            })
            .await;

        info!(order_id = %order.id, "Order cancelled");

        let order_items = self.load_items(&*self.db, order.id).await?;
        Ok(OrderWithItems { order, order_items })
    }

    /// Administrative status advancement, validated against the transition
    /// table. Reaching `delivered` stamps the actual delivery date. The new
    /// status is bulk-applied to the order's items; stock is not touched.
    #[instrument(skip(self, input), fields(order_id = %order_id, new_status = %input.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        let old_status = order.status;
        if !old_status.can_transition_to(input.status) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                old_status, input.status
            )));
        }

        let now = Utc::now();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(input.status);
        if let Some(tracking_number) = input.tracking_number {
            active.tracking_number = Set(Some(tracking_number));
        }
        if let Some(expected) = input.expected_delivery_date {
            active.expected_delivery_date = Set(expected);
        }
        if input.status == OrderStatus::Delivered {
            active.actual_delivery_date = Set(Some(now));
        }
        active.updated_at = Set(now);
        let order = active.update(&txn).await?;

        OrderItem::update_many()
            .col_expr(
                order_item::Column::Status,
                Expr::value(OrderItemStatus::from(input.status)),
            )
            .col_expr(order_item::Column::UpdatedAt, Expr::value(now))
            .filter(order_item::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: order.status.to_string(),
            })
            .await;

        let order_items = self.load_items(&*self.db, order.id).await?;
        Ok(OrderWithItems { order, order_items })
    }

    /// Payment-state update, independent of the order status axis.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        input: UpdatePaymentStatusInput,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        let old_status = order.payment_status;
        if !old_status.can_transition_to(input.payment_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                old_status, input.payment_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(input.payment_status);
        if let Some(payment_id) = input.payment_id {
            active.payment_id = Set(Some(payment_id));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: order.payment_status.to_string(),
            })
            .await;

        Ok(order)
    }

    /// Aggregate order statistics: overview counts plus the most recent 12
    /// months with activity.
    #[instrument(skip(self))]
    pub async fn order_stats(&self) -> Result<OrderStats, ServiceError> {
        let orders = Order::find().all(&*self.db).await?;

        let total_orders = orders.len() as u64;
        let total_revenue: Decimal = orders.iter().map(|o| o.total_amount).sum();
        let avg_order_value = if total_orders == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(total_orders)).round_dp(2)
        };

        let count_status = |status: OrderStatus| -> u64 {
            orders.iter().filter(|o| o.status == status).count() as u64
        };

        let overview = OrderStatsOverview {
            total_orders,
            total_revenue,
            avg_order_value,
            pending_orders: count_status(OrderStatus::Pending),
            confirmed_orders: count_status(OrderStatus::Confirmed),
            processing_orders: count_status(OrderStatus::Processing),
            shipped_orders: count_status(OrderStatus::Shipped),
            delivered_orders: count_status(OrderStatus::Delivered),
            cancelled_orders: count_status(OrderStatus::Cancelled),
        };

        let mut by_month: BTreeMap<(i32, u32), (u64, Decimal)> = BTreeMap::new();
        for order in &orders {
            let key = (order.created_at.year(), order.created_at.month());
            let entry = by_month.entry(key).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += order.total_amount;
        }

        let monthly_stats = by_month
            .into_iter()
            .rev()
            .take(12)
            .map(|((year, month), (orders, revenue))| MonthlyOrderStats {
                year,
                month,
                orders,
                revenue,
            })
            .collect();

        Ok(OrderStats {
            overview,
            monthly_stats,
        })
    }

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(conn)
            .await?)
    }
}

fn apply_order_sort(
    select: sea_orm::Select<Order>,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> sea_orm::Select<Order> {
    let descending = !matches!(sort_order, Some("asc"));
    match sort_by {
        Some("total_amount") => {
            if descending {
                select.order_by_desc(order::Column::TotalAmount)
            } else {
                select.order_by_asc(order::Column::TotalAmount)
            }
        }
        _ => {
            if descending {
                select.order_by_desc(order::Column::CreatedAt)
            } else {
                select.order_by_asc(order::Column::CreatedAt)
            }
        }
    }
}

/// Human-readable order number: timestamp suffix plus a random 3-digit
/// component. Not cryptographically unique; the unique index on the column is
/// the real guard.
fn generate_order_number() -> String {
    let timestamp = Utc::now().timestamp_millis().to_string();
    let suffix = &timestamp[timestamp.len().saturating_sub(8)..];
    let random: u32 = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{}-{:03}", suffix, random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pricing_below_threshold_pays_flat_shipping() {
        let pricing = compute_pricing(dec!(100));
        assert_eq!(pricing.shipping_fee, dec!(50));
        assert_eq!(pricing.tax, dec!(18.00));
        assert_eq!(pricing.discount, Decimal::ZERO);
        assert_eq!(pricing.total_amount, dec!(168.00));
    }

    #[test]
    fn pricing_above_threshold_ships_free() {
        let pricing = compute_pricing(dec!(600));
        assert_eq!(pricing.shipping_fee, Decimal::ZERO);
        assert_eq!(pricing.tax, dec!(108.00));
        assert_eq!(pricing.total_amount, dec!(708.00));
    }

    #[test]
    fn pricing_at_exact_threshold_still_pays_shipping() {
        // The rule is strictly greater than 500
        let pricing = compute_pricing(dec!(500));
        assert_eq!(pricing.shipping_fee, dec!(50));
    }

    #[test]
    fn tax_is_rounded_to_cents() {
        let pricing = compute_pricing(dec!(33.33));
        // 33.33 * 0.18 = 5.9994 -> 6.00
        assert_eq!(pricing.tax, dec!(6.00));
        assert_eq!(pricing.total_amount, dec!(33.33) + dec!(50) + dec!(6.00));
    }

    #[test]
    fn order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    proptest! {
        #[test]
        fn total_is_consistent_for_any_subtotal(cents in 0u64..10_000_000) {
            let subtotal = Decimal::from(cents) / Decimal::from(100);
            let pricing = compute_pricing(subtotal);

            prop_assert_eq!(pricing.tax, (subtotal * dec!(0.18)).round_dp(2));
            let expected_shipping = if subtotal > dec!(500) {
                Decimal::ZERO
            } else {
                dec!(50)
            };
            prop_assert_eq!(pricing.shipping_fee, expected_shipping);
            prop_assert_eq!(
                pricing.total_amount,
                pricing.subtotal + pricing.shipping_fee + pricing.tax - pricing.discount
            );
            prop_assert!(pricing.total_amount >= pricing.subtotal);
        }
    }
}
