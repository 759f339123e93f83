use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::order::OrderStatus;

/// One order line, denormalized from the order so it can carry its own
/// lifecycle: per-line status and the return sub-state. `product_name` and
/// `product_image` are captured at placement time and survive later product
/// edits or deletion.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_price: Decimal,
    pub product_name: String,
    #[sea_orm(nullable)]
    pub product_image: Option<String>,
    pub status: OrderItemStatus,
    pub return_requested: bool,
    #[sea_orm(nullable)]
    pub return_reason: Option<String>,
    pub return_status: ReturnStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(now);
        }

        Ok(active_model)
    }
}

/// Per-line status. Mirrors [`OrderStatus`] for the shared states and adds
/// `returned`, reachable only through return completion.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderItemStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
    #[sea_orm(string_value = "returned")]
    Returned,
}

impl OrderItemStatus {
    pub fn can_transition_to(self, next: OrderItemStatus) -> bool {
        use OrderItemStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Delivered, Refunded)
                | (Delivered, Returned)
                | (Cancelled, Refunded)
        )
    }
}

impl From<OrderStatus> for OrderItemStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => OrderItemStatus::Pending,
            OrderStatus::Confirmed => OrderItemStatus::Confirmed,
            OrderStatus::Processing => OrderItemStatus::Processing,
            OrderStatus::Shipped => OrderItemStatus::Shipped,
            OrderStatus::Delivered => OrderItemStatus::Delivered,
            OrderStatus::Cancelled => OrderItemStatus::Cancelled,
            OrderStatus::Refunded => OrderItemStatus::Refunded,
        }
    }
}

/// Return workflow state for a single order line.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "requested")]
    Requested,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl ReturnStatus {
    pub fn can_transition_to(self, next: ReturnStatus) -> bool {
        use ReturnStatus::*;
        matches!(
            (self, next),
            (None, Requested) | (Requested, Approved) | (Requested, Rejected) | (Approved, Completed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ReturnStatus::None, ReturnStatus::Requested, true)]
    #[case(ReturnStatus::Requested, ReturnStatus::Approved, true)]
    #[case(ReturnStatus::Requested, ReturnStatus::Rejected, true)]
    #[case(ReturnStatus::Approved, ReturnStatus::Completed, true)]
    #[case(ReturnStatus::None, ReturnStatus::Completed, false)]
    #[case(ReturnStatus::Rejected, ReturnStatus::Completed, false)]
    #[case(ReturnStatus::Completed, ReturnStatus::Requested, false)]
    #[case(ReturnStatus::Requested, ReturnStatus::Completed, false)]
    fn return_status_transition_table(
        #[case] from: ReturnStatus,
        #[case] to: ReturnStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn item_status_follows_order_status_names() {
        assert_eq!(
            OrderItemStatus::from(OrderStatus::Shipped),
            OrderItemStatus::Shipped
        );
        assert_eq!(
            OrderItemStatus::from(OrderStatus::Cancelled),
            OrderItemStatus::Cancelled
        );
    }

    #[test]
    fn returned_is_only_reachable_from_delivered() {
        use OrderItemStatus::*;
        for status in [Pending, Confirmed, Processing, Shipped, Cancelled, Refunded] {
            assert!(!status.can_transition_to(Returned));
        }
        assert!(Delivered.can_transition_to(Returned));
    }
}
