use crate::{
    entities::{
        order::{self, Entity as Order},
        order_item::{self, Entity as OrderItem, OrderItemStatus, ReturnStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::Requester,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Returns may be requested up to this long after the item was last updated
/// (delivery stamps `updated_at`, which serves as the window anchor).
const RETURN_WINDOW_DAYS: i64 = 30;

/// Filters for return-request listings
#[derive(Debug, Default, Deserialize)]
pub struct ReturnListQuery {
    pub return_status: Option<ReturnStatus>,
}

/// Per-line lifecycle and return workflow manager.
#[derive(Clone)]
pub struct OrderItemService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderItemService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Items of one order, oldest first, visible to the order's owner or an
    /// admin.
    pub async fn list_for_order(
        &self,
        order_id: Uuid,
        requester: Requester,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;

        if !requester.can_access(order.user_id) {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_order_item(
        &self,
        order_item_id: Uuid,
        requester: Requester,
    ) -> Result<order_item::Model, ServiceError> {
        let (item, order) = self.load_with_order(order_item_id).await?;

        if !requester.can_access(order.user_id) {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        Ok(item)
    }

    /// Files a return request for a delivered item within the return window.
    #[instrument(skip(self, reason), fields(order_item_id = %order_item_id, user_id = %user_id))]
    pub async fn request_return(
        &self,
        user_id: Uuid,
        order_item_id: Uuid,
        reason: String,
    ) -> Result<order_item::Model, ServiceError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "Return reason is required".to_string(),
            ));
        }

        let (item, order) = self.load_with_order(order_item_id).await?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        if item.status != OrderItemStatus::Delivered {
            return Err(ServiceError::InvalidOperation(
                "Only delivered items can be returned".to_string(),
            ));
        }

        if item.return_requested {
            return Err(ServiceError::InvalidOperation(
                "Return already requested for this item".to_string(),
            ));
        }

        if Utc::now() - item.updated_at > Duration::days(RETURN_WINDOW_DAYS) {
            return Err(ServiceError::InvalidOperation(
                "Return window has expired".to_string(),
            ));
        }

        let mut active: order_item::ActiveModel = item.into();
        active.return_requested = Set(true);
        active.return_reason = Set(Some(reason));
        active.return_status = Set(ReturnStatus::Requested);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReturnRequested {
                order_item_id: updated.id,
            })
            .await;

        info!(order_item_id = %updated.id, "Return requested");
        Ok(updated)
    }

    /// Administrative per-line status override, validated against the item
    /// transition table.
    #[instrument(skip(self), fields(order_item_id = %order_item_id, new_status = %status))]
    pub async fn update_item_status(
        &self,
        order_item_id: Uuid,
        status: OrderItemStatus,
    ) -> Result<order_item::Model, ServiceError> {
        let item = self.load(order_item_id).await?;

        if !item.status.can_transition_to(status) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                item.status, status
            )));
        }

        let mut active: order_item::ActiveModel = item.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Administrative return-state transition. Completing a return also marks
    /// the item as returned. Stock is deliberately not restored here.
    #[instrument(skip(self), fields(order_item_id = %order_item_id, new_status = %return_status))]
    pub async fn update_return_status(
        &self,
        order_item_id: Uuid,
        return_status: ReturnStatus,
    ) -> Result<order_item::Model, ServiceError> {
        let item = self.load(order_item_id).await?;

        if !item.return_requested {
            return Err(ServiceError::InvalidOperation(
                "No return request exists for this item".to_string(),
            ));
        }

        let old_status = item.return_status;
        if !old_status.can_transition_to(return_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                old_status, return_status
            )));
        }

        let mut active: order_item::ActiveModel = item.into();
        active.return_status = Set(return_status);
        if return_status == ReturnStatus::Completed {
            active.status = Set(OrderItemStatus::Returned);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReturnStatusChanged {
                order_item_id: updated.id,
                old_status: old_status.to_string(),
                new_status: return_status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// All pending return requests, most recently touched first.
    #[instrument(skip(self))]
    pub async fn list_return_requests(
        &self,
        query: ReturnListQuery,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order_item::Model>, u64), ServiceError> {
        let mut select = OrderItem::find().filter(order_item::Column::ReturnRequested.eq(true));

        if let Some(return_status) = query.return_status {
            select = select.filter(order_item::Column::ReturnStatus.eq(return_status));
        }

        let paginator = select
            .order_by_desc(order_item::Column::UpdatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Return requests belonging to one user's orders.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_return_requests(
        &self,
        user_id: Uuid,
        query: ReturnListQuery,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order_item::Model>, u64), ServiceError> {
        let mut select = OrderItem::find()
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(order::Column::UserId.eq(user_id))
            .filter(order_item::Column::ReturnRequested.eq(true));

        if let Some(return_status) = query.return_status {
            select = select.filter(order_item::Column::ReturnStatus.eq(return_status));
        }

        let paginator = select
            .order_by_desc(order_item::Column::UpdatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    async fn load(&self, order_item_id: Uuid) -> Result<order_item::Model, ServiceError> {
        OrderItem::find_by_id(order_item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order item".to_string()))
    }

    async fn load_with_order(
        &self,
        order_item_id: Uuid,
    ) -> Result<(order_item::Model, order::Model), ServiceError> {
        let item = self.load(order_item_id).await?;
        let order = Order::find_by_id(item.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))?;
        Ok((item, order))
    }
}
