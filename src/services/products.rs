use crate::{
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Catalog service. Admin CRUD plus the stock mutation primitives used by the
/// order placement and cancellation transactions.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    pub brand: Option<String>,
    pub image: Option<String>,
}

fn default_is_active() -> bool {
    true
}

fn validate_price(price: &Decimal) -> Result<(), validator::ValidationError> {
    if price.is_sign_negative() {
        let mut err = validator::ValidationError::new("price");
        err.message = Some("Price must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, message = "Product name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
    pub category_ids: Option<Vec<Uuid>>,
    pub brand: Option<String>,
    pub image: Option<String>,
}

/// Filters and ordering for product listings
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            is_active: Set(input.is_active),
            category_ids: Set(serde_json::to_value(input.category_ids)
                .unwrap_or_else(|_| serde_json::Value::Array(vec![]))),
            brand: Set(input.brand),
            image: Set(input.image),
            rating: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;

        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let existing = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(category_ids) = input.category_ids {
            active.category_ids = Set(serde_json::to_value(category_ids)
                .unwrap_or_else(|_| serde_json::Value::Array(vec![])));
        }
        if let Some(brand) = input.brand {
            active.brand = Set(Some(brand));
        }
        if let Some(image) = input.image {
            active.image = Set(Some(image));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(updated.id))
            .await;

        Ok(updated)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product".to_string()))
    }

    /// Lists products with pagination, optional activity filter and name search.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut select = Product::find();

        if let Some(is_active) = query.is_active {
            select = select.filter(product::Column::IsActive.eq(is_active));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            select = select.filter(product::Column::Name.contains(search.trim()));
        }

        let descending = !matches!(query.sort_order.as_deref(), Some("asc"));
        select = match query.sort_by.as_deref() {
            Some("name") => {
                if descending {
                    select.order_by_desc(product::Column::Name)
                } else {
                    select.order_by_asc(product::Column::Name)
                }
            }
            Some("price") => {
                if descending {
                    select.order_by_desc(product::Column::Price)
                } else {
                    select.order_by_asc(product::Column::Price)
                }
            }
            _ => {
                if descending {
                    select.order_by_desc(product::Column::CreatedAt)
                } else {
                    select.order_by_asc(product::Column::CreatedAt)
                }
            }
        };

        let paginator = select.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Soft delete: products referenced by orders and carts are never removed,
    /// only deactivated.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn deactivate_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        let existing = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductDeactivated(updated.id))
            .await;

        info!(product_id = %product_id, "Product deactivated");
        Ok(updated)
    }
}

/// Conditionally decrements stock: `stock = stock - quantity WHERE id = ? AND
/// stock >= quantity`. Returns whether a row was updated; `false` means a
/// concurrent checkout consumed the stock first and the caller must roll back.
pub(crate) async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<bool, DbErr> {
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Restores stock after a cancellation. A product deleted in the meantime is
/// a silent no-op, matching the decrement's conditional shape.
pub(crate) async fn restore_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), DbErr> {
    Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;

    Ok(())
}
