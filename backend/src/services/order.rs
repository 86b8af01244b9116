//! Order history for customers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{OrderStatus, PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Columns selected for every `Order` query
pub(crate) const ORDER_COLUMNS: &str = "id, user_id, customer_email, status, subtotal, tax, total, \
     currency, payment_session_id, payment_intent_id, paid_at, created_at, updated_at";

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// Order header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub customer_email: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub payment_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line with the name and price captured at checkout
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub strain_id: Uuid,
    pub strain_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Order with its lines
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List a customer's orders, newest first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<OrderWithItems>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = self.attach_items(orders).await?;
        Ok(PaginatedResponse::new(data, pagination, total as u64))
    }

    /// Get one of the customer's orders; other customers' orders are reported as missing
    pub async fn get_for_user(&self, user_id: &str, order_id: Uuid) -> AppResult<OrderWithItems> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1 AND user_id = $2",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        self.with_items(order).await
    }

    /// Get any order by id
    pub async fn get(&self, order_id: Uuid) -> AppResult<OrderWithItems> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        self.with_items(order).await
    }

    pub(crate) async fn with_items(&self, order: Order) -> AppResult<OrderWithItems> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, strain_id, strain_name, unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = $1
            ORDER BY strain_name ASC
            "#,
        )
        .bind(order.id)
        .fetch_all(&self.db)
        .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Load the lines of several orders in one query
    pub(crate) async fn attach_items(&self, orders: Vec<Order>) -> AppResult<Vec<OrderWithItems>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let rows = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, strain_id, strain_name, unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY strain_name ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in rows {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
