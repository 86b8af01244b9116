//! Admin order management, dashboard and exports

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{revenue_statuses, OrderStatus, PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::inventory::{InventoryService, LowStockItem};
use crate::services::order::{Order, OrderService, OrderWithItems, ORDER_COLUMNS};

/// Admin service
#[derive(Clone)]
pub struct AdminService {
    db: PgPool,
    orders: OrderService,
    inventory: InventoryService,
}

/// Number of orders in one status
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Dashboard figures
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    pub revenue_orders: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub strain_count: i64,
    pub low_stock: Vec<LowStockItem>,
    pub recent_orders: Vec<Order>,
}

/// One row of the order export
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderCsvRow {
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub user_id: String,
    pub customer_email: Option<String>,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl AdminService {
    /// Create a new AdminService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            orders: OrderService::new(db.clone()),
            inventory: InventoryService::new(db.clone(), config),
            db,
        }
    }

    /// List all orders, optionally by status, newest first
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<OrderWithItems>> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::varchar IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = self.orders.attach_items(orders).await?;
        Ok(PaginatedResponse::new(data, pagination, total as u64))
    }

    /// Get any order with its lines
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderWithItems> {
        self.orders.get(order_id).await
    }

    /// Move an order to a new status if the lifecycle allows it
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> AppResult<OrderWithItems> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let current = OrderStatus::try_from(current)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if !current.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move order from {} to {}",
                current, next
            )));
        }

        sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(next.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%order_id, from = %current, to = %next, "Order status changed");
        self.orders.get(order_id).await
    }

    /// Revenue, order counts and stock alerts
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let (total_revenue, revenue_orders): (Decimal, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total), 0), COUNT(*) FROM orders WHERE status = ANY($1)",
        )
        .bind(revenue_statuses())
        .fetch_one(&self.db)
        .await?;

        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let strain_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM strains")
            .fetch_one(&self.db)
            .await?;

        let recent_orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC LIMIT 5",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(DashboardStats {
            total_revenue,
            revenue_orders,
            orders_by_status,
            strain_count,
            low_stock: self.inventory.low_stock().await?,
            recent_orders,
        })
    }

    /// Export orders as CSV
    pub async fn export_orders_csv(&self, status: Option<OrderStatus>) -> AppResult<String> {
        let rows = sqlx::query_as::<_, OrderCsvRow>(
            r#"
            SELECT o.id AS order_id, o.created_at, o.status, o.user_id, o.customer_email,
                   COALESCE(SUM(oi.quantity), 0)::BIGINT AS item_count,
                   o.subtotal, o.tax, o.total, o.currency, o.paid_at
            FROM orders o
            LEFT JOIN order_items oi ON oi.order_id = o.id
            WHERE ($1::varchar IS NULL OR o.status = $1)
            GROUP BY o.id
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        to_csv(&rows)
    }
}

/// Serialize records as CSV with a header row
pub fn to_csv<T: Serialize>(records: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_rows() {
        let rows = vec![
            StatusCount {
                status: "paid".to_string(),
                count: 3,
            },
            StatusCount {
                status: "pending".to_string(),
                count: 1,
            },
        ];
        let csv = to_csv(&rows).unwrap();
        assert_eq!(csv, "status,count\npaid,3\npending,1\n");
    }

    #[test]
    fn empty_export_is_empty() {
        let rows: Vec<StatusCount> = Vec::new();
        assert_eq!(to_csv(&rows).unwrap(), "");
    }
}
