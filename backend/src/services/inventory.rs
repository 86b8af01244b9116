//! Inventory service: stock-on-hand and price per strain

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::StockStatus;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Inventory service for stock and pricing
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    low_stock_threshold: i32,
}

/// Inventory record for a strain
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub strain_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub unit: String,
    pub updated_at: DateTime<Utc>,
}

/// Inventory record with stock status
#[derive(Debug, Clone, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub stock_status: StockStatus,
}

/// Input for overwriting inventory values
#[derive(Debug, Deserialize)]
pub struct SetInventoryInput {
    pub quantity: Option<i32>,
    pub price: Option<Decimal>,
    pub unit: Option<String>,
}

/// Input for a relative stock adjustment (restock or write-off)
#[derive(Debug, Deserialize)]
pub struct AdjustInventoryInput {
    pub delta: i32,
    pub reason: Option<String>,
}

/// A strain whose stock has fallen to the low-stock threshold
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LowStockItem {
    pub strain_id: Uuid,
    pub slug: String,
    pub name: String,
    pub quantity: i32,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            low_stock_threshold: config.store.low_stock_threshold,
        }
    }

    fn to_view(&self, record: InventoryRecord) -> InventoryView {
        InventoryView {
            stock_status: StockStatus::from_quantity(record.quantity, self.low_stock_threshold),
            record,
        }
    }

    /// Get the inventory record of a strain
    pub async fn get(&self, strain_id: Uuid) -> AppResult<InventoryView> {
        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT id, strain_id, quantity, price, unit, updated_at
            FROM inventory
            WHERE strain_id = $1
            "#,
        )
        .bind(strain_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory".to_string()))?;

        Ok(self.to_view(record))
    }

    /// Overwrite quantity, price or unit
    pub async fn set(&self, strain_id: Uuid, input: SetInventoryInput) -> AppResult<InventoryView> {
        if let Some(quantity) = input.quantity {
            if quantity < 0 {
                return Err(AppError::validation("quantity", "Quantity cannot be negative"));
            }
        }
        if let Some(price) = input.price {
            shared::validate_price(price).map_err(|msg| AppError::validation("price", msg))?;
        }
        if let Some(unit) = &input.unit {
            if unit.trim().is_empty() || unit.len() > 32 {
                return Err(AppError::validation(
                    "unit",
                    "Unit must be between 1 and 32 characters",
                ));
            }
        }

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            UPDATE inventory
            SET quantity = COALESCE($1, quantity),
                price = COALESCE($2, price),
                unit = COALESCE($3, unit),
                updated_at = NOW()
            WHERE strain_id = $4
            RETURNING id, strain_id, quantity, price, unit, updated_at
            "#,
        )
        .bind(input.quantity)
        .bind(input.price)
        .bind(&input.unit)
        .bind(strain_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory".to_string()))?;

        tracing::info!(%strain_id, quantity = record.quantity, price = %record.price, "Inventory updated");
        Ok(self.to_view(record))
    }

    /// Apply a relative adjustment; the result may not go below zero
    pub async fn adjust(
        &self,
        strain_id: Uuid,
        input: AdjustInventoryInput,
    ) -> AppResult<InventoryView> {
        if input.delta == 0 {
            return Err(AppError::validation("delta", "Adjustment cannot be zero"));
        }

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM inventory WHERE strain_id = $1 FOR UPDATE",
        )
        .bind(strain_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory".to_string()))?;

        let next = current
            .checked_add(input.delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Adjustment of {} would leave {} units in stock",
                    input.delta,
                    i64::from(current) + i64::from(input.delta)
                ))
            })?;

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            UPDATE inventory SET quantity = $1, updated_at = NOW()
            WHERE strain_id = $2
            RETURNING id, strain_id, quantity, price, unit, updated_at
            "#,
        )
        .bind(next)
        .bind(strain_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            %strain_id,
            delta = input.delta,
            reason = input.reason.as_deref().unwrap_or(""),
            quantity = record.quantity,
            "Inventory adjusted"
        );
        Ok(self.to_view(record))
    }

    /// Strains at or below the low-stock threshold, emptiest first
    pub async fn low_stock(&self) -> AppResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT s.id AS strain_id, s.slug, s.name, i.quantity
            FROM inventory i
            JOIN strains s ON s.id = i.strain_id
            WHERE i.quantity <= $1
            ORDER BY i.quantity ASC, s.name ASC
            "#,
        )
        .bind(self.low_stock_threshold)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }
}
