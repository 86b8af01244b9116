//! Checkout service
//!
//! Turns the caller's cart into a pending order with price snapshots and
//! opens a hosted payment page for it. Stock is verified here but only
//! decremented when the payment webhook confirms the order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{CartLine, CartTotals, OrderStatus};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::{CheckoutLineItem, CheckoutSessionRequest, StripeClient};
use crate::middleware::{AuthUser, CartIdentity};
use crate::services::CartService;

/// Checkout service
#[derive(Clone)]
pub struct CheckoutService {
    db: PgPool,
    stripe: StripeClient,
    cart: CartService,
    tax_rate: Decimal,
    currency: String,
}

/// Result of starting a checkout
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub session_id: String,
    pub checkout_url: Option<String>,
    pub totals: CartTotals,
}

/// Order state shown on the payment success page
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CheckoutStatus {
    pub order_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct CheckoutLineRow {
    strain_id: Uuid,
    strain_name: String,
    unit: String,
    unit_price: Decimal,
    quantity: i32,
    available: i32,
}

/// First line that asks for more than is on hand
fn first_shortage(rows: &[CheckoutLineRow]) -> Option<&CheckoutLineRow> {
    rows.iter().find(|row| row.quantity > row.available)
}

impl CheckoutService {
    /// Create a new CheckoutService instance
    pub fn new(db: PgPool, config: &Config, stripe: StripeClient) -> Self {
        Self {
            cart: CartService::new(db.clone(), config),
            db,
            stripe,
            tax_rate: config.store.tax_rate,
            currency: config.store.currency.clone(),
        }
    }

    /// Create a pending order from the cart and open a hosted checkout session
    pub async fn create_checkout(
        &self,
        user: &AuthUser,
        identity: &CartIdentity,
    ) -> AppResult<CheckoutResponse> {
        let mut tx = self.db.begin().await?;

        let cart_id = self
            .cart
            .acquire_cart(&mut tx, identity, false)
            .await?
            .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;

        let rows = sqlx::query_as::<_, CheckoutLineRow>(
            r#"
            SELECT ci.strain_id, s.name AS strain_name, i.unit, i.price AS unit_price,
                   ci.quantity, i.quantity AS available
            FROM cart_items ci
            JOIN strains s ON s.id = ci.strain_id
            JOIN inventory i ON i.strain_id = ci.strain_id
            WHERE ci.cart_id = $1
            ORDER BY ci.strain_id
            FOR UPDATE OF i
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            return Err(AppError::BadRequest("Cart is empty".to_string()));
        }
        if let Some(short) = first_shortage(&rows) {
            return Err(AppError::InsufficientInventory(format!(
                "{}: only {} available, {} requested",
                short.strain_name, short.available, short.quantity
            )));
        }

        let lines: Vec<CartLine> = rows
            .iter()
            .map(|row| CartLine {
                strain_id: row.strain_id,
                quantity: row.quantity,
                unit_price: row.unit_price,
            })
            .collect();
        let totals = CartTotals::compute(&lines, self.tax_rate);

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (user_id, customer_email, status, subtotal, tax, total, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(OrderStatus::Pending.as_str())
        .bind(totals.subtotal)
        .bind(totals.tax)
        .bind(totals.total)
        .bind(&self.currency)
        .fetch_one(&mut *tx)
        .await?;

        for (row, line) in rows.iter().zip(&lines) {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, strain_id, strain_name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id)
            .bind(row.strain_id)
            .bind(&row.strain_name)
            .bind(row.unit_price)
            .bind(row.quantity)
            .bind(line.line_total())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut line_items: Vec<CheckoutLineItem> = rows
            .iter()
            .map(|row| CheckoutLineItem {
                name: format!("{} ({})", row.strain_name, row.unit),
                unit_amount: row.unit_price,
                quantity: row.quantity,
            })
            .collect();
        if totals.tax > Decimal::ZERO {
            line_items.push(CheckoutLineItem {
                name: "Sales tax".to_string(),
                unit_amount: totals.tax,
                quantity: 1,
            });
        }

        let request = CheckoutSessionRequest {
            order_id,
            currency: self.currency.clone(),
            customer_email: user.email.clone(),
            line_items,
        };

        let session = match self.stripe.create_checkout_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(%order_id, error = %e, "Checkout session creation failed");
                self.cancel_pending(order_id).await?;
                return Err(e);
            }
        };

        sqlx::query(
            "UPDATE orders SET payment_session_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(&session.id)
        .bind(order_id)
        .execute(&self.db)
        .await?;

        tracing::info!(%order_id, user_id = %user.user_id, total = %totals.total, "Checkout started");

        Ok(CheckoutResponse {
            order_id,
            session_id: session.id,
            checkout_url: session.url,
            totals,
        })
    }

    /// Order status for a checkout session belonging to the user
    pub async fn get_session_status(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> AppResult<CheckoutStatus> {
        sqlx::query_as::<_, CheckoutStatus>(
            r#"
            SELECT id AS order_id, status, total, currency, paid_at
            FROM orders
            WHERE payment_session_id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Checkout session".to_string()))
    }

    async fn cancel_pending(&self, order_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(OrderStatus::Cancelled.as_str())
        .bind(order_id)
        .bind(OrderStatus::Pending.as_str())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
