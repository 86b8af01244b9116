//! Payment webhook processing
//!
//! Events arrive signed with `Stripe-Signature: t=<unix>,v1=<hex>`. Each event
//! id is recorded in `webhook_events` inside the same transaction that applies
//! it, so redelivered events are acknowledged without being applied twice.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use shared::OrderStatus;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";

/// Compute the hex `v1` signature for a payload
pub fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// Accepts when any `v1` entry matches and `t` is within `tolerance_secs` of `now`.
pub fn verify_stripe_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp_raw =
        timestamp.ok_or_else(|| AppError::InvalidSignature("missing timestamp".to_string()))?;
    let timestamp: i64 = timestamp_raw
        .parse()
        .map_err(|_| AppError::InvalidSignature("malformed timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature("missing v1 signature".to_string()));
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(AppError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    for signature in &signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp_raw.as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(AppError::InvalidSignature("no matching signature".to_string()))
}

/// Stock left after shipping `ordered` units, and how many units were missing
pub fn decrement_stock(on_hand: i32, ordered: i32) -> (i32, i32) {
    let remaining = on_hand.saturating_sub(ordered);
    if remaining < 0 {
        (0, -remaining)
    } else {
        (remaining, 0)
    }
}

/// Envelope of a webhook event
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The checkout session object carried by `checkout.session.*` events
#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get("order_id")
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// What happened to a delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
    Skipped,
}

#[derive(Debug, FromRow)]
struct LockedOrder {
    id: Uuid,
    user_id: String,
    #[sqlx(try_from = "String")]
    status: OrderStatus,
}

#[derive(Debug, FromRow)]
struct PurchasedLine {
    strain_id: Uuid,
    quantity: i32,
}

/// Webhook event service
#[derive(Clone)]
pub struct PaymentEventService {
    db: PgPool,
    webhook_secret: String,
    tolerance_secs: i64,
}

impl PaymentEventService {
    /// Create a new PaymentEventService instance
    pub fn new(db: PgPool, config: &StripeConfig) -> Self {
        Self {
            db,
            webhook_secret: config.webhook_secret.clone(),
            tolerance_secs: config.webhook_tolerance_secs,
        }
    }

    /// Verify, parse and apply a webhook delivery
    pub async fn handle(&self, signature: Option<&str>, payload: &[u8]) -> AppResult<WebhookOutcome> {
        let signature = signature
            .ok_or_else(|| AppError::InvalidSignature("missing Stripe-Signature header".to_string()))?;
        verify_stripe_signature(
            signature,
            payload,
            &self.webhook_secret,
            self.tolerance_secs,
            chrono::Utc::now().timestamp(),
        )?;

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed event: {}", e)))?;

        if event.event_type != CHECKOUT_COMPLETED && event.event_type != CHECKOUT_EXPIRED {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
            .map_err(|e| AppError::BadRequest(format!("Malformed checkout session: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let recorded = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&event.id)
        .bind(&event.event_type)
        .execute(&mut *tx)
        .await?;

        if recorded.rows_affected() == 0 {
            tracing::info!(event_id = %event.id, "Duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = if event.event_type == CHECKOUT_COMPLETED {
            fulfil_order(&mut tx, &session).await?
        } else {
            expire_order(&mut tx, &session).await?
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

async fn lock_order(
    conn: &mut PgConnection,
    session: &CheckoutSessionObject,
) -> AppResult<Option<LockedOrder>> {
    let order = match session.order_id() {
        Some(order_id) => {
            sqlx::query_as::<_, LockedOrder>(
                "SELECT id, user_id, status FROM orders WHERE id = $1 FOR UPDATE",
            )
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, LockedOrder>(
                "SELECT id, user_id, status FROM orders WHERE payment_session_id = $1 FOR UPDATE",
            )
            .bind(&session.id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    if order.is_none() {
        tracing::warn!(session_id = %session.id, "Webhook for unknown order");
    }
    Ok(order)
}

async fn fulfil_order(
    conn: &mut PgConnection,
    session: &CheckoutSessionObject,
) -> AppResult<WebhookOutcome> {
    if session.payment_status.as_deref() == Some("unpaid") {
        tracing::info!(session_id = %session.id, "Checkout completed without payment yet");
        return Ok(WebhookOutcome::Skipped);
    }

    let Some(order) = lock_order(conn, session).await? else {
        return Ok(WebhookOutcome::Skipped);
    };
    if order.status != OrderStatus::Pending {
        tracing::info!(order_id = %order.id, status = %order.status, "Order already settled");
        return Ok(WebhookOutcome::Skipped);
    }

    let lines = sqlx::query_as::<_, PurchasedLine>(
        "SELECT strain_id, quantity FROM order_items WHERE order_id = $1 ORDER BY strain_id",
    )
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await?;

    for line in &lines {
        let on_hand = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM inventory WHERE strain_id = $1 FOR UPDATE",
        )
        .bind(line.strain_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(on_hand) = on_hand else {
            tracing::warn!(order_id = %order.id, strain_id = %line.strain_id, "No inventory row for purchased strain");
            continue;
        };

        let (remaining, shortfall) = decrement_stock(on_hand, line.quantity);
        if shortfall > 0 {
            tracing::warn!(
                order_id = %order.id,
                strain_id = %line.strain_id,
                shortfall,
                "Oversold; inventory floored at zero"
            );
        }

        sqlx::query("UPDATE inventory SET quantity = $1, updated_at = NOW() WHERE strain_id = $2")
            .bind(remaining)
            .bind(line.strain_id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query(
        r#"
        UPDATE orders
        SET status = $1, paid_at = NOW(), payment_intent_id = $2,
            payment_session_id = COALESCE(payment_session_id, $3), updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(OrderStatus::Paid.as_str())
    .bind(&session.payment_intent)
    .bind(&session.id)
    .bind(order.id)
    .execute(&mut *conn)
    .await?;

    let strain_ids: Vec<Uuid> = lines.iter().map(|l| l.strain_id).collect();
    sqlx::query(
        r#"
        DELETE FROM cart_items ci
        USING carts c
        WHERE ci.cart_id = c.id AND c.user_id = $1 AND ci.strain_id = ANY($2)
        "#,
    )
    .bind(&order.user_id)
    .bind(&strain_ids)
    .execute(&mut *conn)
    .await?;

    tracing::info!(order_id = %order.id, lines = lines.len(), "Order paid");
    Ok(WebhookOutcome::Processed)
}

async fn expire_order(
    conn: &mut PgConnection,
    session: &CheckoutSessionObject,
) -> AppResult<WebhookOutcome> {
    let Some(order) = lock_order(conn, session).await? else {
        return Ok(WebhookOutcome::Skipped);
    };
    if order.status != OrderStatus::Pending {
        return Ok(WebhookOutcome::Skipped);
    }

    sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(OrderStatus::Cancelled.as_str())
        .bind(order.id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(order_id = %order.id, "Checkout expired; order cancelled");
    Ok(WebhookOutcome::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn floors_stock_at_zero() {
        assert_eq!(decrement_stock(10, 3), (7, 0));
        assert_eq!(decrement_stock(3, 3), (0, 0));
        assert_eq!(decrement_stock(2, 5), (0, 3));
    }

    #[test]
    fn reads_order_id_from_metadata() {
        let order_id = Uuid::new_v4();
        let session: CheckoutSessionObject = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_intent": "pi_1",
            "metadata": { "order_id": order_id.to_string() }
        }))
        .unwrap();
        assert_eq!(session.order_id(), Some(order_id));

        let bare: CheckoutSessionObject =
            serde_json::from_value(serde_json::json!({ "id": "cs_test_2" })).unwrap();
        assert_eq!(bare.order_id(), None);
    }

    #[test]
    fn accepts_any_matching_v1() {
        let payload = br#"{"id":"evt_1"}"#;
        let good = compute_signature(SECRET, "1700000000", payload).unwrap();
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), good);
        assert!(verify_stripe_signature(&header, payload, SECRET, 300, 1700000100).is_ok());
    }

    #[test]
    fn rejects_malformed_headers() {
        let payload = b"{}";
        for header in ["", "v1=abcd", "t=1700000000", "t=soon,v1=abcd"] {
            assert!(matches!(
                verify_stripe_signature(header, payload, SECRET, 300, 1700000000),
                Err(AppError::InvalidSignature(_))
            ));
        }
    }
}
