//! Stripe API client for hosted checkout sessions
//!
//! Only the calls the storefront needs: creating a Checkout Session for a
//! pending order. Payment results arrive through signed webhooks.

use rust_decimal::prelude::ToPrimitive;
use reqwest::Client;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};

/// Stripe API client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
    success_url: String,
    cancel_url: String,
}

/// One line on the hosted payment page
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount: Decimal,
    pub quantity: i32,
}

/// Request for a new hosted checkout session
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub customer_email: Option<String>,
    pub line_items: Vec<CheckoutLineItem>,
}

/// Checkout session as returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new StripeClient from configuration
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }

    /// Create a hosted checkout session for an order
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        let params = checkout_form(request, &self.success_url, &self.cancel_url)?;
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", format!("checkout-{}", request.order_id))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(AppError::PaymentGateway(format!(
                "Stripe error: {} - {}",
                status, message
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Failed to parse Stripe response: {}", e)))
    }
}

/// Convert a decimal amount to the gateway's minor currency unit (cents)
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .filter(|cents| *cents >= 0)
        .ok_or_else(|| AppError::Internal(format!("Amount {} cannot be charged", amount)))
}

/// Form fields for `POST /v1/checkout/sessions`
fn checkout_form(
    request: &CheckoutSessionRequest,
    success_url: &str,
    cancel_url: &str,
) -> AppResult<Vec<(String, String)>> {
    let order_id = request.order_id.to_string();
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
        ("client_reference_id".to_string(), order_id.clone()),
        ("metadata[order_id]".to_string(), order_id),
    ];

    if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_string(), email.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        params.push((
            format!("{}[price_data][currency]", prefix),
            request.currency.clone(),
        ));
        params.push((
            format!("{}[price_data][unit_amount]", prefix),
            to_minor_units(item.unit_amount)?.to_string(),
        ));
        params.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn converts_to_cents() {
        assert_eq!(to_minor_units(Decimal::new(4500, 2)).unwrap(), 4500);
        assert_eq!(to_minor_units(Decimal::new(15, 3)).unwrap(), 2);
        assert_eq!(to_minor_units(Decimal::new(0, 0)).unwrap(), 0);
        assert!(to_minor_units(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn builds_checkout_form() {
        let order_id = Uuid::new_v4();
        let request = CheckoutSessionRequest {
            order_id,
            currency: "usd".to_string(),
            customer_email: Some("buyer@greenleaf.test".to_string()),
            line_items: vec![
                CheckoutLineItem {
                    name: "Blue Dream (3.5g)".to_string(),
                    unit_amount: Decimal::new(4500, 2),
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Sales tax".to_string(),
                    unit_amount: Decimal::new(720, 2),
                    quantity: 1,
                },
            ],
        };

        let params = checkout_form(&request, "https://shop/success", "https://shop/cart").unwrap();

        assert_eq!(field(&params, "mode"), Some("payment"));
        assert_eq!(field(&params, "metadata[order_id]"), Some(order_id.to_string().as_str()));
        assert_eq!(field(&params, "customer_email"), Some("buyer@greenleaf.test"));
        assert_eq!(field(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(field(&params, "line_items[0][price_data][unit_amount]"), Some("4500"));
        assert_eq!(
            field(&params, "line_items[1][price_data][product_data][name]"),
            Some("Sales tax")
        );
        assert_eq!(field(&params, "line_items[1][price_data][unit_amount]"), Some("720"));
    }
}
