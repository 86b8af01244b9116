//! Payment gateway webhook handler

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::services::payment_events::WebhookOutcome;
use crate::services::PaymentEventService;
use crate::AppState;

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

/// Receive a signed Stripe event. The raw body is needed for signature checks.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    let service = PaymentEventService::new(state.db, &state.config.stripe);
    let outcome = service.handle(signature, &body).await?;

    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}
