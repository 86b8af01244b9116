//! Checkout handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::{CartIdentity, CurrentUser};
use crate::services::checkout::{CheckoutResponse, CheckoutStatus};
use crate::services::CheckoutService;
use crate::AppState;

/// Create an order from the cart and return the hosted payment page
pub async fn create_checkout(
    State(state): State<AppState>,
    current_user: CurrentUser,
    identity: CartIdentity,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    let service = CheckoutService::new(state.db, &state.config, state.stripe);
    let checkout = service.create_checkout(&current_user.0, &identity).await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

/// Order status for a checkout session
pub async fn get_checkout_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<CheckoutStatus>> {
    let service = CheckoutService::new(state.db, &state.config, state.stripe);
    let status = service
        .get_session_status(&current_user.0.user_id, &session_id)
        .await?;
    Ok(Json(status))
}
