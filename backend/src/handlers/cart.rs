//! Shopping cart handlers
//!
//! Every route resolves the cart from the bearer token (when present) and the
//! session id header.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CartIdentity;
use crate::services::cart::{AddItemInput, CartView, UpdateItemInput};
use crate::services::CartService;
use crate::AppState;

/// Get the current cart
pub async fn get_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<CartView>> {
    let service = CartService::new(state.db, &state.config);
    let cart = service.get(&identity).await?;
    Ok(Json(cart))
}

/// Add a strain to the cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(input): Json<AddItemInput>,
) -> AppResult<Json<CartView>> {
    let service = CartService::new(state.db, &state.config);
    let cart = service.add_item(&identity, input).await?;
    Ok(Json(cart))
}

/// Set the quantity of a cart line
pub async fn update_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(strain_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<CartView>> {
    let service = CartService::new(state.db, &state.config);
    let cart = service.update_item(&identity, strain_id, input).await?;
    Ok(Json(cart))
}

/// Remove a strain from the cart
pub async fn remove_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(strain_id): Path<Uuid>,
) -> AppResult<Json<CartView>> {
    let service = CartService::new(state.db, &state.config);
    let cart = service.remove_item(&identity, strain_id).await?;
    Ok(Json(cart))
}

/// Empty the cart
pub async fn clear_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<CartView>> {
    let service = CartService::new(state.db, &state.config);
    let cart = service.clear(&identity).await?;
    Ok(Json(cart))
}

/// Fold the anonymous session cart into the signed-in user's cart
pub async fn merge_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<CartView>> {
    let service = CartService::new(state.db, &state.config);
    let cart = service.merge(&identity).await?;
    Ok(Json(cart))
}
