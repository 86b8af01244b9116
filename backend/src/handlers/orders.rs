//! Customer order history handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::order::OrderWithItems;
use crate::services::OrderService;
use crate::AppState;

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List the caller's orders
pub async fn list_my_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<OrderWithItems>>> {
    let service = OrderService::new(state.db);
    let pagination = Pagination::from_query(query.page, query.per_page);
    let orders = service
        .list_for_user(&current_user.0.user_id, pagination)
        .await?;
    Ok(Json(orders))
}

/// Get one of the caller's orders
pub async fn get_my_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderWithItems>> {
    let service = OrderService::new(state.db);
    let order = service.get_for_user(&current_user.0.user_id, order_id).await?;
    Ok(Json(order))
}
