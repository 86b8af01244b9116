//! Admin handlers: catalog maintenance, stock, orders and reports
//!
//! Every handler takes `AdminUser`, which rejects callers without the admin role.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{OrderStatus, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AdminUser;
use crate::services::admin::DashboardStats;
use crate::services::inventory::{
    AdjustInventoryInput, InventoryView, LowStockItem, SetInventoryInput,
};
use crate::services::order::OrderWithItems;
use crate::services::strain::{CreateStrainInput, StrainView, UpdateStrainInput};
use crate::services::{AdminService, InventoryService, StrainService};
use crate::AppState;

#[derive(Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
}

// Strains

/// Create a strain with its inventory record
pub async fn admin_create_strain(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CreateStrainInput>,
) -> AppResult<(StatusCode, Json<StrainView>)> {
    let service = StrainService::new(state.db, &state.config);
    let strain = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(strain)))
}

/// Update strain attributes
pub async fn admin_update_strain(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(strain_id): Path<Uuid>,
    Json(input): Json<UpdateStrainInput>,
) -> AppResult<Json<StrainView>> {
    let service = StrainService::new(state.db, &state.config);
    let strain = service.update(strain_id, input).await?;
    Ok(Json(strain))
}

/// Delete a strain
pub async fn admin_delete_strain(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(strain_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = StrainService::new(state.db, &state.config);
    service.delete(strain_id).await?;
    tracing::info!(%strain_id, admin = %admin.0.user_id, "Strain removed by admin");
    Ok(StatusCode::NO_CONTENT)
}

// Inventory

/// Get the inventory record of a strain
pub async fn admin_get_inventory(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(strain_id): Path<Uuid>,
) -> AppResult<Json<InventoryView>> {
    let service = InventoryService::new(state.db, &state.config);
    let inventory = service.get(strain_id).await?;
    Ok(Json(inventory))
}

/// Overwrite quantity, price or unit
pub async fn admin_set_inventory(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(strain_id): Path<Uuid>,
    Json(input): Json<SetInventoryInput>,
) -> AppResult<Json<InventoryView>> {
    let service = InventoryService::new(state.db, &state.config);
    let inventory = service.set(strain_id, input).await?;
    Ok(Json(inventory))
}

/// Restock or write off units
pub async fn admin_adjust_inventory(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(strain_id): Path<Uuid>,
    Json(input): Json<AdjustInventoryInput>,
) -> AppResult<Json<InventoryView>> {
    let service = InventoryService::new(state.db, &state.config);
    let inventory = service.adjust(strain_id, input).await?;
    Ok(Json(inventory))
}

/// Strains at or below the low-stock threshold
pub async fn admin_low_stock(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<LowStockItem>>> {
    let service = InventoryService::new(state.db, &state.config);
    let items = service.low_stock().await?;
    Ok(Json(items))
}

// Orders

/// List all orders
pub async fn admin_list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminOrderQuery>,
) -> AppResult<Json<PaginatedResponse<OrderWithItems>>> {
    let service = AdminService::new(state.db, &state.config);
    let pagination = Pagination::from_query(query.page, query.per_page);
    let orders = service.list_orders(query.status, pagination).await?;
    Ok(Json(orders))
}

/// Get any order
pub async fn admin_get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderWithItems>> {
    let service = AdminService::new(state.db, &state.config);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

/// Move an order along its lifecycle
pub async fn admin_update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<OrderWithItems>> {
    let service = AdminService::new(state.db, &state.config);
    let order = service.update_order_status(order_id, input.status).await?;
    Ok(Json(order))
}

// Reports

/// Dashboard figures
pub async fn admin_dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<DashboardStats>> {
    let service = AdminService::new(state.db, &state.config);
    let stats = service.dashboard().await?;
    Ok(Json(stats))
}

/// Download orders as CSV
pub async fn admin_export_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ExportQuery>,
) -> AppResult<impl IntoResponse> {
    let service = AdminService::new(state.db, &state.config);
    let csv = service.export_orders_csv(query.status).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
        ],
        csv,
    ))
}
