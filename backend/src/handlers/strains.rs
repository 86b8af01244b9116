//! Public catalog handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::PaginatedResponse;

use crate::error::AppResult;
use crate::services::strain::{StrainFilter, StrainView};
use crate::services::StrainService;
use crate::AppState;

#[derive(Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<i64>,
}

/// List strains with filters
pub async fn list_strains(
    State(state): State<AppState>,
    Query(filter): Query<StrainFilter>,
) -> AppResult<Json<PaginatedResponse<StrainView>>> {
    let service = StrainService::new(state.db, &state.config);
    let strains = service.list(filter).await?;
    Ok(Json(strains))
}

/// Featured strains that are in stock
pub async fn list_featured_strains(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> AppResult<Json<Vec<StrainView>>> {
    let service = StrainService::new(state.db, &state.config);
    let strains = service.featured(query.limit.unwrap_or(6)).await?;
    Ok(Json(strains))
}

/// Get a strain by slug
pub async fn get_strain(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<StrainView>> {
    let service = StrainService::new(state.db, &state.config);
    let strain = service.get_by_slug(&slug).await?;
    Ok(Json(strain))
}
