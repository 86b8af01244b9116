//! Strain catalog service: public listings and admin maintenance

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{classify_potency, Pagination, PaginatedResponse, Potency, StockStatus, StrainType};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{map_unique_violation, AppError, AppResult};

/// Strain catalog service
#[derive(Clone)]
pub struct StrainService {
    db: PgPool,
    low_stock_threshold: i32,
}

/// Strain joined with its inventory record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StrainRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub strain_type: StrainType,
    pub description: Option<String>,
    pub thc_percentage: Decimal,
    pub cbd_percentage: Decimal,
    pub effects: Vec<String>,
    pub flavors: Vec<String>,
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub price: Decimal,
    pub quantity: i32,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Strain as shown by the storefront
#[derive(Debug, Clone, Serialize)]
pub struct StrainView {
    #[serde(flatten)]
    pub strain: StrainRow,
    pub potency: Potency,
    pub stock_status: StockStatus,
}

/// Sort order for listings
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrainSort {
    #[default]
    Name,
    ThcDesc,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl StrainSort {
    fn order_by(&self) -> &'static str {
        match self {
            StrainSort::Name => " ORDER BY s.name ASC",
            StrainSort::ThcDesc => " ORDER BY s.thc_percentage DESC, s.name ASC",
            StrainSort::PriceAsc => " ORDER BY price ASC, s.name ASC",
            StrainSort::PriceDesc => " ORDER BY price DESC, s.name ASC",
            StrainSort::Newest => " ORDER BY s.created_at DESC",
        }
    }
}

/// Query parameters for listing strains
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrainFilter {
    pub strain_type: Option<StrainType>,
    pub search: Option<String>,
    pub min_thc: Option<Decimal>,
    pub max_thc: Option<Decimal>,
    pub effect: Option<String>,
    pub in_stock: Option<bool>,
    pub sort: Option<StrainSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for creating a strain together with its inventory record
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStrainInput {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,
    pub slug: Option<String>,
    pub strain_type: StrainType,
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
    pub thc_percentage: Decimal,
    pub cbd_percentage: Option<Decimal>,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub flavors: Vec<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    pub price: Decimal,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
    #[validate(length(min = 1, max = 32, message = "Unit must be between 1 and 32 characters"))]
    pub unit: Option<String>,
}

/// Input for updating a strain; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStrainInput {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub strain_type: Option<StrainType>,
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
    pub thc_percentage: Option<Decimal>,
    pub cbd_percentage: Option<Decimal>,
    pub effects: Option<Vec<String>>,
    pub flavors: Option<Vec<String>>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    pub is_featured: Option<bool>,
}

const STRAIN_SELECT: &str = r#"
    SELECT s.id, s.slug, s.name, s.strain_type, s.description, s.thc_percentage,
           s.cbd_percentage, s.effects, s.flavors, s.image_url, s.is_featured,
           COALESCE(i.price, 0) AS price, COALESCE(i.quantity, 0) AS quantity,
           COALESCE(i.unit, '3.5g') AS unit, s.created_at, s.updated_at
    FROM strains s
    LEFT JOIN inventory i ON i.strain_id = s.id
"#;

impl StrainService {
    /// Create a new StrainService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            low_stock_threshold: config.store.low_stock_threshold,
        }
    }

    fn to_view(&self, strain: StrainRow) -> StrainView {
        StrainView {
            potency: classify_potency(strain.thc_percentage),
            stock_status: StockStatus::from_quantity(strain.quantity, self.low_stock_threshold),
            strain,
        }
    }

    /// List strains with filters, sorting and pagination
    pub async fn list(&self, filter: StrainFilter) -> AppResult<PaginatedResponse<StrainView>> {
        if let (Some(min), Some(max)) = (filter.min_thc, filter.max_thc) {
            if min > max {
                return Err(AppError::validation(
                    "min_thc",
                    "min_thc cannot be greater than max_thc",
                ));
            }
        }

        let pagination = Pagination::from_query(filter.page, filter.per_page);

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM strains s LEFT JOIN inventory i ON i.strain_id = s.id WHERE TRUE",
        );
        push_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(STRAIN_SELECT);
        query.push(" WHERE TRUE");
        push_filters(&mut query, &filter);
        query.push(filter.sort.unwrap_or_default().order_by());
        query.push(" LIMIT ");
        query.push_bind(pagination.limit());
        query.push(" OFFSET ");
        query.push_bind(pagination.offset());

        let rows: Vec<StrainRow> = query.build_query_as().fetch_all(&self.db).await?;
        let views = rows.into_iter().map(|r| self.to_view(r)).collect();

        Ok(PaginatedResponse::new(
            views,
            pagination,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Get a strain by its slug
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<StrainView> {
        let row = sqlx::query_as::<_, StrainRow>(&format!("{} WHERE s.slug = $1", STRAIN_SELECT))
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Strain".to_string()))?;

        Ok(self.to_view(row))
    }

    /// Get a strain by id
    pub async fn get(&self, strain_id: Uuid) -> AppResult<StrainView> {
        let row = sqlx::query_as::<_, StrainRow>(&format!("{} WHERE s.id = $1", STRAIN_SELECT))
            .bind(strain_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Strain".to_string()))?;

        Ok(self.to_view(row))
    }

    /// Featured strains that can currently be bought
    pub async fn featured(&self, limit: i64) -> AppResult<Vec<StrainView>> {
        let rows = sqlx::query_as::<_, StrainRow>(&format!(
            "{} WHERE s.is_featured AND COALESCE(i.quantity, 0) > 0 ORDER BY s.updated_at DESC LIMIT $1",
            STRAIN_SELECT
        ))
        .bind(limit.clamp(1, 24))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| self.to_view(r)).collect())
    }

    /// Create a strain and its inventory record
    pub async fn create(&self, input: CreateStrainInput) -> AppResult<StrainView> {
        input.validate()?;

        let slug = match &input.slug {
            Some(slug) => slug.clone(),
            None => shared::slugify(&input.name),
        };
        shared::validate_slug(&slug).map_err(|msg| AppError::validation("slug", msg))?;
        shared::validate_percentage(input.thc_percentage)
            .map_err(|msg| AppError::validation("thc_percentage", msg))?;
        let cbd = input.cbd_percentage.unwrap_or(Decimal::ZERO);
        shared::validate_percentage(cbd).map_err(|msg| AppError::validation("cbd_percentage", msg))?;
        shared::validate_price(input.price).map_err(|msg| AppError::validation("price", msg))?;

        let effects = normalize_effects(&input.effects);

        let mut tx = self.db.begin().await?;

        let strain_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO strains (slug, name, strain_type, description, thc_percentage,
                                 cbd_percentage, effects, flavors, image_url, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&slug)
        .bind(&input.name)
        .bind(input.strain_type.as_str())
        .bind(&input.description)
        .bind(input.thc_percentage)
        .bind(cbd)
        .bind(&effects)
        .bind(&input.flavors)
        .bind(&input.image_url)
        .bind(input.is_featured)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "slug"))?;

        sqlx::query(
            r#"
            INSERT INTO inventory (strain_id, quantity, price, unit)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(strain_id)
        .bind(input.quantity.unwrap_or(0))
        .bind(input.price)
        .bind(input.unit.as_deref().unwrap_or("3.5g"))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%strain_id, %slug, "Strain created");
        self.get(strain_id).await
    }

    /// Update strain attributes
    pub async fn update(&self, strain_id: Uuid, input: UpdateStrainInput) -> AppResult<StrainView> {
        input.validate()?;

        if let Some(slug) = &input.slug {
            shared::validate_slug(slug).map_err(|msg| AppError::validation("slug", msg))?;
        }
        if let Some(thc) = input.thc_percentage {
            shared::validate_percentage(thc)
                .map_err(|msg| AppError::validation("thc_percentage", msg))?;
        }
        if let Some(cbd) = input.cbd_percentage {
            shared::validate_percentage(cbd)
                .map_err(|msg| AppError::validation("cbd_percentage", msg))?;
        }

        let effects = input.effects.as_deref().map(normalize_effects);

        let result = sqlx::query(
            r#"
            UPDATE strains
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                strain_type = COALESCE($3, strain_type),
                description = COALESCE($4, description),
                thc_percentage = COALESCE($5, thc_percentage),
                cbd_percentage = COALESCE($6, cbd_percentage),
                effects = COALESCE($7, effects),
                flavors = COALESCE($8, flavors),
                image_url = COALESCE($9, image_url),
                is_featured = COALESCE($10, is_featured),
                updated_at = NOW()
            WHERE id = $11
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.strain_type.map(|t| t.as_str()))
        .bind(&input.description)
        .bind(input.thc_percentage)
        .bind(input.cbd_percentage)
        .bind(&effects)
        .bind(&input.flavors)
        .bind(&input.image_url)
        .bind(input.is_featured)
        .bind(strain_id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "slug"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Strain".to_string()));
        }

        self.get(strain_id).await
    }

    /// Delete a strain. Strains referenced by past orders cannot be deleted.
    pub async fn delete(&self, strain_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM strains WHERE id = $1")
            .bind(strain_id)
            .execute(&self.db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(
                        "Strain appears on existing orders and cannot be deleted".to_string(),
                    )
                }
                _ => AppError::DatabaseError(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Strain".to_string()));
        }

        tracing::info!(%strain_id, "Strain deleted");
        Ok(())
    }
}

/// Append WHERE clauses for the listing filters
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &StrainFilter) {
    if let Some(strain_type) = filter.strain_type {
        query.push(" AND s.strain_type = ");
        query.push_bind(strain_type.as_str());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        query.push(" AND (s.name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR s.description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(min_thc) = filter.min_thc {
        query.push(" AND s.thc_percentage >= ");
        query.push_bind(min_thc);
    }
    if let Some(max_thc) = filter.max_thc {
        query.push(" AND s.thc_percentage <= ");
        query.push_bind(max_thc);
    }
    if let Some(effect) = filter.effect.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query.push(" AND EXISTS (SELECT 1 FROM unnest(s.effects) e WHERE lower(e) = ");
        query.push_bind(effect.to_lowercase());
        query.push(")");
    }
    if filter.in_stock == Some(true) {
        query.push(" AND COALESCE(i.quantity, 0) > 0");
    }
}

/// Effects are stored trimmed, lowercased and without duplicates
fn normalize_effects(effects: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(effects.len());
    for effect in effects {
        let effect = effect.trim().to_lowercase();
        if !effect.is_empty() && !normalized.contains(&effect) {
            normalized.push(effect);
        }
    }
    normalized
}

/// Escape LIKE wildcards in user input
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_wildcards() {
        assert_eq!(escape_like("og_kush 100%"), "og\\_kush 100\\%");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn effects_are_normalized() {
        let effects = vec![
            "Relaxed".to_string(),
            " HAPPY ".to_string(),
            "relaxed".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(normalize_effects(&effects), vec!["relaxed", "happy"]);
        assert!(normalize_effects(&[]).is_empty());
    }

    #[test]
    fn default_sort_is_by_name() {
        assert_eq!(StrainSort::default(), StrainSort::Name);
        assert!(StrainSort::PriceAsc.order_by().contains("price ASC"));
    }

    #[test]
    fn create_input_validation() {
        let input: CreateStrainInput = serde_json::from_value(serde_json::json!({
            "name": "",
            "strain_type": "hybrid",
            "thc_percentage": "21.5",
            "price": "35.00"
        }))
        .unwrap();

        assert!(input.validate().is_err());
    }
}
