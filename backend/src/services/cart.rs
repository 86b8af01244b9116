//! Shopping cart service
//!
//! Carts are keyed by user id or by anonymous session id. On authenticated
//! access an anonymous session cart is claimed by the user, or merged into
//! the user's existing cart. A session cart that already belongs to a user is
//! never returned for another identity.
//!
//! Every mutation runs in one transaction: the cart row is locked first, then
//! the inventory rows it touches, so concurrent adds cannot push a line past
//! the stock on hand.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{fits_in_stock, merged_quantity, CartLine, CartTotals, StrainType};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::CartIdentity;

/// Shopping cart service
#[derive(Clone)]
pub struct CartService {
    db: PgPool,
    tax_rate: Decimal,
    max_quantity_per_item: i32,
}

/// Minimal cart row used for identity resolution
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CartRef {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl CartRef {
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

/// What to do with the carts found for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartResolution {
    /// Use this cart as is
    Existing(Uuid),
    /// Move the anonymous session cart's lines into the user's cart
    Merge { from: Uuid, into: Uuid },
    /// Attach the anonymous session cart to the user
    Claim(Uuid),
    /// No cart yet for the signed-in user
    CreateForUser,
    /// No cart yet for the anonymous session
    CreateForSession,
    /// The session's cart belongs to an account; not visible anonymously
    Hidden,
}

/// Decide which cart an identity may use.
///
/// `user_cart` is the cart found by `identity.user_id`, `session_cart` the one
/// found by `identity.session_id`. A session cart owned by a user is only ever
/// reachable through that user's id.
pub fn resolve_cart(
    identity: &CartIdentity,
    user_cart: Option<&CartRef>,
    session_cart: Option<&CartRef>,
) -> CartResolution {
    match identity.user_id {
        Some(_) => {
            let anonymous = session_cart.filter(|c| c.is_anonymous());
            match (user_cart, anonymous) {
                (Some(user), Some(session)) if session.id != user.id => CartResolution::Merge {
                    from: session.id,
                    into: user.id,
                },
                (Some(user), _) => CartResolution::Existing(user.id),
                (None, Some(session)) => CartResolution::Claim(session.id),
                (None, None) => CartResolution::CreateForUser,
            }
        }
        None => match session_cart {
            Some(session) if session.is_anonymous() => CartResolution::Existing(session.id),
            Some(_) => CartResolution::Hidden,
            None => CartResolution::CreateForSession,
        },
    }
}

/// A cart line joined with strain and inventory data
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartItemView {
    pub id: Uuid,
    pub strain_id: Uuid,
    pub slug: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub strain_type: StrainType,
    pub image_url: Option<String>,
    pub unit: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Stock currently on hand for this strain
    pub available: i32,
}

impl CartItemView {
    pub fn exceeds_stock(&self) -> bool {
        self.quantity > self.available
    }
}

/// Cart contents and totals
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: Option<Uuid>,
    pub items: Vec<CartItemView>,
    pub totals: CartTotals,
    /// Set when some line asks for more than is on hand; checkout will refuse it
    pub has_stock_issues: bool,
}

impl CartView {
    pub fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            totals: CartTotals::default(),
            has_stock_issues: false,
        }
    }

    pub fn from_items(cart_id: Uuid, items: Vec<CartItemView>, tax_rate: Decimal) -> Self {
        let lines: Vec<CartLine> = items
            .iter()
            .map(|item| CartLine {
                strain_id: item.strain_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        Self {
            cart_id: Some(cart_id),
            totals: CartTotals::compute(&lines, tax_rate),
            has_stock_issues: items.iter().any(CartItemView::exceeds_stock),
            items,
        }
    }
}

/// Input for adding a strain to the cart
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub strain_id: Uuid,
    pub quantity: i32,
}

/// Input for setting the quantity of a line; zero removes it
#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    pub quantity: i32,
}

/// Row used while merging carts
#[derive(Debug, FromRow)]
struct MergeRow {
    strain_id: Uuid,
    incoming: i32,
    existing: i32,
    available: i32,
}

impl CartService {
    /// Create a new CartService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            tax_rate: config.store.tax_rate,
            max_quantity_per_item: config.cart.max_quantity_per_item,
        }
    }

    /// Get the cart for an identity without creating one
    pub async fn get(&self, identity: &CartIdentity) -> AppResult<CartView> {
        let mut tx = self.db.begin().await?;

        let view = match self.acquire_cart(&mut tx, identity, false).await? {
            Some(cart_id) => self.load_view(&mut tx, cart_id).await?,
            None => CartView::empty(),
        };

        tx.commit().await?;
        Ok(view)
    }

    /// Add a strain to the cart, creating the cart on first use
    pub async fn add_item(&self, identity: &CartIdentity, input: AddItemInput) -> AppResult<CartView> {
        shared::validate_cart_quantity(input.quantity, self.max_quantity_per_item)
            .map_err(|msg| AppError::validation("quantity", msg))?;

        let mut tx = self.db.begin().await?;

        let cart_id = self
            .acquire_cart(&mut tx, identity, true)
            .await?
            .ok_or_else(|| AppError::Internal("cart was not created".to_string()))?;

        let available = lock_stock(&mut tx, input.strain_id).await?;

        let in_cart = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE cart_id = $1 AND strain_id = $2",
        )
        .bind(cart_id)
        .bind(input.strain_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if !fits_in_stock(in_cart, input.quantity, available) {
            return Err(AppError::InsufficientInventory(format!(
                "Only {} available and {} already in cart",
                available, in_cart
            )));
        }
        shared::validate_cart_quantity(in_cart + input.quantity, self.max_quantity_per_item)
            .map_err(|msg| AppError::validation("quantity", msg))?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, strain_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, strain_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(cart_id)
        .bind(input.strain_id)
        .bind(input.quantity)
        .execute(&mut *tx)
        .await?;

        touch_cart(&mut tx, cart_id).await?;
        let view = self.load_view(&mut tx, cart_id).await?;
        tx.commit().await?;

        tracing::debug!(%cart_id, strain_id = %input.strain_id, quantity = input.quantity, "Added to cart");
        Ok(view)
    }

    /// Set the quantity of a line; zero removes it
    pub async fn update_item(
        &self,
        identity: &CartIdentity,
        strain_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<CartView> {
        if input.quantity == 0 {
            return self.remove_item(identity, strain_id).await;
        }
        shared::validate_cart_quantity(input.quantity, self.max_quantity_per_item)
            .map_err(|msg| AppError::validation("quantity", msg))?;

        let mut tx = self.db.begin().await?;

        let cart_id = self
            .acquire_cart(&mut tx, identity, false)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item".to_string()))?;

        let in_cart = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE cart_id = $1 AND strain_id = $2",
        )
        .bind(cart_id)
        .bind(strain_id)
        .fetch_optional(&mut *tx)
        .await?;

        let available = lock_stock(&mut tx, strain_id).await?;
        check_line_update(in_cart, input.quantity, available)?;

        sqlx::query(
            r#"
            UPDATE cart_items SET quantity = $1, updated_at = NOW()
            WHERE cart_id = $2 AND strain_id = $3
            "#,
        )
        .bind(input.quantity)
        .bind(cart_id)
        .bind(strain_id)
        .execute(&mut *tx)
        .await?;

        touch_cart(&mut tx, cart_id).await?;
        let view = self.load_view(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Remove a strain from the cart
    pub async fn remove_item(&self, identity: &CartIdentity, strain_id: Uuid) -> AppResult<CartView> {
        let mut tx = self.db.begin().await?;

        let cart_id = self
            .acquire_cart(&mut tx, identity, false)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item".to_string()))?;

        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND strain_id = $2")
            .bind(cart_id)
            .bind(strain_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cart item".to_string()));
        }

        touch_cart(&mut tx, cart_id).await?;
        let view = self.load_view(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Remove every line from the cart
    pub async fn clear(&self, identity: &CartIdentity) -> AppResult<CartView> {
        let mut tx = self.db.begin().await?;

        let view = match self.acquire_cart(&mut tx, identity, false).await? {
            Some(cart_id) => {
                sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
                    .bind(cart_id)
                    .execute(&mut *tx)
                    .await?;
                touch_cart(&mut tx, cart_id).await?;
                CartView {
                    cart_id: Some(cart_id),
                    ..CartView::empty()
                }
            }
            None => CartView::empty(),
        };

        tx.commit().await?;
        Ok(view)
    }

    /// Reconcile the session cart with the signed-in user's cart right after login
    pub async fn merge(&self, identity: &CartIdentity) -> AppResult<CartView> {
        if !identity.is_authenticated() || identity.session_id.is_none() {
            return Err(AppError::BadRequest(
                "Merging requires a signed-in user and a session id".to_string(),
            ));
        }

        self.get(identity).await
    }

    /// Resolve (and when needed claim, merge or create) the cart for an identity.
    /// Returns `None` only when `create` is false and no visible cart exists.
    pub(crate) async fn acquire_cart(
        &self,
        conn: &mut PgConnection,
        identity: &CartIdentity,
        create: bool,
    ) -> AppResult<Option<Uuid>> {
        let user_cart = match &identity.user_id {
            Some(user_id) => {
                sqlx::query_as::<_, CartRef>(
                    "SELECT id, user_id, session_id FROM carts WHERE user_id = $1 FOR UPDATE",
                )
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            None => None,
        };

        let session_cart = match &identity.session_id {
            Some(session_id) => {
                sqlx::query_as::<_, CartRef>(
                    "SELECT id, user_id, session_id FROM carts WHERE session_id = $1 FOR UPDATE",
                )
                .bind(session_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            None => None,
        };

        match resolve_cart(identity, user_cart.as_ref(), session_cart.as_ref()) {
            CartResolution::Existing(cart_id) => Ok(Some(cart_id)),
            CartResolution::Merge { from, into } => {
                merge_carts(conn, from, into, self.max_quantity_per_item).await?;
                Ok(Some(into))
            }
            CartResolution::Claim(cart_id) => {
                sqlx::query(
                    r#"
                    UPDATE carts SET user_id = $1, session_id = NULL, updated_at = NOW()
                    WHERE id = $2 AND user_id IS NULL
                    "#,
                )
                .bind(&identity.user_id)
                .bind(cart_id)
                .execute(&mut *conn)
                .await?;

                tracing::info!(%cart_id, "Session cart claimed by user");
                Ok(Some(cart_id))
            }
            CartResolution::CreateForUser if create => {
                let cart_id = sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO carts (user_id) VALUES ($1)
                    ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
                    RETURNING id
                    "#,
                )
                .bind(&identity.user_id)
                .fetch_one(&mut *conn)
                .await?;
                Ok(Some(cart_id))
            }
            CartResolution::CreateForSession if create => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO carts (session_id) VALUES ($1)
                    ON CONFLICT (session_id) DO UPDATE SET updated_at = NOW()
                    WHERE carts.user_id IS NULL
                    RETURNING id
                    "#,
                )
                .bind(&identity.session_id)
                .fetch_optional(&mut *conn)
                .await?
                .map(Some)
                .ok_or_else(session_taken)
            }
            CartResolution::Hidden if create => Err(session_taken()),
            CartResolution::CreateForUser
            | CartResolution::CreateForSession
            | CartResolution::Hidden => Ok(None),
        }
    }

    async fn load_view(&self, conn: &mut PgConnection, cart_id: Uuid) -> AppResult<CartView> {
        let items = sqlx::query_as::<_, CartItemView>(
            r#"
            SELECT ci.id, ci.strain_id, s.slug, s.name, s.strain_type, s.image_url, i.unit,
                   ci.quantity, i.price AS unit_price, i.price * ci.quantity AS line_total,
                   i.quantity AS available
            FROM cart_items ci
            JOIN strains s ON s.id = ci.strain_id
            JOIN inventory i ON i.strain_id = ci.strain_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(CartView::from_items(cart_id, items, self.tax_rate))
    }
}

/// A line must exist before its quantity is checked against stock
fn check_line_update(in_cart: Option<i32>, requested: i32, available: i32) -> AppResult<()> {
    if in_cart.is_none() {
        return Err(AppError::NotFound("Cart item".to_string()));
    }
    if requested > available {
        return Err(AppError::InsufficientInventory(format!(
            "Only {} available",
            available
        )));
    }
    Ok(())
}

fn session_taken() -> AppError {
    AppError::Conflict("This session's cart belongs to an account; sign in to use it".to_string())
}

/// Lock the inventory row of a strain and return its quantity
async fn lock_stock(conn: &mut PgConnection, strain_id: Uuid) -> AppResult<i32> {
    sqlx::query_scalar::<_, i32>("SELECT quantity FROM inventory WHERE strain_id = $1 FOR UPDATE")
        .bind(strain_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Strain".to_string()))
}

async fn touch_cart(conn: &mut PgConnection, cart_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Move every line of `from` into `into`, capping each line at current stock
/// and at `max_per_item`, then delete `from`.
async fn merge_carts(
    conn: &mut PgConnection,
    from: Uuid,
    into: Uuid,
    max_per_item: i32,
) -> AppResult<()> {
    // Inventory rows are locked in strain id order.
    let rows = sqlx::query_as::<_, MergeRow>(
        r#"
        SELECT src.strain_id, src.quantity AS incoming,
               COALESCE(dst.quantity, 0) AS existing, i.quantity AS available
        FROM cart_items src
        JOIN inventory i ON i.strain_id = src.strain_id
        LEFT JOIN cart_items dst ON dst.cart_id = $2 AND dst.strain_id = src.strain_id
        WHERE src.cart_id = $1
        ORDER BY src.strain_id
        FOR UPDATE OF i
        "#,
    )
    .bind(from)
    .bind(into)
    .fetch_all(&mut *conn)
    .await?;

    let mut capped = 0;
    for row in &rows {
        let quantity = merged_quantity(row.existing, row.incoming, row.available, max_per_item);
        if quantity < row.existing.saturating_add(row.incoming) {
            capped += 1;
        }

        if quantity > 0 {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, strain_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (cart_id, strain_id)
                DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
                "#,
            )
            .bind(into)
            .bind(row.strain_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        } else {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND strain_id = $2")
                .bind(into)
                .bind(row.strain_id)
                .execute(&mut *conn)
                .await?;
        }
    }

    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(from)
        .execute(&mut *conn)
        .await?;
    touch_cart(conn, into).await?;

    tracing::info!(from = %from, into = %into, lines = rows.len(), capped, "Merged session cart into user cart");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user: Option<&str>, session: Option<&str>) -> CartIdentity {
        CartIdentity {
            user_id: user.map(String::from),
            session_id: session.map(String::from),
        }
    }

    fn cart(user: Option<&str>, session: Option<&str>) -> CartRef {
        CartRef {
            id: Uuid::new_v4(),
            user_id: user.map(String::from),
            session_id: session.map(String::from),
        }
    }

    #[test]
    fn anonymous_uses_anonymous_session_cart() {
        let session = cart(None, Some("sess_12345678"));
        let resolution = resolve_cart(&identity(None, Some("sess_12345678")), None, Some(&session));
        assert_eq!(resolution, CartResolution::Existing(session.id));
    }

    #[test]
    fn anonymous_cannot_see_owned_cart() {
        let owned = cart(Some("user_a"), Some("sess_12345678"));
        let resolution = resolve_cart(&identity(None, Some("sess_12345678")), None, Some(&owned));
        assert_eq!(resolution, CartResolution::Hidden);
    }

    #[test]
    fn user_claims_anonymous_session_cart() {
        let session = cart(None, Some("sess_12345678"));
        let resolution = resolve_cart(
            &identity(Some("user_a"), Some("sess_12345678")),
            None,
            Some(&session),
        );
        assert_eq!(resolution, CartResolution::Claim(session.id));
    }

    #[test]
    fn user_does_not_claim_other_users_cart() {
        let owned = cart(Some("user_b"), Some("sess_12345678"));
        let resolution = resolve_cart(
            &identity(Some("user_a"), Some("sess_12345678")),
            None,
            Some(&owned),
        );
        assert_eq!(resolution, CartResolution::CreateForUser);
    }

    #[test]
    fn user_cart_absorbs_anonymous_session_cart() {
        let mine = cart(Some("user_a"), None);
        let session = cart(None, Some("sess_12345678"));
        let resolution = resolve_cart(
            &identity(Some("user_a"), Some("sess_12345678")),
            Some(&mine),
            Some(&session),
        );
        assert_eq!(
            resolution,
            CartResolution::Merge {
                from: session.id,
                into: mine.id
            }
        );
    }

    #[test]
    fn user_cart_wins_without_session() {
        let mine = cart(Some("user_a"), None);
        let resolution = resolve_cart(&identity(Some("user_a"), None), Some(&mine), None);
        assert_eq!(resolution, CartResolution::Existing(mine.id));
    }

    #[test]
    fn anonymous_without_cart_creates_one() {
        let resolution = resolve_cart(&identity(None, Some("sess_12345678")), None, None);
        assert_eq!(resolution, CartResolution::CreateForSession);
    }

    fn item(quantity: i32, available: i32, price: i64) -> CartItemView {
        let unit_price = Decimal::new(price, 2);
        CartItemView {
            id: Uuid::new_v4(),
            strain_id: Uuid::new_v4(),
            slug: "blue-dream".to_string(),
            name: "Blue Dream".to_string(),
            strain_type: StrainType::Hybrid,
            image_url: None,
            unit: "3.5g".to_string(),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
            available,
        }
    }

    #[test]
    fn view_flags_lines_above_stock() {
        let cart_id = Uuid::new_v4();

        let fine = CartView::from_items(cart_id, vec![item(2, 5, 3500)], Decimal::ZERO);
        assert!(!fine.has_stock_issues);
        assert_eq!(fine.totals.subtotal, Decimal::new(7000, 2));

        let stale = CartView::from_items(
            cart_id,
            vec![item(2, 5, 3500), item(4, 3, 1250)],
            Decimal::ZERO,
        );
        assert!(stale.has_stock_issues);
        assert_eq!(stale.totals.item_count, 6);
    }

    #[test]
    fn missing_line_is_reported_before_stock() {
        let err = check_line_update(None, 50, 3).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = check_line_update(Some(1), 50, 3).unwrap_err();
        assert!(matches!(err, AppError::InsufficientInventory(_)));

        assert!(check_line_update(Some(1), 3, 3).is_ok());
    }
}
