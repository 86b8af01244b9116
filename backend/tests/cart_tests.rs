//! Cart tests
//!
//! Tests for cart identity resolution and cart arithmetic:
//! - a session cart owned by a user is never handed to another identity
//! - merging never produces a line larger than the stock on hand
//! - totals are additive and tax is rounded to cents

use greenleaf_backend::middleware::CartIdentity;
use greenleaf_backend::services::cart::{resolve_cart, CartRef, CartResolution};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{fits_in_stock, merged_quantity, CartLine, CartTotals};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

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

/// The cart id a resolution hands to the caller, if any
fn exposed_cart(resolution: CartResolution) -> Option<Uuid> {
    match resolution {
        CartResolution::Existing(id) | CartResolution::Claim(id) => Some(id),
        CartResolution::Merge { into, .. } => Some(into),
        CartResolution::CreateForUser
        | CartResolution::CreateForSession
        | CartResolution::Hidden => None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_user_keeps_own_cart_when_session_cart_is_owned() {
        let mine = cart(Some("user_a"), None);
        let theirs = cart(Some("user_b"), Some("sess_shared_01"));

        let resolution = resolve_cart(
            &identity(Some("user_a"), Some("sess_shared_01")),
            Some(&mine),
            Some(&theirs),
        );

        assert_eq!(resolution, CartResolution::Existing(mine.id));
    }

    #[test]
    fn test_anonymous_read_of_owned_cart_is_hidden() {
        let owned = cart(Some("user_b"), Some("sess_shared_01"));
        let resolution = resolve_cart(&identity(None, Some("sess_shared_01")), None, Some(&owned));
        assert_eq!(resolution, CartResolution::Hidden);
        assert_eq!(exposed_cart(resolution), None);
    }

    #[test]
    fn test_same_cart_found_twice_is_not_merged() {
        let mine = cart(Some("user_a"), Some("sess_mine_001"));
        let resolution = resolve_cart(
            &identity(Some("user_a"), Some("sess_mine_001")),
            Some(&mine),
            Some(&mine),
        );
        assert_eq!(resolution, CartResolution::Existing(mine.id));
    }

    #[test]
    fn test_totals_with_tax() {
        let lines = vec![
            CartLine {
                strain_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: dec("45.00"),
            },
            CartLine {
                strain_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec("32.50"),
            },
        ];

        let totals = CartTotals::compute(&lines, dec("0.0825"));

        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.subtotal, dec("122.50"));
        // 122.50 * 0.0825 = 10.10625
        assert_eq!(totals.tax, dec("10.11"));
        assert_eq!(totals.total, dec("132.61"));
    }

    #[test]
    fn test_empty_cart_totals() {
        let totals = CartTotals::compute(&[], dec("0.1"));
        assert_eq!(totals, CartTotals::default());
    }

    #[test]
    fn test_merge_caps_at_stock() {
        assert_eq!(merged_quantity(2, 3, 10, 10), 5);
        assert_eq!(merged_quantity(4, 4, 6, 10), 6);
        assert_eq!(merged_quantity(1, 1, 0, 10), 0);
    }

    #[test]
    fn test_merge_caps_at_line_limit() {
        // 8 + 8 with plenty of stock still respects the per-line limit
        assert_eq!(merged_quantity(8, 8, 100, 10), 10);
        assert_eq!(merged_quantity(0, 12, 100, 10), 10);
    }

    #[test]
    fn test_add_guard() {
        assert!(fits_in_stock(0, 5, 5));
        assert!(!fits_in_stock(3, 3, 5));
        assert!(!fits_in_stock(i32::MAX, 1, i32::MAX - 1));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for an optional owner drawn from a small user pool
    fn owner_strategy() -> impl Strategy<Value = Option<&'static str>> {
        prop_oneof![
            Just(None),
            Just(Some("user_a")),
            Just(Some("user_b")),
            Just(Some("user_c")),
        ]
    }

    /// Strategy for cart unit prices
    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=50000i64).prop_map(|n| Decimal::new(n, 2)) // 0.01 to 500.00
    }

    fn line_strategy() -> impl Strategy<Value = CartLine> {
        (1i32..=10, price_strategy()).prop_map(|(quantity, unit_price)| CartLine {
            strain_id: Uuid::new_v4(),
            quantity,
            unit_price,
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Resolution never exposes a cart owned by someone other than the caller
        #[test]
        fn prop_never_exposes_foreign_cart(
            caller in owner_strategy(),
            has_session in any::<bool>(),
            user_cart_exists in any::<bool>(),
            session_owner in owner_strategy(),
            session_cart_exists in any::<bool>(),
        ) {
            let session = if has_session || caller.is_none() { Some("sess_prop_0001") } else { None };
            let who = identity(caller, session);

            let user_cart = match caller {
                Some(user) if user_cart_exists => Some(cart(Some(user), None)),
                _ => None,
            };
            let session_cart = match session {
                Some(sid) if session_cart_exists => Some(cart(session_owner, Some(sid))),
                _ => None,
            };

            let resolution = resolve_cart(&who, user_cart.as_ref(), session_cart.as_ref());

            if let Some(id) = exposed_cart(resolution) {
                let chosen = [user_cart.as_ref(), session_cart.as_ref()]
                    .into_iter()
                    .flatten()
                    .find(|c| c.id == id)
                    .expect("resolution must pick one of the found carts");
                let owner = chosen.user_id.as_deref();
                prop_assert!(owner.is_none() || owner == caller);
            }

            if let CartResolution::Merge { from, .. } = resolution {
                let source = session_cart.as_ref().expect("merge needs a session cart");
                prop_assert_eq!(source.id, from);
                prop_assert!(source.user_id.is_none());
            }
        }

        /// A merged line never exceeds stock and never goes negative
        #[test]
        fn prop_merged_quantity_bounded(
            existing in 0i32..=50,
            incoming in 0i32..=50,
            available in 0i32..=60,
            max_per_item in 1i32..=20,
        ) {
            let merged = merged_quantity(existing, incoming, available, max_per_item);
            prop_assert!(merged <= available);
            prop_assert!(merged <= max_per_item);
            prop_assert!(merged >= 0);
            prop_assert!(merged <= existing + incoming);
        }

        /// Subtotal of a cart equals the sum of the subtotals of any split
        #[test]
        fn prop_totals_additive(
            lines in prop::collection::vec(line_strategy(), 0..12),
            split in 0usize..12,
        ) {
            let split = split.min(lines.len());
            let (left, right) = lines.split_at(split);

            let whole = CartTotals::compute(&lines, Decimal::ZERO);
            let a = CartTotals::compute(left, Decimal::ZERO);
            let b = CartTotals::compute(right, Decimal::ZERO);

            prop_assert_eq!(whole.subtotal, a.subtotal + b.subtotal);
            prop_assert_eq!(whole.item_count, a.item_count + b.item_count);
        }

        /// Tax is in cents and within half a cent of the exact amount
        #[test]
        fn prop_tax_rounded_to_cents(
            lines in prop::collection::vec(line_strategy(), 1..8),
            rate_bp in 0i64..=2500,
        ) {
            let rate = Decimal::new(rate_bp, 4);
            let totals = CartTotals::compute(&lines, rate);
            let exact = totals.subtotal * rate;

            prop_assert!(totals.tax.scale() <= 2);
            prop_assert!((totals.tax - exact).abs() <= dec("0.005"));
            prop_assert_eq!(totals.total, totals.subtotal + totals.tax);
        }
    }
}
