//! Shopping cart models and totals

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A priced cart line used for totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub strain_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Computed cart totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CartTotals {
    pub item_count: i32,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Sum lines and apply `tax_rate` (a fraction, e.g. 0.15) to the subtotal.
    /// Tax is rounded half away from zero to cents.
    pub fn compute(lines: &[CartLine], tax_rate: Decimal) -> Self {
        let item_count = lines.iter().map(|l| l.quantity).sum();
        let subtotal: Decimal = lines.iter().map(CartLine::line_total).sum();
        let tax = round_money(subtotal * tax_rate);

        Self {
            item_count,
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Round a money amount to cents
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Quantity of a line after merging an anonymous cart into a user cart.
///
/// The sum is capped at what is currently available and at the per-line
/// limit, so a merge never produces a line that could not have been added
/// directly.
pub fn merged_quantity(existing: i32, incoming: i32, available: i32, max_per_item: i32) -> i32 {
    existing
        .saturating_add(incoming)
        .min(available)
        .min(max_per_item)
        .max(0)
}

/// Whether `requested` more units fit on top of `in_cart` given `available` stock
pub fn fits_in_stock(in_cart: i32, requested: i32, available: i32) -> bool {
    in_cart.saturating_add(requested) <= available
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(quantity: i32, price: &str) -> CartLine {
        CartLine {
            strain_id: Uuid::new_v4(),
            quantity,
            unit_price: dec(price),
        }
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        let totals = CartTotals::compute(&[], dec("0.15"));
        assert_eq!(totals, CartTotals::default());
    }

    #[test]
    fn totals_with_tax() {
        let lines = vec![line(2, "35.00"), line(1, "12.50")];
        let totals = CartTotals::compute(&lines, dec("0.15"));

        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.subtotal, dec("82.50"));
        // 82.50 * 0.15 = 12.375 -> 12.38
        assert_eq!(totals.tax, dec("12.38"));
        assert_eq!(totals.total, dec("94.88"));
    }

    #[test]
    fn merge_caps_at_available() {
        assert_eq!(merged_quantity(3, 4, 5, 10), 5);
        assert_eq!(merged_quantity(1, 2, 10, 10), 3);
        assert_eq!(merged_quantity(2, 2, 0, 10), 0);
        assert_eq!(merged_quantity(i32::MAX, 1, 7, 10), 7);
    }

    #[test]
    fn merge_caps_at_line_limit() {
        assert_eq!(merged_quantity(8, 8, 100, 10), 10);
        assert_eq!(merged_quantity(10, 1, 100, 10), 10);
        assert_eq!(merged_quantity(4, 5, 100, 10), 9);
    }

    #[test]
    fn fits_in_stock_is_inclusive() {
        assert!(fits_in_stock(3, 2, 5));
        assert!(!fits_in_stock(3, 3, 5));
        assert!(fits_in_stock(0, 0, 0));
    }
}
