//! WebAssembly module for the GreenLeaf storefront
//!
//! Provides client-side computation for:
//! - Cart totals preview before the server round trip
//! - Potency and stock labels on product cards
//! - Quantity checks for the add-to-cart button
//! - Session id and slug helpers

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("greenleaf-wasm loaded"));
}

fn parse_decimal(value: &str, what: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

/// Compute cart totals from `[{strain_id, quantity, unit_price}]`; returns JSON
#[wasm_bindgen]
pub fn calculate_cart_totals(lines_json: &str, tax_rate: &str) -> Result<String, JsValue> {
    let lines: Vec<CartLine> = serde_json::from_str(lines_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid cart JSON: {}", e)))?;
    let rate = parse_decimal(tax_rate, "tax rate")?;

    let totals = CartTotals::compute(&lines, rate);
    serde_json::to_string(&totals).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Potency label for a THC percentage
#[wasm_bindgen]
pub fn classify_strain_potency(thc_percentage: f64) -> String {
    let thc = Decimal::try_from(thc_percentage).unwrap_or(Decimal::ZERO);
    classify_potency(thc).to_string()
}

/// Stock badge text for a product card
#[wasm_bindgen]
pub fn stock_label(quantity: i32, low_stock_threshold: i32) -> String {
    match StockStatus::from_quantity(quantity, low_stock_threshold) {
        StockStatus::InStock => "In stock".to_string(),
        StockStatus::LowStock => format!("Only {} left", quantity),
        StockStatus::OutOfStock => "Out of stock".to_string(),
    }
}

/// Whether the add-to-cart button should be enabled
#[wasm_bindgen]
pub fn can_add_to_cart(in_cart: i32, requested: i32, available: i32, max_per_item: i32) -> bool {
    requested > 0
        && fits_in_stock(in_cart, requested, available)
        && validate_cart_quantity(in_cart.saturating_add(requested), max_per_item).is_ok()
}

/// Format a money amount for display
#[wasm_bindgen]
pub fn format_price(amount: &str, currency: &str) -> Result<String, JsValue> {
    let amount = round_money(parse_decimal(amount, "amount")?);
    let amount = format!("{:.2}", amount);
    Ok(match currency.to_ascii_lowercase().as_str() {
        "usd" => format!("${}", amount),
        other => format!("{} {}", amount, other.to_ascii_uppercase()),
    })
}

/// Check a browser session id before sending it as a header
#[wasm_bindgen]
pub fn is_valid_session_id(session_id: &str) -> bool {
    validate_session_id(session_id).is_ok()
}

/// Suggest a URL slug for a strain name
#[wasm_bindgen]
pub fn suggest_slug(name: &str) -> String {
    slugify(name)
}

/// Allowed next statuses for an order, for the admin status menu
#[wasm_bindgen]
pub fn next_order_statuses(current: &str) -> js_sys::Array {
    let next = js_sys::Array::new();
    if let Some(status) = OrderStatus::parse(current) {
        for candidate in OrderStatus::ALL {
            if status.can_transition_to(candidate) {
                next.push(&JsValue::from_str(candidate.as_str()));
            }
        }
    }
    next
}
