//! Validation utilities for the GreenLeaf storefront

use rust_decimal::Decimal;

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate a URL slug: lowercase ascii letters, digits and single dashes
pub fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.is_empty() || slug.len() > 120 {
        return Err("Slug must be between 1 and 120 characters");
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Slug may only contain lowercase letters, digits and dashes");
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err("Slug cannot start or end with a dash or contain consecutive dashes");
    }
    Ok(())
}

/// Derive a slug from a display name ("Blue Dream #2" -> "blue-dream-2")
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Validate a cannabinoid percentage (0-100)
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a price: non-negative with at most two decimal places
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    if price.normalize().scale() > 2 {
        return Err("Price cannot have more than two decimal places");
    }
    Ok(())
}

// ============================================================================
// Cart Validations
// ============================================================================

/// Validate a quantity requested for a single cart line
pub fn validate_cart_quantity(quantity: i32, max_per_item: i32) -> Result<(), &'static str> {
    if quantity < 1 {
        return Err("Quantity must be at least 1");
    }
    if quantity > max_per_item {
        return Err("Quantity exceeds the per-item limit");
    }
    Ok(())
}

/// Validate a session identifier supplied by an anonymous client
pub fn validate_session_id(session_id: &str) -> Result<(), &'static str> {
    if session_id.len() < 8 || session_id.len() > 128 {
        return Err("Session id must be between 8 and 128 characters");
    }
    if !session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Session id contains invalid characters");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && email.len() >= 5 => {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn test_valid_slugs() {
        assert!(validate_slug("blue-dream").is_ok());
        assert!(validate_slug("og-kush-2").is_ok());
    }

    #[test]
    fn test_invalid_slugs() {
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Blue-Dream").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("double--dash").is_err());
        assert!(validate_slug("space here").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blue Dream"), "blue-dream");
        assert_eq!(slugify("  Girl Scout Cookies #4 "), "girl-scout-cookies-4");
        assert_eq!(slugify("AK-47"), "ak-47");
    }

    #[test]
    fn test_price_scale() {
        assert!(validate_price(Decimal::from_str("35.00").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("35.5").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("35.555").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("-1").unwrap()).is_err());
    }

    #[test]
    fn test_cart_quantity() {
        assert!(validate_cart_quantity(1, 10).is_ok());
        assert!(validate_cart_quantity(10, 10).is_ok());
        assert!(validate_cart_quantity(0, 10).is_err());
        assert!(validate_cart_quantity(11, 10).is_err());
    }

    #[test]
    fn test_session_id() {
        assert!(validate_session_id("sess_4f9c2a1b").is_ok());
        assert!(validate_session_id("short").is_err());
        assert!(validate_session_id("has spaces in it").is_err());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("buyer@greenleaf.com").is_ok());
        assert!(validate_email("@greenleaf.com").is_err());
        assert!(validate_email("buyer.greenleaf.com").is_err());
    }

    proptest! {
        /// Every slugified name is either empty or a valid slug
        #[test]
        fn prop_slugify_produces_valid_slugs(name in "[A-Za-z0-9 #&'-]{1,60}") {
            let slug = slugify(&name);
            prop_assume!(!slug.is_empty());
            prop_assert!(validate_slug(&slug).is_ok(), "{} -> {}", name, slug);
        }
    }
}
