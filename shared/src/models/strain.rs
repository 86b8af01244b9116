//! Strain catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::UnknownVariant;

/// Botanical classification of a strain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrainType {
    Indica,
    Sativa,
    Hybrid,
}

impl StrainType {
    pub const ALL: [StrainType; 3] = [StrainType::Indica, StrainType::Sativa, StrainType::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrainType::Indica => "indica",
            StrainType::Sativa => "sativa",
            StrainType::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "indica" => Some(StrainType::Indica),
            "sativa" => Some(StrainType::Sativa),
            "hybrid" => Some(StrainType::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrainType::Indica => write!(f, "Indica"),
            StrainType::Sativa => write!(f, "Sativa"),
            StrainType::Hybrid => write!(f, "Hybrid"),
        }
    }
}

impl TryFrom<String> for StrainType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| UnknownVariant::new("strain type", value))
    }
}

/// Potency band shown on product cards
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Potency {
    Mild,
    Moderate,
    Strong,
    VeryStrong,
}

impl std::fmt::Display for Potency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Potency::Mild => write!(f, "Mild"),
            Potency::Moderate => write!(f, "Moderate"),
            Potency::Strong => write!(f, "Strong"),
            Potency::VeryStrong => write!(f, "Very Strong"),
        }
    }
}

/// Classify a strain by THC percentage
pub fn classify_potency(thc_percentage: Decimal) -> Potency {
    if thc_percentage < Decimal::from(10) {
        Potency::Mild
    } else if thc_percentage < Decimal::from(18) {
        Potency::Moderate
    } else if thc_percentage < Decimal::from(25) {
        Potency::Strong
    } else {
        Potency::VeryStrong
    }
}

/// Stock availability derived from inventory quantity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// A quantity at or below `low_stock_threshold` (but above zero) is low stock
    pub fn from_quantity(quantity: i32, low_stock_threshold: i32) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity <= low_stock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, StockStatus::OutOfStock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strain_type_round_trips_through_str() {
        for t in StrainType::ALL {
            assert_eq!(StrainType::parse(t.as_str()), Some(t));
        }
        assert_eq!(StrainType::parse("ruderalis"), None);
    }

    #[test]
    fn strain_type_try_from_reports_value() {
        let err = StrainType::try_from("Indica".to_string()).unwrap_err();
        assert!(err.to_string().contains("Indica"));
    }

    #[test]
    fn potency_band_boundaries() {
        assert_eq!(classify_potency(Decimal::new(999, 2)), Potency::Mild);
        assert_eq!(classify_potency(Decimal::from(10)), Potency::Moderate);
        assert_eq!(classify_potency(Decimal::new(1799, 2)), Potency::Moderate);
        assert_eq!(classify_potency(Decimal::from(18)), Potency::Strong);
        assert_eq!(classify_potency(Decimal::from(25)), Potency::VeryStrong);
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::from_quantity(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_quantity(-1, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_quantity(5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::from_quantity(6, 5), StockStatus::InStock);
        assert!(!StockStatus::OutOfStock.is_available());
    }
}
