use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored in `product_url` when the listing URL failed validation.
pub const URL_SENTINEL: &str = "N/A";

/// Brand used when a listing carries no usable brand text.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// Canonical product record as written to the output dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub category: String,
    pub price: PriceInfo,
    pub measurement: Measurement,
    pub unit_count: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u32>,
    pub category_path: Option<String>,
    pub product_url: String,
    #[serde(default)]
    pub image_url: Vec<String>,
    pub description: Option<String>,
    pub availability: Availability,
}

impl NormalizedProduct {
    /// True when `product_url` holds a validated URL rather than the sentinel
    pub fn has_valid_url(&self) -> bool {
        self.product_url != URL_SENTINEL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub discount_price: Option<f64>,
    pub original_price: Option<f64>,
    pub unit_measurement: UnitMeasurement,
    pub currency: String,
}

/// Per-unit price such as `54,00 €/m²`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitMeasurement {
    pub price: Option<f64>,
    pub unit: Option<String>,
}

/// Two-dimensional size. Values are decimal strings (`"20.0"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub length: Option<String>,
    pub width: Option<String>,
    pub unit: Option<String>,
}

impl Measurement {
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.width.is_none()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.length, &self.width) {
            (Some(length), Some(width)) => {
                write!(f, "{length}x{width}")?;
                if let Some(unit) = &self.unit {
                    write!(f, " {unit}")?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
