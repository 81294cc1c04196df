//! Field normalizers
//!
//! Every function here is pure and total: malformed input turns into a
//! default field value, never an error. Each normalized value has a canonical
//! text form that normalizes back to itself.

pub mod availability;
pub mod brand;
pub mod measurement;
pub mod price;
pub mod url;

pub use availability::classify_availability;
pub use brand::normalize_brand;
pub use measurement::{parse_dimensions, parse_parts};
pub use price::{ParsedPrice, UnitPrice, parse_price};
pub use self::url::{UrlPolicy, normalize_images};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::{
    CanonicalUrl, Measurement, NormalizedProduct, PriceInfo, RawListingRecord, URL_SENTINEL,
    UnitMeasurement, assign_product_id,
};

/// `normalization` section of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationSettings {
    pub default_currency: String,
    pub measurement_unit: String,
    pub brand_noise_words: Vec<String>,
    pub out_of_stock_phrases: Vec<String>,
    /// Query parameters stripped on top of the built-in tracking list
    pub tracking_params: Vec<String>,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            default_currency: "EUR".to_string(),
            measurement_unit: "cm".to_string(),
            brand_noise_words: vec!["marque".to_string(), "brand".to_string()],
            out_of_stock_phrases: [
                "rupture",
                "indisponible",
                "épuisé",
                "out of stock",
                "sold out",
                "non disponible",
                "plus disponible",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            tracking_params: Vec::new(),
        }
    }
}

/// Turns raw listing records of one source into canonical products
#[derive(Debug, Clone)]
pub struct ProductNormalizer {
    settings: NormalizationSettings,
    urls: UrlPolicy,
}

impl ProductNormalizer {
    pub fn new(settings: NormalizationSettings, urls: UrlPolicy) -> Self {
        Self { settings, urls }
    }

    pub fn settings(&self) -> &NormalizationSettings {
        &self.settings
    }

    pub fn normalize(&self, raw: &RawListingRecord, category: &str) -> NormalizedProduct {
        let settings = &self.settings;
        let product_name = collapse(raw.name.as_deref()).unwrap_or_default();
        let product_url = self.urls.normalize(raw.product_url.as_deref());

        let price = self.normalize_price(raw);
        let measurement = self.normalize_measurement(raw);

        let canonical = if product_url == URL_SENTINEL {
            None
        } else {
            CanonicalUrl::parse(&product_url, &settings.tracking_params)
        };
        let product_id = assign_product_id(raw.native_id.as_deref(), canonical.as_ref(), &product_name);

        let product = NormalizedProduct {
            product_id,
            product_name,
            brand: normalize_brand(raw.brand_text.as_deref(), &settings.brand_noise_words),
            category: category.to_string(),
            price,
            measurement,
            unit_count: digits(raw.unit_count.as_deref()),
            rating: parse_rating(raw.rating.as_deref()),
            rating_count: digits(raw.rating_count.as_deref()).and_then(|d| d.parse().ok()),
            category_path: collapse(raw.category_path.as_deref()),
            product_url,
            image_url: normalize_images(&raw.image_urls),
            description: collapse(raw.description.as_deref()),
            availability: classify_availability(
                raw.stock_text.as_deref(),
                &settings.out_of_stock_phrases,
            ),
        };
        trace!(product_id = %product.product_id, category, "normalized listing");
        product
    }

    fn normalize_price(&self, raw: &RawListingRecord) -> PriceInfo {
        let settings = &self.settings;
        let hint = raw.currency_hint.as_deref();
        let main = raw
            .price_text
            .as_deref()
            .map(|t| parse_price(t, hint, &settings.default_currency));
        let original = raw
            .original_price_text
            .as_deref()
            .map(|t| parse_price(t, hint, &settings.default_currency));
        let unit_text = raw
            .unit_price_text
            .as_deref()
            .map(|t| parse_price(t, hint, &settings.default_currency));

        let currency = [&main, &original, &unit_text]
            .into_iter()
            .flatten()
            .find(|p| p.amount.is_some() || p.unit_price.is_some())
            .map(|p| p.currency.clone())
            .unwrap_or_else(|| {
                hint.and_then(|h| {
                    let h = h.trim();
                    (h.len() == 3 && h.chars().all(|c| c.is_ascii_alphabetic()))
                        .then(|| h.to_ascii_uppercase())
                })
                .unwrap_or_else(|| settings.default_currency.clone())
            });

        let mut discount_price = main.as_ref().and_then(|p| p.amount);
        let mut original_price = original.as_ref().and_then(|p| p.amount);
        match (discount_price, original_price) {
            (Some(d), Some(o)) if d > o => {
                discount_price = Some(o);
                original_price = Some(d);
            }
            (None, Some(o)) => discount_price = Some(o),
            _ => {}
        }

        let unit_price = unit_text
            .as_ref()
            .and_then(|p| p.unit_price.clone())
            .or_else(|| main.as_ref().and_then(|p| p.unit_price.clone()))
            .or_else(|| original.as_ref().and_then(|p| p.unit_price.clone()));

        PriceInfo {
            discount_price,
            original_price,
            unit_measurement: unit_price
                .map(|u| UnitMeasurement {
                    price: Some(u.amount),
                    unit: Some(u.unit),
                })
                .unwrap_or_default(),
            currency,
        }
    }

    fn normalize_measurement(&self, raw: &RawListingRecord) -> Measurement {
        let unit = &self.settings.measurement_unit;
        let combined = raw
            .dimension_text
            .as_deref()
            .map(|t| parse_dimensions(t, unit))
            .filter(|m| !m.is_empty());
        match combined {
            Some(m) => m,
            None => match (raw.length_text.as_deref(), raw.width_text.as_deref()) {
                (Some(l), Some(w)) => parse_parts(l, w, unit),
                _ => Measurement::default(),
            },
        }
    }
}

fn collapse(text: Option<&str>) -> Option<String> {
    let joined = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Digits of a count text such as `(1 234 avis)` or `Lot de 4`. Groups
/// separated only by spaces belong to the same number.
fn digits(text: Option<&str>) -> Option<String> {
    let text = text?;
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let mut digits = String::new();
    let mut pending_gap = false;
    for c in text[start..].chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            pending_gap = false;
        } else if matches!(c, ' ' | '\u{a0}' | '\u{202f}') && !pending_gap {
            pending_gap = true;
        } else {
            break;
        }
    }
    Some(digits)
}

fn parse_rating(text: Option<&str>) -> Option<f64> {
    let text = text?.trim();
    let first = text.split(['/', ' ']).find(|p| !p.is_empty())?;
    let value: f64 = first.replace(',', ".").parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
