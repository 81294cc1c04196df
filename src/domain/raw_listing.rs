use serde::{Deserialize, Serialize};

/// Loosely-typed field bag produced by an extraction collaborator for one
/// product on one listing page. Every text field is taken verbatim from the
/// source; interpretation happens in `normalize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListingRecord {
    /// Source-native identifier (SKU, article number)
    pub native_id: Option<String>,
    pub name: Option<String>,
    pub price_text: Option<String>,
    pub original_price_text: Option<String>,
    pub unit_price_text: Option<String>,
    /// Currency code reported next to the price, e.g. JSON-LD `priceCurrency`
    pub currency_hint: Option<String>,
    /// Combined size text such as `30x60 cm`
    pub dimension_text: Option<String>,
    pub length_text: Option<String>,
    pub width_text: Option<String>,
    pub brand_text: Option<String>,
    pub stock_text: Option<String>,
    pub product_url: Option<String>,
    pub category_path: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub rating: Option<String>,
    pub rating_count: Option<String>,
    pub unit_count: Option<String>,
    pub description: Option<String>,
}

impl RawListingRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.product_url = Some(url.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price_text = Some(price.into());
        self
    }
}
