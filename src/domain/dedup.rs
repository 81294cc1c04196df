//! Cross-batch duplicate elimination
//!
//! Records sharing a [`DedupKey`] collapse last-write-wins. The surviving
//! record keeps the output position of the first observation.

use indexmap::IndexMap;
use serde::Serialize;

use super::identity::DedupKey;
use super::product::NormalizedProduct;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub inserted: usize,
    pub replaced: usize,
}

impl IngestStats {
    pub fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Inserted => self.inserted += 1,
            IngestOutcome::Replaced => self.replaced += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupEngine {
    entries: IndexMap<DedupKey, NormalizedProduct>,
    extra_tracking: Vec<String>,
}

impl DedupEngine {
    pub fn new(extra_tracking: Vec<String>) -> Self {
        Self {
            entries: IndexMap::new(),
            extra_tracking,
        }
    }

    pub fn ingest(&mut self, product: NormalizedProduct) -> IngestOutcome {
        let key = DedupKey::for_product(&product, &self.extra_tracking);
        match self.entries.insert(key, product) {
            Some(_) => IngestOutcome::Replaced,
            None => IngestOutcome::Inserted,
        }
    }

    pub fn ingest_all<I>(&mut self, products: I) -> IngestStats
    where
        I: IntoIterator<Item = NormalizedProduct>,
    {
        let mut stats = IngestStats::default();
        for product in products {
            stats.record(self.ingest(product));
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn products(&self) -> impl Iterator<Item = &NormalizedProduct> {
        self.entries.values()
    }

    pub fn into_products(self) -> Vec<NormalizedProduct> {
        self.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Availability, Measurement, PriceInfo, UnitMeasurement};

    fn product(id: &str, url: &str, price: f64) -> NormalizedProduct {
        NormalizedProduct {
            product_id: id.into(),
            product_name: format!("Product {id}"),
            brand: "Unknown".into(),
            category: "Carrelage".into(),
            price: PriceInfo {
                discount_price: Some(price),
                original_price: Some(price),
                unit_measurement: UnitMeasurement::default(),
                currency: "EUR".into(),
            },
            measurement: Measurement::default(),
            unit_count: None,
            rating: None,
            rating_count: None,
            category_path: None,
            product_url: url.into(),
            image_url: vec![],
            description: None,
            availability: Availability::InStock,
        }
    }

    #[test]
    fn test_last_write_wins_keeps_first_position() {
        let mut engine = DedupEngine::default();
        engine.ingest(product("1", "https://www.castorama.fr/a?utm_source=x", 10.0));
        engine.ingest(product("2", "https://www.castorama.fr/b", 20.0));
        let outcome = engine.ingest(product("1", "https://WWW.castorama.fr/a", 9.5));

        assert_eq!(outcome, IngestOutcome::Replaced);
        let products = engine.into_products();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].product_id, "1");
        assert_eq!(products[0].price.discount_price, Some(9.5));
        assert_eq!(products[1].product_id, "2");
    }

    #[test]
    fn test_sentinel_urls_fall_back_to_id() {
        let mut engine = DedupEngine::default();
        let stats = engine.ingest_all(vec![
            product("fp-1", "N/A", 1.0),
            product("fp-2", "N/A", 2.0),
            product("fp-1", "N/A", 3.0),
        ]);
        assert_eq!(stats, IngestStats { inserted: 2, replaced: 1 });
        assert_eq!(engine.len(), 2);
    }
}
