//! Scrape session envelope
//!
//! One session covers one complete run. `session_id` and `scraped_at` are
//! fixed when the session starts; only `total_products` and `last_updated`
//! move afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::NormalizedProduct;

/// Schema version of the output file
pub const FILE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub scraper: String,
    pub session_id: String,
    pub scraped_at: DateTime<Utc>,
    pub total_products: usize,
    pub file_version: String,
    pub last_updated: DateTime<Utc>,
}

impl ScrapeSession {
    pub fn start(scraper: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            scraper: scraper.into(),
            session_id: session_id_for(started_at),
            scraped_at: started_at,
            total_products: 0,
            file_version: FILE_VERSION.to_string(),
            last_updated: started_at,
        }
    }

    /// Recompute the mutable fields at write time
    pub fn touch(&mut self, total_products: usize, now: DateTime<Utc>) {
        self.total_products = total_products;
        self.last_updated = now;
    }
}

/// Timestamp-derived session identifier, e.g. `20261014_093000`
pub fn session_id_for(started_at: DateTime<Utc>) -> String {
    started_at.format("%Y%m%d_%H%M%S").to_string()
}

/// On-disk layout: one `metadata` object plus the `products` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub metadata: ScrapeSession,
    pub products: Vec<NormalizedProduct>,
}
