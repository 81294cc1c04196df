//! Run report: per-source and per-category outcomes

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::crawling::{CategoryOutcome, CrawlPhase};
use crate::error::PersistError;
use crate::infrastructure::write_json_atomically;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub phase: CrawlPhase,
    pub pages_fetched: u32,
    pub fetch_attempts: u32,
    pub products: usize,
    pub lost_pages: Vec<u32>,
    pub error: Option<String>,
}

impl From<&CategoryOutcome> for CategoryReport {
    fn from(outcome: &CategoryOutcome) -> Self {
        Self {
            category: outcome.category.clone(),
            phase: outcome.state.phase(),
            pages_fetched: outcome.state.pages_fetched,
            fetch_attempts: outcome.state.fetch_attempts,
            products: outcome.records.len(),
            lost_pages: outcome.state.lost_pages.clone(),
            error: outcome.state.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub categories: Vec<CategoryReport>,
    /// Unique products after the worker's local dedup
    pub products: usize,
    /// Set when the worker itself died
    pub error: Option<String>,
}

impl SourceReport {
    pub fn crashed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            categories: Vec::new(),
            products: 0,
            error: Some(error.into()),
        }
    }

    /// No category produced anything and at least one failed, or the worker died
    pub fn failed_entirely(&self) -> bool {
        if self.error.is_some() {
            return true;
        }
        self.products == 0
            && !self.categories.is_empty()
            && self.categories.iter().all(|c| c.phase == CrawlPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub sources: Vec<SourceReport>,
    pub products_collected: usize,
    pub products_inserted: usize,
    pub products_replaced: usize,
    pub total_products: usize,
    pub persisted: bool,
}

impl RunReport {
    pub fn all_sources_failed(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(SourceReport::failed_entirely)
    }

    pub fn log_summary(&self) {
        for source in &self.sources {
            if let Some(error) = &source.error {
                warn!(source = %source.source, error = %error, "source worker crashed");
                continue;
            }
            for category in &source.categories {
                info!(
                    source = %source.source,
                    category = %category.category,
                    phase = %category.phase,
                    pages = category.pages_fetched,
                    attempts = category.fetch_attempts,
                    products = category.products,
                    lost_pages = ?category.lost_pages,
                    "category result"
                );
            }
        }
        info!(
            session_id = %self.session_id,
            duration_ms = self.duration_ms,
            sources = self.sources.len(),
            failed_sources = self.sources.iter().filter(|s| s.failed_entirely()).count(),
            collected = self.products_collected,
            inserted = self.products_inserted,
            replaced = self.products_replaced,
            total = self.total_products,
            persisted = self.persisted,
            "run finished"
        );
    }

    pub async fn write(&self, path: &Path) -> Result<(), PersistError> {
        write_json_atomically(path, self, false).await
    }
}
