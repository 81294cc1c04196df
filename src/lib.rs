//! Material Scraper - multi-supplier renovation material catalog crawler
//!
//! Raw listings pulled page by page from each supplier are normalized into
//! typed product records, deduplicated across pages, categories and
//! suppliers, and written as one versioned JSON dataset per run.

pub mod application;
pub mod crawling;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod normalize;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

pub use application::{RunReport, RunSettings, ScrapeRun, SourceWorker};
pub use error::{ConfigError, FetchError, PersistError, ScrapeError};
pub use infrastructure::{CliOverrides, ScraperConfig};

/// Crawl every configured supplier with the generic JSON-LD source and
/// persist the session. `config` must already be validated.
pub async fn run_pipeline(config: &ScraperConfig) -> Result<RunReport, ScrapeError> {
    let workers = application::build_workers(config, Arc::new(crawling::TokioClock))?;
    ScrapeRun::new(RunSettings::from_config(config), workers)
        .execute()
        .await
}
