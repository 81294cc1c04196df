#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use material_scraper::crawling::{Clock, ListingSource};
use material_scraper::infrastructure::{ScraperConfig, SourceConfig};
use material_scraper::test_utils::ScriptedSource;
use material_scraper::{RunSettings, ScrapeRun, SourceWorker};

/// Valid config for the given suppliers, writing to `output`, with no pacing
/// delay and millisecond backoff.
pub fn config_for(suppliers: &[&str], categories: &[&str], output: &Path) -> ScraperConfig {
    let mut config = ScraperConfig {
        suppliers: suppliers.iter().map(|s| s.to_string()).collect(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        ..ScraperConfig::default()
    };
    config.output.file = output.to_path_buf();
    config.scraping.delay_between_requests = 0.0;
    config.scraping.backoff_base_ms = 1;
    config.scraping.backoff_max_ms = 5;
    config.scraping.jitter_seed = Some(7);
    for supplier in suppliers {
        config.sources.insert(
            supplier.to_string(),
            SourceConfig {
                base_url: Some(format!("https://www.{supplier}.fr")),
                allowed_domains: vec![format!("{supplier}.fr"), "shared-catalog.fr".to_string()],
                search_url: Some(format!("https://www.{supplier}.fr/search?q={{category}}&page={{page}}")),
                ..SourceConfig::default()
            },
        );
    }
    config
}

pub fn worker(source: Arc<ScriptedSource>, config: &ScraperConfig, clock: Arc<dyn Clock>) -> SourceWorker {
    let source_config = config.source(source.name()).cloned().unwrap_or_default();
    SourceWorker::from_config(source, &source_config, config, clock, 7)
}

pub fn run(config: &ScraperConfig, workers: Vec<SourceWorker>) -> ScrapeRun {
    config.validate().unwrap();
    ScrapeRun::new(RunSettings::from_config(config), workers)
}
