//! Builds one worker per configured supplier

use std::sync::Arc;
use tracing::debug;

use super::scrape_run::SourceWorker;
use crate::crawling::Clock;
use crate::error::ConfigError;
use crate::infrastructure::{HttpClient, HttpClientConfig, JsonLdSource, ScraperConfig};

pub fn build_workers(config: &ScraperConfig, clock: Arc<dyn Clock>) -> Result<Vec<SourceWorker>, ConfigError> {
    let seed = config.scraping.jitter_seed.unwrap_or_else(|| fastrand::u64(..));
    let http_config = HttpClientConfig {
        timeout: config.crawl_limits().request_timeout,
        ..HttpClientConfig::default()
    };

    config
        .selected_suppliers()
        .into_iter()
        .map(|name| {
            let source_config = config
                .source(&name)
                .ok_or_else(|| ConfigError::UnknownSupplier(name.clone()))?;
            let http = HttpClient::new(&name, &http_config)?;
            let source = JsonLdSource::new(name.clone(), source_config.clone(), http);
            debug!(source = %name, "source worker configured");
            Ok(SourceWorker::from_config(
                Arc::new(source),
                source_config,
                config,
                clock.clone(),
                seed,
            ))
        })
        .collect()
}
