//! Run coordinator
//!
//! One tokio task per source. Each task crawls its categories (at most
//! `category_concurrency` at a time), normalizes and dedupes locally, and
//! hands back a single batch. Batches are merged into the aggregator in
//! source order and the output file is written once, after every task has
//! joined.

use chrono::Utc;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::report::{CategoryReport, RunReport, SourceReport};
use super::session_aggregator::SessionAggregator;
use crate::crawling::{
    CategoryCrawler, CategoryOutcome, Clock, HeaderRotation, ListingSource, RequestPacer, SourceContext,
};
use crate::domain::{DedupEngine, NormalizedProduct};
use crate::error::ScrapeError;
use crate::infrastructure::{OutputStore, ScraperConfig, SourceConfig};
use crate::normalize::{ProductNormalizer, UrlPolicy};

/// A source plus everything needed to crawl and normalize it
pub struct SourceWorker {
    pub context: Arc<SourceContext>,
    pub normalizer: ProductNormalizer,
}

impl SourceWorker {
    pub fn new(context: SourceContext, normalizer: ProductNormalizer) -> Self {
        Self {
            context: Arc::new(context),
            normalizer,
        }
    }

    /// Wire a source with the run's pacing, retry and normalization settings
    pub fn from_config(
        source: Arc<dyn ListingSource>,
        source_config: &SourceConfig,
        config: &ScraperConfig,
        clock: Arc<dyn Clock>,
        jitter_seed: u64,
    ) -> Self {
        let scraping = &config.scraping;
        let context = SourceContext {
            source,
            pacer: Arc::new(RequestPacer::new(config.request_delay(), clock.clone())),
            headers: Arc::new(HeaderRotation::new(&scraping.user_agents, &scraping.accept_languages)),
            retry: config.retry_policy(),
            limits: config.crawl_limits(),
            clock,
            jitter_seed,
        };
        let urls = UrlPolicy::new(
            source_config.parsed_base_url(),
            source_config.allowed_domains.clone(),
            source_config.require_https,
        );
        Self::new(context, ProductNormalizer::new(config.normalization.clone(), urls))
    }

    pub fn name(&self) -> &str {
        self.context.source_name()
    }
}

/// Run-level settings taken from the configuration
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub categories: Vec<String>,
    pub category_concurrency: usize,
    pub extra_tracking: Vec<String>,
    pub output: OutputStore,
    pub merge_previous: bool,
    pub report_file: Option<PathBuf>,
}

impl RunSettings {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            categories: config.selected_categories(),
            category_concurrency: config.scraping.category_concurrency.max(1),
            extra_tracking: config.normalization.tracking_params.clone(),
            output: OutputStore::new(config.output.file.clone(), config.output.backup_previous),
            merge_previous: config.output.merge_previous,
            report_file: config.output.report_file.clone(),
        }
    }
}

struct SourceBatch {
    report: SourceReport,
    products: Vec<NormalizedProduct>,
    collected: usize,
}

pub struct ScrapeRun {
    settings: RunSettings,
    workers: Vec<SourceWorker>,
}

impl ScrapeRun {
    pub fn new(settings: RunSettings, workers: Vec<SourceWorker>) -> Self {
        Self { settings, workers }
    }

    pub async fn execute(self) -> Result<RunReport, ScrapeError> {
        let started_at = Utc::now();
        let scraper = self
            .workers
            .iter()
            .map(SourceWorker::name)
            .collect::<Vec<_>>()
            .join(",");
        let aggregator = SessionAggregator::start(scraper, started_at, self.settings.extra_tracking.clone());
        let session_id = aggregator.session().await.session_id;

        if self.settings.merge_previous {
            self.seed_from_previous(&aggregator).await;
        }

        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            let name = worker.name().to_string();
            let categories = self.settings.categories.clone();
            let concurrency = self.settings.category_concurrency;
            let extra_tracking = self.settings.extra_tracking.clone();
            let handle = tokio::spawn(async move {
                run_source(worker, categories, concurrency, extra_tracking).await
            });
            handles.push((name, handle));
        }

        let mut sources = Vec::with_capacity(handles.len());
        let mut collected = 0;
        for (name, handle) in handles {
            match handle.await {
                Ok(batch) => {
                    collected += batch.collected;
                    aggregator.merge(batch.products).await;
                    sources.push(batch.report);
                }
                Err(e) => {
                    error!(source = %name, error = %e, "source worker crashed");
                    sources.push(SourceReport::crashed(name, e.to_string()));
                }
            }
        }

        let stats = aggregator.stats().await;
        let mut report = RunReport {
            session_id,
            started_at,
            finished_at: started_at,
            duration_ms: 0,
            sources,
            products_collected: collected,
            products_inserted: stats.inserted,
            products_replaced: stats.replaced,
            total_products: aggregator.len().await,
            persisted: false,
        };

        if report.all_sources_failed() {
            warn!("every source failed, previous output left untouched");
        } else {
            match aggregator.persist(&self.settings.output, Utc::now()).await {
                Ok(document) => {
                    report.total_products = document.metadata.total_products;
                    report.persisted = true;
                }
                Err(e) => {
                    error!(path = %self.settings.output.path().display(), error = %e, "failed to persist output");
                    finish(&mut report);
                    report.log_summary();
                    return Err(e.into());
                }
            }
        }

        finish(&mut report);
        report.log_summary();
        if let Some(path) = &self.settings.report_file {
            if let Err(e) = report.write(path).await {
                warn!(path = %path.display(), error = %e, "failed to write run report");
            }
        }
        Ok(report)
    }

    async fn seed_from_previous(&self, aggregator: &SessionAggregator) {
        match self.settings.output.load().await {
            Ok(Some(previous)) => {
                let seeded = aggregator.seed(previous.products).await;
                info!(
                    previous_session = %previous.metadata.session_id,
                    seeded,
                    "seeded from previous output"
                );
            }
            Ok(None) => info!("no previous output to merge"),
            Err(e) => warn!(error = %e, "previous output unreadable, starting empty"),
        }
    }
}

fn finish(report: &mut RunReport) {
    report.finished_at = Utc::now();
    report.duration_ms = (report.finished_at - report.started_at).num_milliseconds();
}

#[instrument(skip_all, fields(source = %worker.name()))]
async fn run_source(
    worker: SourceWorker,
    categories: Vec<String>,
    concurrency: usize,
    extra_tracking: Vec<String>,
) -> SourceBatch {
    info!(categories = categories.len(), concurrency, "source worker started");
    let crawler = CategoryCrawler::new(worker.context.clone());
    let crawler = &crawler;

    let outcomes: Vec<CategoryOutcome> = stream::iter(categories.clone())
        .map(|category| async move { crawler.crawl(&category).await }.boxed())
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut local = DedupEngine::new(extra_tracking);
    let mut collected = 0;
    let mut reports = Vec::with_capacity(outcomes.len());
    for outcome in &outcomes {
        collected += outcome.records.len();
        for raw in &outcome.records {
            local.ingest(worker.normalizer.normalize(raw, &outcome.category));
        }
        reports.push(CategoryReport::from(outcome));
    }

    let products = local.into_products();
    info!(collected, unique = products.len(), "source worker finished");
    SourceBatch {
        report: SourceReport {
            source: worker.name().to_string(),
            categories: reports,
            products: products.len(),
            error: None,
        },
        products,
        collected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::CrawlPhase;
    use crate::normalize::NormalizationSettings;
    use crate::test_utils::{ManualClock, ScriptedPage, ScriptedSource, listings, source_context};

    fn assert_send<T: Send>(_: &T) {}

    fn worker(categories: &[&str]) -> SourceWorker {
        let clock = Arc::new(ManualClock::new());
        let mut source = ScriptedSource::new("castorama", clock.clone());
        for (i, category) in categories.iter().enumerate() {
            let prefix = format!("c{i}-");
            source = source.with_category(
                *category,
                vec![ScriptedPage::with_records(listings(&prefix, "https://www.castorama.fr/p", 2)).last()],
            );
        }
        let urls = UrlPolicy::new(None, vec!["castorama.fr".into()], true);
        SourceWorker::new(
            source_context(Arc::new(source), clock),
            ProductNormalizer::new(NormalizationSettings::default(), urls),
        )
    }

    #[tokio::test]
    async fn test_source_task_is_spawnable_with_concurrent_categories() {
        let categories = vec!["Peinture".to_string(), "Lavabos".to_string(), "Douches".to_string()];
        let future = run_source(worker(&["Peinture", "Lavabos", "Douches"]), categories, 2, Vec::new());
        assert_send(&future);

        let batch = tokio::spawn(future).await.unwrap();
        let order: Vec<&str> = batch.report.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["Peinture", "Lavabos", "Douches"]);
        assert!(batch.report.categories.iter().all(|c| c.phase == CrawlPhase::Done));
        assert_eq!(batch.collected, 6);
        assert_eq!(batch.products.len(), 6);
    }
}
