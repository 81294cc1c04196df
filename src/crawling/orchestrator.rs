//! Category crawler
//!
//! Drives one (source, category) pair through [`CrawlState`]: pages are
//! fetched strictly in cursor order, transient failures are retried with
//! backoff, and the crawl ends on the last page, on a limit, or on the first
//! page that cannot be recovered.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::clock::Clock;
use super::pacing::{HeaderRotation, RequestPacer};
use super::retry_calculator::RetryPolicy;
use super::source::{ListingPage, ListingSource, PagePayload};
use super::state::{CrawlPhase, CrawlState, InvalidTransition};
use crate::domain::RawListingRecord;
use crate::error::FetchError;

/// Per-category stopping rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_pages: u32,
    pub max_products: usize,
    pub request_timeout: Duration,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_products: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything a source worker shares between its category crawls
pub struct SourceContext {
    pub source: Arc<dyn ListingSource>,
    pub pacer: Arc<RequestPacer>,
    pub headers: Arc<HeaderRotation>,
    pub retry: RetryPolicy,
    pub limits: CrawlLimits,
    pub clock: Arc<dyn Clock>,
    /// Base seed for backoff jitter; each category derives its own stream
    pub jitter_seed: u64,
}

impl SourceContext {
    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}

/// Terminal state of one category plus the records it collected
#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub source: String,
    pub category: String,
    pub state: CrawlState,
    pub records: Vec<RawListingRecord>,
}

impl CategoryOutcome {
    pub fn phase(&self) -> CrawlPhase {
        self.state.phase()
    }
}

pub struct CategoryCrawler {
    context: Arc<SourceContext>,
}

impl CategoryCrawler {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    /// Crawl one category to a terminal state. Never panics on page errors;
    /// whatever was collected before a failure is returned.
    #[instrument(skip(self), fields(source = %self.context.source_name()))]
    pub async fn crawl(&self, category: &str) -> CategoryOutcome {
        let mut state = CrawlState::new();
        let mut records = Vec::new();
        let mut rng = fastrand::Rng::with_seed(category_seed(
            self.context.jitter_seed,
            self.context.source_name(),
            category,
        ));

        if let Err(e) = self.run(category, &mut state, &mut records, &mut rng).await {
            warn!(category, error = %e, "crawl state machine rejected a transition");
            state.force_failed(e);
        }
        state.products_collected = records.len();

        info!(
            category,
            phase = %state.phase(),
            pages = state.pages_fetched,
            attempts = state.fetch_attempts,
            products = records.len(),
            lost_pages = state.lost_pages.len(),
            "category crawl finished"
        );

        CategoryOutcome {
            source: self.context.source_name().to_string(),
            category: category.to_string(),
            state,
            records,
        }
    }

    async fn run(
        &self,
        category: &str,
        state: &mut CrawlState,
        records: &mut Vec<RawListingRecord>,
        rng: &mut fastrand::Rng,
    ) -> Result<(), InvalidTransition> {
        let limits = self.context.limits;
        state.transition(CrawlPhase::Fetching)?;

        loop {
            let payload = match self.fetch_with_retry(category, state, rng).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(category, page = state.cursor().page, error = %e, "page lost");
                    return state.fail_page(e);
                }
            };
            state.pages_fetched += 1;
            state.transition(CrawlPhase::Parsing)?;

            let cursor = state.cursor().clone();
            let ListingPage { records: page_records, next } =
                match self.context.source.parse_page(category, &cursor, &payload) {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(category, page = cursor.page, error = %e, "page lost");
                        return state.fail_page(e);
                    }
                };

            let found = page_records.len();
            let room = limits.max_products.saturating_sub(records.len());
            records.extend(page_records.into_iter().take(room));
            state.products_collected = records.len();
            debug!(category, page = cursor.page, found, total = records.len(), "page parsed");

            if found == 0 {
                debug!(category, page = cursor.page, "empty page, stopping");
                return state.transition(CrawlPhase::Done);
            }
            if records.len() >= limits.max_products {
                debug!(category, max_products = limits.max_products, "product cap reached");
                return state.transition(CrawlPhase::Done);
            }
            if state.pages_fetched >= limits.max_pages {
                debug!(category, max_pages = limits.max_pages, "page cap reached");
                return state.transition(CrawlPhase::Done);
            }
            match next {
                Some(next) if next != cursor => {
                    state.advance(next)?;
                    state.transition(CrawlPhase::Fetching)?;
                }
                _ => return state.transition(CrawlPhase::Done),
            }
        }
    }

    /// At most `max_retries + 1` attempts; permanent errors return at once.
    async fn fetch_with_retry(
        &self,
        category: &str,
        state: &mut CrawlState,
        rng: &mut fastrand::Rng,
    ) -> Result<PagePayload, FetchError> {
        let ctx = &self.context;
        let mut retries_done = 0;
        loop {
            ctx.pacer.acquire().await;
            let profile = ctx.headers.next_profile();
            state.fetch_attempts += 1;
            let cursor = state.cursor().clone();

            let result = match tokio::time::timeout(
                ctx.limits.request_timeout,
                ctx.source.fetch_page(category, &cursor, &profile),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: format!("{}/{category} {cursor}", ctx.source_name()),
                }),
            };

            match result {
                Ok(payload) => {
                    state.consecutive_failures = 0;
                    return Ok(payload);
                }
                Err(e) if e.is_transient() && ctx.retry.should_retry(retries_done) => {
                    retries_done += 1;
                    state.consecutive_failures += 1;
                    let delay = ctx.retry.delay_for(retries_done, rng.f64());
                    warn!(
                        category,
                        page = cursor.page,
                        attempt = retries_done,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient fetch failure, retrying"
                    );
                    ctx.clock.sleep(delay).await;
                }
                Err(e) => {
                    state.consecutive_failures += 1;
                    return Err(e);
                }
            }
        }
    }
}

fn category_seed(base: u64, source: &str, category: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(b"/");
    hasher.update(category.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    base ^ u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_seed_is_stable_and_distinct() {
        assert_eq!(category_seed(7, "castorama", "Peinture"), category_seed(7, "castorama", "Peinture"));
        assert_ne!(category_seed(7, "castorama", "Peinture"), category_seed(7, "castorama", "Lavabos"));
        assert_ne!(category_seed(7, "castorama", "Peinture"), category_seed(8, "castorama", "Peinture"));
    }
}
