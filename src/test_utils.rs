//! Test utilities
//!
//! In-memory listing sources and a manual clock so crawl behavior can be
//! exercised without network access or real delays.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::crawling::{
    Clock, CrawlLimits, HeaderRotation, ListingPage, ListingSource, PageCursor, PagePayload,
    RequestPacer, RequestProfile, RetryPolicy, SourceContext,
};
use crate::domain::RawListingRecord;
use crate::error::FetchError;

/// Clock whose `sleep` advances time instantly and records the wait
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *lock(&self.offset)
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.offset) += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *lock(&self.offset)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}

/// One scripted listing page
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub records: Vec<RawListingRecord>,
    pub has_next: bool,
    /// Errors returned by successive fetches before the page succeeds
    pub failures: Vec<FetchError>,
    pub parse_error: Option<FetchError>,
}

impl ScriptedPage {
    pub fn with_records(records: Vec<RawListingRecord>) -> Self {
        Self {
            records,
            has_next: true,
            ..Self::default()
        }
    }

    pub fn last(mut self) -> Self {
        self.has_next = false;
        self
    }

    pub fn failing(mut self, failures: Vec<FetchError>) -> Self {
        self.failures = failures;
        self
    }
}

/// A fetch as observed by [`ScriptedSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRecord {
    pub category: String,
    pub page: u32,
    pub at: Duration,
    pub profile: RequestProfile,
}

/// [`ListingSource`] replaying per-category page scripts
pub struct ScriptedSource {
    name: String,
    pages: HashMap<String, Vec<ScriptedPage>>,
    pending_failures: Mutex<HashMap<(String, u32), VecDeque<FetchError>>>,
    fetch_log: Mutex<Vec<FetchRecord>>,
    clock: Arc<dyn Clock>,
    origin: Instant,
    fetch_delay: Option<Duration>,
    panic_on_fetch: bool,
}

impl ScriptedSource {
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let origin = clock.now();
        Self {
            name: name.into(),
            pages: HashMap::new(),
            pending_failures: Mutex::new(HashMap::new()),
            fetch_log: Mutex::new(Vec::new()),
            clock,
            origin,
            fetch_delay: None,
            panic_on_fetch: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>, pages: Vec<ScriptedPage>) -> Self {
        let category = category.into();
        {
            let mut pending = lock(&self.pending_failures);
            for (index, page) in pages.iter().enumerate() {
                if !page.failures.is_empty() {
                    pending.insert(
                        (category.clone(), index as u32 + 1),
                        page.failures.iter().cloned().collect(),
                    );
                }
            }
        }
        self.pages.insert(category, pages);
        self
    }

    /// Every fetch waits this long in real time before answering
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Fetches panic, simulating a crashing worker
    pub fn panicking(mut self) -> Self {
        self.panic_on_fetch = true;
        self
    }

    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        lock(&self.fetch_log).clone()
    }

    pub fn fetches_for(&self, category: &str) -> Vec<FetchRecord> {
        self.fetch_log()
            .into_iter()
            .filter(|f| f.category == category)
            .collect()
    }

    fn page(&self, category: &str, cursor: &PageCursor) -> Option<&ScriptedPage> {
        let index = cursor.page.checked_sub(1)? as usize;
        self.pages.get(category)?.get(index)
    }

    fn page_url(&self, category: &str, page: u32) -> String {
        format!("scripted://{}/{category}/{page}", self.name)
    }
}

#[async_trait]
impl ListingSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(
        &self,
        category: &str,
        cursor: &PageCursor,
        profile: &RequestProfile,
    ) -> Result<PagePayload, FetchError> {
        if self.panic_on_fetch {
            panic!("scripted source '{}' crashed", self.name);
        }
        lock(&self.fetch_log).push(FetchRecord {
            category: category.to_string(),
            page: cursor.page,
            at: self.clock.now().saturating_duration_since(self.origin),
            profile: profile.clone(),
        });
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let url = self.page_url(category, cursor.page);
        let failure = lock(&self.pending_failures)
            .get_mut(&(category.to_string(), cursor.page))
            .and_then(VecDeque::pop_front);
        if let Some(error) = failure {
            return Err(error);
        }
        if self.page(category, cursor).is_none() {
            return Err(FetchError::HttpStatus { url, status: 404 });
        }
        Ok(PagePayload {
            url,
            body: String::new(),
        })
    }

    fn parse_page(
        &self,
        category: &str,
        cursor: &PageCursor,
        payload: &PagePayload,
    ) -> Result<ListingPage, FetchError> {
        let page = self.page(category, cursor).ok_or_else(|| FetchError::Parse {
            url: payload.url.clone(),
            message: "no scripted page".to_string(),
        })?;
        if let Some(error) = &page.parse_error {
            return Err(error.clone());
        }
        Ok(ListingPage {
            records: page.records.clone(),
            next: page.has_next.then(|| cursor.following()),
        })
    }
}

/// Context around `source` with no pacing delay and instant backoff
pub fn source_context(source: Arc<dyn ListingSource>, clock: Arc<dyn Clock>) -> SourceContext {
    SourceContext {
        source,
        pacer: Arc::new(RequestPacer::new(Duration::ZERO, clock.clone())),
        headers: Arc::new(HeaderRotation::new(&[], &[])),
        retry: RetryPolicy {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2.0,
            jitter_ratio: 0.5,
        },
        limits: CrawlLimits::default(),
        clock,
        jitter_seed: 42,
    }
}

/// Raw record with a native ID, URL and price
pub fn listing(sku: &str, url: &str, price: &str) -> RawListingRecord {
    RawListingRecord {
        native_id: Some(sku.to_string()),
        name: Some(format!("Produit {sku}")),
        price_text: Some(price.to_string()),
        product_url: Some(url.to_string()),
        ..RawListingRecord::default()
    }
}

/// `count` distinct records whose URLs live under `base`
pub fn listings(prefix: &str, base: &str, count: usize) -> Vec<RawListingRecord> {
    (0..count)
        .map(|i| listing(&format!("{prefix}{i}"), &format!("{base}/{prefix}{i}"), "10,00 €"))
        .collect()
}

pub fn transient(url: &str) -> FetchError {
    FetchError::HttpStatus {
        url: url.to_string(),
        status: 503,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
