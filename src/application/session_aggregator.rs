//! Run-wide product accumulation
//!
//! Workers never touch the aggregator directly while crawling. The run
//! coordinator merges each worker's finished batch once, under the lock.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{DedupEngine, IngestStats, NormalizedProduct, ScrapeSession, SessionDocument};
use crate::error::PersistError;
use crate::infrastructure::OutputStore;

struct AggregatorState {
    session: ScrapeSession,
    dedup: DedupEngine,
    stats: IngestStats,
}

pub struct SessionAggregator {
    state: Mutex<AggregatorState>,
}

impl SessionAggregator {
    pub fn start(scraper: impl Into<String>, started_at: DateTime<Utc>, extra_tracking: Vec<String>) -> Self {
        let session = ScrapeSession::start(scraper, started_at);
        info!(session_id = %session.session_id, scraper = %session.scraper, "session started");
        Self {
            state: Mutex::new(AggregatorState {
                session,
                dedup: DedupEngine::new(extra_tracking),
                stats: IngestStats::default(),
            }),
        }
    }

    /// Load products from a previous run. Later merges overwrite them.
    pub async fn seed(&self, products: Vec<NormalizedProduct>) -> usize {
        let mut state = self.state.lock().await;
        let stats = state.dedup.ingest_all(products);
        debug!(seeded = stats.inserted, collapsed = stats.replaced, "aggregator seeded");
        stats.inserted
    }

    /// Merge one worker's batch
    pub async fn merge(&self, products: Vec<NormalizedProduct>) -> IngestStats {
        let mut state = self.state.lock().await;
        let stats = state.dedup.ingest_all(products);
        state.stats.inserted += stats.inserted;
        state.stats.replaced += stats.replaced;
        debug!(inserted = stats.inserted, replaced = stats.replaced, total = state.dedup.len(), "batch merged");
        stats
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.dedup.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.dedup.is_empty()
    }

    pub async fn session(&self) -> ScrapeSession {
        self.state.lock().await.session.clone()
    }

    /// Inserted / replaced counts of all merges so far (seeding excluded)
    pub async fn stats(&self) -> IngestStats {
        self.state.lock().await.stats
    }

    /// Current document with `total_products` and `last_updated` refreshed
    pub async fn snapshot(&self, now: DateTime<Utc>) -> SessionDocument {
        let mut state = self.state.lock().await;
        let total = state.dedup.len();
        state.session.touch(total, now);
        SessionDocument {
            metadata: state.session.clone(),
            products: state.dedup.products().cloned().collect(),
        }
    }

    pub async fn persist(&self, store: &OutputStore, now: DateTime<Utc>) -> Result<SessionDocument, PersistError> {
        let document = self.snapshot(now).await;
        store.write(&document).await?;
        Ok(document)
    }
}
