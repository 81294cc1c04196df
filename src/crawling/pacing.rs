//! Per-source request pacing and header rotation
//!
//! One [`RequestPacer`] and one [`HeaderRotation`] exist per source and are
//! shared by every category crawl of that source.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::clock::Clock;

/// Enforces a minimum delay between consecutive requests to one source
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
            clock,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request may start, then claim that slot.
    ///
    /// The lock is held across the wait so concurrent callers queue up
    /// behind each other instead of firing together.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                trace!(wait_ms = wait.as_millis() as u64, "pacing request");
                self.clock.sleep(wait).await;
            }
        }
        *last = Some(self.clock.now());
    }
}

/// Request headers used for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            user_agent: concat!("material-scraper/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_language: "fr-FR,fr;q=0.9,en;q=0.8".to_string(),
        }
    }
}

/// Round-robin over configured user agents and accept-language values
pub struct HeaderRotation {
    profiles: Vec<RequestProfile>,
    next: AtomicUsize,
}

impl HeaderRotation {
    /// Pairs the i-th user agent with the i-th language, cycling the shorter list.
    pub fn new(user_agents: &[String], accept_languages: &[String]) -> Self {
        let fallback = RequestProfile::default();
        let count = user_agents.len().max(accept_languages.len());
        let profiles = if count == 0 {
            vec![fallback]
        } else {
            (0..count)
                .map(|i| RequestProfile {
                    user_agent: pick(user_agents, i).unwrap_or(&fallback.user_agent).clone(),
                    accept_language: pick(accept_languages, i)
                        .unwrap_or(&fallback.accept_language)
                        .clone(),
                })
                .collect()
        };
        Self {
            profiles,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next_profile(&self) -> RequestProfile {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.profiles.len();
        self.profiles[index].clone()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn pick(values: &[String], i: usize) -> Option<&String> {
    if values.is_empty() {
        None
    } else {
        values.get(i % values.len())
    }
}
