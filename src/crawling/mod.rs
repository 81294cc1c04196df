//! Crawl orchestration: pagination, retry and pacing per source

pub mod clock;
pub mod orchestrator;
pub mod pacing;
pub mod retry_calculator;
pub mod source;
pub mod state;

pub use clock::{Clock, TokioClock};
pub use orchestrator::{CategoryCrawler, CategoryOutcome, CrawlLimits, SourceContext};
pub use pacing::{HeaderRotation, RequestPacer, RequestProfile};
pub use retry_calculator::RetryPolicy;
pub use source::{ListingPage, ListingSource, PageCursor, PagePayload};
pub use state::{CrawlPhase, CrawlState, InvalidTransition};
