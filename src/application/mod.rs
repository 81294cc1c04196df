//! Application layer: run coordination, aggregation and reporting

pub mod report;
pub mod scrape_run;
pub mod session_aggregator;
pub mod source_registry;

pub use report::{CategoryReport, RunReport, SourceReport};
pub use scrape_run::{RunSettings, ScrapeRun, SourceWorker};
pub use session_aggregator::SessionAggregator;
pub use source_registry::build_workers;
