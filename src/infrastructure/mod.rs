//! Infrastructure layer: configuration, logging, HTTP and file output

pub mod config;
pub mod http_client;
pub mod json_ld_source;
pub mod logging;
pub mod output_store;

pub use self::config::{
    CliOverrides, DEFAULT_CONFIG_PATH, LoggingConfig, OutputConfig, ScraperConfig, ScrapingConfig,
    SourceConfig,
};
pub use http_client::{HttpClient, HttpClientConfig};
pub use json_ld_source::JsonLdSource;
pub use logging::init_logging;
pub use output_store::{OutputStore, write_json_atomically};
