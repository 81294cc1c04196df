//! Scraper configuration
//!
//! Loaded with the `config` crate from one file (YAML, TOML or JSON by
//! extension) plus `MATERIAL_SCRAPER__SECTION__KEY` environment overrides.
//! Every section has defaults, so a file only needs what differs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::crawling::{CrawlLimits, RetryPolicy};
use crate::error::ConfigError;
use crate::normalize::NormalizationSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config/scraper_config.yaml";
const ENV_PREFIX: &str = "MATERIAL_SCRAPER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub suppliers: Vec<String>,
    pub categories: Vec<String>,
    pub scraping: ScrapingConfig,
    pub output: OutputConfig,
    pub normalization: NormalizationSettings,
    pub sources: BTreeMap<String, SourceConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Seconds between two requests to the same source
    pub delay_between_requests: f64,
    /// Per-request timeout in seconds
    pub timeout: f64,
    pub max_retries: u32,
    pub max_products_per_category: usize,
    pub max_pages_per_category: u32,
    pub category_concurrency: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ratio: f64,
    /// Fixed jitter seed; a random one is drawn per run when absent
    pub jitter_seed: Option<u64>,
    pub user_agents: Vec<String>,
    pub accept_languages: Vec<String>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            delay_between_requests: 1.0,
            timeout: 30.0,
            max_retries: 3,
            max_products_per_category: 100,
            max_pages_per_category: 50,
            category_concurrency: 1,
            backoff_base_ms: 1000,
            backoff_max_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_ratio: 0.5,
            jitter_seed: None,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
            accept_languages: vec![
                "fr-FR,fr;q=0.9,en;q=0.8".to_string(),
                "fr-FR,fr;q=0.8".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file: PathBuf,
    pub format: String,
    pub backup_previous: bool,
    /// Start from the products of the previous output file
    pub merge_previous: bool,
    pub report_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("output/products.json"),
            format: "json".to_string(),
            backup_previous: true,
            merge_previous: false,
            report_file: None,
        }
    }
}

/// How to reach one supplier catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: Option<String>,
    pub allowed_domains: Vec<String>,
    pub require_https: bool,
    /// Listing URL template with `{category}` and `{page}` placeholders
    pub search_url: Option<String>,
    /// First listing page per category
    pub category_urls: BTreeMap<String, String>,
    /// Query parameter carrying the page number on `category_urls` pages
    pub page_param: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            allowed_domains: Vec::new(),
            require_https: true,
            search_url: None,
            category_urls: BTreeMap::new(),
            page_param: "page".to_string(),
        }
    }
}

impl SourceConfig {
    /// First listing page of `category`, matched case-insensitively
    pub fn category_url(&self, category: &str) -> Option<&String> {
        lookup_ignoring_case(&self.category_urls, category)
    }

    pub fn parsed_base_url(&self) -> Option<Url> {
        self.base_url.as_deref().and_then(|u| Url::parse(u).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Values given on the command line; they win over file and environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub suppliers: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub output: Option<PathBuf>,
}

impl ScraperConfig {
    /// Read file + environment without validating
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("suppliers")
                    .with_list_parse_key("categories"),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        info!(path = %path.display(), suppliers = config.suppliers.len(), "configuration loaded");
        Ok(config)
    }

    /// Load, apply CLI overrides, validate
    pub fn resolve(path: &Path, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: CliOverrides) {
        if let Some(suppliers) = overrides.suppliers.filter(|s| !s.is_empty()) {
            self.suppliers = suppliers;
        }
        if let Some(categories) = overrides.categories.filter(|c| !c.is_empty()) {
            self.categories = categories;
        }
        if let Some(output) = overrides.output {
            self.output.file = output;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.selected_suppliers().is_empty() {
            return Err(ConfigError::invalid("suppliers", "at least one supplier is required"));
        }
        if self.selected_categories().is_empty() {
            return Err(ConfigError::invalid("categories", "at least one category is required"));
        }

        let scraping = &self.scraping;
        if !(scraping.timeout.is_finite() && scraping.timeout > 0.0) {
            return Err(ConfigError::invalid("scraping.timeout", "must be greater than 0"));
        }
        if !(scraping.delay_between_requests.is_finite() && scraping.delay_between_requests >= 0.0) {
            return Err(ConfigError::invalid(
                "scraping.delay_between_requests",
                "must not be negative",
            ));
        }
        if scraping.max_products_per_category == 0 {
            return Err(ConfigError::invalid(
                "scraping.max_products_per_category",
                "must be greater than 0",
            ));
        }
        if scraping.max_pages_per_category == 0 {
            return Err(ConfigError::invalid(
                "scraping.max_pages_per_category",
                "must be greater than 0",
            ));
        }
        if scraping.category_concurrency == 0 {
            return Err(ConfigError::invalid(
                "scraping.category_concurrency",
                "must be greater than 0",
            ));
        }
        if scraping.backoff_base_ms > scraping.backoff_max_ms {
            return Err(ConfigError::invalid(
                "scraping.backoff_base_ms",
                "cannot be greater than backoff_max_ms",
            ));
        }
        if !(scraping.backoff_multiplier.is_finite() && scraping.backoff_multiplier >= 1.0) {
            return Err(ConfigError::invalid("scraping.backoff_multiplier", "must be at least 1.0"));
        }
        if !(scraping.jitter_ratio.is_finite() && scraping.jitter_ratio >= 0.0) {
            return Err(ConfigError::invalid("scraping.jitter_ratio", "must not be negative"));
        }

        if !self.output.format.eq_ignore_ascii_case("json") {
            return Err(ConfigError::invalid(
                "output.format",
                format!("unsupported format '{}', only 'json' is available", self.output.format),
            ));
        }
        if self.output.file.as_os_str().is_empty() {
            return Err(ConfigError::invalid("output.file", "path must not be empty"));
        }
        if self.normalization.default_currency.trim().is_empty() {
            return Err(ConfigError::invalid("normalization.default_currency", "must not be empty"));
        }

        for supplier in self.selected_suppliers() {
            let source = self
                .source(&supplier)
                .ok_or_else(|| ConfigError::UnknownSupplier(supplier.clone()))?;
            validate_source(&supplier, source)?;
        }
        Ok(())
    }

    /// Source entry for `name`. The config loader lowercases map keys, so
    /// names match case-insensitively.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        lookup_ignoring_case(&self.sources, name)
    }

    /// Suppliers in configured order, blanks and repeats removed
    pub fn selected_suppliers(&self) -> Vec<String> {
        unique_trimmed(&self.suppliers)
    }

    /// Categories in configured order, blanks and repeats removed
    pub fn selected_categories(&self) -> Vec<String> {
        unique_trimmed(&self.categories)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.scraping.max_retries,
            base_delay_ms: self.scraping.backoff_base_ms,
            max_delay_ms: self.scraping.backoff_max_ms,
            backoff_multiplier: self.scraping.backoff_multiplier,
            jitter_ratio: self.scraping.jitter_ratio,
        }
    }

    pub fn crawl_limits(&self) -> CrawlLimits {
        CrawlLimits {
            max_pages: self.scraping.max_pages_per_category,
            max_products: self.scraping.max_products_per_category,
            request_timeout: Duration::from_secs_f64(self.scraping.timeout.max(0.001)),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.scraping.delay_between_requests.max(0.0))
    }
}

fn validate_source(name: &str, source: &SourceConfig) -> Result<(), ConfigError> {
    let field = |key: &str| format!("sources.{name}.{key}");

    if let Some(base) = &source.base_url {
        let url = Url::parse(base)
            .map_err(|e| ConfigError::invalid(field("base_url"), format!("'{base}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(field("base_url"), "scheme must be http or https"));
        }
    }
    if source.allowed_domains.iter().all(|d| d.trim().is_empty()) {
        return Err(ConfigError::invalid(
            field("allowed_domains"),
            "at least one domain is required",
        ));
    }
    match &source.search_url {
        Some(template) if !template.contains("{category}") => {
            return Err(ConfigError::invalid(
                field("search_url"),
                "template must contain {category}",
            ));
        }
        None if source.category_urls.is_empty() => {
            return Err(ConfigError::invalid(
                field("search_url"),
                "either search_url or category_urls is required",
            ));
        }
        _ => {}
    }
    if source.page_param.trim().is_empty() {
        return Err(ConfigError::invalid(field("page_param"), "must not be empty"));
    }
    Ok(())
}

fn lookup_ignoring_case<'a, V>(map: &'a BTreeMap<String, V>, key: &str) -> Option<&'a V> {
    map.get(key).or_else(|| {
        let wanted = key.to_lowercase();
        map.iter()
            .find(|(k, _)| k.to_lowercase() == wanted)
            .map(|(_, v)| v)
    })
}

fn unique_trimmed(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}
