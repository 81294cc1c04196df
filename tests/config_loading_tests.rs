//! Configuration loading from YAML files

use std::path::{Path, PathBuf};

use material_scraper::ConfigError;
use material_scraper::crawling::PageCursor;
use material_scraper::infrastructure::{
    CliOverrides, DEFAULT_CONFIG_PATH, HttpClient, HttpClientConfig, JsonLdSource, ScraperConfig,
};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const MINIMAL: &str = r#"
suppliers: [castorama]
categories: [Peinture, Lavabos]
output:
  file: out/products.json
sources:
  castorama:
    base_url: https://www.castorama.fr
    allowed_domains: [castorama.fr]
    search_url: "https://www.castorama.fr/search?term={category}&page={page}"
"#;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("scraper_config.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn repository_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
    let config = assert_ok!(ScraperConfig::resolve(&path, CliOverrides::default()));

    assert_eq!(config.selected_suppliers(), vec!["castorama", "leroymerlin", "manomano"]);
    assert_eq!(config.selected_categories().len(), 8);
    assert!(config.selected_categories().contains(&"Éviers".to_string()));
    assert!(config.output.backup_previous);
}

#[test]
fn minimal_file_gets_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, MINIMAL);
    let config = assert_ok!(ScraperConfig::resolve(&path, CliOverrides::default()));

    assert_eq!(config.scraping.max_retries, 3);
    assert_eq!(config.scraping.max_products_per_category, 100);
    assert_eq!(config.output.format, "json");
    assert_eq!(config.normalization.default_currency, "EUR");
    assert_eq!(config.normalization.measurement_unit, "cm");
    assert_eq!(config.sources["castorama"].page_param, "page");
    assert!(config.sources["castorama"].require_https);
}

#[test]
fn cli_overrides_replace_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, MINIMAL);
    let overrides = CliOverrides {
        suppliers: None,
        categories: Some(vec!["Douches".into()]),
        output: Some(PathBuf::from("elsewhere.json")),
    };
    let config = assert_ok!(ScraperConfig::resolve(&path, overrides));

    assert_eq!(config.selected_categories(), vec!["Douches"]);
    assert_eq!(config.output.file, PathBuf::from("elsewhere.json"));
    assert_eq!(config.selected_suppliers(), vec!["castorama"]);
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let err = assert_err!(ScraperConfig::resolve(
        &dir.path().join("absent.yaml"),
        CliOverrides::default()
    ));
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn malformed_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "suppliers: [castorama\ncategories: ");
    let err = assert_err!(ScraperConfig::load(&path));
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn supplier_without_source_entry_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, MINIMAL);
    let overrides = CliOverrides {
        suppliers: Some(vec!["castorama".into(), "bricodepot".into()]),
        ..CliOverrides::default()
    };
    let err = assert_err!(ScraperConfig::resolve(&path, overrides));
    assert!(matches!(err, ConfigError::UnknownSupplier(name) if name == "bricodepot"));
}

#[test]
fn out_of_range_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let body = format!("{MINIMAL}\nscraping:\n  timeout: 0\n");
    let path = write_config(&dir, &body);
    let err = assert_err!(ScraperConfig::resolve(&path, CliOverrides::default()));
    assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "scraping.timeout"));
}

#[test]
fn empty_category_list_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, MINIMAL);
    let mut config = assert_ok!(ScraperConfig::load(&path));
    config.categories = vec!["  ".into()];
    let err = assert_err!(config.validate());
    assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "categories"));
}

const CATEGORY_PAGES: &str = r#"
suppliers: [LeroyMerlin]
categories: [Peinture, Éviers]
sources:
  LeroyMerlin:
    base_url: https://www.leroymerlin.fr
    allowed_domains: [leroymerlin.fr]
    page_param: p
    category_urls:
      Peinture: https://www.leroymerlin.fr/produits/peinture/
      Éviers: "https://www.leroymerlin.fr/produits/cuisine/eviers/?tri=prix"
"#;

#[test]
fn category_urls_from_file_address_capitalized_categories() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATEGORY_PAGES);
    let config = assert_ok!(ScraperConfig::resolve(&path, CliOverrides::default()));

    let supplier = &config.selected_suppliers()[0];
    assert_eq!(supplier, "LeroyMerlin");
    let source_config = config.source(supplier).cloned().unwrap();
    let http = HttpClient::new(supplier, &HttpClientConfig::default()).unwrap();
    let source = JsonLdSource::new(supplier.clone(), source_config, http);

    assert_eq!(
        source.page_url("Peinture", &PageCursor::first()).unwrap(),
        "https://www.leroymerlin.fr/produits/peinture/"
    );
    assert_eq!(
        source.page_url("Peinture", &PageCursor::first().following()).unwrap(),
        "https://www.leroymerlin.fr/produits/peinture/?p=2"
    );
    assert_eq!(
        source.page_url("Éviers", &PageCursor::first().following()).unwrap(),
        "https://www.leroymerlin.fr/produits/cuisine/eviers/?tri=prix&p=2"
    );
}
