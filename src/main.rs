use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use material_scraper::infrastructure::{DEFAULT_CONFIG_PATH, LoggingConfig, init_logging};
use material_scraper::{CliOverrides, ScrapeError, ScraperConfig, run_pipeline};

const EXIT_CONFIG: u8 = 1;
const EXIT_ALL_SOURCES_FAILED: u8 = 2;
const EXIT_PERSIST: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "material-scraper", version, about = "Scrape renovation material catalogs into one JSON dataset")]
struct Cli {
    /// Suppliers to scrape (defaults to `suppliers` from the config file)
    #[arg(long, num_args = 1..)]
    suppliers: Vec<String>,

    /// Categories to scrape (defaults to `categories` from the config file)
    #[arg(long, num_args = 1..)]
    categories: Vec<String>,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Output file, overrides `output.file`
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            suppliers: (!self.suppliers.is_empty()).then(|| self.suppliers.clone()),
            categories: (!self.categories.is_empty()).then(|| self.categories.clone()),
            output: self.output.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ScraperConfig::resolve(&cli.config, cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the file that just failed to load
            let _guard = init_logging(&LoggingConfig::default()).ok().flatten();
            error!(config = %cli.config.display(), "configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let _guard = match init_logging(&config.logging).context("Failed to initialize logging") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        suppliers = ?config.selected_suppliers(),
        categories = ?config.selected_categories(),
        output = %config.output.file.display(),
        "material-scraper starting"
    );

    match run_pipeline(&config).await {
        Ok(report) if report.all_sources_failed() => {
            warn!("all sources failed entirely");
            ExitCode::from(EXIT_ALL_SOURCES_FAILED)
        }
        Ok(report) => {
            info!(total = report.total_products, "done");
            ExitCode::SUCCESS
        }
        Err(ScrapeError::Config(e)) => {
            error!("configuration error: {e}");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(ScrapeError::Persist(e)) => {
            error!("persistence failure: {e}");
            ExitCode::from(EXIT_PERSIST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_lists_and_defaults() {
        let cli = Cli::parse_from([
            "material-scraper",
            "--suppliers",
            "castorama",
            "manomano",
            "--categories",
            "Peinture",
            "--output",
            "out.json",
        ]);
        assert_eq!(cli.suppliers, vec!["castorama", "manomano"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        let overrides = cli.overrides();
        assert_eq!(overrides.categories, Some(vec!["Peinture".to_string()]));
        assert_eq!(overrides.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_cli_without_lists_keeps_config() {
        let cli = Cli::parse_from(["material-scraper"]);
        assert_eq!(cli.overrides(), CliOverrides::default());
    }
}
