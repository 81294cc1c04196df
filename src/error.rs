//! Error types for every layer of the scraper
//!
//! Normalizers never fail (bad fields become defaults), so the taxonomy here
//! only covers the failures that can change the outcome of a page, a source
//! or the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems. Raised before any crawling starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("Unknown supplier '{0}': no entry under `sources`")]
    UnknownSupplier(String),

    #[error("Failed to build HTTP client for '{source_name}': {message}")]
    HttpClient { source_name: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to obtain or decode one listing page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP request failed: {status} - {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Failed to parse listing page {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Cannot address page: {message}")]
    Unaddressable { message: String },
}

impl FetchError {
    /// Transient failures are worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. } => true,
            Self::HttpStatus { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Parse { .. } | Self::Unaddressable { .. } => false,
        }
    }
}

/// Failure to write or read the output dataset.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let url = "https://www.castorama.fr/p".to_string();
        assert!(FetchError::Timeout { url: url.clone() }.is_transient());
        assert!(FetchError::HttpStatus { url: url.clone(), status: 503 }.is_transient());
        assert!(FetchError::HttpStatus { url: url.clone(), status: 429 }.is_transient());
        assert!(!FetchError::HttpStatus { url: url.clone(), status: 404 }.is_transient());
        assert!(!FetchError::HttpStatus { url: url.clone(), status: 403 }.is_transient());
        assert!(!FetchError::Parse { url, message: "bad json".into() }.is_transient());
    }
}
