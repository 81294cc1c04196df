//! HTTP client for listing pages
//!
//! One client per source: cookie store, compression and a per-request
//! timeout. Retry and pacing live in the crawler, not here.

use reqwest::{Client, ClientBuilder, header};
use std::time::Duration;
use tracing::debug;

use crate::crawling::{PagePayload, RequestProfile};
use crate::error::{ConfigError, FetchError};

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            follow_redirects: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    source_name: String,
}

impl HttpClient {
    pub fn new(source_name: &str, config: &HttpClientConfig) -> Result<Self, ConfigError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| ConfigError::HttpClient {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            source_name: source_name.to_string(),
        })
    }

    /// GET one page with the headers of `profile`
    pub async fn fetch(&self, url: &str, profile: &RequestProfile) -> Result<PagePayload, FetchError> {
        debug!(source = %self.source_name, url, user_agent = %profile.user_agent, "GET");

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, &profile.user_agent)
            .header(header::ACCEPT_LANGUAGE, &profile.accept_language)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        debug!(source = %self.source_name, url = %final_url, bytes = body.len(), "page received");
        Ok(PagePayload { url: final_url, body })
    }
}

fn classify_request_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else if let Some(status) = error.status() {
        FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else if error.is_builder() {
        FetchError::Unaddressable {
            message: format!("{url}: {error}"),
        }
    } else {
        FetchError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        let client = HttpClient::new("castorama", &HttpClientConfig::default()).unwrap();
        assert_eq!(client.source_name, "castorama");
    }

    #[tokio::test]
    async fn test_invalid_url_is_permanent() {
        let client = HttpClient::new("castorama", &HttpClientConfig::default()).unwrap();
        let err = client
            .fetch("not a url", &RequestProfile::default())
            .await
            .unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
    }
}
