//! Listing URL validation against a source's domain allowlist

use url::Url;

use crate::domain::URL_SENTINEL;

/// What a source accepts as a product URL
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    base_url: Option<Url>,
    allowed_domains: Vec<String>,
    require_https: bool,
}

impl UrlPolicy {
    pub fn new(base_url: Option<Url>, allowed_domains: Vec<String>, require_https: bool) -> Self {
        let allowed_domains = allowed_domains
            .into_iter()
            .map(|d| d.trim().trim_start_matches("www.").to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            base_url,
            allowed_domains,
            require_https,
        }
    }

    /// Validated URL, or `None` when the URL must be rejected.
    ///
    /// Absolute URLs that pass come back unchanged; relative ones are
    /// resolved against the base URL when one is configured.
    pub fn validate(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == URL_SENTINEL {
            return None;
        }
        let (parsed, resolved) = match Url::parse(raw) {
            Ok(url) => (url, false),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref()?;
                (base.join(raw).ok()?, true)
            }
            Err(_) => return None,
        };

        match parsed.scheme() {
            "https" => {}
            "http" if !self.require_https => {}
            _ => return None,
        }
        let host = parsed.host_str()?.to_ascii_lowercase();
        if !self.host_allowed(&host) {
            return None;
        }

        if resolved {
            Some(parsed.into())
        } else {
            Some(raw.to_string())
        }
    }

    /// Validated URL or the `N/A` sentinel
    pub fn normalize(&self, raw: Option<&str>) -> String {
        raw.and_then(|r| self.validate(r))
            .unwrap_or_else(|| URL_SENTINEL.to_string())
    }

    fn host_allowed(&self, host: &str) -> bool {
        self.allowed_domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{d}")))
    }
}

/// Keep absolute http(s) image URLs, drop repeats, preserve order.
pub fn normalize_images(images: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    images
        .iter()
        .map(|i| i.trim())
        .filter(|i| {
            Url::parse(i)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
                .unwrap_or(false)
        })
        .filter(|i| seen.insert(i.to_string()))
        .map(str::to_string)
        .collect()
}
