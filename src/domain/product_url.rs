use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Query parameters that only carry click attribution
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "msclkid", "mc_cid", "mc_eid", "ref", "src", "_ga", "yclid",
];

/// URL normalized for comparison: lowercase scheme/host, no fragment, no
/// default port, no trailing slash, tracking parameters removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Returns `None` for anything that isn't an absolute URL.
    pub fn parse(raw: &str, extra_tracking: &[String]) -> Option<Self> {
        let mut url = Url::parse(raw.trim()).ok()?;
        url.host_str()?;
        url.set_fragment(None);

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key, extra_tracking))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        let path = url.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            url.set_path(path.trim_end_matches('/'));
        }

        Some(Self(url.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_tracking_param(key: &str, extra: &[String]) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_")
        || DEFAULT_TRACKING_PARAMS.contains(&key.as_str())
        || extra.iter().any(|p| p.eq_ignore_ascii_case(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(raw: &str) -> String {
        CanonicalUrl::parse(raw, &[]).unwrap().to_string()
    }

    #[test]
    fn test_lowercases_and_strips_tracking() {
        assert_eq!(
            canon("HTTPS://WWW.Castorama.FR/carrelage/123.html?utm_source=x&gclid=abc#reviews"),
            "https://www.castorama.fr/carrelage/123.html"
        );
    }

    #[test]
    fn test_keeps_meaningful_query() {
        assert_eq!(
            canon("https://www.manomano.fr/p/abc?model_id=42&utm_medium=cpc"),
            "https://www.manomano.fr/p/abc?model_id=42"
        );
    }

    #[test]
    fn test_default_port_and_trailing_slash() {
        assert_eq!(
            canon("https://www.leroymerlin.fr:443/produits/douche/"),
            "https://www.leroymerlin.fr/produits/douche"
        );
    }

    #[test]
    fn test_extra_tracking_params() {
        let extra = vec!["campaign".to_string()];
        let url = CanonicalUrl::parse("https://a.fr/x?campaign=1&id=2", &extra).unwrap();
        assert_eq!(url.as_str(), "https://a.fr/x?id=2");
    }

    #[test]
    fn test_rejects_non_absolute() {
        assert!(CanonicalUrl::parse("N/A", &[]).is_none());
        assert!(CanonicalUrl::parse("/produits/1", &[]).is_none());
    }
}
