//! Stable product identity
//!
//! A listing keeps the same `product_id` across runs: the source's own
//! identifier when it has one, otherwise a fingerprint of content that does
//! not change between scrapes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::product::NormalizedProduct;
use super::product_url::CanonicalUrl;

const FINGERPRINT_PREFIX: &str = "fp-";
const FINGERPRINT_HEX_LEN: usize = 16;

/// Pick the product ID for a listing.
///
/// Native IDs made of ASCII alphanumerics (plus `-`/`_`) are used as-is.
pub fn assign_product_id(
    native_id: Option<&str>,
    canonical_url: Option<&CanonicalUrl>,
    product_name: &str,
) -> String {
    if let Some(native) = native_id.map(str::trim).filter(|id| is_native_id(id)) {
        return native.to_string();
    }
    content_fingerprint(canonical_url, product_name)
}

fn is_native_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `fp-` + first 16 hex chars of blake3(canonical url, normalized name)
pub fn content_fingerprint(canonical_url: Option<&CanonicalUrl>, product_name: &str) -> String {
    let name = product_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let url = canonical_url.map(CanonicalUrl::as_str).unwrap_or("");

    let mut hasher = blake3::Hasher::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(name.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("{FINGERPRINT_PREFIX}{}", &hex.as_str()[..FINGERPRINT_HEX_LEN])
}

/// Key under which duplicates collapse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DedupKey {
    Url(CanonicalUrl),
    /// Fallback for listings whose URL was rejected
    Id(String),
}

impl DedupKey {
    pub fn for_product(product: &NormalizedProduct, extra_tracking: &[String]) -> Self {
        if product.has_valid_url() {
            if let Some(url) = CanonicalUrl::parse(&product.product_url, extra_tracking) {
                return Self::Url(url);
            }
        }
        Self::Id(product.product_id.clone())
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "url:{url}"),
            Self::Id(id) => write!(f, "id:{id}"),
        }
    }
}
