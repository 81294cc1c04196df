//! Extraction collaborator seam
//!
//! A [`ListingSource`] knows how to address and decode the listing pages of
//! one catalog. The crawler only sees cursors, payloads and raw records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::pacing::RequestProfile;
use crate::domain::RawListingRecord;
use crate::error::FetchError;

/// Opaque pagination position: a page number plus an optional source token
/// such as a `rel="next"` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    pub page: u32,
    pub token: Option<String>,
}

impl PageCursor {
    pub fn first() -> Self {
        Self { page: 1, token: None }
    }

    /// Next numbered page without a token
    pub fn following(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            token: None,
        }
    }

    pub fn with_token(page: u32, token: impl Into<String>) -> Self {
        Self {
            page,
            token: Some(token.into()),
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(f, "page {} ({token})", self.page),
            None => write!(f, "page {}", self.page),
        }
    }
}

/// Fetched page body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePayload {
    pub url: String,
    pub body: String,
}

/// Result of parsing one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub records: Vec<RawListingRecord>,
    pub next: Option<PageCursor>,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Supplier name as used in configuration and logs
    fn name(&self) -> &str;

    async fn fetch_page(
        &self,
        category: &str,
        cursor: &PageCursor,
        profile: &RequestProfile,
    ) -> Result<PagePayload, FetchError>;

    fn parse_page(
        &self,
        category: &str,
        cursor: &PageCursor,
        payload: &PagePayload,
    ) -> Result<ListingPage, FetchError>;
}
