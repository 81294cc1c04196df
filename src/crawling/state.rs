//! Per (source, category) crawl state machine
//!
//! ```text
//! Idle -> Fetching -> Parsing -> NextPage -> Fetching ...
//!            |           |-> Done
//!            |-> Failed  |-> Failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::source::PageCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    Idle,
    Fetching,
    Parsing,
    NextPage,
    Done,
    Failed,
}

impl CrawlPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Parsing)
                | (Fetching, Failed)
                | (Parsing, NextPage)
                | (Parsing, Done)
                | (Parsing, Failed)
                | (NextPage, Fetching)
        )
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::NextPage => "next_page",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid crawl transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: CrawlPhase,
    pub to: CrawlPhase,
}

/// Mutable progress of one category crawl. Owned by that crawl only.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlState {
    phase: CrawlPhase,
    cursor: PageCursor,
    pub consecutive_failures: u32,
    pub products_collected: usize,
    pub pages_fetched: u32,
    pub fetch_attempts: u32,
    /// Page numbers that could not be fetched or parsed
    pub lost_pages: Vec<u32>,
    pub last_error: Option<String>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlState {
    pub fn new() -> Self {
        Self {
            phase: CrawlPhase::Idle,
            cursor: PageCursor::first(),
            consecutive_failures: 0,
            products_collected: 0,
            pages_fetched: 0,
            fetch_attempts: 0,
            lost_pages: Vec::new(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn transition(&mut self, next: CrawlPhase) -> Result<(), InvalidTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// `Parsing -> NextPage`, moving the cursor forward
    pub fn advance(&mut self, next: PageCursor) -> Result<(), InvalidTransition> {
        self.transition(CrawlPhase::NextPage)?;
        self.cursor = next;
        Ok(())
    }

    /// Record the current page as lost and terminate in `Failed`
    pub fn fail_page(&mut self, error: impl fmt::Display) -> Result<(), InvalidTransition> {
        self.transition(CrawlPhase::Failed)?;
        self.lost_pages.push(self.cursor.page);
        self.last_error = Some(error.to_string());
        Ok(())
    }

    /// Terminal fallback used when a transition was rejected
    pub(crate) fn force_failed(&mut self, error: impl fmt::Display) {
        self.phase = CrawlPhase::Failed;
        self.last_error = Some(error.to_string());
    }
}
