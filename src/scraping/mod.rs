//! Page-interaction pipeline against the disruption site.
//!
//! The target is a JS-heavy SPA whose DOM we do not control: selectors drift,
//! consent overlays appear non-deterministically, and the results table is the
//! last thing to render after several async filter steps. Every wait in this
//! module tree is therefore bounded, and every UI target is addressed through
//! an ordered fallback chain rather than a single fixed selector.

pub mod browser;
pub mod extractor;
pub mod filter;
pub mod locator;
pub mod navigator;
pub mod retry;

use thiserror::Error;

/// Cycle-aborting scrape failures. Per-row parse problems and an empty table
/// are deliberately *not* errors — they are valid (if disappointing) outcomes
/// the next cycle retries.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Page failed to load or become ready within budget.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A load-bearing UI step (filter panel, results tab) could not complete
    /// after exhausting fallback selectors and retries.
    #[error("interaction failed: {0}")]
    Interaction(String),
}
