//! Remote source traits and structured error types.
//!
//! `RankingSource` abstracts over the paginated ranking endpoint and
//! `RatingLookup` over the single-user search endpoint, so the collector and
//! the query path can be driven by the real HTTP client or by scripted mocks.

use thiserror::Error;

/// Structured error types for remote operations.
///
/// These are designed to be displayable in both log lines and CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True for the 429 signal, which is retried rather than skipped.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DataError::RateLimited { .. })
    }
}

/// One page of the ranking endpoint.
pub trait RankingSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the ratings on a 1-indexed page.
    ///
    /// An empty vector means the source has no more entries.
    fn fetch_page(&self, page: u32) -> Result<Vec<u32>, DataError>;
}

/// Maps a username to its current rating.
pub trait RatingLookup: Send + Sync {
    /// `Ok(None)` when the user is unknown to the remote service.
    fn lookup_rating(&self, username: &str) -> Result<Option<u32>, DataError>;
}

/// Progress callback for a collection run.
pub trait CollectProgress: Send + Sync {
    /// Called before a page request is issued.
    fn on_page(&self, page: u32, expected_pages: u32, collected: usize);

    /// Called after the partial accumulator has been checkpointed.
    fn on_checkpoint(&self, page: u32, collected: usize, result: &Result<(), String>);

    /// Called when a page is skipped after an error.
    fn on_page_failed(&self, page: u32, error: &DataError);

    /// Called once the loop ends, before the final write.
    fn on_finished(&self, pages_requested: u32, collected: usize);
}

/// Progress reporter that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl CollectProgress for LogProgress {
    fn on_page(&self, page: u32, expected_pages: u32, collected: usize) {
        tracing::debug!(page, expected_pages, collected, "collecting page");
    }

    fn on_checkpoint(&self, page: u32, collected: usize, result: &Result<(), String>) {
        match result {
            Ok(()) => tracing::info!(page, collected, "checkpoint saved"),
            Err(e) => tracing::warn!(page, collected, error = %e, "checkpoint failed"),
        }
    }

    fn on_page_failed(&self, page: u32, error: &DataError) {
        tracing::warn!(page, error = %error, "page skipped");
    }

    fn on_finished(&self, pages_requested: u32, collected: usize) {
        tracing::info!(pages_requested, collected, "collection loop finished");
    }
}

/// Progress reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl CollectProgress for NoProgress {
    fn on_page(&self, _page: u32, _expected_pages: u32, _collected: usize) {}
    fn on_checkpoint(&self, _page: u32, _collected: usize, _result: &Result<(), String>) {}
    fn on_page_failed(&self, _page: u32, _error: &DataError) {}
    fn on_finished(&self, _pages_requested: u32, _collected: usize) {}
}
