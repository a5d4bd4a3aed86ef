//! Engine Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Errors raised while refreshing a single item are logged
//! and counted by the pass; they never escape [`UpdateQueue::process`].
//!
//! [`UpdateQueue::process`]: crate::UpdateQueue::process

use derive_more::{Display, Error};
use shelf_models::{MangaKey, SourceId};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A pass is already running; try again once it has finished.
    #[display("a refresh pass is already in progress")]
    AlreadyProcessing,
    /// No adapter is registered for the source, or it is not ready.
    #[display("could not resolve adapter for source {_0}")]
    AdapterResolution(#[error(not(source))] SourceId),
    /// The adapter could not produce the item (including timeouts).
    #[display("could not fetch {_0}")]
    AdapterFetch(#[error(not(source))] MangaKey),
    /// The item was fetched but could not be written to the cache.
    #[display("could not merge {_0} into the cache")]
    Merge(#[error(not(source))] MangaKey),
    /// Reading the cache or library failed.
    #[display("cache error")]
    Cache,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AdapterResolution(_))
    }
}
