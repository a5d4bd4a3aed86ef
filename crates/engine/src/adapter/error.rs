//! Source Adapter Error Types

use derive_more::{Display, Error};
use shelf_models::MangaId;

/// An adapter error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source does not know the requested item (any more).
    #[display("item not found: {_0}")]
    NotFound(#[error(not(source))] MangaId),
    #[display("network error")]
    Network,
    /// The source answered, but not with anything usable.
    #[display("invalid response from source: {_0}")]
    InvalidResponse(#[error(not(source))] &'static str),
    /// The fetch did not settle within the configured bound.
    #[display("fetch timed out")]
    Timeout,
    /// The adapter cannot serve requests right now (not configured, logged
    /// out, rate limited).
    #[display("source unavailable")]
    Unavailable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Unavailable)
    }
}
