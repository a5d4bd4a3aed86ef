//! CLI Error Types

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the store")]
    Store,
    #[display("cache operation failed")]
    Cache,
    #[display("{_0}")]
    Usage(#[error(not(source))] &'static str),
}
