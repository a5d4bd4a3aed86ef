//! Configuration Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source could not be read or did not match the schema.
    #[display("could not load configuration")]
    Load,
    /// A value parsed, but is outside what the application accepts.
    #[display("invalid configuration value for `{_0}`")]
    InvalidValue(#[error(not(source))] &'static str),
    /// No platform directory could be determined for defaults.
    #[display("could not determine platform directories")]
    NoHomeDirectory,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
