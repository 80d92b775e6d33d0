//! Error types shared across the IAMF encoder crates.
//!
//! Every fallible operation returns [`Result`]; the first error
//! short-circuits its caller. Errors are never used for control flow.

use thiserror::Error;

/// Main error type for the IAMF encoder.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied data violates a documented invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal state makes the operation impossible.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The operation is not implemented (e.g. read paths of write-only OBUs).
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// A fixed-capacity buffer cannot hold the write.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// I/O errors from the underlying byte sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a failed precondition error.
    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Error::FailedPrecondition(msg.into())
    }

    /// Create an unimplemented error.
    pub fn unimplemented(msg: impl Into<String>) -> Self {
        Error::Unimplemented(msg.into())
    }

    /// Check if this is an invalid argument error.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }

    /// Check if this is a failed precondition error.
    #[must_use]
    pub fn is_failed_precondition(&self) -> bool {
        matches!(self, Error::FailedPrecondition(_))
    }

    /// Check if this is an unimplemented error.
    #[must_use]
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Error::Unimplemented(_))
    }
}
