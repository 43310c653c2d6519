//! The crate's error type.

use thiserror::Error;

/// Errors that cross the synthesis boundary.
///
/// Failing to learn a program is not an error: [`crate::Session::learn`] reports it as a
/// `LearnResult` without a program. Search caps being hit are folded into that same outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller asked for something the session is not ready for, such as running a program
    /// before learning one, or referenced a row the session does not know about.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Input data was rejected at ingestion.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Learning was abandoned by the caller or ran past its deadline.
    #[error("learning cancelled")]
    Cancelled,

    /// A program could not be converted to or from its structured representation.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }
}
