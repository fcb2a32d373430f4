//! Error types for the phasestretch crate.

use thiserror::Error;

use crate::io::FileId;

/// Errors that can occur while configuring a stretcher or stretching a file.
///
/// The streaming core never fails once constructed; these are raised at
/// construction time or by the file driver and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StretchError {
    /// Invalid audio format or parameters.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// Invalid stretch ratio.
    #[error("invalid stretch ratio: {0}")]
    InvalidRatio(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),
    /// The file manager has no source registered under this id.
    #[error("source audio file {0} not found")]
    SourceNotFound(FileId),
    /// The destination file could not be created or written.
    #[error("cannot create destination: {0}")]
    Destination(String),
    /// A source failed to decode data it had already accepted.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// The user cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for StretchError {
    fn from(err: std::io::Error) -> Self {
        StretchError::IoError(err.to_string())
    }
}

impl From<hound::Error> for StretchError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => StretchError::IoError(e.to_string()),
            hound::Error::FormatError(msg) => StretchError::InvalidFormat(msg.to_string()),
            other => StretchError::InvalidFormat(other.to_string()),
        }
    }
}
