//! Common error types used throughout shrinkray.
//!
//! These cover user-supplied values that fail to parse before a job can be
//! built: target sizes, codec names and container extensions.

/// Common error type for shrinkray.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The target size was not a positive whole number of megabytes.
    #[error("Invalid target size: {0:?}")]
    InvalidTargetSize(String),

    /// The codec name is not one of the supported encoders.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    /// The container extension is not one of the supported formats.
    #[error("Unknown container: {0}")]
    UnknownContainer(String),
}

impl Error {
    /// Create a new InvalidTargetSize error.
    pub fn invalid_target_size<S: Into<String>>(raw: S) -> Self {
        Self::InvalidTargetSize(raw.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
