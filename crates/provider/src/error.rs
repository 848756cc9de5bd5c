//! Provider Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A provider error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested page index is outside the document.
    #[display("page not found: {_0}")]
    NotFound(#[error(not(source))] u32),
    /// Transport or parse failure while opening a document or resolving a page.
    #[display("load error: {_0}")]
    Load(#[error(not(source))] String),
    /// Painting a page onto its surface failed.
    #[display("render error: {_0}")]
    Render(#[error(not(source))] String),
    /// The audio sink could not load or preload a clip.
    #[display("audio error: {_0}")]
    Audio(#[error(not(source))] String),
    /// The platform refused to start playback without a user gesture.
    #[display("playback blocked by autoplay policy")]
    AutoplayBlocked,
    /// Key-value store could not be read or written.
    #[display("store error: {_0}")]
    Store(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Render(_) | Self::Audio(_) | Self::Store(_))
    }
}
