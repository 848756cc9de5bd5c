//! Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An orchestration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Only [`ProviderUnavailable`](Self::ProviderUnavailable) ends a session;
/// everything else is reported as a [`Notice`](crate::Notice) (or dropped,
/// for persisted state) and leaves the engine ready for the next request.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document could not be opened.
    #[display("document could not be opened")]
    ProviderUnavailable,
    /// A page handle could not be resolved; the current page is unchanged.
    #[display("page {_0} could not be loaded")]
    PageResolutionFailed(#[error(not(source))] u32),
    /// A page failed to paint; the current page is unchanged.
    #[display("page {_0} could not be displayed")]
    RenderFailed(#[error(not(source))] u32),
    /// The narration clip reported an error while loading.
    #[display("narration could not be loaded: {_0}")]
    AudioLoadFailed(#[error(not(source))] String),
    /// The narration clip did not become playable in time.
    #[display("narration timed out while loading: {_0}")]
    AudioLoadTimeout(#[error(not(source))] String),
    /// Playback needs a user gesture first.
    #[display("playback blocked until sound is enabled")]
    AutoplayBlocked,
    /// The saved session is malformed, stale or does not fit the document.
    #[display("saved session state is invalid")]
    PersistedStateInvalid,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable
                | Self::PageResolutionFailed(_)
                | Self::RenderFailed(_)
                | Self::AudioLoadFailed(_)
                | Self::AudioLoadTimeout(_)
        )
    }
}
