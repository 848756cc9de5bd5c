//! Narration audio sink interface.

use crate::error::Result;
use async_trait::async_trait;

/// A clip fetched ahead of time so that switching to it is instant.
#[derive(Clone, Debug, PartialEq)]
pub struct PreloadedAudio {
    pub url: String,
    /// Clip length in seconds, when the sink could determine it.
    pub duration: Option<f64>,
}

/// A single playable audio channel.
///
/// The sink holds one mutable source at a time. Loading resolves once the
/// sink signals it can play (`canplay`) and fails when it signals `error`;
/// the end of playback (`ended`) is reported by the host to the
/// orchestrator directly.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Currently assigned clip, if any.
    fn source(&self) -> Option<String>;

    /// Replace the current clip. Does not start loading.
    fn set_source(&self, url: &str);

    /// Load the current source; resolves when it is ready to play.
    ///
    /// Returns [`Audio`](crate::error::ErrorKind::Audio) when the clip
    /// cannot be loaded. Callers impose their own timeout.
    async fn load(&self) -> Result<()>;

    /// Start playback of the current source.
    ///
    /// Returns [`AutoplayBlocked`](crate::error::ErrorKind::AutoplayBlocked)
    /// when the platform requires a user gesture first.
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    fn seek(&self, seconds: f64);

    /// Length of the current clip in seconds, once known.
    fn duration(&self) -> Option<f64>;

    /// Fetch `url` in the background without touching the current source.
    async fn preload(&self, url: &str) -> Result<PreloadedAudio>;
}
