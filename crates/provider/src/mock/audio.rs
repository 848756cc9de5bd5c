//! In-memory audio sink for testing.

use crate::audio::{AudioSink, PreloadedAudio};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct State {
    source: Option<String>,
    paused: bool,
    muted: bool,
    position: f64,
    duration: Option<f64>,
    autoplay_blocked: bool,
    failing: HashSet<String>,
    stalling: HashSet<String>,
    loads: Vec<String>,
    plays: Vec<String>,
    preloads: Vec<String>,
}

/// In-memory audio sink for testing.
///
/// Every clip is [`CLIP_SECONDS`](Self::CLIP_SECONDS) long. Individual URLs
/// can be made to fail or to never become ready, and autoplay can be
/// refused to emulate a platform that requires a user gesture.
pub struct MockAudioSink {
    state: Mutex<State>,
}

impl MockAudioSink {
    pub const CLIP_SECONDS: f64 = 30.0;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                source: None,
                paused: true,
                muted: false,
                position: 0.0,
                duration: None,
                autoplay_blocked: false,
                failing: HashSet::new(),
                stalling: HashSet::new(),
                loads: Vec::new(),
                plays: Vec::new(),
                preloads: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loading or preloading `url` fails.
    pub fn fail_load(&self, url: impl Into<String>) {
        self.state().failing.insert(url.into());
    }

    /// Loading `url` never signals readiness.
    pub fn stall_load(&self, url: impl Into<String>) {
        self.state().stalling.insert(url.into());
    }

    /// Refuse [`play`](AudioSink::play) as a platform autoplay policy would.
    pub fn block_autoplay(&self, blocked: bool) {
        self.state().autoplay_blocked = blocked;
    }

    /// Sources passed to [`load`](AudioSink::load), in call order.
    pub fn loads(&self) -> Vec<String> {
        self.state().loads.clone()
    }

    /// Sources that started playing, in call order.
    pub fn plays(&self) -> Vec<String> {
        self.state().plays.clone()
    }

    /// URLs passed to [`preload`](AudioSink::preload), in call order.
    pub fn preloads(&self) -> Vec<String> {
        self.state().preloads.clone()
    }

    /// Emulate the clip playing to its end.
    pub fn finish(&self) {
        let mut state = self.state();
        state.paused = true;
        state.position = state.duration.unwrap_or(0.0);
    }
}

impl Default for MockAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for MockAudioSink {
    fn source(&self) -> Option<String> {
        self.state().source.clone()
    }

    fn set_source(&self, url: &str) {
        let mut state = self.state();
        state.source = Some(url.to_string());
        state.duration = None;
        state.position = 0.0;
    }

    async fn load(&self) -> Result<()> {
        let (source, stall) = {
            let mut state = self.state();
            let Some(source) = state.source.clone() else {
                exn::bail!(ErrorKind::Audio("no source assigned".to_string()));
            };
            state.loads.push(source.clone());
            let stall = state.stalling.contains(&source);
            (source, stall)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        let mut state = self.state();
        if state.failing.contains(&source) {
            exn::bail!(ErrorKind::Audio(format!("cannot decode {source}")));
        }
        state.duration = Some(Self::CLIP_SECONDS);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.state();
        let Some(source) = state.source.clone() else {
            exn::bail!(ErrorKind::Audio("no source assigned".to_string()));
        };
        if state.autoplay_blocked {
            exn::bail!(ErrorKind::AutoplayBlocked);
        }
        state.paused = false;
        state.plays.push(source);
        Ok(())
    }

    fn pause(&self) {
        self.state().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn is_muted(&self) -> bool {
        self.state().muted
    }

    fn set_muted(&self, muted: bool) {
        self.state().muted = muted;
    }

    fn current_time(&self) -> f64 {
        self.state().position
    }

    fn seek(&self, seconds: f64) {
        self.state().position = seconds;
    }

    fn duration(&self) -> Option<f64> {
        self.state().duration
    }

    async fn preload(&self, url: &str) -> Result<PreloadedAudio> {
        let mut state = self.state();
        if state.failing.contains(url) {
            exn::bail!(ErrorKind::Audio(format!("cannot fetch {url}")));
        }
        state.preloads.push(url.to_string());
        Ok(PreloadedAudio { url: url.to_string(), duration: Some(Self::CLIP_SECONDS) })
    }
}
