//! Narration selection and playback.

use crate::error::ErrorKind;
use crate::notice::{Notice, Notifier};
use std::time::Duration;
use storybook_config::{AudioMap, BookConfig};
use storybook_layout::{next_logical_page, pages_shown, shows_trailing_single};
use storybook_prefetch::SharedCache;
use storybook_provider::error::ErrorKind as ProviderErrorKind;
use storybook_provider::{AudioSinkHandle, PreloadedAudio};
use tracing::instrument;

/// Pick the narration clip for the visible pages.
///
/// Groups are tried in order and the first match wins. The single trailing
/// page of an even-length document first looks for a group carrying the
/// `"last-even"` marker. Groups without a clip never match. Without a match
/// the map's default flip sound is used, if any.
pub fn select_clip<'a>(pages_shown: &[u32], total_pages: u32, audio_map: Option<&'a AudioMap>) -> Option<&'a str> {
    let map = audio_map?;
    let last_even = shows_trailing_single(pages_shown, total_pages)
        .then(|| map.groups.iter().find(|group| group.contains_last_even()))
        .flatten()
        .and_then(|group| group.audio.as_deref());
    last_even
        .or_else(|| {
            map.groups
                .iter()
                .filter(|group| group.audio.is_some())
                .find(|group| pages_shown.iter().any(|&page| group.contains_page(page)))
                .and_then(|group| group.audio.as_deref())
        })
        .or(map.default_flip_sound.as_deref())
}

/// The clip worth preloading for the view at `page`: the page's own
/// narration from the book metadata, else whatever the audio map selects.
pub fn preload_source<'a>(
    page: u32,
    total_pages: u32,
    book: &'a BookConfig,
    audio_map: Option<&'a AudioMap>,
) -> Option<&'a str> {
    book.page(page)
        .and_then(|meta| meta.audio.as_deref())
        .or_else(|| select_clip(&pages_shown(page, total_pages), total_pages, audio_map))
}

/// How a narration sync ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The clip is loaded and playing.
    Playing(String),
    /// The clip is loaded but was not started (narration locked, muted,
    /// autoplay off, or autoplay refused).
    Ready(String),
    /// The view has no narration.
    Silent,
    /// The clip could not be loaded in time.
    Failed(String),
    /// A newer view was committed before the sync finished.
    Superseded,
}

/// Drives the single audio sink on behalf of the engine.
pub(crate) struct Narrator {
    pub(crate) sink: AudioSinkHandle,
    pub(crate) preloaded: SharedCache<u32, PreloadedAudio>,
    audio_map: Option<AudioMap>,
    book: BookConfig,
    load_timeout: Duration,
    notices: Notifier,
}

impl Narrator {
    pub(crate) fn new(
        sink: AudioSinkHandle,
        book: BookConfig,
        audio_map: Option<AudioMap>,
        cache_bound: usize,
        load_timeout: Duration,
        notices: Notifier,
    ) -> Self {
        Self { sink, preloaded: SharedCache::new(cache_bound), audio_map, book, load_timeout, notices }
    }

    pub(crate) fn loop_playback(&self) -> bool {
        self.book.loop_playback
    }

    /// Pause and rewind.
    pub(crate) fn stop(&self) {
        if !self.sink.is_paused() {
            self.sink.pause();
        }
        self.sink.seek(0.0);
    }

    /// Load and, when allowed, start the narration for `pages_shown`.
    ///
    /// `live` reports whether the view this sync belongs to is still the one
    /// on screen; it is checked after every suspension point.
    #[instrument(skip_all, fields(pages = ?pages_shown))]
    pub(crate) async fn sync(
        &self,
        pages_shown: &[u32],
        total_pages: u32,
        unlocked: bool,
        live: impl Fn() -> bool,
    ) -> SyncOutcome {
        if !live() {
            return SyncOutcome::Superseded;
        }
        self.stop();
        let Some(url) = select_clip(pages_shown, total_pages, self.audio_map.as_ref()).map(str::to_string) else {
            tracing::debug!("No narration for this view");
            self.notices.send(Notice::NoNarration);
            return SyncOutcome::Silent;
        };

        self.sink.set_source(&url);
        let loaded = tokio::time::timeout(self.load_timeout, self.sink.load()).await;
        if !live() {
            return SyncOutcome::Superseded;
        }
        match loaded {
            Ok(Ok(())) => {},
            Ok(Err(err)) => {
                tracing::warn!(url = %url, error = ?err, "Narration failed to load");
                self.notices.warn(ErrorKind::AudioLoadFailed(url.clone()));
                return SyncOutcome::Failed(url);
            },
            Err(_) => {
                tracing::warn!(url = %url, timeout = ?self.load_timeout, "Narration load timed out");
                self.notices.warn(ErrorKind::AudioLoadTimeout(url.clone()));
                return SyncOutcome::Failed(url);
            },
        }

        if !(unlocked && !self.sink.is_muted() && self.book.autoplay) {
            return SyncOutcome::Ready(url);
        }
        match self.sink.play().await {
            Ok(()) => SyncOutcome::Playing(url),
            Err(err) if *err == ProviderErrorKind::AutoplayBlocked => {
                tracing::info!(url = %url, "Autoplay blocked, waiting for a user gesture");
                self.notices.send(Notice::EnableSound);
                SyncOutcome::Ready(url)
            },
            Err(err) => {
                tracing::warn!(url = %url, error = ?err, "Narration failed to start");
                self.notices.warn(ErrorKind::AudioLoadFailed(url.clone()));
                SyncOutcome::Failed(url)
            },
        }
    }

    /// Preload the narration for the page after `current`, keyed by that page.
    ///
    /// Best-effort: returns whether a clip was inserted.
    #[instrument(skip(self))]
    pub(crate) async fn preload_next(&self, current: u32, total_pages: u32) -> bool {
        let Some(next) = next_logical_page(current, total_pages) else {
            return false;
        };
        if self.preloaded.has(&next) {
            return false;
        }
        let Some(url) = preload_source(next, total_pages, &self.book, self.audio_map.as_ref()).map(str::to_string)
        else {
            return false;
        };
        match self.sink.preload(&url).await {
            Ok(clip) => {
                if let Some(evicted) = self.preloaded.insert(next, clip) {
                    tracing::trace!(page = next, evicted, "Evicted preloaded narration");
                }
                true
            },
            Err(err) => {
                tracing::debug!(page = next, url = %url, error = ?err, "Narration preload failed");
                false
            },
        }
    }
}
