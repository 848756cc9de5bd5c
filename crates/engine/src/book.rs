use crate::audio::{Narrator, SyncOutcome};
use crate::error::{ErrorKind, Result};
use crate::notice::{Notice, Notices, Notifier};
use crate::render::{RenderOutcome, RenderState};
use crate::session::{SessionState, SessionTracker};
use exn::ResultExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use storybook_config::{Config, EngineSettings};
use storybook_layout::{next_logical_page, pages_shown, prev_logical_page};
use storybook_prefetch::SharedCache;
use storybook_provider::{AudioSinkHandle, PageHandle, PageProviderHandle, StoreHandle};
use tokio::task::JoinSet;
use tracing::instrument;

/// The external services a [`Storybook`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: PageProviderHandle,
    pub audio: AudioSinkHandle,
    pub store: StoreHandle,
}

pub(crate) struct Inner {
    pub(crate) provider: PageProviderHandle,
    pub(crate) narrator: Narrator,
    pub(crate) session: SessionTracker,
    pub(crate) pages: SharedCache<u32, PageHandle>,
    pub(crate) settings: EngineSettings,
    pub(crate) total_pages: u32,
    pub(crate) state: Mutex<RenderState>,
    pub(crate) token: AtomicU64,
    /// Bumped by every committed render; narration syncs check against it.
    pub(crate) committed: AtomicU64,
    pub(crate) unlocked: AtomicBool,
    pub(crate) notices: Notifier,
    tasks: Mutex<JoinSet<()>>,
}

/// One open document and its reading session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Storybook {
    pub(crate) inner: Arc<Inner>,
}

impl Storybook {
    /// Open the configured document.
    ///
    /// Applies the book's `start_muted` setting to the audio sink. Nothing is
    /// rendered until [`start`](Self::start).
    ///
    /// # Errors
    /// [`ProviderUnavailable`](ErrorKind::ProviderUnavailable) when the
    /// document cannot be opened or has no pages. This is the only failure
    /// that ends a session.
    #[instrument(skip_all, fields(source = %config.book.pdf))]
    pub async fn open(config: Config, collaborators: Collaborators) -> Result<(Self, Notices)> {
        let Config { book, audio_map, engine } = config;
        let Collaborators { provider, audio, store } = collaborators;

        let total_pages = provider.open(&book.pdf).await.or_raise(|| ErrorKind::ProviderUnavailable)?;
        if total_pages == 0 {
            exn::bail!(ErrorKind::ProviderUnavailable);
        }
        audio.set_muted(book.start_muted);
        tracing::info!(total_pages, title = %book.title, "Document opened");

        let (notices, receiver) = Notifier::channel();
        let session = SessionTracker::new(store, engine.storage_key.clone(), engine.session_max_age());
        let narrator = Narrator::new(
            audio,
            book,
            audio_map,
            engine.audio_cache_bound,
            engine.audio_load_timeout(),
            notices.clone(),
        );
        let inner = Inner {
            provider,
            narrator,
            session,
            pages: SharedCache::new(engine.page_cache_bound),
            state: Mutex::new(RenderState::new(engine.initial_scale)),
            settings: engine,
            total_pages,
            token: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            unlocked: AtomicBool::new(false),
            notices,
            tasks: Mutex::new(JoinSet::new()),
        };
        Ok((Self { inner: Arc::new(inner) }, receiver))
    }

    /// Show the cover, then resume the saved session if there is a usable one.
    ///
    /// The saved state is read before the cover is rendered, since rendering
    /// persists a fresh state. Restoring applies the saved mute and scale and
    /// navigates to the saved page; it never unlocks narration.
    pub async fn start(&self) -> RenderOutcome {
        let saved = self.inner.session.restore(self.inner.total_pages);
        let outcome = self.render_page(1, false).await;
        let Some(saved) = saved else {
            return outcome;
        };
        tracing::info!(page = saved.current_page, muted = saved.muted, scale = saved.scale, "Restoring session");
        self.inner.narrator.sink.set_muted(saved.muted);
        self.lock_state().scale = saved.scale;
        self.go_to_page(saved.current_page).await
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RenderState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_live(&self, token: u64) -> bool {
        self.inner.token.load(Ordering::SeqCst) == token
    }

    /// Whether no render has committed since the one that produced `generation`.
    pub(crate) fn is_current_view(&self, generation: u64) -> bool {
        self.inner.committed.load(Ordering::SeqCst) == generation
    }

    /// Run `task` in the background; [`idle`](Self::idle) waits for it.
    ///
    /// A task holds its own handle to the session, so it runs to completion
    /// even when every [`Storybook`] clone the host holds has been dropped.
    pub(crate) fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set does not grow with every page turn.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Wait for every background task (prefetch, narration sync, narration
    /// preload) spawned so far, including tasks they spawn in turn.
    ///
    /// Dropping this future before it resolves leaves the tasks it was
    /// waiting on running, but later calls no longer wait for them.
    pub async fn idle(&self) {
        loop {
            let taken = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if taken.is_empty() {
                return;
            }
            let mut tasks = Detached(taken);
            while let Some(result) = tasks.0.join_next().await {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "Background task did not complete");
                }
            }
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.inner.total_pages
    }

    /// The page of the last successful render.
    pub fn current_page(&self) -> u32 {
        self.lock_state().current_page
    }

    pub fn scale(&self) -> f32 {
        self.lock_state().scale
    }

    pub fn is_rendering(&self) -> bool {
        self.lock_state().is_rendering
    }

    /// The pages on screen for the current page.
    pub fn pages_shown(&self) -> Vec<u32> {
        pages_shown(self.current_page(), self.inner.total_pages)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Page numbers held by the page prefetch cache, oldest first.
    pub fn cached_pages(&self) -> Vec<u32> {
        self.inner.pages.keys()
    }

    /// Page numbers with preloaded narration, oldest first.
    pub fn preloaded_narration(&self) -> Vec<u32> {
        self.inner.narrator.preloaded.keys()
    }

    // Navigation

    /// Render `page`. Out-of-range pages are ignored.
    pub async fn go_to_page(&self, page: u32) -> RenderOutcome {
        if !(1..=self.inner.total_pages).contains(&page) {
            tracing::debug!(page, total_pages = self.inner.total_pages, "Ignoring out-of-range page");
            return RenderOutcome::Ignored;
        }
        self.render_page(page, false).await
    }

    fn next_target(&self) -> Option<u32> {
        let current = self.current_page();
        next_logical_page(current, self.inner.total_pages).filter(|&next| next != current)
    }

    fn prev_target(&self) -> Option<u32> {
        let current = self.current_page();
        prev_logical_page(current, self.inner.total_pages).filter(|&prev| prev != current)
    }

    pub fn can_go_next(&self) -> bool {
        self.next_target().is_some()
    }

    pub fn can_go_prev(&self) -> bool {
        self.prev_target().is_some()
    }

    /// Turn forward one spread.
    pub async fn next_page(&self) -> RenderOutcome {
        match self.next_target() {
            Some(next) => self.render_page(next, false).await,
            None => RenderOutcome::Ignored,
        }
    }

    /// Turn back one spread.
    pub async fn prev_page(&self) -> RenderOutcome {
        match self.prev_target() {
            Some(prev) => self.render_page(prev, false).await,
            None => RenderOutcome::Ignored,
        }
    }

    /// Change the zoom and re-render.
    ///
    /// The target is the page a queued or in-flight render is heading to,
    /// falling back to the current page when nothing is rendering.
    pub async fn set_scale(&self, scale: f32) -> RenderOutcome {
        if !scale.is_finite() || scale <= 0.0 {
            tracing::debug!(scale, "Ignoring invalid scale");
            return RenderOutcome::Ignored;
        }
        let target = {
            let mut state = self.lock_state();
            state.scale = scale;
            state.pending_page.or(state.in_flight_page).unwrap_or(state.current_page)
        };
        self.render_page(target, false).await
    }

    // Narration

    /// Record that the reader made a gesture that allows sound.
    ///
    /// Only later narration syncs are affected; nothing starts playing here.
    pub fn unlock_narration(&self) {
        if !self.inner.unlocked.swap(true, Ordering::SeqCst) {
            tracing::debug!("Narration unlocked");
        }
    }

    /// The reader accepted the prompt to enable sound: unlock narration and
    /// start a clip that is loaded but paused.
    pub async fn enable_sound(&self) {
        self.unlock_narration();
        let sink = &self.inner.narrator.sink;
        if sink.source().is_some() && sink.is_paused() {
            if let Err(err) = sink.play().await {
                tracing::warn!(error = ?err, "Narration could not start after unlock");
            }
        }
    }

    pub fn narration_unlocked(&self) -> bool {
        self.inner.unlocked.load(Ordering::SeqCst)
    }

    /// Flip the sink's mute state and persist it. Returns the new state.
    pub fn toggle_mute(&self) -> bool {
        let sink = &self.inner.narrator.sink;
        let muted = !sink.is_muted();
        sink.set_muted(muted);
        let (page, scale) = {
            let state = self.lock_state();
            (state.current_page, state.scale)
        };
        self.inner.session.persist(&SessionState::capture(page, muted, scale));
        muted
    }

    pub fn is_muted(&self) -> bool {
        self.inner.narrator.sink.is_muted()
    }

    /// Play when paused, pause when playing. Returns whether narration is
    /// playing afterwards.
    pub async fn toggle_play_pause(&self) -> bool {
        let sink = &self.inner.narrator.sink;
        if sink.source().is_none() {
            self.inner.notices.send(Notice::NothingToPlay);
            return false;
        }
        if !sink.is_paused() {
            sink.pause();
            return false;
        }
        match sink.play().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = ?err, "Narration could not start");
                if !self.narration_unlocked() {
                    self.inner.notices.send(Notice::EnableSound);
                }
                false
            },
        }
    }

    /// Replay the narration of the current view from the start.
    ///
    /// Counts as a user gesture.
    pub async fn replay(&self) -> SyncOutcome {
        self.unlock_narration();
        self.inner.narrator.stop();
        let generation = self.inner.committed.load(Ordering::SeqCst);
        self.sync_narration(self.pages_shown(), generation).await
    }

    /// Sync narration for the view committed as `generation`. The sync stops
    /// once a newer render commits.
    pub(crate) async fn sync_narration(&self, shown: Vec<u32>, generation: u64) -> SyncOutcome {
        let unlocked = self.narration_unlocked();
        let live = || self.is_current_view(generation);
        self.inner.narrator.sync(&shown, self.inner.total_pages, unlocked, live).await
    }

    /// Host callback for the sink's end of playback. With `loop` configured
    /// the clip restarts; returns whether it did.
    pub async fn on_audio_ended(&self) -> bool {
        if !self.inner.narrator.loop_playback() {
            return false;
        }
        let sink = &self.inner.narrator.sink;
        sink.seek(0.0);
        match sink.play().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = ?err, "Narration could not loop");
                false
            },
        }
    }

    /// Host callback for the page being hidden or shown again.
    pub fn on_visibility_change(&self, hidden: bool) {
        let sink = &self.inner.narrator.sink;
        if hidden && !sink.is_paused() {
            sink.pause();
        }
    }

    /// Jump to `percent` (0-100) of the current clip, once its length is known.
    pub fn seek_percent(&self, percent: f64) {
        let sink = &self.inner.narrator.sink;
        if let Some(duration) = sink.duration().filter(|d| d.is_finite() && *d > 0.0) {
            sink.seek(duration / 100.0 * percent.clamp(0.0, 100.0));
        }
    }

    pub fn playback(&self) -> Playback {
        let sink = &self.inner.narrator.sink;
        Playback { position: sink.current_time(), duration: sink.duration(), playing: !sink.is_paused() }
    }
}

/// Detaches whatever is left in the set when dropped, since dropping a
/// `JoinSet` aborts its tasks.
struct Detached(JoinSet<()>);

impl Drop for Detached {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

/// A snapshot of the narration progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Playback {
    /// Seconds into the clip.
    pub position: f64,
    pub duration: Option<f64>,
    pub playing: bool,
}

impl Playback {
    /// Progress through the clip, 0-100, once its length is known.
    pub fn percent(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0).map(|d| self.position / d * 100.0)
    }
}

impl std::fmt::Display for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", format_time(self.position), format_time(self.duration.unwrap_or(f64::NAN)))
    }
}

/// Format seconds as `m:ss`. Unknown (non-finite) times show as `0:00`.
///
/// ```
/// assert_eq!(storybook_engine::format_time(75.9), "1:15");
/// assert_eq!(storybook_engine::format_time(f64::NAN), "0:00");
/// ```
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "0:00".to_string();
    }
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
