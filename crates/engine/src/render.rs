//! Render coordination.

use crate::book::Storybook;
use crate::error::{ErrorKind, Result};
use crate::session::SessionState;
use exn::ResultExt;
use futures::future::join_all;
use std::sync::atomic::Ordering;
use storybook_layout::{Spread, pages_shown, spread_for};
use storybook_prefetch::prefetch_around;
use storybook_provider::Surface;
use tracing::instrument;

#[derive(Debug)]
pub(crate) struct RenderState {
    pub(crate) current_page: u32,
    pub(crate) is_rendering: bool,
    /// Target of the render holding the busy flag.
    pub(crate) in_flight_page: Option<u32>,
    pub(crate) pending_page: Option<u32>,
    pub(crate) scale: f32,
}

impl RenderState {
    pub(crate) fn new(scale: f32) -> Self {
        Self { current_page: 1, is_rendering: false, in_flight_page: None, pending_page: None, scale }
    }
}

/// What a render request led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The page is on screen and is now the current page.
    Rendered(u32),
    /// Another render was in flight; the page will be rendered after it
    /// unless a later request replaces it.
    Queued,
    /// A newer render took over before this one finished; its result was
    /// discarded.
    Superseded(u32),
    /// Resolving or painting failed. A warning notice was sent and the
    /// current page is unchanged.
    Failed(u32),
    /// The request had no target (out of range, or nowhere to turn to).
    Ignored,
}

fn surface_for(spread: &Spread, page: u32) -> Surface {
    if spread.is_single() {
        Surface::Single
    } else if page % 2 == 0 {
        Surface::Left
    } else {
        Surface::Right
    }
}

impl Storybook {
    /// Render the spread containing `page`.
    ///
    /// While another render is in flight a non-forced request only records
    /// `page` as the pending target and returns [`Queued`](RenderOutcome::Queued);
    /// of several such requests only the last survives. A forced request
    /// starts immediately and makes any render in flight stale.
    ///
    /// When a render finishes and a different page is pending, this call
    /// renders that page too before returning. A pending request for the
    /// same page is only honoured when the scale changed in the meantime.
    /// The outcome describes the last render it ran.
    pub async fn render_page(&self, page: u32, force: bool) -> RenderOutcome {
        if !(1..=self.inner.total_pages).contains(&page) {
            return RenderOutcome::Ignored;
        }
        let (mut page, mut force) = (page, force);
        loop {
            let scale = {
                let mut state = self.lock_state();
                if state.is_rendering && !force {
                    tracing::debug!(page, "Render in flight, queueing");
                    state.pending_page = Some(page);
                    return RenderOutcome::Queued;
                }
                state.is_rendering = true;
                state.in_flight_page = Some(page);
                state.scale
            };

            let outcome = self.render_once(page, scale).await;

            let (pending, rescaled) = {
                let mut state = self.lock_state();
                state.is_rendering = false;
                state.in_flight_page = None;
                (state.pending_page.take(), state.scale != scale)
            };
            match pending {
                Some(next) if next != page || rescaled => {
                    tracing::debug!(from = page, to = next, "Draining queued render");
                    (page, force) = (next, false);
                },
                _ => return outcome,
            }
        }
    }

    #[instrument(skip(self), fields(token = tracing::field::Empty))]
    async fn render_once(&self, page: u32, scale: f32) -> RenderOutcome {
        let token = self.inner.token.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::Span::current().record("token", token);
        let total_pages = self.inner.total_pages;
        let spread = spread_for(page, total_pages);
        let shown = pages_shown(page, total_pages);
        tracing::debug!(kind = %spread.kind, pages = ?shown, scale, "Rendering spread");

        let paints = shown.iter().map(|&number| self.paint(number, surface_for(&spread, number), scale, token));
        let painted = join_all(paints).await.into_iter().collect::<Result<Vec<bool>>>();
        match painted {
            Ok(live) if live.iter().all(|&live| live) && self.is_live(token) => {},
            Ok(_) => {
                tracing::debug!("Render superseded");
                return RenderOutcome::Superseded(page);
            },
            Err(_) if !self.is_live(token) => {
                tracing::debug!("Render failed after being superseded");
                return RenderOutcome::Superseded(page);
            },
            Err(err) => {
                tracing::warn!(error = ?err, "Render failed");
                self.inner.notices.warn((*err).clone());
                return RenderOutcome::Failed(page);
            },
        }

        self.commit(page, shown);
        RenderOutcome::Rendered(page)
    }

    /// Resolve and paint one page. Returns `false` as soon as `token` is stale.
    async fn paint(&self, number: u32, surface: Surface, scale: f32, token: u64) -> Result<bool> {
        let provider = &self.inner.provider;
        let handle = match self.inner.pages.get(&number) {
            Some(handle) => handle,
            None => provider.get_page(number).await.or_raise(|| ErrorKind::PageResolutionFailed(number))?,
        };
        if !self.is_live(token) {
            return Ok(false);
        }
        provider.render(&handle, scale, surface).await.or_raise(|| ErrorKind::RenderFailed(number))?;
        Ok(self.is_live(token))
    }

    /// Apply a successful render and start its follow-up work.
    fn commit(&self, page: u32, shown: Vec<u32>) {
        let scale = {
            let mut state = self.lock_state();
            state.current_page = page;
            state.scale
        };
        let generation = self.inner.committed.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(page, generation, "Page rendered");

        let total_pages = self.inner.total_pages;
        let book = self.clone();
        self.spawn(async move {
            book.sync_narration(shown, generation).await;
        });

        let muted = self.inner.narrator.sink.is_muted();
        self.inner.session.persist(&SessionState::capture(page, muted, scale));

        let book = self.clone();
        self.spawn(async move {
            let distance = book.inner.settings.prefetch_distance;
            prefetch_around(book.inner.provider.as_ref(), &book.inner.pages, page, total_pages, distance).await;
        });
        let book = self.clone();
        self.spawn(async move {
            book.inner.narrator.preload_next(page, total_pages).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Notice;
    use crate::testing::harness;
    use storybook_provider::mock::{Paint, Stage};
    use storybook_provider::{AudioSink, KeyValueStore};

    fn painted_pages(paints: &[Paint]) -> Vec<u32> {
        let mut pages: Vec<u32> = paints.iter().map(|paint| paint.page).collect();
        pages.sort_unstable();
        pages
    }

    #[tokio::test]
    async fn test_render_dual_spread() {
        let h = harness(8).await;
        assert_eq!(h.book.render_page(5, false).await, RenderOutcome::Rendered(5));
        h.book.idle().await;

        let mut paints = h.doc.painted().await;
        paints.sort_by_key(|paint| paint.page);
        assert_eq!(
            paints,
            vec![
                Paint { page: 4, surface: Surface::Left, scale: 1.5 },
                Paint { page: 5, surface: Surface::Right, scale: 1.5 },
            ]
        );
        assert_eq!(h.book.current_page(), 5);
        assert!(!h.book.is_rendering());
    }

    #[tokio::test]
    async fn test_render_single_pages() {
        let h = harness(8).await;
        h.book.render_page(1, false).await;
        h.book.render_page(8, false).await;
        h.book.idle().await;
        let surfaces: Vec<_> = h.doc.painted().await.iter().map(|paint| (paint.page, paint.surface)).collect();
        assert_eq!(surfaces, vec![(1, Surface::Single), (8, Surface::Single)]);
    }

    #[tokio::test]
    async fn test_out_of_range_is_ignored() {
        let h = harness(8).await;
        assert_eq!(h.book.render_page(0, false).await, RenderOutcome::Ignored);
        assert_eq!(h.book.render_page(9, true).await, RenderOutcome::Ignored);
        assert!(h.doc.resolved().await.is_empty());
    }

    #[tokio::test]
    async fn test_newer_token_discards_older_render() {
        let h = harness(8).await;
        h.doc.hold(Stage::Resolve, 2).await;
        h.doc.hold(Stage::Resolve, 3).await;
        let first = tokio::spawn({
            let book = h.book.clone();
            async move { book.render_page(2, false).await }
        });
        h.doc.reached(Stage::Resolve, 2).await;
        h.doc.reached(Stage::Resolve, 3).await;

        assert_eq!(h.book.render_page(5, true).await, RenderOutcome::Rendered(5));
        h.doc.release(Stage::Resolve, 2).await;
        h.doc.release(Stage::Resolve, 3).await;
        assert_eq!(first.await.unwrap(), RenderOutcome::Superseded(2));
        h.book.idle().await;

        assert_eq!(painted_pages(&h.doc.painted().await), vec![4, 5]);
        assert_eq!(h.book.current_page(), 5);
        // Page 2's narration was never loaded.
        assert!(h.sink.loads().iter().all(|url| url != "spread1.mp3"));
        let saved = h.store.get("pdf-storybook-state").unwrap().unwrap();
        assert!(saved.contains("\"currentPage\":5"));
    }

    #[tokio::test]
    async fn test_stale_paint_is_discarded() {
        let h = harness(8).await;
        h.doc.hold(Stage::Paint, 1).await;
        let first = tokio::spawn({
            let book = h.book.clone();
            async move { book.render_page(1, false).await }
        });
        h.doc.reached(Stage::Paint, 1).await;
        assert_eq!(h.book.render_page(8, true).await, RenderOutcome::Rendered(8));
        h.doc.release(Stage::Paint, 1).await;

        // The paint itself completes, but its result is not applied.
        assert_eq!(first.await.unwrap(), RenderOutcome::Superseded(1));
        assert_eq!(h.book.current_page(), 8);
    }

    #[tokio::test]
    async fn test_busy_requests_coalesce_to_latest() {
        let h = harness(10).await;
        h.doc.hold(Stage::Resolve, 2).await;
        let first = tokio::spawn({
            let book = h.book.clone();
            async move { book.render_page(2, false).await }
        });
        h.doc.reached(Stage::Resolve, 2).await;
        assert!(h.book.is_rendering());

        assert_eq!(h.book.render_page(3, false).await, RenderOutcome::Queued);
        assert_eq!(h.book.render_page(4, false).await, RenderOutcome::Queued);
        h.doc.release(Stage::Resolve, 2).await;

        // The in-flight call drains the single pending request.
        assert_eq!(first.await.unwrap(), RenderOutcome::Rendered(4));
        h.book.idle().await;
        assert_eq!(painted_pages(&h.doc.painted().await), vec![2, 3, 4, 5]);
        assert_eq!(h.book.current_page(), 4);
    }

    #[tokio::test]
    async fn test_pending_same_page_is_not_rerendered() {
        let h = harness(10).await;
        h.doc.hold(Stage::Resolve, 6).await;
        let first = tokio::spawn({
            let book = h.book.clone();
            async move { book.render_page(6, false).await }
        });
        h.doc.reached(Stage::Resolve, 6).await;
        assert_eq!(h.book.render_page(6, false).await, RenderOutcome::Queued);
        h.doc.release(Stage::Resolve, 6).await;
        assert_eq!(first.await.unwrap(), RenderOutcome::Rendered(6));
        assert_eq!(painted_pages(&h.doc.painted().await), vec![6, 7]);
        assert_eq!(h.book.lock_state().pending_page, None);
    }

    #[tokio::test]
    async fn test_failures_release_busy_flag() {
        let mut h = harness(8).await;
        h.doc.fail(Stage::Paint, 3).await;
        h.doc.fail(Stage::Resolve, 5).await;

        assert_eq!(h.book.render_page(2, false).await, RenderOutcome::Failed(2));
        assert!(!h.book.is_rendering());
        assert_eq!(h.book.current_page(), 1);
        assert_eq!(h.notices.try_recv().ok(), Some(Notice::Warning(ErrorKind::RenderFailed(3))));

        assert_eq!(h.book.render_page(4, false).await, RenderOutcome::Failed(4));
        assert_eq!(h.notices.try_recv().ok(), Some(Notice::Warning(ErrorKind::PageResolutionFailed(5))));

        assert_eq!(h.book.render_page(6, false).await, RenderOutcome::Rendered(6));
        assert_eq!(h.book.current_page(), 6);
        assert_eq!(h.store.get("pdf-storybook-state").unwrap().map(|s| s.contains("\"currentPage\":6")), Some(true));
    }

    #[tokio::test]
    async fn test_failed_render_drains_pending() {
        let h = harness(8).await;
        h.doc.fail(Stage::Resolve, 2).await;
        h.doc.hold(Stage::Resolve, 2).await;
        let first = tokio::spawn({
            let book = h.book.clone();
            async move { book.render_page(2, false).await }
        });
        h.doc.reached(Stage::Resolve, 2).await;
        assert_eq!(h.book.render_page(6, false).await, RenderOutcome::Queued);
        h.doc.release(Stage::Resolve, 2).await;
        assert_eq!(first.await.unwrap(), RenderOutcome::Rendered(6));
    }

    #[tokio::test]
    async fn test_failed_render_keeps_narration_of_view_on_screen() {
        let h = harness(8).await;
        h.doc.fail(Stage::Resolve, 4).await;
        assert_eq!(h.book.render_page(2, false).await, RenderOutcome::Rendered(2));
        assert_eq!(h.book.render_page(4, false).await, RenderOutcome::Failed(4));
        h.book.idle().await;

        assert_eq!(h.book.pages_shown(), vec![2, 3]);
        assert_eq!(h.sink.source().as_deref(), Some("spread1.mp3"));
        assert!(h.sink.loads().contains(&"spread1.mp3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_commit_supersedes_narration() {
        let mut h = harness(8).await;
        h.sink.stall_load("spread1.mp3");
        assert_eq!(h.book.render_page(2, false).await, RenderOutcome::Rendered(2));
        assert_eq!(h.book.render_page(8, false).await, RenderOutcome::Rendered(8));
        h.book.idle().await;

        // The stalled sync for spread 2-3 gives up quietly once page 8 is on screen.
        assert_eq!(h.sink.source().as_deref(), Some("end.mp3"));
        while let Ok(notice) = h.notices.try_recv() {
            assert!(!matches!(notice, Notice::Warning(ErrorKind::AudioLoadTimeout(_))));
        }
    }

    #[tokio::test]
    async fn test_zoom_during_turn_keeps_target() {
        let h = harness(8).await;
        h.doc.hold(Stage::Resolve, 4).await;
        let turn = tokio::spawn({
            let book = h.book.clone();
            async move { book.render_page(4, false).await }
        });
        h.doc.reached(Stage::Resolve, 4).await;

        assert_eq!(h.book.set_scale(2.0).await, RenderOutcome::Queued);
        h.doc.release(Stage::Resolve, 4).await;
        assert_eq!(turn.await.unwrap(), RenderOutcome::Rendered(4));
        h.book.idle().await;

        assert_eq!(h.book.current_page(), 4);
        let paints = h.doc.painted().await;
        assert!(paints.iter().all(|paint| paint.page == 4 || paint.page == 5));
        for page in [4, 5] {
            let last = paints.iter().rev().find(|paint| paint.page == page).map(|paint| paint.scale);
            assert_eq!(last, Some(2.0));
        }
    }

    #[tokio::test]
    async fn test_zoom_during_rerender_is_painted() {
        let h = harness(8).await;
        h.book.render_page(4, false).await;
        h.book.idle().await;

        h.doc.hold(Stage::Paint, 4).await;
        let first_zoom = tokio::spawn({
            let book = h.book.clone();
            async move { book.set_scale(2.0).await }
        });
        h.doc.reached(Stage::Paint, 4).await;
        assert_eq!(h.book.set_scale(3.0).await, RenderOutcome::Queued);
        h.doc.release(Stage::Paint, 4).await;
        assert_eq!(first_zoom.await.unwrap(), RenderOutcome::Rendered(4));

        assert_eq!(h.book.scale(), 3.0);
        let paints = h.doc.painted().await;
        for page in [4, 5] {
            let last = paints.iter().rev().find(|paint| paint.page == page).map(|paint| paint.scale);
            assert_eq!(last, Some(3.0));
        }
        assert_eq!(paints.iter().filter(|paint| paint.scale == 2.0).count(), 2);
    }

    #[tokio::test]
    async fn test_render_prefetches_neighbours() {
        let h = harness(10).await;
        h.book.render_page(5, false).await;
        h.book.idle().await;
        assert_eq!(h.book.cached_pages(), vec![6, 4, 7, 3]);

        // Cached handles are not resolved again.
        h.book.render_page(6, false).await;
        h.book.idle().await;
        let resolved = h.doc.resolved().await;
        assert_eq!(resolved.iter().filter(|&&page| page == 7).count(), 1);
    }

    #[tokio::test]
    async fn test_render_narrates_and_preloads() {
        let h = harness(8).await;
        h.book.unlock_narration();
        h.book.render_page(2, false).await;
        h.book.idle().await;
        assert_eq!(h.sink.plays(), vec!["spread1.mp3".to_string()]);
        assert_eq!(h.sink.source().as_deref(), Some("spread1.mp3"));
        // Next logical page after 2 is 4, which has no narration.
        assert!(h.book.preloaded_narration().is_empty());

        h.book.render_page(6, false).await;
        h.book.idle().await;
        assert_eq!(h.book.preloaded_narration(), vec![8]);
    }
}
