//! Pagination and render orchestration for audio storybooks.
//!
//! A [`Storybook`] owns one open document and coordinates everything that
//! happens when the reader turns a page:
//!
//! 1. the requested page is mapped to a spread (`storybook-layout`),
//! 2. the spread's pages are resolved (from the prefetch cache when
//!    possible) and painted by the [`PageProvider`](storybook_provider::PageProvider),
//! 3. the narration for the visible pages is loaded and, once the reader
//!    has made a gesture, played,
//! 4. the session is persisted and neighbouring pages and narration are
//!    prefetched in the background.
//!
//! Overlapping requests are settled with a render token: every render
//! captures a fresh token and only the render still holding the latest
//! token may change what is displayed. Requests made while a render is in
//! flight collapse into a single follow-up for the most recent target.
//!
//! Conditions the reader should hear about arrive as [`Notice`]s on the
//! channel returned by [`Storybook::open`].

pub mod audio;
mod book;
pub mod error;
pub mod input;
mod notice;
mod render;
pub mod session;
#[cfg(test)]
mod testing;

pub use crate::audio::{SyncOutcome, preload_source, select_clip};
pub use crate::book::{Collaborators, Playback, Storybook, format_time};
pub use crate::input::{Command, SwipeTracker};
pub use crate::notice::{Notice, Notices};
pub use crate::render::RenderOutcome;
pub use crate::session::{SessionState, SessionTracker};
