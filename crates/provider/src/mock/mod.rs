//! In-memory collaborators for testing.
//!
//! [`MockDocument`] can park a page's resolution or paint behind a gate
//! (see [`Stage`]) so tests decide exactly when each asynchronous step
//! completes. [`MockAudioSink`] records every load, play and preload and
//! can be told to fail, stall or refuse autoplay.

mod audio;
mod document;

pub use self::audio::MockAudioSink;
pub use self::document::{MockDocument, Paint, Stage};
