//! Collaborators consumed by the storybook orchestrator.
//!
//! The orchestrator never parses documents, decodes audio or touches
//! storage itself. It drives three collaborators through the traits in this
//! crate:
//!
//! - [`PageProvider`]: opens a document, resolves page handles and paints
//!   them onto an output [`Surface`].
//! - [`AudioSink`]: a single playable narration channel.
//! - [`KeyValueStore`]: small synchronous persistence for session state.
//!
//! In-memory test doubles live behind the `mock` feature.

pub mod audio;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod page;
pub mod store;

pub use crate::audio::{AudioSink, PreloadedAudio};
pub use crate::page::{PageHandle, PageProvider, Surface};
pub use crate::store::{FileStore, KeyValueStore, MemoryStore};
use std::sync::Arc;

pub type PageProviderHandle = Arc<dyn PageProvider>;
pub type AudioSinkHandle = Arc<dyn AudioSink>;
pub type StoreHandle = Arc<dyn KeyValueStore>;
