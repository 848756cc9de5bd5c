//! Shared fixtures for engine tests.

use crate::{Collaborators, Notices, Storybook};
use std::sync::Arc;
use storybook_config::{AudioGroup, AudioMap, Config, PageRef};
use storybook_provider::MemoryStore;
use storybook_provider::mock::{MockAudioSink, MockDocument};

pub(crate) struct Harness {
    pub(crate) book: Storybook,
    pub(crate) doc: Arc<MockDocument>,
    pub(crate) sink: Arc<MockAudioSink>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) notices: Notices,
}

/// Autoplaying book whose first spread and trailing single page are narrated.
pub(crate) fn story_config() -> Config {
    let mut config = Config::default();
    config.book.pdf = "book.pdf".to_string();
    config.book.autoplay = true;
    config.audio_map = Some(AudioMap {
        groups: vec![
            AudioGroup { pages: vec![PageRef::LAST_EVEN], audio: Some("end.mp3".to_string()) },
            AudioGroup { pages: vec![PageRef::Page(2), PageRef::Page(3)], audio: Some("spread1.mp3".to_string()) },
        ],
        default_flip_sound: None,
    });
    config
}

pub(crate) async fn harness_with(total_pages: u32, config: Config, store: Arc<MemoryStore>) -> Harness {
    let doc = Arc::new(MockDocument::new(total_pages));
    let sink = Arc::new(MockAudioSink::new());
    let collaborators = Collaborators { provider: doc.clone(), audio: sink.clone(), store: store.clone() };
    let (book, notices) = Storybook::open(config, collaborators).await.unwrap();
    Harness { book, doc, sink, store, notices }
}

pub(crate) async fn harness(total_pages: u32) -> Harness {
    harness_with(total_pages, story_config(), Arc::new(MemoryStore::new())).await
}
