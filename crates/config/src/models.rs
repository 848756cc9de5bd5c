use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Everything the orchestrator reads at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub book: BookConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_map: Option<AudioMap>,
    #[serde(default)]
    pub engine: EngineSettings,
}

/// Presentation settings for one book.
///
/// Keys are snake_case so environment variables can reach them; the
/// camelCase spelling used by a book's `config.json` is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookConfig {
    /// Location of the document, handed to the page provider as-is.
    #[serde(default)]
    pub pdf: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, alias = "startMuted")]
    pub start_muted: bool,
    #[serde(default)]
    pub autoplay: bool,
    /// Restart narration when a clip ends.
    #[serde(default, rename = "loop")]
    pub loop_playback: bool,
    /// Per-page metadata keyed by page number.
    #[serde(default)]
    pub pages: BTreeMap<String, PageMeta>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            pdf: String::new(),
            title: default_title(),
            start_muted: false,
            autoplay: false,
            loop_playback: false,
            pages: BTreeMap::new(),
        }
    }
}

impl BookConfig {
    pub fn page(&self, number: u32) -> Option<&PageMeta> {
        self.pages.get(&number.to_string())
    }
}

fn default_title() -> String {
    "PDF Audio Storybook".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Which narration clip belongs to which pages.
///
/// Group order is priority order: the first matching group wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMap {
    #[serde(default)]
    pub groups: Vec<AudioGroup>,
    /// Played when no group matches the visible pages.
    #[serde(default, alias = "defaultFlipSound", skip_serializing_if = "Option::is_none")]
    pub default_flip_sound: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioGroup {
    #[serde(default)]
    pub pages: Vec<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl AudioGroup {
    pub fn contains_page(&self, page: u32) -> bool {
        self.pages.contains(&PageRef::Page(page))
    }

    pub fn contains_last_even(&self) -> bool {
        self.pages.contains(&PageRef::LastEven(LastEven::LastEven))
    }
}

/// An entry of [`AudioGroup::pages`]: a page number or the `"last-even"`
/// marker for the single trailing page of an even-length document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Page(u32),
    LastEven(LastEven),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastEven {
    #[serde(rename = "last-even")]
    LastEven,
}

impl PageRef {
    pub const LAST_EVEN: PageRef = PageRef::LastEven(LastEven::LastEven);
}

/// Orchestrator tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum resolved page handles kept by the page prefetcher.
    pub page_cache_bound: usize,
    /// Maximum preloaded narration clips.
    pub audio_cache_bound: usize,
    /// How many pages either side of the current one are prefetched.
    pub prefetch_distance: u32,
    pub audio_load_timeout_secs: u64,
    /// Saved sessions older than this are ignored.
    pub session_max_age_days: u64,
    pub initial_scale: f32,
    /// Key the session state is persisted under.
    pub storage_key: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_cache_bound: 6,
            audio_cache_bound: 3,
            prefetch_distance: 2,
            audio_load_timeout_secs: 10,
            session_max_age_days: 7,
            initial_scale: 1.5,
            storage_key: "pdf-storybook-state".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn audio_load_timeout(&self) -> Duration {
        Duration::from_secs(self.audio_load_timeout_secs)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_days.saturating_mul(24 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_audio_map_from_json() {
        let map: AudioMap = serde_json::from_str(
            r#"{
                "groups": [
                    {"pages": ["last-even"], "audio": "end.mp3"},
                    {"pages": [2, 3], "audio": "spread1.mp3"},
                    {"pages": [4]}
                ],
                "defaultFlipSound": "flip.mp3"
            }"#,
        )
        .unwrap();
        assert_eq!(map.groups.len(), 3);
        assert!(map.groups[0].contains_last_even());
        assert!(!map.groups[0].contains_page(2));
        assert!(map.groups[1].contains_page(3));
        assert_eq!(map.groups[2].audio, None);
        assert_eq!(map.default_flip_sound.as_deref(), Some("flip.mp3"));
    }

    #[rstest]
    #[case(r#"7"#, PageRef::Page(7))]
    #[case(r#""last-even""#, PageRef::LAST_EVEN)]
    fn test_page_ref_deserialize(#[case] input: &str, #[case] expected: PageRef) {
        assert_eq!(serde_json::from_str::<PageRef>(input).unwrap(), expected);
    }

    #[test]
    fn test_page_ref_rejects_unknown_marker() {
        assert!(serde_json::from_str::<PageRef>(r#""first-odd""#).is_err());
    }

    #[test]
    fn test_book_config_from_camel_case_json() {
        let book: BookConfig = serde_json::from_str(
            r#"{
                "pdf": "assets/book.pdf",
                "startMuted": true,
                "autoplay": true,
                "loop": true,
                "pages": {"3": {"audio": "p3.mp3"}}
            }"#,
        )
        .unwrap();
        assert_eq!(book.title, "PDF Audio Storybook");
        assert!(book.start_muted && book.autoplay && book.loop_playback);
        assert_eq!(book.page(3).and_then(|p| p.audio.as_deref()), Some("p3.mp3"));
        assert_eq!(book.page(4), None);
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineSettings::default();
        assert_eq!(engine.audio_load_timeout(), Duration::from_secs(10));
        assert_eq!(engine.session_max_age(), Duration::from_secs(7 * 86_400));
    }
}
