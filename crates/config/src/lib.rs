//! Storybook configuration.
//!
//! A [`Config`] is layered with `figment`: built-in defaults, then an
//! optional file (TOML, JSON or YAML by extension), then `STORYBOOK_`
//! environment variables with `__` separating nested keys, e.g.
//! `STORYBOOK_ENGINE__PREFETCH_DISTANCE=3`.

pub mod error;
mod models;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
pub use models::{AudioGroup, AudioMap, BookConfig, Config, EngineSettings, LastEven, PageMeta, PageRef};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "STORYBOOK_";
const CONFIG_FILE_NAME: &str = "storybook.toml";
const SESSION_FILE_NAME: &str = "session.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "storybook")
}

/// Platform configuration file location, e.g. `~/.config/storybook/storybook.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Platform location of the file-backed session store.
pub fn default_session_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join(SESSION_FILE_NAME))
}

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let figment = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        _ => exn::bail!(ErrorKind::InvalidValue(format!("unsupported config format: {}", path.display()))),
    };
    Ok(figment)
}

impl Config {
    /// Resolve the configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform default file
    /// is merged when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Only engine defaults are serialized: book keys accept two spellings, and
        // a serialized `start_muted` next to a file's `startMuted` is a duplicate.
        let mut figment = Figment::from(Serialized::default("engine", EngineSettings::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = file_provider(figment, path)?;
            },
            None => {
                if let Some(default) = default_config_path().filter(|path| path.is_file()) {
                    tracing::debug!(path = %default.display(), "Using default config file");
                    figment = file_provider(figment, &default)?;
                }
            },
        }
        let config: Config =
            figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.page_cache_bound == 0 {
            exn::bail!(ErrorKind::InvalidValue("page_cache_bound must be at least 1".to_string()));
        }
        if self.audio_cache_bound == 0 {
            exn::bail!(ErrorKind::InvalidValue("audio_cache_bound must be at least 1".to_string()));
        }
        if self.audio_load_timeout_secs == 0 {
            exn::bail!(ErrorKind::InvalidValue("audio_load_timeout_secs must be at least 1".to_string()));
        }
        if !self.initial_scale.is_finite() || self.initial_scale <= 0.0 {
            exn::bail!(ErrorKind::InvalidValue(format!("initial_scale must be positive, got {}", self.initial_scale)));
        }
        if self.storage_key.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidValue("storage_key must not be empty".to_string()));
        }
        Ok(())
    }
}

impl BookConfig {
    /// Read a book's standalone `config.json`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Figment::from(Json::file_exact(path)).extract().or_raise(|| ErrorKind::Load)
    }
}

impl AudioMap {
    /// Read a standalone audio map.
    ///
    /// Narration is optional, so a missing or malformed file yields `None`
    /// with a warning instead of an error.
    pub fn from_json_file(path: &Path) -> Option<Self> {
        match Figment::from(Json::file_exact(path)).extract::<AudioMap>() {
            Ok(map) => Some(map),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Audio map unavailable, narration disabled");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn jail_err(err: error::Error) -> figment::Error {
        figment::Error::from(err.to_string())
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(None).map_err(jail_err)?;
            assert_eq!(config.engine, EngineSettings::default());
            assert_eq!(config.book.title, "PDF Audio Storybook");
            assert_eq!(config.audio_map, None);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "book.toml",
                r#"
                [book]
                pdf = "assets/book.pdf"
                start_muted = true

                [book.pages.3]
                audio = "p3.mp3"

                [engine]
                prefetch_distance = 1
                initial_scale = 2.0

                [[audio_map.groups]]
                pages = [2, 3]
                audio = "spread1.mp3"
                "#,
            )?;
            jail.set_env("STORYBOOK_ENGINE__PREFETCH_DISTANCE", "3");
            jail.set_env("STORYBOOK_BOOK__LOOP", "true");

            let config = Config::load(Some(Path::new("book.toml"))).map_err(jail_err)?;
            assert_eq!(config.book.pdf, "assets/book.pdf");
            assert!(config.book.start_muted);
            assert!(config.book.loop_playback);
            assert_eq!(config.book.page(3).and_then(|meta| meta.audio.as_deref()), Some("p3.mp3"));
            assert_eq!(config.engine.prefetch_distance, 3);
            assert_eq!(config.engine.initial_scale, 2.0);
            assert_eq!(config.engine.page_cache_bound, 6);
            let groups = config.audio_map.map(|map| map.groups).unwrap_or_default();
            assert_eq!(groups.len(), 1);
            assert!(groups[0].contains_page(2));
            Ok(())
        });
    }

    #[test]
    fn test_json_file_with_camel_case_keys() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "book.json",
                r#"{"book": {"pdf": "book.pdf", "startMuted": true, "title": "The Fox"}}"#,
            )?;
            let config = Config::load(Some(Path::new("book.json"))).map_err(jail_err)?;
            assert!(config.book.start_muted);
            assert_eq!(config.book.title, "The Fox");
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert_eq!(*err, ErrorKind::NotFound(PathBuf::from("nope.toml")));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("book.ini", "pdf = book.pdf")?;
            let err = Config::load(Some(Path::new("book.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidValue(_)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file_is_error() {
        Jail::expect_with(|jail| {
            jail.create_file("book.toml", "[engine]\npage_cache_bound = \"many\"")?;
            let err = Config::load(Some(Path::new("book.toml"))).unwrap_err();
            assert_eq!(*err, ErrorKind::Load);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_env_value_fails_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("STORYBOOK_ENGINE__AUDIO_CACHE_BOUND", "0");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidValue(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case::zero_page_bound(EngineSettings { page_cache_bound: 0, ..Default::default() })]
    #[case::zero_audio_bound(EngineSettings { audio_cache_bound: 0, ..Default::default() })]
    #[case::zero_timeout(EngineSettings { audio_load_timeout_secs: 0, ..Default::default() })]
    #[case::zero_scale(EngineSettings { initial_scale: 0.0, ..Default::default() })]
    #[case::negative_scale(EngineSettings { initial_scale: -1.5, ..Default::default() })]
    #[case::nan_scale(EngineSettings { initial_scale: f32::NAN, ..Default::default() })]
    #[case::blank_key(EngineSettings { storage_key: " ".to_string(), ..Default::default() })]
    fn test_validate_rejects(#[case] engine: EngineSettings) {
        assert!(matches!(&*engine.validate().unwrap_err(), ErrorKind::InvalidValue(_)));
    }

    #[test]
    fn test_audio_map_file_tolerates_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AudioMap::from_json_file(&dir.path().join("missing.json")), None);

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(AudioMap::from_json_file(&broken), None);

        let good = dir.path().join("audio-map.json");
        std::fs::write(&good, r#"{"groups": [{"pages": ["last-even"], "audio": "end.mp3"}]}"#).unwrap();
        let map = AudioMap::from_json_file(&good).unwrap();
        assert!(map.groups[0].contains_last_even());
    }

    #[test]
    fn test_book_config_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pdf": "book.pdf", "autoplay": true, "pages": {"1": {"audio": "cover.mp3"}}}"#)
            .unwrap();
        let book = BookConfig::from_json_file(&path).unwrap();
        assert!(book.autoplay);
        assert_eq!(book.page(1).and_then(|meta| meta.audio.as_deref()), Some("cover.mp3"));

        let err = BookConfig::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
