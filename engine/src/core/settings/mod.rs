//! Reader Settings Persistence
//!
//! Provides persistent reader settings with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Tolerant normalization of out-of-range values
//!
//! Storage location: {settings_dir}/settings.json

use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::fs::atomic_write_json_pretty;
use crate::core::resources::VERSE_CONFIG_FILE;
use crate::core::{CoreError, CoreResult, DisplayMode, Language, TimeSec};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Highest verse number probed when no configuration is available
pub const DEFAULT_PROBE_CAP: u32 = 176;

/// Reader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Bound on a caption or configuration fetch
    #[serde(default = "default_caption_timeout_ms")]
    pub caption_timeout_ms: u64,

    /// Bound on a single existence probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Bound on each audio extension probe
    #[serde(default = "default_audio_resolve_timeout_ms")]
    pub audio_resolve_timeout_ms: u64,

    /// Highest verse probed by the discovery fallback
    #[serde(default = "default_probe_cap")]
    pub probe_cap: u32,

    /// Delay between entering a narration mode and its first clip
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,

    /// Opening window of a verse clip that keeps its first segment highlighted
    #[serde(default = "default_intro_threshold_secs")]
    pub intro_threshold_secs: TimeSec,

    /// Horizontal distance a touch must travel to count as a swipe
    #[serde(default = "default_swipe_threshold_px")]
    pub swipe_threshold_px: f64,

    /// Language heard first in alternate narration
    #[serde(default = "default_alternate_start")]
    pub alternate_start_language: Language,

    /// Layout shown on first start
    #[serde(default)]
    pub display_mode: DisplayMode,

    /// Candidate extensions for verse audio, in probe order
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,

    /// Name of the lesson -> verse count resource
    #[serde(default = "default_verse_config_file")]
    pub verse_config_file: String,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_caption_timeout_ms() -> u64 {
    1500
}

fn default_probe_timeout_ms() -> u64 {
    300
}

fn default_audio_resolve_timeout_ms() -> u64 {
    500
}

fn default_probe_cap() -> u32 {
    DEFAULT_PROBE_CAP
}

fn default_start_delay_ms() -> u64 {
    200
}

fn default_intro_threshold_secs() -> TimeSec {
    0.3
}

fn default_swipe_threshold_px() -> f64 {
    50.0
}

fn default_alternate_start() -> Language {
    Language::Portuguese
}

fn default_audio_extensions() -> Vec<String> {
    vec!["mp3".to_string()]
}

fn default_verse_config_file() -> String {
    VERSE_CONFIG_FILE.to_string()
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            caption_timeout_ms: default_caption_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            audio_resolve_timeout_ms: default_audio_resolve_timeout_ms(),
            probe_cap: default_probe_cap(),
            start_delay_ms: default_start_delay_ms(),
            intro_threshold_secs: default_intro_threshold_secs(),
            swipe_threshold_px: default_swipe_threshold_px(),
            alternate_start_language: default_alternate_start(),
            display_mode: DisplayMode::default(),
            audio_extensions: default_audio_extensions(),
            verse_config_file: default_verse_config_file(),
        }
    }
}

impl ReaderSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected instead of rejected, so an old or hand-edited
    /// file never prevents the reader from starting.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.caption_timeout_ms = self.caption_timeout_ms.clamp(100, 30_000);
        self.probe_timeout_ms = self.probe_timeout_ms.clamp(50, 10_000);
        self.audio_resolve_timeout_ms = self.audio_resolve_timeout_ms.clamp(50, 10_000);
        self.probe_cap = self.probe_cap.clamp(1, 1_000);
        self.start_delay_ms = self.start_delay_ms.clamp(0, 5_000);
        self.intro_threshold_secs = clamp_f64(self.intro_threshold_secs, 0.0, 5.0);
        self.swipe_threshold_px = clamp_f64(self.swipe_threshold_px, 1.0, 1_000.0);

        self.audio_extensions = self
            .audio_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .collect();
        self.audio_extensions.dedup();
        if self.audio_extensions.is_empty() {
            self.audio_extensions = default_audio_extensions();
        }

        let config_file = self.verse_config_file.trim();
        if config_file.is_empty() || config_file.contains("..") {
            self.verse_config_file = default_verse_config_file();
        } else {
            self.verse_config_file = config_file.to_string();
        }
    }

    pub fn caption_timeout(&self) -> Duration {
        Duration::from_millis(self.caption_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn audio_resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_resolve_timeout_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager storing `settings.json` in `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self {
            settings_path: dir.join(SETTINGS_FILE),
        }
    }

    /// Create a manager for an explicit settings file path
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            settings_path: path,
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> ReaderSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(ReaderSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<ReaderSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                ReaderSettings::default()
            }
        }
    }

    /// Save settings to disk using an atomic write; returns what was stored
    pub fn save(&self, settings: &ReaderSettings) -> CoreResult<ReaderSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            atomic_write_json_pretty(&self.settings_path, &normalized)?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<ReaderSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path).map_err(|e| {
                    CoreError::Internal(format!("Failed to delete settings file: {}", e))
                })?;
                info!("Settings file deleted");
            }
            Ok(ReaderSettings::default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ============================================================
    // ReaderSettings Tests
    // ============================================================

    #[test]
    fn test_default_settings() {
        let settings = ReaderSettings::default();
        assert_eq!(settings.caption_timeout(), Duration::from_millis(1500));
        assert_eq!(settings.probe_timeout(), Duration::from_millis(300));
        assert_eq!(settings.audio_resolve_timeout(), Duration::from_millis(500));
        assert_eq!(settings.start_delay(), Duration::from_millis(200));
        assert_eq!(settings.probe_cap, 176);
        assert_eq!(settings.intro_threshold_secs, 0.3);
        assert_eq!(settings.swipe_threshold_px, 50.0);
        assert_eq!(settings.alternate_start_language, Language::Portuguese);
        assert_eq!(settings.display_mode, DisplayMode::Horizontal);
        assert_eq!(settings.audio_extensions, vec!["mp3"]);
        assert_eq!(settings.verse_config_file, "psalm-config.json");
    }

    #[test]
    fn test_settings_serialization_is_camel_case() {
        let json = serde_json::to_value(ReaderSettings::default()).unwrap();
        assert_eq!(json["captionTimeoutMs"], 1500);
        assert_eq!(json["alternateStartLanguage"], "pt");
        assert_eq!(json["displayMode"], "horizontal");
    }

    #[test]
    fn test_partial_json_uses_defaults_for_missing() {
        let settings: ReaderSettings =
            serde_json::from_str(r#"{"probeCap": 20, "displayMode": "vertical"}"#).unwrap();
        assert_eq!(settings.probe_cap, 20);
        assert_eq!(settings.display_mode, DisplayMode::Vertical);
        assert_eq!(settings.caption_timeout_ms, 1500);
    }

    #[test]
    fn test_normalization_clamps_values() {
        let mut settings = ReaderSettings {
            version: 0,
            caption_timeout_ms: 0,
            probe_cap: 0,
            intro_threshold_secs: f64::NAN,
            swipe_threshold_px: -3.0,
            audio_extensions: vec![".MP3".to_string(), "".to_string(), "../x".to_string()],
            verse_config_file: "  ".to_string(),
            ..ReaderSettings::default()
        };
        settings.normalize();

        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.caption_timeout_ms, 100);
        assert_eq!(settings.probe_cap, 1);
        assert_eq!(settings.intro_threshold_secs, 0.0);
        assert_eq!(settings.swipe_threshold_px, 1.0);
        assert_eq!(settings.audio_extensions, vec!["mp3"]);
        assert_eq!(settings.verse_config_file, "psalm-config.json");
    }

    #[test]
    fn test_normalization_restores_default_extensions() {
        let mut settings = ReaderSettings {
            audio_extensions: vec![" ".to_string()],
            ..ReaderSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.audio_extensions, vec!["mp3"]);
    }

    // ============================================================
    // SettingsManager Tests
    // ============================================================

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        assert_eq!(manager.load(), ReaderSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());

        let settings = ReaderSettings {
            alternate_start_language: Language::English,
            probe_cap: 40,
            ..ReaderSettings::default()
        };
        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved, settings);

        let loaded = manager.load();
        assert_eq!(loaded.alternate_start_language, Language::English);
        assert_eq!(loaded.probe_cap, 40);
    }

    #[test]
    fn test_save_twice_overwrites_successfully() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());

        manager
            .save(&ReaderSettings {
                probe_cap: 10,
                ..ReaderSettings::default()
            })
            .unwrap();
        manager
            .save(&ReaderSettings {
                probe_cap: 11,
                ..ReaderSettings::default()
            })
            .unwrap();

        assert_eq!(manager.load().probe_cap, 11);
    }

    #[test]
    fn test_invalid_json_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        fs::write(manager.settings_path(), "{ not json").unwrap();

        assert_eq!(manager.load(), ReaderSettings::default());
    }

    #[test]
    fn test_reset_deletes_file() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        manager.save(&ReaderSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        let reset = manager.reset().unwrap();
        assert_eq!(reset, ReaderSettings::default());
        assert!(!manager.settings_path().exists());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let manager = SettingsManager::new(nested.clone());

        manager.save(&ReaderSettings::default()).unwrap();
        assert!(nested.join(SETTINGS_FILE).exists());
    }

    #[test]
    fn test_at_path_uses_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reader.json");
        let manager = SettingsManager::at_path(path.clone());

        manager.save(&ReaderSettings::default()).unwrap();
        assert!(path.exists());
    }
}
