//! Configuration System
//!
//! Typed library configuration with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Normalization that corrects bad values instead of failing
//!
//! The orchestrator and dispatcher receive an already-constructed `Config`
//! at construction time and never read files or environment variables at
//! call time. API keys resolve deterministically: an explicit config value
//! wins, the `<PROVIDER>_API_KEY` environment variable is the fallback.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::media::MediaKind;

/// Config schema version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Default config file name
pub const CONFIG_FILE: &str = "mediaichemy.json";

// =============================================================================
// Root Config
// =============================================================================

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Content-type settings
    #[serde(default)]
    pub content: ContentSettings,

    /// Provider routing per media kind
    #[serde(default)]
    pub ai: AiSettings,

    /// Video creation/extension strategies
    #[serde(default)]
    pub video: VideoSettings,

    /// Audio mixing settings
    #[serde(default)]
    pub audio: AudioSettings,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            content: ContentSettings::default(),
            ai: AiSettings::default(),
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    /// Loads configuration from a JSON file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.normalize();
        Ok(config)
    }

    /// Default config file location: `mediaichemy.json` in the working
    /// directory, else the platform config dir.
    pub fn default_path() -> PathBuf {
        let cwd_path = PathBuf::from(CONFIG_FILE);
        if cwd_path.exists() {
            return cwd_path;
        }
        dirs::config_dir()
            .map(|dir| dir.join("mediaichemy").join(CONFIG_FILE))
            .unwrap_or(cwd_path)
    }

    /// Saves configuration atomically (temp file + rename).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Normalizes and clamps settings so a loaded config is always usable.
    ///
    /// Intentionally tolerant: corrects bad values instead of failing, so an
    /// old or hand-edited config never bricks a pipeline run.
    pub fn normalize(&mut self) {
        self.version = CONFIG_VERSION;

        let sv = &mut self.content.short_video;
        sv.n_ideas = sv.n_ideas.clamp(1, 20);
        if sv.languages.is_empty() {
            sv.languages = default_languages();
        }
        sv.subtitles.font_size = sv.subtitles.font_size.clamp(12, 200);
        sv.subtitles.max_words_per_line = sv.subtitles.max_words_per_line.clamp(1, 12);
        sv.subtitles.alignment = normalize_enum(
            &sv.subtitles.alignment,
            &[
                "bottom_left",
                "bottom_center",
                "bottom_right",
                "middle_left",
                "middle_center",
                "middle_right",
                "top_left",
                "top_center",
                "top_right",
            ],
            default_alignment(),
        );

        self.video.still_duration_secs = clamp_f64(self.video.still_duration_secs, 1.0, 60.0);

        self.audio.background.relative_volume =
            clamp_f64(self.audio.background.relative_volume, 0.0, 2.0);
        self.audio.silence_secs = clamp_f64(self.audio.silence_secs, 0.0, 10.0);

        for selection in [
            &mut self.ai.text,
            &mut self.ai.image,
            &mut self.ai.speech,
            &mut self.ai.video,
        ] {
            for provider in selection.providers.values_mut() {
                provider.timeout_secs = provider.timeout_secs.clamp(5, 600);
            }
        }
    }

    /// Returns the provider selection table for a media kind.
    pub fn selection(&self, kind: MediaKind) -> &KindSelection {
        match kind {
            MediaKind::Text => &self.ai.text,
            MediaKind::Image => &self.ai.image,
            MediaKind::Speech => &self.ai.speech,
            MediaKind::Video => &self.ai.video,
        }
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

// =============================================================================
// Content Settings
// =============================================================================

/// Settings for content working directories and per-type parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentSettings {
    /// Root directory under which per-content working dirs are created
    #[serde(default = "default_content_root")]
    pub root_dir: PathBuf,

    /// Short-video content type
    #[serde(default)]
    pub short_video: ShortVideoSettings,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            root_dir: default_content_root(),
            short_video: ShortVideoSettings::default(),
        }
    }
}

fn default_content_root() -> PathBuf {
    PathBuf::from("content")
}

/// Parameters of the short-video content type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShortVideoSettings {
    /// Ideas to request per generation round
    #[serde(default = "default_n_ideas")]
    pub n_ideas: usize,

    /// Free-form guidance for the generated texts
    #[serde(default)]
    pub text_details: String,

    /// Leading tags for generated image prompts
    #[serde(default)]
    pub img_tags: String,

    /// Target languages (codes or English names)
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Subtitle burn-in
    #[serde(default)]
    pub subtitles: SubtitleSettings,
}

impl Default for ShortVideoSettings {
    fn default() -> Self {
        Self {
            n_ideas: default_n_ideas(),
            text_details: String::new(),
            img_tags: String::new(),
            languages: default_languages(),
            subtitles: SubtitleSettings::default(),
        }
    }
}

fn default_n_ideas() -> usize {
    3
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

/// Subtitle styling for the burn-in stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSettings {
    /// Whether the subtitling stage runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Font family name
    #[serde(default = "default_font")]
    pub font: String,

    /// Font size in video pixels
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Placement: {bottom,middle,top}_{left,center,right}
    #[serde(default = "default_alignment")]
    pub alignment: String,

    /// Words per subtitle line before wrapping to the next cue
    #[serde(default = "default_max_words")]
    pub max_words_per_line: usize,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            font: default_font(),
            font_size: default_font_size(),
            alignment: default_alignment(),
            max_words_per_line: default_max_words(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_font() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    64
}

fn default_alignment() -> String {
    "middle_center".to_string()
}

fn default_max_words() -> usize {
    4
}

// =============================================================================
// AI Settings
// =============================================================================

/// Provider routing: one active provider per media kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default)]
    pub text: KindSelection,
    #[serde(default)]
    pub image: KindSelection,
    #[serde(default)]
    pub speech: KindSelection,
    #[serde(default)]
    pub video: KindSelection,
}

/// The configured provider for one media kind, plus per-provider tables
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KindSelection {
    /// Name of the active provider for this kind, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Per-provider settings tables keyed by provider name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub providers: HashMap<String, ProviderSettings>,
}

impl KindSelection {
    /// Returns the active provider name and its settings table.
    ///
    /// A named provider without a settings table gets the defaults; its API
    /// key can still arrive through the environment.
    pub fn active(&self) -> Option<(&str, ProviderSettings)> {
        let name = self.provider.as_deref()?;
        let settings = self.providers.get(name).cloned().unwrap_or_default();
        Some((name, settings))
    }

    /// Selects a provider by name (builder style, used in tests and setup).
    pub fn with_provider(mut self, name: impl Into<String>, settings: ProviderSettings) -> Self {
        let name = name.into();
        self.provider = Some(name.clone());
        self.providers.insert(name, settings);
        self
    }
}

/// Settings for one (media kind, provider) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// API key; wins over the `<PROVIDER>_API_KEY` environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model ID (provider-specific)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Additional provider-specific settings (voice id, image size, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, serde_json::Value>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            settings: HashMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

impl ProviderSettings {
    /// Creates settings with an explicit API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Sets the model ID.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom setting.
    pub fn with_setting<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.settings.insert(key.into(), v);
        }
        self
    }

    /// Gets a typed setting value.
    pub fn get_setting<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.settings
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Resolves the API key: explicit config value first, then the
    /// `<PROVIDER>_API_KEY` environment variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(env_key(provider)).ok().filter(|key| !key.is_empty()))
    }
}

/// Environment variable name carrying a provider's API key.
pub fn env_key(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_ascii_uppercase())
}

// =============================================================================
// Video / Audio Settings
// =============================================================================

/// Strategy for producing the base video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationMethod {
    /// Animate the generated image via the video provider.
    Ai,
    /// Render the still image as a fixed-duration clip locally.
    Still,
}

/// Strategy for stretching the base video to the speech duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtendMethod {
    /// Boomerang the clip and repeat it until long enough, then trim.
    Loop,
    /// Generate continuation clips seeded from the last frame until long
    /// enough, then trim.
    Ai,
}

/// Video pipeline strategies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    /// How the base video is produced
    #[serde(default = "default_creation_method")]
    pub creation_method: CreationMethod,

    /// How the base video is stretched to the speech duration
    #[serde(default = "default_extension_method")]
    pub extension_method: ExtendMethod,

    /// Clip length when `creation_method` is `still`
    #[serde(default = "default_still_duration")]
    pub still_duration_secs: f64,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            creation_method: default_creation_method(),
            extension_method: default_extension_method(),
            still_duration_secs: default_still_duration(),
        }
    }
}

fn default_creation_method() -> CreationMethod {
    CreationMethod::Ai
}

fn default_extension_method() -> ExtendMethod {
    ExtendMethod::Loop
}

fn default_still_duration() -> f64 {
    5.0
}

/// Audio mixing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    /// Background music source and balance
    #[serde(default)]
    pub background: BackgroundSettings,

    /// Trailing silence appended after the speech track, in seconds
    #[serde(default = "default_silence")]
    pub silence_secs: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            background: BackgroundSettings::default(),
            silence_secs: default_silence(),
        }
    }
}

fn default_silence() -> f64 {
    1.5
}

/// Background-music settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSettings {
    /// Candidate source URLs; one is picked at random per pipeline run.
    /// Empty list disables background music.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Background volume relative to speech, in [0, 2]:
    /// 0 = speech only, 1 = equal, 2 = background only.
    #[serde(default = "default_relative_volume")]
    pub relative_volume: f64,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            relative_volume: default_relative_volume(),
        }
    }
}

fn default_relative_volume() -> f64 {
    0.4
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.content.short_video.n_ideas, 3);
        assert_eq!(config.content.short_video.languages, vec!["en"]);
        assert_eq!(config.video.extension_method, ExtendMethod::Loop);
        assert!(config.ai.image.provider.is_none());
    }

    #[test]
    fn test_normalize_clamps() {
        let mut config = Config::default();
        config.content.short_video.n_ideas = 0;
        config.audio.background.relative_volume = 7.5;
        config.audio.silence_secs = f64::NAN;
        config.content.short_video.subtitles.alignment = "somewhere".to_string();
        config.normalize();

        assert_eq!(config.content.short_video.n_ideas, 1);
        assert_eq!(config.audio.background.relative_volume, 2.0);
        assert_eq!(config.audio.silence_secs, 0.0);
        assert_eq!(
            config.content.short_video.subtitles.alignment,
            "middle_center"
        );
    }

    #[test]
    fn test_selection_lookup() {
        let mut config = Config::default();
        config.ai.image = KindSelection::default()
            .with_provider("runware", ProviderSettings::with_api_key("rw-key"));

        let (name, settings) = config.selection(MediaKind::Image).active().unwrap();
        assert_eq!(name, "runware");
        assert_eq!(settings.api_key.as_deref(), Some("rw-key"));
        assert!(config.selection(MediaKind::Video).active().is_none());
    }

    #[test]
    fn test_api_key_precedence() {
        // Explicit config value wins over the environment.
        std::env::set_var("CFGTESTPROV_API_KEY", "env-key");
        let explicit = ProviderSettings::with_api_key("config-key");
        assert_eq!(
            explicit.resolve_api_key("cfgtestprov").as_deref(),
            Some("config-key")
        );

        // Environment is the fallback when the config has no key.
        let empty = ProviderSettings::default();
        assert_eq!(
            empty.resolve_api_key("cfgtestprov").as_deref(),
            Some("env-key")
        );
        std::env::remove_var("CFGTESTPROV_API_KEY");

        let empty = ProviderSettings::default();
        assert_eq!(empty.resolve_api_key("cfgtestprov-absent"), None);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.content.short_video.languages = vec!["en".to_string(), "es".to_string()];
        config.ai.text = KindSelection::default().with_provider(
            "openrouter",
            ProviderSettings::with_api_key("or-key").with_model("openrouter/auto"),
        );
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_env_key_shape() {
        assert_eq!(env_key("openrouter"), "OPENROUTER_API_KEY");
        assert_eq!(env_key("ElevenLabs"), "ELEVENLABS_API_KEY");
    }
}
