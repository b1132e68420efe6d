//! ElevenLabs Speech Provider
//!
//! Adapter for the ElevenLabs text-to-speech API. The response body is the
//! audio stream itself, written straight to the requested output path.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::error::{Error, Result};
use crate::media::{MediaKind, MediaRequest, MediaResult};

use super::openrouter::client_with_timeout;
use super::{classify_status, stream_to_path, transport_error, MediaProvider};

/// Default base URL for the ElevenLabs API
const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Default multilingual TTS model
const DEFAULT_MODEL: &str = "eleven_multilingual_v2";

/// Compact MP3 output, enough for short-form speech tracks
const OUTPUT_FORMAT: &str = "mp3_22050_32";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// API Request Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SpeechRequest {
    text: String,
    model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_settings: Option<serde_json::Value>,
}

// =============================================================================
// ElevenLabsProvider
// =============================================================================

/// ElevenLabs speech generation provider
pub struct ElevenLabsProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice_id: Option<String>,
    voice_settings: Option<serde_json::Value>,
}

impl std::fmt::Debug for ElevenLabsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice_id", &self.voice_id)
            .finish_non_exhaustive()
    }
}

impl ElevenLabsProvider {
    /// Creates a new ElevenLabs provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: client_with_timeout(DEFAULT_TIMEOUT),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice_id: None,
            voice_settings: None,
        }
    }

    /// Applies configured overrides (model, base URL, voice, timeout).
    pub fn configure(mut self, settings: &ProviderSettings) -> Self {
        if let Some(model) = &settings.model {
            self.model = model.clone();
        }
        if let Some(base_url) = &settings.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(voice_id) = settings.get_setting::<String>("voice_id") {
            self.voice_id = Some(voice_id);
        }
        self.voice_settings = settings.settings.get("voice_settings").cloned();
        self.client = client_with_timeout(Duration::from_secs(settings.timeout_secs));
        self
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the voice to speak with.
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!(
            "{}/text-to-speech/{}?output_format={}",
            self.base_url, voice_id, OUTPUT_FORMAT
        )
    }
}

#[async_trait]
impl MediaProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn kinds(&self) -> Vec<MediaKind> {
        vec![MediaKind::Speech]
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_speech(&self, request: &MediaRequest) -> Result<MediaResult> {
        let output_path = request
            .output_path
            .as_deref()
            .ok_or_else(|| Error::Validation("speech generation requires an output path".into()))?;

        let voice_id = request
            .get_option::<String>("voice_id")
            .or_else(|| self.voice_id.clone())
            .ok_or_else(|| {
                Error::Configuration(
                    "no voice_id configured for the elevenlabs provider".to_string(),
                )
            })?;

        debug!(
            "requesting speech from ElevenLabs (voice '{}', model '{}')",
            voice_id, self.model
        );

        let body = SpeechRequest {
            text: request.prompt.clone(),
            model_id: self.model.clone(),
            voice_settings: self.voice_settings.clone(),
        };

        let response = self
            .client
            .post(self.speech_url(&voice_id))
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &body));
        }

        stream_to_path(response, self.name(), output_path).await?;

        Ok(MediaResult::file(MediaKind::Speech, self.name(), output_path)
            .with_metadata("model", self.model.clone())
            .with_metadata("voice_id", voice_id))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_kinds() {
        let provider = ElevenLabsProvider::new("key");
        assert_eq!(provider.name(), "elevenlabs");
        assert!(provider.supports(MediaKind::Speech));
        assert!(!provider.supports(MediaKind::Text));
    }

    #[test]
    fn test_availability() {
        assert!(ElevenLabsProvider::new("key").is_available());
        assert!(!ElevenLabsProvider::new("").is_available());
    }

    #[test]
    fn test_speech_url() {
        let provider = ElevenLabsProvider::new("key");
        assert_eq!(
            provider.speech_url("voice-1"),
            "https://api.elevenlabs.io/v1/text-to-speech/voice-1?output_format=mp3_22050_32"
        );
    }

    #[test]
    fn test_configure_reads_voice_settings() {
        let settings = ProviderSettings::with_api_key("key")
            .with_setting("voice_id", "voice-1")
            .with_setting(
                "voice_settings",
                serde_json::json!({"stability": 0.6, "similarity_boost": 0.8}),
            );
        let provider = ElevenLabsProvider::new("key").configure(&settings);

        assert_eq!(provider.voice_id.as_deref(), Some("voice-1"));
        assert!(provider.voice_settings.is_some());
    }

    #[tokio::test]
    async fn test_missing_voice_is_configuration_error() {
        let provider = ElevenLabsProvider::new("key");
        let request =
            MediaRequest::new(MediaKind::Speech, "hello there").with_output("/tmp/s.mp3");

        let err = provider.generate_speech(&request).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
