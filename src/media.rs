//! Media Request/Result Types
//!
//! The generic request and result descriptors that normalize heterogeneous
//! provider APIs behind one call signature.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Media Kind
// =============================================================================

/// The category of artifact a provider produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Image,
    Speech,
    Video,
}

impl MediaKind {
    /// All supported kinds, in dispatch order.
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Text,
        MediaKind::Image,
        MediaKind::Speech,
        MediaKind::Video,
    ];

    /// File kinds write their artifact to disk; text is returned inline.
    pub fn writes_file(self) -> bool {
        !matches!(self, MediaKind::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Speech => "speech",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Media Request
// =============================================================================

/// A generation request, normalized across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRequest {
    /// What to produce.
    pub kind: MediaKind,
    /// The prompt (or, for speech, the text to speak).
    pub prompt: String,
    /// Where to write the artifact. Required for file-producing kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Seed image for image-to-video generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image: Option<PathBuf>,
    /// Provider-specific options forwarded verbatim.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, serde_json::Value>,
}

impl MediaRequest {
    /// Creates a new request for the given kind and prompt.
    pub fn new(kind: MediaKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            output_path: None,
            input_image: None,
            options: HashMap::new(),
        }
    }

    /// Sets the output path.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets the seed image.
    pub fn with_input_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_image = Some(path.into());
        self
    }

    /// Sets a provider-specific option.
    pub fn with_option<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.options.insert(key.into(), v);
        }
        self
    }

    /// Gets a typed option value.
    pub fn get_option<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.options
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Validates the request shape before any provider is contacted.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if self.kind.writes_file() && self.output_path.is_none() {
            return Err(format!(
                "output path is required for {} requests",
                self.kind
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Media Result
// =============================================================================

/// Outcome of a dispatched request. Immutable once returned; owned by the
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaResult {
    /// The kind that was produced.
    pub kind: MediaKind,
    /// Name of the provider that produced the artifact.
    pub provider: String,
    /// Inline payload, for text generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Artifact location, for file-producing kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Raw provider metadata (model, upstream ids, timings).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MediaResult {
    /// Creates a text result.
    pub fn text(provider: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Text,
            provider: provider.into(),
            text: Some(content.into()),
            path: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a file result.
    pub fn file(kind: MediaKind, provider: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            text: None,
            path: Some(path.into()),
            metadata: HashMap::new(),
        }
    }

    /// Attaches a metadata entry.
    pub fn with_metadata<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }

    /// Returns the artifact path or a validation error for text results.
    pub fn require_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            Error::Validation(format!("{} result carries no artifact path", self.kind))
        })
    }

    /// Returns the inline text or a validation error for file results.
    pub fn require_text(&self) -> Result<&str> {
        self.text.as_deref().ok_or_else(|| {
            Error::Validation(format!("{} result carries no text payload", self.kind))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_writes_file() {
        assert!(!MediaKind::Text.writes_file());
        assert!(MediaKind::Image.writes_file());
        assert!(MediaKind::Speech.writes_file());
        assert!(MediaKind::Video.writes_file());
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&MediaKind::Speech).unwrap(),
            "\"speech\""
        );
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"video\"").unwrap(),
            MediaKind::Video
        );
    }

    #[test]
    fn test_request_builder() {
        let request = MediaRequest::new(MediaKind::Video, "a drifting nebula")
            .with_output("/tmp/out/video.mp4")
            .with_input_image("/tmp/out/image.jpg")
            .with_option("seed", 7);

        assert_eq!(request.prompt, "a drifting nebula");
        assert_eq!(request.get_option::<u64>("seed"), Some(7));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_prompt() {
        let request = MediaRequest::new(MediaKind::Text, "   ");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_missing_output_path() {
        let request = MediaRequest::new(MediaKind::Image, "a lighthouse at dusk");
        let err = request.validate().unwrap_err();
        assert!(err.contains("image"));

        // Text requests do not need one.
        let request = MediaRequest::new(MediaKind::Text, "hello");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_result_accessors() {
        let text = MediaResult::text("openrouter", "a reply");
        assert_eq!(text.require_text().unwrap(), "a reply");
        assert!(text.require_path().is_err());

        let file = MediaResult::file(MediaKind::Image, "runware", "/tmp/image.jpg")
            .with_metadata("model", "flux.1");
        assert!(file.require_path().is_ok());
        assert!(file.require_text().is_err());
        assert_eq!(
            file.metadata.get("model").and_then(|v| v.as_str()),
            Some("flux.1")
        );
    }
}
