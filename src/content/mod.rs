//! Content Models
//!
//! Ideas, pipeline stage tracking, and the content-type seam the
//! orchestrator builds on.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::providers::MediaDispatcher;

pub mod language;
mod short_video;

pub use short_video::{ShortVideo, ShortVideoCreator, ShortVideoPrompt};

/// File carrying the idea a working directory was created from
pub const IDEA_FILE: &str = "idea.json";

/// File tracking pipeline progress inside a working directory
pub const STATE_FILE: &str = ".state";

// =============================================================================
// Idea
// =============================================================================

/// A generated seed description used to parameterize new content.
///
/// Produced in batches by the idea-generation call; consumed by
/// `initialize_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    /// Identifier, generated when the idea is parsed
    #[serde(default = "new_idea_id")]
    pub id: String,
    /// Spoken/written text per language code
    pub texts: HashMap<String, String>,
    /// Social caption per language code
    #[serde(default)]
    pub captions: HashMap<String, String>,
    /// Prompt for the seed image
    pub image_prompt: String,
    /// Target language codes
    #[serde(default)]
    pub languages: Vec<String>,
}

fn new_idea_id() -> String {
    ulid::Ulid::new().to_string().to_ascii_lowercase()
}

/// Extracts idea objects from raw model output.
///
/// Models wrap JSON in markdown fences and prose more often than not, so
/// this scans for top-level JSON objects anywhere in the text and keeps the
/// ones that deserialize as ideas.
pub fn parse_ideas(raw: &str) -> Vec<Idea> {
    // Regex-free fence stripping: drop the marker lines, keep their content.
    let cleaned: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut ideas = Vec::new();
    let total_len = cleaned.len();
    let mut index = 0;

    while let Some(offset) = cleaned[index..].find('{') {
        let start = index + offset;
        let mut stream =
            serde_json::Deserializer::from_str(&cleaned[start..]).into_iter::<serde_json::Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset().max(1);
                match serde_json::from_value::<Idea>(value) {
                    Ok(idea) => ideas.push(idea),
                    Err(e) => debug!("skipping non-idea JSON object: {}", e),
                }
                index = start + consumed;
            }
            _ => {
                index = start + 1;
            }
        }
        if index >= total_len {
            break;
        }
    }

    ideas
}

// =============================================================================
// Pipeline Stage
// =============================================================================

/// Checkpointed pipeline progress for a short-video working directory.
///
/// Ordered: a spec that reached a stage never redoes it on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initialized,
    ImageCreated,
    VideoCreated,
    SpeechCreated,
    VideoEdited,
    SubtitlesAdded,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initialized => "initialized",
            Stage::ImageCreated => "image_created",
            Stage::VideoCreated => "video_created",
            Stage::SpeechCreated => "speech_created",
            Stage::VideoEdited => "video_edited",
            Stage::SubtitlesAdded => "subtitles_added",
        }
    }

    /// Parses a persisted stage name; unknown names restart the pipeline.
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "image_created" => Stage::ImageCreated,
            "video_created" => Stage::VideoCreated,
            "speech_created" => Stage::SpeechCreated,
            "video_edited" => Stage::VideoEdited,
            "subtitles_added" => Stage::SubtitlesAdded,
            _ => Stage::Initialized,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ContentCreator Trait
// =============================================================================

/// Trait for content-type pipelines.
///
/// A creator knows how to prompt for ideas, turn one idea into a working
/// spec, and drive the spec through its generation/editing stages. Adding a
/// content type means implementing this trait; the orchestrator stays
/// untouched.
#[async_trait]
pub trait ContentCreator: Send + Sync {
    /// The content spec this creator produces and drives
    type Content: Send;

    /// Type tag (e.g. "short_video")
    fn content_type(&self) -> &'static str;

    /// Generates a batch of ideas through the text provider.
    async fn generate_ideas(&self, dispatcher: &MediaDispatcher) -> Result<Vec<Idea>>;

    /// Turns an idea into an initialized content spec. No network I/O.
    fn initialize(&self, idea: Idea) -> Result<Self::Content>;

    /// Drives the spec through all stages and returns the final artifacts.
    async fn create(
        &self,
        dispatcher: &MediaDispatcher,
        content: &mut Self::Content,
    ) -> Result<Vec<PathBuf>>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn idea_json(lang_text: &str) -> String {
        format!(
            r#"{{"texts": {{"en": "{}"}}, "image_prompt": "a fox, forest", "captions": {{"en": "caption"}}, "languages": ["en"]}}"#,
            lang_text
        )
    }

    #[test]
    fn test_parse_ideas_plain_array() {
        let raw = format!("[{}, {}]", idea_json("first"), idea_json("second"));
        let ideas = parse_ideas(&raw);
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[0].texts["en"], "first");
        assert_eq!(ideas[1].texts["en"], "second");
        assert!(!ideas[0].id.is_empty());
    }

    #[test]
    fn test_parse_ideas_with_fences_and_prose() {
        let raw = format!(
            "Here are your ideas:\n```json\n[{}]\n```\nEnjoy!",
            idea_json("fenced")
        );
        let ideas = parse_ideas(&raw);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].texts["en"], "fenced");
    }

    #[test]
    fn test_parse_ideas_skips_unrelated_objects() {
        let raw = format!(r#"{{"note": "not an idea"}} and then {}"#, idea_json("real"));
        let ideas = parse_ideas(&raw);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].texts["en"], "real");
    }

    #[test]
    fn test_parse_ideas_garbage() {
        assert!(parse_ideas("no json here at all").is_empty());
        assert!(parse_ideas("{ broken json").is_empty());
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Initialized < Stage::ImageCreated);
        assert!(Stage::ImageCreated < Stage::VideoCreated);
        assert!(Stage::VideoEdited < Stage::SubtitlesAdded);
    }

    #[test]
    fn test_stage_roundtrip() {
        for stage in [
            Stage::Initialized,
            Stage::ImageCreated,
            Stage::VideoCreated,
            Stage::SpeechCreated,
            Stage::VideoEdited,
            Stage::SubtitlesAdded,
        ] {
            assert_eq!(Stage::parse(stage.as_str()), stage);
        }
        // Unknown names restart rather than fail.
        assert_eq!(Stage::parse("???"), Stage::Initialized);
    }
}
