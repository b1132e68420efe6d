//! Short-Video Content Type
//!
//! The spec describing one short video (per-language texts, image prompt,
//! working directory, checkpointed artifacts) and the creator that drives it
//! through generation and editing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};

use crate::config::{AudioSettings, Config, CreationMethod, ShortVideoSettings, VideoSettings};
use crate::edit::{FfmpegEditor, MediaEditor};
use crate::error::{Error, ProviderFault, Result};
use crate::media::{MediaKind, MediaRequest};
use crate::providers::MediaDispatcher;

use super::language::{self, Language};
use super::{ContentCreator, Idea, Stage, IDEA_FILE, STATE_FILE};

// =============================================================================
// Prompt Template
// =============================================================================

/// Builds the idea-generation prompt from content-type settings.
#[derive(Debug, Clone)]
pub struct ShortVideoPrompt {
    pub n_ideas: usize,
    pub text_details: String,
    pub img_tags: String,
    pub languages: Vec<Language>,
}

impl ShortVideoPrompt {
    /// Builds the prompt from configuration.
    pub fn from_settings(settings: &ShortVideoSettings) -> Result<Self> {
        Ok(Self {
            n_ideas: settings.n_ideas,
            text_details: settings.text_details.clone(),
            img_tags: settings.img_tags.clone(),
            languages: language::resolve_all(&settings.languages)?,
        })
    }

    /// Renders the instruction block sent to the text provider.
    pub fn render(&self) -> String {
        let names = self
            .languages
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let codes = self
            .languages
            .iter()
            .map(|l| l.code.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Create {n} texts for social media.\n\
             Don't include emojis.\n\n\
             Text details: {details}\n\n\
             For each text write a prompt for creating an image that follows \
             it. The image prompt should be a comma-separated tag list \
             starting with: {tags}\n\n\
             For each text and image write a caption that follows it.\n\
             Don't include hashtags.\n\n\
             Make a version of the text and caption for each of the \
             following languages:\n{names}\n\n\
             Return the result as a JSON array. Languages are keyed by their \
             codes ({codes}):\n\
             [\n\
             {{\n\
             \"texts\": {{\"code\": \"the text in that language\"}},\n\
             \"image_prompt\": \"tag1, tag2, tag3\",\n\
             \"captions\": {{\"code\": \"the caption in that language\"}},\n\
             \"languages\": [\"code\"]\n\
             }}\n\
             ]\n",
            n = self.n_ideas,
            details = self.text_details,
            tags = self.img_tags,
            names = names,
            codes = codes,
        )
    }
}

// =============================================================================
// ShortVideo Spec
// =============================================================================

/// One short video being assembled: working directory, validated idea
/// payload, and checkpointed stage.
#[derive(Debug, Clone)]
pub struct ShortVideo {
    dir: PathBuf,
    idea: Idea,
    languages: Vec<Language>,
    texts: HashMap<String, String>,
    image_prompt: String,
    stage: Stage,
}

impl ShortVideo {
    /// Creates a working directory under `root` and populates it from an
    /// idea. Pure beyond the directory/idea-file writes; no network I/O.
    pub fn from_idea(idea: Idea, root: &Path) -> Result<Self> {
        let languages = Self::validate(&idea)?;
        let texts = Self::normalized_texts(&idea, &languages)?;

        let dir = root
            .join("short_video")
            .join(ulid::Ulid::new().to_string().to_ascii_lowercase());
        std::fs::create_dir_all(&dir)?;

        let spec = Self {
            dir,
            image_prompt: idea.image_prompt.clone(),
            idea,
            languages,
            texts,
            stage: Stage::Initialized,
        };
        spec.save_idea()?;
        spec.save_state()?;
        info!("initialized short video at {}", spec.dir.display());
        Ok(spec)
    }

    /// Reloads a previously initialized working directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(dir.join(IDEA_FILE))?;
        let idea: Idea = serde_json::from_str(&raw)?;
        let languages = Self::validate(&idea)?;
        let texts = Self::normalized_texts(&idea, &languages)?;

        let stage = match std::fs::read_to_string(dir.join(STATE_FILE)) {
            Ok(raw) => Stage::parse(&raw),
            Err(_) => {
                warn!(
                    "no state file in {}, starting from scratch",
                    dir.display()
                );
                Stage::Initialized
            }
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            image_prompt: idea.image_prompt.clone(),
            idea,
            languages,
            texts,
            stage,
        })
    }

    /// Checks the idea carries everything a short video needs.
    fn validate(idea: &Idea) -> Result<Vec<Language>> {
        if idea.image_prompt.trim().is_empty() {
            return Err(Error::Validation("idea is missing an image prompt".into()));
        }
        if idea.languages.is_empty() {
            return Err(Error::Validation("idea names no target languages".into()));
        }
        language::resolve_all(&idea.languages)
    }

    /// Normalizes text keys to language codes and checks completeness.
    fn normalized_texts(
        idea: &Idea,
        languages: &[Language],
    ) -> Result<HashMap<String, String>> {
        let mut texts = HashMap::new();
        for (key, value) in &idea.texts {
            match Language::parse(key) {
                Ok(lang) => {
                    texts.insert(lang.code, value.clone());
                }
                // Models sometimes emit stray keys; completeness for the
                // target languages is checked below.
                Err(_) => warn!("ignoring text for unrecognized language '{}'", key),
            }
        }
        for lang in languages {
            match texts.get(&lang.code) {
                Some(text) if !text.trim().is_empty() => {}
                _ => {
                    return Err(Error::Validation(format!(
                        "idea has no text for language '{}'",
                        lang.code
                    )))
                }
            }
        }
        Ok(texts)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn idea(&self) -> &Idea {
        &self.idea
    }

    pub fn image_prompt(&self) -> &str {
        &self.image_prompt
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Text spoken in the given language.
    pub fn text_for(&self, code: &str) -> Result<&str> {
        self.texts
            .get(code)
            .map(|s| s.as_str())
            .ok_or_else(|| Error::Validation(format!("no text for language '{}'", code)))
    }

    // -------------------------------------------------------------------------
    // Artifact Paths
    // -------------------------------------------------------------------------

    pub fn image_path(&self) -> PathBuf {
        self.dir.join("image.jpg")
    }

    pub fn video_path(&self) -> PathBuf {
        self.dir.join("video.mp4")
    }

    pub fn background_path(&self) -> PathBuf {
        self.dir.join("background.mp3")
    }

    pub fn speech_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}_speech.mp3", code))
    }

    pub fn final_audio_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}_final_audio.mp3", code))
    }

    pub fn extended_video_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}_extended_video.mp4", code))
    }

    pub fn edited_video_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}_edited_video.mp4", code))
    }

    pub fn subtitled_video_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}_subtitled_video.mp4", code))
    }

    /// The final per-language artifacts currently on disk: the subtitled
    /// video when that stage produced one, else the edited video.
    pub fn final_video_paths(&self) -> Vec<PathBuf> {
        self.languages
            .iter()
            .filter_map(|lang| {
                let subtitled = self.subtitled_video_path(&lang.code);
                let edited = self.edited_video_path(&lang.code);
                if subtitled.exists() {
                    Some(subtitled)
                } else if edited.exists() {
                    Some(edited)
                } else {
                    None
                }
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Checkpointing
    // -------------------------------------------------------------------------

    /// Whether a stage has already been completed.
    pub fn reached(&self, stage: Stage) -> bool {
        self.stage >= stage
    }

    /// Marks a stage complete and persists the checkpoint.
    pub fn advance(&mut self, stage: Stage) -> Result<()> {
        self.stage = stage;
        self.save_state()?;
        info!("content stage updated: {}", stage);
        Ok(())
    }

    fn save_idea(&self) -> Result<()> {
        let path = self.dir.join(IDEA_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(&self.idea)?)?;
        Ok(())
    }

    fn save_state(&self) -> Result<()> {
        std::fs::write(self.dir.join(STATE_FILE), self.stage.as_str())?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Cleanup
    // -------------------------------------------------------------------------

    /// Removes intermediate artifacts, keeping the final videos, the idea
    /// file and the state file. Safe to call repeatedly; a second call is a
    /// no-op.
    pub fn purge(&self) -> Result<()> {
        let mut keep: Vec<PathBuf> = self.final_video_paths();
        keep.push(self.dir.join(IDEA_FILE));
        keep.push(self.dir.join(STATE_FILE));

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || keep.contains(&path) {
                continue;
            }
            std::fs::remove_file(&path)?;
            info!("purged intermediate artifact {}", path.display());
        }
        Ok(())
    }
}

// =============================================================================
// ShortVideoCreator
// =============================================================================

/// Drives a [`ShortVideo`] through its pipeline:
/// image → base video → per-language speech → extension + mixing →
/// subtitles. Failures abort the pipeline annotated with the failing stage;
/// artifacts from completed stages stay on disk.
pub struct ShortVideoCreator {
    settings: ShortVideoSettings,
    video_settings: VideoSettings,
    audio_settings: AudioSettings,
    root_dir: PathBuf,
    editor: Arc<dyn MediaEditor>,
}

impl std::fmt::Debug for ShortVideoCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortVideoCreator")
            .field("settings", &self.settings)
            .field("video_settings", &self.video_settings)
            .field("audio_settings", &self.audio_settings)
            .field("root_dir", &self.root_dir)
            .finish()
    }
}

impl ShortVideoCreator {
    /// Creates a creator over the production ffmpeg editor.
    pub fn new(config: &Config) -> Self {
        Self {
            settings: config.content.short_video.clone(),
            video_settings: config.video.clone(),
            audio_settings: config.audio.clone(),
            root_dir: config.content.root_dir.clone(),
            editor: Arc::new(FfmpegEditor::new()),
        }
    }

    /// Swaps the editing collaborator (used by tests).
    pub fn with_editor(mut self, editor: Arc<dyn MediaEditor>) -> Self {
        self.editor = editor;
        self
    }

    /// Runs the per-language editing chain: stretch the base video to the
    /// speech duration, finalize the audio, and mux them together.
    async fn edit_language(
        &self,
        dispatcher: &MediaDispatcher,
        content: &ShortVideo,
        code: &str,
        background: Option<&Path>,
    ) -> Result<()> {
        let speech = content.speech_path(code);
        let speech_duration = self.editor.duration(&speech).await?;
        let target_duration = speech_duration + self.audio_settings.silence_secs;

        // Each language works on its own copy of the base video so the
        // parallel chains never collide on derived file names.
        let base_copy = content.dir().join(format!("{}_base.mp4", code));
        tokio::fs::copy(content.video_path(), &base_copy).await?;

        let extended = content.extended_video_path(code);
        self.editor
            .extend_video(
                dispatcher,
                &base_copy,
                target_duration,
                self.video_settings.extension_method,
                content.image_prompt(),
                &extended,
            )
            .await?;

        let final_audio = content.final_audio_path(code);
        self.editor
            .finalize_speech_track(
                &speech,
                background,
                self.audio_settings.background.relative_volume,
                self.audio_settings.silence_secs,
                &final_audio,
            )
            .await?;

        self.editor
            .mux_audio(&extended, &final_audio, &content.edited_video_path(code))
            .await?;
        Ok(())
    }

    /// Burns the per-language subtitles into the edited video.
    async fn subtitle_language(&self, content: &ShortVideo, code: &str) -> Result<()> {
        let speech_duration = self
            .editor
            .duration(&content.speech_path(code))
            .await?;
        self.editor
            .burn_subtitles(
                &content.edited_video_path(code),
                content.text_for(code)?,
                speech_duration,
                &self.settings.subtitles,
                &content.subtitled_video_path(code),
            )
            .await
    }
}

/// Joins parallel per-language results: the first failure propagates, the
/// rest are logged so multi-language breakage is visible.
fn join_language_results<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        return Ok(values);
    }
    for extra in errors.iter().skip(1) {
        warn!("additional language task failed: {}", extra);
    }
    Err(errors.remove(0))
}

#[async_trait]
impl ContentCreator for ShortVideoCreator {
    type Content = ShortVideo;

    fn content_type(&self) -> &'static str {
        "short_video"
    }

    async fn generate_ideas(&self, dispatcher: &MediaDispatcher) -> Result<Vec<Idea>> {
        let prompt = ShortVideoPrompt::from_settings(&self.settings)?;
        let result = dispatcher
            .request(MediaKind::Text, &prompt.render(), None)
            .await?;

        let mut ideas = super::parse_ideas(result.require_text()?);
        if ideas.len() < self.settings.n_ideas {
            return Err(Error::provider(
                result.provider,
                ProviderFault::Api,
                format!(
                    "asked for {} ideas but could only extract {}",
                    self.settings.n_ideas,
                    ideas.len()
                ),
            ));
        }
        ideas.truncate(self.settings.n_ideas);
        Ok(ideas)
    }

    fn initialize(&self, idea: Idea) -> Result<ShortVideo> {
        ShortVideo::from_idea(idea, &self.root_dir)
    }

    async fn create(
        &self,
        dispatcher: &MediaDispatcher,
        content: &mut ShortVideo,
    ) -> Result<Vec<PathBuf>> {
        // Stage: image generation
        if !content.reached(Stage::ImageCreated) {
            dispatcher
                .dispatch(
                    MediaRequest::new(MediaKind::Image, content.image_prompt())
                        .with_output(content.image_path()),
                )
                .await
                .map_err(|e| e.at_stage("image_generation"))?;
            content.advance(Stage::ImageCreated)?;
        } else {
            info!("skipping image generation, checkpoint already reached");
        }

        // Stage: base video generation (depends on the image)
        if !content.reached(Stage::VideoCreated) {
            match self.video_settings.creation_method {
                CreationMethod::Ai => {
                    dispatcher
                        .dispatch(
                            MediaRequest::new(MediaKind::Video, content.image_prompt())
                                .with_input_image(content.image_path())
                                .with_output(content.video_path()),
                        )
                        .await
                        .map_err(|e| e.at_stage("video_generation"))?;
                }
                CreationMethod::Still => {
                    self.editor
                        .still_video(
                            &content.image_path(),
                            self.video_settings.still_duration_secs,
                            &content.video_path(),
                        )
                        .await
                        .map_err(|e| e.at_stage("video_generation"))?;
                }
            }
            content.advance(Stage::VideoCreated)?;
        } else {
            info!("skipping video generation, checkpoint already reached");
        }

        // Stage: per-language speech, in parallel
        if !content.reached(Stage::SpeechCreated) {
            let spec: &ShortVideo = content;
            let tasks = spec.languages().iter().map(|lang| {
                let code = lang.code.clone();
                async move {
                    let text = spec.text_for(&code)?;
                    dispatcher
                        .dispatch(
                            MediaRequest::new(MediaKind::Speech, text)
                                .with_output(spec.speech_path(&code)),
                        )
                        .await
                        .map(|_| ())
                }
            });
            join_language_results(join_all(tasks).await)
                .map_err(|e| e.at_stage("speech_generation"))?;
            content.advance(Stage::SpeechCreated)?;
        } else {
            info!("skipping speech generation, checkpoint already reached");
        }

        // Stage: per-language extension and audio mixing, in parallel
        if !content.reached(Stage::VideoEdited) {
            let spec: &ShortVideo = content;
            let background = if self.audio_settings.background.urls.is_empty() {
                None
            } else {
                let path = spec.background_path();
                self.editor
                    .fetch_background_track(&self.audio_settings.background.urls, &path)
                    .await
                    .map_err(|e| e.at_stage("video_editing"))?;
                Some(path)
            };

            let tasks = spec.languages().iter().map(|lang| {
                self.edit_language(dispatcher, spec, &lang.code, background.as_deref())
            });
            join_language_results(join_all(tasks).await)
                .map_err(|e| e.at_stage("video_editing"))?;
            content.advance(Stage::VideoEdited)?;
        } else {
            info!("skipping video editing, checkpoint already reached");
        }

        // Stage: subtitles
        if self.settings.subtitles.enabled && !content.reached(Stage::SubtitlesAdded) {
            let spec: &ShortVideo = content;
            let tasks = spec
                .languages()
                .iter()
                .map(|lang| self.subtitle_language(spec, &lang.code));
            join_language_results(join_all(tasks).await)
                .map_err(|e| e.at_stage("subtitling"))?;
            content.advance(Stage::SubtitlesAdded)?;
        }

        Ok(content.final_video_paths())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_idea() -> Idea {
        Idea {
            id: "idea-1".to_string(),
            texts: HashMap::from([
                ("en".to_string(), "A calm forest story.".to_string()),
                ("es".to_string(), "Una historia tranquila.".to_string()),
            ]),
            captions: HashMap::from([("en".to_string(), "forest vibes".to_string())]),
            image_prompt: "forest, fog, morning light".to_string(),
            languages: vec!["en".to_string(), "es".to_string()],
        }
    }

    #[test]
    fn test_prompt_render_mentions_languages_and_count() {
        let prompt = ShortVideoPrompt {
            n_ideas: 2,
            text_details: "calming nature facts".to_string(),
            img_tags: "nature, cinematic".to_string(),
            languages: language::resolve_all(&["en".to_string(), "es".to_string()]).unwrap(),
        };
        let rendered = prompt.render();

        assert!(rendered.contains("Create 2 texts for social media."));
        assert!(rendered.contains("calming nature facts"));
        assert!(rendered.contains("starting with: nature, cinematic"));
        assert!(rendered.contains("English, Spanish"));
        assert!(rendered.contains("en, es"));
    }

    #[test]
    fn test_from_idea_creates_working_dir() {
        let root = tempfile::tempdir().unwrap();
        let spec = ShortVideo::from_idea(sample_idea(), root.path()).unwrap();

        assert!(spec.dir().starts_with(root.path()));
        assert!(spec.dir().join(IDEA_FILE).exists());
        assert!(spec.dir().join(STATE_FILE).exists());
        assert_eq!(spec.stage(), Stage::Initialized);
        assert_eq!(spec.text_for("en").unwrap(), "A calm forest story.");
    }

    #[test]
    fn test_from_idea_rejects_incomplete_ideas() {
        let root = tempfile::tempdir().unwrap();

        let mut missing_prompt = sample_idea();
        missing_prompt.image_prompt = "  ".to_string();
        assert!(matches!(
            ShortVideo::from_idea(missing_prompt, root.path()),
            Err(Error::Validation(_))
        ));

        let mut missing_text = sample_idea();
        missing_text.texts.remove("es");
        assert!(matches!(
            ShortVideo::from_idea(missing_text, root.path()),
            Err(Error::Validation(_))
        ));

        let mut no_languages = sample_idea();
        no_languages.languages.clear();
        assert!(matches!(
            ShortVideo::from_idea(no_languages, root.path()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_texts_keyed_by_name_normalize_to_codes() {
        let root = tempfile::tempdir().unwrap();
        let mut idea = sample_idea();
        idea.texts = HashMap::from([
            ("English".to_string(), "By name.".to_string()),
            ("Spanish".to_string(), "Por nombre.".to_string()),
        ]);

        let spec = ShortVideo::from_idea(idea, root.path()).unwrap();
        assert_eq!(spec.text_for("en").unwrap(), "By name.");
        assert_eq!(spec.text_for("es").unwrap(), "Por nombre.");
    }

    #[test]
    fn test_load_roundtrip_with_state() {
        let root = tempfile::tempdir().unwrap();
        let mut spec = ShortVideo::from_idea(sample_idea(), root.path()).unwrap();
        spec.advance(Stage::VideoCreated).unwrap();

        let reloaded = ShortVideo::load(spec.dir()).unwrap();
        assert_eq!(reloaded.stage(), Stage::VideoCreated);
        assert!(reloaded.reached(Stage::ImageCreated));
        assert!(!reloaded.reached(Stage::SpeechCreated));
        assert_eq!(reloaded.idea().id, "idea-1");
    }

    #[test]
    fn test_purge_keeps_finals_and_records() {
        let root = tempfile::tempdir().unwrap();
        let spec = ShortVideo::from_idea(sample_idea(), root.path()).unwrap();

        // Fake a full run's artifacts.
        for path in [
            spec.image_path(),
            spec.video_path(),
            spec.speech_path("en"),
            spec.final_audio_path("en"),
            spec.edited_video_path("en"),
            spec.subtitled_video_path("en"),
            spec.subtitled_video_path("es"),
        ] {
            std::fs::write(path, b"artifact").unwrap();
        }

        spec.purge().unwrap();

        assert!(!spec.image_path().exists());
        assert!(!spec.video_path().exists());
        assert!(!spec.speech_path("en").exists());
        assert!(!spec.edited_video_path("en").exists());
        assert!(spec.subtitled_video_path("en").exists());
        assert!(spec.subtitled_video_path("es").exists());
        assert!(spec.dir().join(IDEA_FILE).exists());

        // Idempotent: a second purge changes nothing and does not fail.
        spec.purge().unwrap();
        assert!(spec.subtitled_video_path("en").exists());
    }

    #[test]
    fn test_purge_on_fresh_spec_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        let spec = ShortVideo::from_idea(sample_idea(), root.path()).unwrap();
        spec.purge().unwrap();
        spec.purge().unwrap();
        assert!(spec.dir().join(IDEA_FILE).exists());
    }

    #[test]
    fn test_join_language_results() {
        let ok: Vec<Result<u32>> = vec![Ok(1), Ok(2)];
        assert_eq!(join_language_results(ok).unwrap(), vec![1, 2]);

        let mixed: Vec<Result<u32>> = vec![
            Ok(1),
            Err(Error::Validation("first".into())),
            Err(Error::Validation("second".into())),
        ];
        let err = join_language_results(mixed).unwrap_err();
        assert!(err.to_string().contains("first"));
    }
}
