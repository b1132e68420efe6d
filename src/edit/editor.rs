//! Media Editor Seam
//!
//! The content pipeline talks to its editing collaborator through the
//! [`MediaEditor`] trait: duration probing, clip stretching, audio
//! finalizing, muxing, and subtitle burn-in. The production implementation
//! drives ffmpeg/yt-dlp; a mock implementation lets pipelines run in tests
//! without media binaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::{ExtendMethod, SubtitleSettings};
use crate::error::Result;
use crate::providers::MediaDispatcher;

use super::audio;
use super::ffmpeg::Ffmpeg;
use super::subtitles;
use super::video;

// =============================================================================
// MediaEditor Trait
// =============================================================================

/// Editing collaborator contract used by content pipelines.
#[async_trait]
pub trait MediaEditor: Send + Sync {
    /// Duration of a media file in seconds.
    async fn duration(&self, media: &Path) -> Result<f64>;

    /// Renders a still image as a fixed-duration clip at `output`.
    async fn still_video(&self, image: &Path, duration: f64, output: &Path) -> Result<()>;

    /// Stretches `video` to exactly `target_duration` seconds at `output`.
    ///
    /// `Loop` repeats a boomeranged copy of the clip; `Ai` asks the video
    /// provider for continuation clips seeded from the last frame. Both trim
    /// to the exact target afterwards.
    async fn extend_video(
        &self,
        dispatcher: &MediaDispatcher,
        video: &Path,
        target_duration: f64,
        method: ExtendMethod,
        prompt: &str,
        output: &Path,
    ) -> Result<()>;

    /// Downloads a random background track to `output`.
    async fn fetch_background_track(&self, urls: &[String], output: &Path) -> Result<()>;

    /// Appends trailing silence to the speech track, mixes in a random
    /// section of the background track when one is given, and writes the
    /// final audio to `output`.
    async fn finalize_speech_track(
        &self,
        speech: &Path,
        background: Option<&Path>,
        relative_volume: f64,
        trailing_silence: f64,
        output: &Path,
    ) -> Result<()>;

    /// Muxes `audio` onto `video` at `output`.
    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Burns timed subtitles for `text` into `video` at `output`.
    async fn burn_subtitles(
        &self,
        video: &Path,
        text: &str,
        speech_duration: f64,
        style: &SubtitleSettings,
        output: &Path,
    ) -> Result<()>;
}

// =============================================================================
// FfmpegEditor
// =============================================================================

/// Production editor backed by ffmpeg/ffprobe/yt-dlp.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEditor {
    ffmpeg: Ffmpeg,
}

impl FfmpegEditor {
    /// Creates an editor using binaries from PATH.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an editor over a detected/custom ffmpeg installation.
    pub fn with_ffmpeg(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }
}

#[async_trait]
impl MediaEditor for FfmpegEditor {
    async fn duration(&self, media: &Path) -> Result<f64> {
        self.ffmpeg.probe_duration(media).await
    }

    async fn still_video(&self, image: &Path, duration: f64, output: &Path) -> Result<()> {
        video::video_from_image(&self.ffmpeg, image, duration, output).await?;
        Ok(())
    }

    async fn extend_video(
        &self,
        dispatcher: &MediaDispatcher,
        video_path: &Path,
        target_duration: f64,
        method: ExtendMethod,
        prompt: &str,
        output: &Path,
    ) -> Result<()> {
        let extended = video::extend_to_duration(
            &self.ffmpeg,
            dispatcher,
            video_path,
            target_duration,
            method,
            prompt,
        )
        .await?;
        tokio::fs::rename(&extended, output).await?;
        Ok(())
    }

    async fn fetch_background_track(&self, urls: &[String], output: &Path) -> Result<()> {
        audio::download_background_track(urls, output).await?;
        Ok(())
    }

    async fn finalize_speech_track(
        &self,
        speech: &Path,
        background: Option<&Path>,
        relative_volume: f64,
        trailing_silence: f64,
        output: &Path,
    ) -> Result<()> {
        let padded = audio::add_silence(&self.ffmpeg, speech, trailing_silence).await?;

        let finalized = match background {
            Some(track) => {
                let padded_duration = self.ffmpeg.probe_duration(&padded).await?;
                let section =
                    audio::extract_random_section(&self.ffmpeg, track, padded_duration).await?;
                audio::mix(&self.ffmpeg, &padded, &section, relative_volume).await?
            }
            None => padded,
        };

        // The finalized track may still be the original speech file; copy so
        // the source artifact survives for inspection.
        tokio::fs::copy(&finalized, output).await?;
        Ok(())
    }

    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, output: &Path) -> Result<()> {
        let muxed = video::add_audio_to_video(&self.ffmpeg, video_path, audio_path).await?;
        tokio::fs::rename(&muxed, output).await?;
        Ok(())
    }

    async fn burn_subtitles(
        &self,
        video_path: &Path,
        text: &str,
        speech_duration: f64,
        style: &SubtitleSettings,
        output: &Path,
    ) -> Result<()> {
        let cues = subtitles::build_cues(text, speech_duration, style.max_words_per_line);
        subtitles::burn(&self.ffmpeg, video_path, &cues, style, output).await?;
        Ok(())
    }
}

// =============================================================================
// Mock Editor for Testing
// =============================================================================

/// Mock editor: writes placeholder artifacts and records the operations it
/// was asked to perform, so pipelines can be exercised without ffmpeg.
#[derive(Debug)]
pub struct MockEditor {
    /// Fallback duration reported for unknown media files
    default_duration: Mutex<f64>,
    /// Per-path duration overrides
    durations: Mutex<HashMap<PathBuf, f64>>,
    /// (video, target_duration) pairs passed to `extend_video`
    extend_calls: Mutex<Vec<(PathBuf, f64)>>,
}

impl MockEditor {
    /// Creates a mock editor reporting 3 seconds for every file.
    pub fn new() -> Self {
        Self {
            default_duration: Mutex::new(3.0),
            durations: Mutex::new(HashMap::new()),
            extend_calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the fallback duration.
    pub fn with_default_duration(self, seconds: f64) -> Self {
        *self.default_duration.lock().unwrap() = seconds;
        self
    }

    /// Sets the duration reported for one path.
    pub fn set_duration(&self, path: impl Into<PathBuf>, seconds: f64) {
        self.durations.lock().unwrap().insert(path.into(), seconds);
    }

    /// Returns the recorded `(video, target_duration)` extension calls.
    pub fn extend_calls(&self) -> Vec<(PathBuf, f64)> {
        self.extend_calls.lock().unwrap().clone()
    }

    async fn write_placeholder(&self, output: &Path, label: &str) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, format!("mock {} artifact", label)).await?;
        Ok(())
    }
}

impl Default for MockEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEditor for MockEditor {
    async fn duration(&self, media: &Path) -> Result<f64> {
        let durations = self.durations.lock().unwrap();
        Ok(durations
            .get(media)
            .copied()
            .unwrap_or(*self.default_duration.lock().unwrap()))
    }

    async fn still_video(&self, _image: &Path, _duration: f64, output: &Path) -> Result<()> {
        self.write_placeholder(output, "still video").await
    }

    async fn extend_video(
        &self,
        _dispatcher: &MediaDispatcher,
        video: &Path,
        target_duration: f64,
        _method: ExtendMethod,
        _prompt: &str,
        output: &Path,
    ) -> Result<()> {
        self.extend_calls
            .lock()
            .unwrap()
            .push((video.to_path_buf(), target_duration));
        // The stretched clip matches the requested duration exactly.
        self.durations
            .lock()
            .unwrap()
            .insert(output.to_path_buf(), target_duration);
        self.write_placeholder(output, "extended video").await
    }

    async fn fetch_background_track(&self, _urls: &[String], output: &Path) -> Result<()> {
        self.write_placeholder(output, "background track").await
    }

    async fn finalize_speech_track(
        &self,
        _speech: &Path,
        _background: Option<&Path>,
        _relative_volume: f64,
        _trailing_silence: f64,
        output: &Path,
    ) -> Result<()> {
        self.write_placeholder(output, "final audio").await
    }

    async fn mux_audio(&self, video: &Path, _audio: &Path, output: &Path) -> Result<()> {
        // The muxed clip keeps the video duration.
        let video_duration = self.duration(video).await?;
        self.durations
            .lock()
            .unwrap()
            .insert(output.to_path_buf(), video_duration);
        self.write_placeholder(output, "muxed video").await
    }

    async fn burn_subtitles(
        &self,
        video: &Path,
        _text: &str,
        _speech_duration: f64,
        _style: &SubtitleSettings,
        output: &Path,
    ) -> Result<()> {
        let video_duration = self.duration(video).await?;
        self.durations
            .lock()
            .unwrap()
            .insert(output.to_path_buf(), video_duration);
        self.write_placeholder(output, "subtitled video").await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_editor_durations() {
        let editor = MockEditor::new().with_default_duration(4.5);
        assert_eq!(editor.duration(Path::new("/a.mp3")).await.unwrap(), 4.5);

        editor.set_duration("/a.mp3", 7.0);
        assert_eq!(editor.duration(Path::new("/a.mp3")).await.unwrap(), 7.0);
    }

    #[tokio::test]
    async fn test_mock_editor_records_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");

        let editor = MockEditor::new();
        let dispatcher = MediaDispatcher::new();
        editor
            .extend_video(
                &dispatcher,
                Path::new("/base.mp4"),
                12.0,
                ExtendMethod::Loop,
                "",
                &output,
            )
            .await
            .unwrap();

        assert_eq!(
            editor.extend_calls(),
            vec![(PathBuf::from("/base.mp4"), 12.0)]
        );
        assert_eq!(editor.duration(&output).await.unwrap(), 12.0);
        assert!(output.exists());
    }
}
