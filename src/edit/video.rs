//! Video Editing Operations
//!
//! ffmpeg-based building blocks for the pipeline: loop/concat/trim to
//! stretch a clip, still-image rendering, last-frame extraction for
//! AI continuation, and audio muxing.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ExtendMethod;
use crate::error::{Error, Result};
use crate::media::{MediaKind, MediaRequest};
use crate::providers::MediaDispatcher;

use super::ffmpeg::{derive_path, Ffmpeg};

/// Muxes an audio track onto a video, keeping the shorter duration.
pub async fn add_audio_to_video(ffmpeg: &Ffmpeg, video: &Path, audio: &Path) -> Result<PathBuf> {
    let output = derive_path(video, "_w_audio");
    ffmpeg
        .run(
            "add_audio",
            [
                "-i".as_ref(),
                video.as_os_str(),
                "-i".as_ref(),
                audio.as_os_str(),
                "-map".as_ref(),
                "0:v".as_ref(),
                "-map".as_ref(),
                "1:a".as_ref(),
                "-c:v".as_ref(),
                "copy".as_ref(),
                "-shortest".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output)
}

/// Produces a forward-then-reverse version of the clip, so looping it does
/// not jump cut. Strips audio; speech is muxed later.
pub async fn apply_boomerang(ffmpeg: &Ffmpeg, video: &Path) -> Result<PathBuf> {
    let output = derive_path(video, "_boomerang");
    ffmpeg
        .run(
            "boomerang",
            [
                "-an".as_ref(),
                "-i".as_ref(),
                video.as_os_str(),
                "-filter_complex".as_ref(),
                "[0]split[b][c];[c]reverse[r];[b][r]concat".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output)
}

/// Concatenates `n` copies of a clip via the concat demuxer.
pub async fn concat_copies(ffmpeg: &Ffmpeg, video: &Path, n: usize) -> Result<PathBuf> {
    if n == 0 {
        return Err(Error::Validation("cannot concatenate zero copies".into()));
    }
    let entries = vec![video.to_path_buf(); n];
    concat_list(ffmpeg, video, &entries, "_loop").await
}

/// Concatenates a clip with follow-up clips, in order.
pub async fn concat_videos(
    ffmpeg: &Ffmpeg,
    video: &Path,
    followups: &[PathBuf],
) -> Result<PathBuf> {
    let mut entries = Vec::with_capacity(followups.len() + 1);
    entries.push(video.to_path_buf());
    entries.extend(followups.iter().cloned());
    concat_list(ffmpeg, video, &entries, "_concat").await
}

async fn concat_list(
    ffmpeg: &Ffmpeg,
    base: &Path,
    entries: &[PathBuf],
    suffix: &str,
) -> Result<PathBuf> {
    let output = derive_path(base, suffix);
    let list_path = derive_path(base, "_concat_list").with_extension("txt");

    let mut list = String::new();
    for entry in entries {
        let absolute = std::fs::canonicalize(entry).unwrap_or_else(|_| entry.clone());
        list.push_str(&format!("file '{}'\n", absolute.display()));
    }
    tokio::fs::write(&list_path, list).await?;

    let result = ffmpeg
        .run(
            "concat",
            [
                "-f".as_ref(),
                "concat".as_ref(),
                "-safe".as_ref(),
                "0".as_ref(),
                "-i".as_ref(),
                list_path.as_os_str(),
                "-c".as_ref(),
                "copy".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await;

    let _ = tokio::fs::remove_file(&list_path).await;
    result?;
    Ok(output)
}

/// Trims a clip to an exact duration without re-encoding.
pub async fn trim(ffmpeg: &Ffmpeg, video: &Path, duration: f64) -> Result<PathBuf> {
    if duration <= 0.0 {
        return Err(Error::Validation(
            "trim duration must be greater than 0 seconds".into(),
        ));
    }
    let output = derive_path(video, "_trim");
    ffmpeg
        .run(
            "trim",
            [
                "-i".as_ref(),
                video.as_os_str(),
                "-t".as_ref(),
                format!("{:.3}", duration).as_ref(),
                "-c".as_ref(),
                "copy".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output)
}

/// Extracts the last frame of a clip as a JPEG, for seeding continuation
/// generation.
pub async fn extract_last_frame(ffmpeg: &Ffmpeg, video: &Path) -> Result<PathBuf> {
    let output = derive_path(video, "_lastframe").with_extension("jpg");
    ffmpeg
        .run(
            "extract_last_frame",
            [
                "-y".as_ref(),
                "-sseof".as_ref(),
                "-3".as_ref(),
                "-i".as_ref(),
                video.as_os_str(),
                "-vsync".as_ref(),
                "0".as_ref(),
                "-q:v".as_ref(),
                "0".as_ref(),
                "-update".as_ref(),
                "true".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output)
}

/// Renders a still image as a fixed-duration H.264 clip.
pub async fn video_from_image(
    ffmpeg: &Ffmpeg,
    image: &Path,
    duration: f64,
    output: &Path,
) -> Result<PathBuf> {
    if duration <= 0.0 {
        return Err(Error::Validation(
            "still clip duration must be greater than 0 seconds".into(),
        ));
    }
    ffmpeg
        .run(
            "still_video",
            [
                "-loop".as_ref(),
                "1".as_ref(),
                "-i".as_ref(),
                image.as_os_str(),
                "-c:v".as_ref(),
                "libx264".as_ref(),
                "-t".as_ref(),
                format!("{:.3}", duration).as_ref(),
                "-pix_fmt".as_ref(),
                "yuv420p".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output.to_path_buf())
}

/// Number of clip repetitions needed to reach a target duration.
pub(crate) fn loops_needed(target_duration: f64, clip_duration: f64) -> usize {
    if clip_duration <= 0.0 {
        return 1;
    }
    (target_duration / clip_duration).ceil().max(1.0) as usize
}

/// Stretches a clip to at least `target_duration`, then trims to it exactly.
///
/// `Loop` boomerangs the clip and repeats it; `Ai` generates continuation
/// clips seeded from the last frame through the video provider until the
/// accumulated footage is long enough.
pub async fn extend_to_duration(
    ffmpeg: &Ffmpeg,
    dispatcher: &MediaDispatcher,
    video: &Path,
    target_duration: f64,
    method: ExtendMethod,
    prompt: &str,
) -> Result<PathBuf> {
    if target_duration <= 0.0 {
        return Err(Error::Validation(
            "target duration must be greater than 0 seconds".into(),
        ));
    }

    let extended = match method {
        ExtendMethod::Loop => {
            let boom = apply_boomerang(ffmpeg, video).await?;
            let clip_duration = ffmpeg.probe_duration(&boom).await?;
            let n = loops_needed(target_duration, clip_duration);
            if n > 1 {
                concat_copies(ffmpeg, &boom, n).await?
            } else {
                boom
            }
        }
        ExtendMethod::Ai => ai_continuation(ffmpeg, dispatcher, video, target_duration, prompt).await?,
    };

    trim(ffmpeg, &extended, target_duration).await
}

/// Generates continuation clips until the footage covers the target
/// duration, each seeded from the last frame of the previous clip.
async fn ai_continuation(
    ffmpeg: &Ffmpeg,
    dispatcher: &MediaDispatcher,
    video: &Path,
    target_duration: f64,
    prompt: &str,
) -> Result<PathBuf> {
    if prompt.trim().is_empty() {
        warn!("no prompt provided for video continuation generation");
    }

    let mut total = ffmpeg.probe_duration(video).await?;
    let mut current = video.to_path_buf();
    let mut followups: Vec<PathBuf> = Vec::new();

    while total < target_duration {
        let index = followups.len();
        let continuation_path = derive_path(video, &format!("_ai_extension{}", index));
        let last_frame = extract_last_frame(ffmpeg, &current).await?;

        info!(
            "generating continuation clip {} ({}s of {}s covered)",
            index, total, target_duration
        );
        let request = MediaRequest::new(MediaKind::Video, prompt)
            .with_input_image(&last_frame)
            .with_output(&continuation_path);
        let result = dispatcher.dispatch(request).await?;
        let clip = result.require_path()?.to_path_buf();

        total += ffmpeg.probe_duration(&clip).await?;
        followups.push(clip.clone());
        current = clip;
    }

    if followups.is_empty() {
        Ok(video.to_path_buf())
    } else {
        concat_videos(ffmpeg, video, &followups).await
    }
}

// =============================================================================
// Tests
// =============================================================================
