//! Audio Editing Operations
//!
//! ffmpeg-based speech/background processing: trailing silence, random
//! section extraction, volume-weighted mixing, and background-track download
//! through yt-dlp.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::ffmpeg::{derive_path, Ffmpeg};

/// Downloads one of the candidate URLs as an MP3, picked at random.
///
/// Delegates to the `yt-dlp` binary; its stderr tail is surfaced on failure.
pub async fn download_background_track(urls: &[String], output: &Path) -> Result<PathBuf> {
    if urls.is_empty() {
        return Err(Error::Validation(
            "background track URL list is empty".into(),
        ));
    }

    let selected = {
        let mut rng = rand::thread_rng();
        &urls[rng.gen_range(0..urls.len())]
    };
    info!("downloading background track from {}", selected);

    let output_arg = output.to_string_lossy();
    let result = tokio::process::Command::new("yt-dlp")
        .args([
            "-x",
            "--audio-format",
            "mp3",
            "-o",
            output_arg.as_ref(),
            selected.as_str(),
        ])
        .output()
        .await
        .map_err(|e| {
            Error::editing(
                "background_download",
                format!("failed to start yt-dlp: {}", e),
            )
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!("background track download failed; a VPN can cause this");
        return Err(Error::editing(
            "background_download",
            stderr.trim().chars().take(600).collect::<String>(),
        ));
    }

    Ok(output.to_path_buf())
}

/// Appends trailing silence to an audio track.
pub async fn add_silence(ffmpeg: &Ffmpeg, audio: &Path, seconds: f64) -> Result<PathBuf> {
    if seconds <= 0.0 {
        return Ok(audio.to_path_buf());
    }
    let output = derive_path(audio, "_silence");
    ffmpeg
        .run(
            "add_silence",
            [
                "-i".as_ref(),
                audio.as_os_str(),
                "-f".as_ref(),
                "lavfi".as_ref(),
                "-t".as_ref(),
                format!("{:.3}", seconds).as_ref(),
                "-i".as_ref(),
                "anullsrc=channel_layout=stereo:sample_rate=44100".as_ref(),
                "-filter_complex".as_ref(),
                "[0:a][1:a]concat=n=2:v=0:a=1[out]".as_ref(),
                "-map".as_ref(),
                "[out]".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output)
}

/// Cuts a random section of the given length out of a longer track.
pub async fn extract_random_section(
    ffmpeg: &Ffmpeg,
    audio: &Path,
    duration: f64,
) -> Result<PathBuf> {
    let total = ffmpeg.probe_duration(audio).await?;
    if duration > total {
        return Err(Error::Validation(format!(
            "requested section ({:.1}s) is longer than the track ({:.1}s)",
            duration, total
        )));
    }

    let start = {
        let mut rng = rand::thread_rng();
        rng.gen_range(0.0..=(total - duration))
    };
    info!(
        "extracting audio section from {:.1}s to {:.1}s",
        start,
        start + duration
    );

    let output = derive_path(audio, "_section");
    ffmpeg
        .run(
            "extract_section",
            [
                "-i".as_ref(),
                audio.as_os_str(),
                "-ss".as_ref(),
                format!("{:.3}", start).as_ref(),
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

/// Mixes two tracks with a relative volume balance in [0, 2]:
/// 0 keeps only the primary track, 1 mixes equally, 2 keeps only the
/// secondary track.
pub async fn mix(
    ffmpeg: &Ffmpeg,
    primary: &Path,
    secondary: &Path,
    relative_volume: f64,
) -> Result<PathBuf> {
    if !(0.0..=2.0).contains(&relative_volume) {
        return Err(Error::Validation(format!(
            "relative volume must be between 0 and 2, got {}",
            relative_volume
        )));
    }

    let primary_volume = 2.0 - relative_volume;
    let secondary_volume = relative_volume;
    let filter = format!(
        "[0:a]volume={:.3}[a0];[1:a]volume={:.3}[a1];\
         [a0][a1]amix=inputs=2:duration=longest:dropout_transition=2",
        primary_volume, secondary_volume
    );

    let output = derive_path(primary, "_mix");
    ffmpeg
        .run(
            "mix",
            [
                "-i".as_ref(),
                primary.as_os_str(),
                "-i".as_ref(),
                secondary.as_os_str(),
                "-filter_complex".as_ref(),
                filter.as_ref(),
                "-c:a".as_ref(),
                "libmp3lame".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await?;
    Ok(output)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_requires_urls() {
        let err = download_background_track(&[], Path::new("/tmp/bg.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_mix_rejects_out_of_range_volume() {
        let ffmpeg = Ffmpeg::new();
        let err = mix(
            &ffmpeg,
            Path::new("/tmp/a.mp3"),
            Path::new("/tmp/b.mp3"),
            2.5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_zero_silence_is_a_no_op() {
        let ffmpeg = Ffmpeg::new();
        let path = Path::new("/tmp/a.mp3");
        let out = add_silence(&ffmpeg, path, 0.0).await.unwrap();
        assert_eq!(out, path);
    }
}
