//! Subtitle Generation and Burn-in
//!
//! Builds timed subtitle cues from the spoken text, renders them as an ASS
//! script, and burns them into the video with ffmpeg.

use std::path::{Path, PathBuf};

use crate::config::SubtitleSettings;
use crate::error::{Error, Result};

use super::ffmpeg::{derive_path, Ffmpeg};

/// One timed subtitle line
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Line text
    pub text: String,
}

/// Splits the spoken text into short cues and distributes the duration
/// across them proportionally to their length.
pub fn build_cues(text: &str, duration: f64, max_words_per_line: usize) -> Vec<SubtitleCue> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || duration <= 0.0 {
        return Vec::new();
    }

    let chunk_size = max_words_per_line.max(1);
    let lines: Vec<String> = words
        .chunks(chunk_size)
        .map(|chunk| chunk.join(" "))
        .collect();

    let total_chars: usize = lines.iter().map(|line| line.chars().count().max(1)).sum();
    let mut cues = Vec::with_capacity(lines.len());
    let mut cursor = 0.0;

    for (i, line) in lines.iter().enumerate() {
        let weight = line.chars().count().max(1) as f64 / total_chars as f64;
        let end = if i == lines.len() - 1 {
            // Rounding drift lands on the last cue.
            duration
        } else {
            cursor + weight * duration
        };
        cues.push(SubtitleCue {
            start: cursor,
            end,
            text: line.clone(),
        });
        cursor = end;
    }

    cues
}

/// Formats a timestamp in ASS `h:mm:ss.cs` notation.
pub(crate) fn format_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, cs)
}

/// Maps a placement name to the ASS numpad alignment code.
pub(crate) fn alignment_code(alignment: &str) -> u8 {
    match alignment {
        "bottom_left" => 1,
        "bottom_center" => 2,
        "bottom_right" => 3,
        "middle_left" => 4,
        "middle_center" => 5,
        "middle_right" => 6,
        "top_left" => 7,
        "top_center" => 8,
        "top_right" => 9,
        _ => 5,
    }
}

/// Escapes a cue text for an ASS Dialogue line.
fn escape_ass_text(text: &str) -> String {
    // Braces open ASS override blocks; newlines become soft breaks.
    let cleaned: String = text.chars().filter(|c| *c != '{' && *c != '}').collect();
    cleaned.replace('\n', "\\N")
}

/// Renders cues into a complete ASS script.
pub fn render_ass(cues: &[SubtitleCue], style: &SubtitleSettings) -> String {
    let mut script = String::new();
    script.push_str("[Script Info]\n");
    script.push_str("ScriptType: v4.00+\n");
    script.push_str("WrapStyle: 0\n");
    script.push_str("ScaledBorderAndShadow: yes\n\n");

    script.push_str("[V4+ Styles]\n");
    script.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BackColour, \
         Bold, Outline, Shadow, Alignment, MarginL, MarginR, MarginV\n",
    );
    script.push_str(&format!(
        "Style: Default,{},{},&H00FFFFFF,&H00000000,&H80000000,1,2,1,{},30,30,40\n\n",
        style.font,
        style.font_size,
        alignment_code(&style.alignment)
    ));

    script.push_str("[Events]\n");
    script.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for cue in cues {
        script.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            escape_ass_text(&cue.text)
        ));
    }

    script
}

/// Burns subtitles into a video, re-encoding the video stream.
pub async fn burn(
    ffmpeg: &Ffmpeg,
    video: &Path,
    cues: &[SubtitleCue],
    style: &SubtitleSettings,
    output: &Path,
) -> Result<PathBuf> {
    if cues.is_empty() {
        return Err(Error::Validation("no subtitle cues to burn".into()));
    }

    let script_path = derive_path(output, "_subs").with_extension("ass");
    tokio::fs::write(&script_path, render_ass(cues, style)).await?;

    let filter = format!("ass={}", escape_filter_path(&script_path));
    let result = ffmpeg
        .run(
            "burn_subtitles",
            [
                "-i".as_ref(),
                video.as_os_str(),
                "-vf".as_ref(),
                filter.as_ref(),
                "-c:a".as_ref(),
                "copy".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ],
        )
        .await;

    let _ = tokio::fs::remove_file(&script_path).await;
    result?;
    Ok(output.to_path_buf())
}

/// Escapes a path for use inside an ffmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ':' | '\\' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cues_covers_duration() {
        let cues = build_cues("one two three four five six seven eight", 8.0, 4);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, 0.0);
        assert_eq!(cues[1].end, 8.0);
        assert!(cues[0].end > cues[0].start);
        assert_eq!(cues[0].end, cues[1].start);
    }

    #[test]
    fn test_build_cues_empty_inputs() {
        assert!(build_cues("", 5.0, 4).is_empty());
        assert!(build_cues("hello", 0.0, 4).is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00:00.00");
        assert_eq!(format_timestamp(61.25), "0:01:01.25");
        assert_eq!(format_timestamp(3601.5), "1:00:01.50");
    }

    #[test]
    fn test_alignment_codes() {
        assert_eq!(alignment_code("bottom_center"), 2);
        assert_eq!(alignment_code("middle_center"), 5);
        assert_eq!(alignment_code("top_right"), 9);
        assert_eq!(alignment_code("nonsense"), 5);
    }

    #[test]
    fn test_render_ass_contains_style_and_cues() {
        let style = SubtitleSettings::default();
        let cues = build_cues("hello world", 2.0, 4);
        let script = render_ass(&cues, &style);

        assert!(script.contains("[Script Info]"));
        assert!(script.contains(&format!("Style: Default,{},{}", style.font, style.font_size)));
        assert!(script.contains("Dialogue: 0,0:00:00.00,0:00:02.00,Default,,0,0,0,,hello world"));
    }

    #[test]
    fn test_ass_text_escaping() {
        assert_eq!(escape_ass_text("a {b} c"), "a b c");
        assert_eq!(escape_ass_text("line\nbreak"), "line\\Nbreak");
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("/work/video_subs.ass")),
            "/work/video_subs.ass"
        );
        assert_eq!(escape_filter_path(Path::new("C:/subs.ass")), "C\\:/subs.ass");
    }
}
