/*!
 * ffprobe/ffmpeg backed probing, splitting and rendering.
 */

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::collaborators::{MediaProbe, MediaSplitter, Renderer, run_tool};
use crate::cue::{ChunkSpan, Page};
use crate::errors::StageError;
use crate::srt;
use crate::subtitles::compute_render_style;

/// Locations and limits for the ffmpeg tool pair
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Timeout for probing and splitting one chunk
    pub timeout: Duration,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl FfmpegTool {
    async fn probe(&self, args: &[&str], path: &Path) -> Result<String, StageError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(StageError::Probe(format!("Media file not found: {}", path.display())));
        }
        let mut command = Command::new(&self.ffprobe);
        command.args(args).arg(path);
        let output = run_tool(command, "ffprobe", self.timeout)
            .await
            .map_err(StageError::Probe)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parse ffprobe's `format=duration` output (seconds) into ms
pub fn parse_duration_ms(raw: &str) -> Result<u64, StageError> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| StageError::Probe(format!("Unexpected duration from ffprobe: '{}'", raw)))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(StageError::Probe(format!("Invalid media duration: {}", secs)));
    }
    Ok((secs * 1_000.0).round() as u64)
}

/// Parse ffprobe's JSON stream listing into (width, height)
pub fn parse_dimensions(raw: &str) -> Result<(u32, u32), StageError> {
    let json: Value = serde_json::from_str(raw)
        .map_err(|e| StageError::Probe(format!("Failed to parse ffprobe output: {}", e)))?;
    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|streams| streams.first())
        .ok_or_else(|| StageError::Probe("No video stream found".to_string()))?;
    let dimension = |key: &str| {
        stream
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| StageError::Probe(format!("Video stream has no {}", key)))
    };
    Ok((dimension("width")?, dimension("height")?))
}

#[async_trait]
impl MediaProbe for FfmpegTool {
    async fn probe_duration(&self, path: &Path) -> Result<u64, StageError> {
        let raw = self
            .probe(
                &["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
                path,
            )
            .await?;
        parse_duration_ms(&raw)
    }

    async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), StageError> {
        let raw = self
            .probe(
                &["-v", "error", "-select_streams", "v:0", "-show_entries", "stream=width,height", "-of", "json"],
                path,
            )
            .await?;
        parse_dimensions(&raw)
    }
}

/// Seconds with millisecond precision, as ffmpeg expects for -ss/-t
fn ffmpeg_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1_000, ms % 1_000)
}

#[async_trait]
impl MediaSplitter for FfmpegTool {
    /// Cuts the span as 16 kHz mono WAV, the input the transcriber expects
    async fn split(&self, source: &Path, span: ChunkSpan, dest_dir: &Path) -> Result<PathBuf, StageError> {
        let output = dest_dir.join(format!("chunk_{:04}.wav", span.index));
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-v", "error", "-y", "-ss", &ffmpeg_seconds(span.start_offset_ms), "-i"])
            .arg(source)
            .args(["-t", &ffmpeg_seconds(span.length_ms), "-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"])
            .arg(&output);

        run_tool(command, "ffmpeg", self.timeout)
            .await
            .map_err(StageError::Split)?;

        let size = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(StageError::Split(format!("ffmpeg produced an empty chunk: {}", output.display())));
        }
        debug!("Cut chunk {} ({} ms) to {}", span.index, span.length_ms, output.display());
        Ok(output)
    }
}

/// Burns pages into a video with ffmpeg's `subtitles` filter
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    pub tool: FfmpegTool,
    pub content_scale: f64,
    pub font_name: Option<String>,
    pub render_timeout: Duration,
}

impl FfmpegRenderer {
    pub fn new(tool: FfmpegTool, content_scale: f64, font_name: Option<String>, render_timeout: Duration) -> Self {
        Self {
            tool,
            content_scale,
            font_name,
            render_timeout,
        }
    }
}

/// Escape a path for use inside a filtergraph option value
pub fn escape_filter_path(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '\\' => escaped.push('/'),
            ':' | '\'' | ',' | '[' | ']' | ';' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, video_path: &Path, pages: &[Page], output_path: &Path) -> Result<PathBuf, StageError> {
        let (width, height) = self.tool.probe_dimensions(video_path).await.map_err(|e| match e {
            StageError::Probe(msg) => StageError::Render(msg),
            other => other,
        })?;
        let is_bilingual = pages.iter().any(|p| !p.primary_line.is_empty() && !p.secondary_line.is_empty());
        let mut style = compute_render_style(width, height, is_bilingual, self.content_scale);
        if let Some(font) = self.font_name.as_deref().filter(|f| !f.is_empty()) {
            style.font_name = font.to_string();
        }

        let subtitle_file = tempfile::Builder::new().prefix("subforge-burn-").suffix(".srt").tempfile()?;
        tokio::fs::write(subtitle_file.path(), srt::compose_pages(pages)).await?;

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let filter = format!(
            "subtitles=filename='{}':force_style='{}'",
            escape_filter_path(subtitle_file.path()),
            style.force_style()
        );
        info!("Rendering {}x{} video with font size {}", width, height, style.font_size);

        let mut command = Command::new(&self.tool.ffmpeg);
        command
            .args(["-v", "error", "-y", "-i"])
            .arg(video_path)
            .args(["-vf", &filter])
            .args(["-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "128k"])
            .arg(output_path);

        run_tool(command, "ffmpeg", self.render_timeout)
            .await
            .map_err(StageError::Render)?;

        Ok(output_path.to_path_buf())
    }
}
