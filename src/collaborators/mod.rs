/*!
 * Narrow contracts for the external tools the pipeline drives.
 *
 * The pipeline only sees these traits. Retries for transient failures are
 * the implementation's business; whatever error a collaborator returns is
 * final for the chunk or run that called it.
 */

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::cue::{Chunk, ChunkSpan, Cue, Page};
use crate::errors::{StageError, TranslationError};

pub mod downloader;
pub mod ffmpeg;
pub mod translator;
pub mod whisper;

pub use downloader::YtDlpDownloader;
pub use ffmpeg::{FfmpegRenderer, FfmpegTool};
pub use translator::LlmTranslator;
pub use whisper::WhisperTranscriber;

/// Makes a source available as a local file
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Resolve `source` (a local path or a URL) to a local media file,
    /// downloading into `dest_dir` when needed
    async fn fetch(&self, source: &str, dest_dir: &Path) -> Result<PathBuf, StageError>;
}

/// Reads media metadata
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Total duration in ms
    async fn probe_duration(&self, path: &Path) -> Result<u64, StageError>;

    /// Width and height of the first video stream
    async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), StageError>;
}

/// Cuts a time range out of a media file
#[async_trait]
pub trait MediaSplitter: Send + Sync {
    /// Write the media for `span` into `dest_dir` and return its path
    async fn split(&self, source: &Path, span: ChunkSpan, dest_dir: &Path) -> Result<PathBuf, StageError>;
}

/// Speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Cues in chunk-local time, non-overlapping. `work_dir` is private to
    /// this chunk.
    async fn transcribe(&self, chunk: &Chunk, work_dir: &Path) -> Result<Vec<Cue>, StageError>;
}

/// Text translation of cues
#[async_trait]
pub trait Translator: Send + Sync {
    /// Must return exactly one cue per input cue with unchanged timings
    async fn translate(&self, cues: &[Cue]) -> Result<Vec<Cue>, TranslationError>;
}

/// Burns pages into a video
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, video_path: &Path, pages: &[Page], output_path: &Path) -> Result<PathBuf, StageError>;
}

/// The full set of collaborators a run needs
#[derive(Clone)]
pub struct Collaborators {
    pub downloader: Arc<dyn Downloader>,
    pub probe: Arc<dyn MediaProbe>,
    pub splitter: Arc<dyn MediaSplitter>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub renderer: Arc<dyn Renderer>,
}

/// Run an external tool to completion, killing it after `timeout`.
///
/// A non-zero exit is an error carrying the tail of stderr.
pub(crate) async fn run_tool(mut command: Command, name: &str, timeout: Duration) -> Result<Output, String> {
    command.kill_on_drop(true);
    let tool_future = command.output();

    let output = tokio::select! {
        result = tool_future => {
            result.map_err(|e| format!("Failed to execute {}: {}", name, e))?
        },
        _ = tokio::time::sleep(timeout) => {
            return Err(format!("{} timed out after {} s", name, timeout.as_secs()));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} exited with {}: {}", name, output.status, stderr_tail(&stderr)));
    }
    Ok(output)
}

/// Last few meaningful lines of a tool's stderr
pub(crate) fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join(" | ")
}
