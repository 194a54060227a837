/*!
 * Mock collaborator implementations for testing
 *
 * These stand in for ffmpeg, whisper, the LLM translator and the renderer so
 * pipeline tests run without any external tool. Mocks record what they were
 * asked to do so tests can assert on it.
 */

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use subforge::collaborators::{MediaProbe, MediaSplitter, Renderer, Transcriber, Translator};
use subforge::cue::{Chunk, ChunkSpan, Cue, Page};
use subforge::errors::{StageError, TranslationError};
use subforge::pipeline::{ProgressSink, RunStatus};

/// `count` cues spread evenly over the chunk, in chunk-local time
pub fn spaced_cues(chunk: &Chunk, count: usize) -> Vec<Cue> {
    if count == 0 {
        return Vec::new();
    }
    let slot = chunk.length_ms / count as u64;
    (0..count)
        .map(|i| {
            let start = i as u64 * slot;
            let end = start + (slot * 4 / 5).max(1);
            Cue::new(i + 1, start, end, format!("chunk {} line {}", chunk.index, i))
        })
        .collect()
}

/// Reports a fixed duration and 1280x720
pub struct FixedProbe {
    pub duration_ms: u64,
}

impl FixedProbe {
    pub fn new(duration_ms: u64) -> Self {
        Self { duration_ms }
    }
}

#[async_trait]
impl MediaProbe for FixedProbe {
    async fn probe_duration(&self, _path: &Path) -> Result<u64, StageError> {
        Ok(self.duration_ms)
    }

    async fn probe_dimensions(&self, _path: &Path) -> Result<(u32, u32), StageError> {
        Ok((1280, 720))
    }
}

/// Writes a small placeholder file per span and records the spans
#[derive(Default)]
pub struct StubSplitter {
    pub spans: Mutex<Vec<ChunkSpan>>,
}

impl StubSplitter {
    pub fn recorded_spans(&self) -> Vec<ChunkSpan> {
        self.spans.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSplitter for StubSplitter {
    async fn split(&self, _source: &Path, span: ChunkSpan, dest_dir: &Path) -> Result<PathBuf, StageError> {
        let path = dest_dir.join(format!("chunk_{:04}.wav", span.index));
        tokio::fs::write(&path, b"chunk").await?;
        self.spans.lock().unwrap().push(span);
        Ok(path)
    }
}

/// Produces `cues_per_chunk` cues per chunk, optionally failing on one chunk
pub struct ScriptedTranscriber {
    pub cues_per_chunk: usize,
    pub fail_at: Option<usize>,
    pub delay: Duration,
    chunk_delays: Vec<(usize, Duration)>,
    started: Mutex<Vec<usize>>,
    seen_media: Mutex<Vec<PathBuf>>,
}

impl ScriptedTranscriber {
    pub fn new(cues_per_chunk: usize) -> Self {
        Self {
            cues_per_chunk,
            fail_at: None,
            delay: Duration::ZERO,
            chunk_delays: Vec::new(),
            started: Mutex::new(Vec::new()),
            seen_media: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, chunk_index: usize) -> Self {
        self.fail_at = Some(chunk_index);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Overrides the delay for one chunk
    pub fn with_chunk_delay(mut self, chunk_index: usize, delay: Duration) -> Self {
        self.chunk_delays.push((chunk_index, delay));
        self
    }

    fn delay_for(&self, chunk_index: usize) -> Duration {
        self.chunk_delays
            .iter()
            .find(|(index, _)| *index == chunk_index)
            .map_or(self.delay, |(_, delay)| *delay)
    }

    /// Chunk indices in the order transcription started
    pub fn started(&self) -> Vec<usize> {
        self.started.lock().unwrap().clone()
    }

    pub fn seen_media(&self) -> Vec<PathBuf> {
        self.seen_media.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, chunk: &Chunk, work_dir: &Path) -> Result<Vec<Cue>, StageError> {
        self.started.lock().unwrap().push(chunk.index);
        self.seen_media.lock().unwrap().push(chunk.media_path.clone());
        assert!(work_dir.exists(), "chunk work dir should exist before transcription");

        let delay = self.delay_for(chunk.index);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at == Some(chunk.index) {
            return Err(StageError::Transcription(format!("scripted failure on chunk {}", chunk.index)));
        }
        Ok(spaced_cues(chunk, self.cues_per_chunk))
    }
}

/// Bilingual translation that tags each line
pub struct TaggingTranslator;

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(&self, cues: &[Cue]) -> Result<Vec<Cue>, TranslationError> {
        Ok(cues
            .iter()
            .map(|cue| cue.clone().with_secondary(format!("译 {}", cue.primary_text)))
            .collect())
    }
}

/// Returns one cue fewer than it was given
pub struct ShortTranslator;

#[async_trait]
impl Translator for ShortTranslator {
    async fn translate(&self, cues: &[Cue]) -> Result<Vec<Cue>, TranslationError> {
        let mut out: Vec<Cue> = cues.to_vec();
        out.pop();
        Ok(out)
    }
}

/// Writes a placeholder output video and records the pages it received
#[derive(Default)]
pub struct RecordingRenderer {
    pub calls: Mutex<Vec<(PathBuf, usize)>>,
}

impl RecordingRenderer {
    pub fn calls(&self) -> Vec<(PathBuf, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, video_path: &Path, pages: &[Page], output_path: &Path) -> Result<PathBuf, StageError> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, b"rendered").await?;
        self.calls.lock().unwrap().push((video_path.to_path_buf(), pages.len()));
        Ok(output_path.to_path_buf())
    }
}

/// Writes a partial output file, then fails
#[derive(Default)]
pub struct FailingRenderer {
    pub calls: Mutex<usize>,
}

impl FailingRenderer {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Renderer for FailingRenderer {
    async fn render(&self, _video_path: &Path, _pages: &[Page], output_path: &Path) -> Result<PathBuf, StageError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, b"half a vid").await?;
        Err(StageError::Render("encoder crashed".to_string()))
    }
}

/// Keeps every published status
#[derive(Default)]
pub struct RecordingSink {
    pub statuses: Mutex<Vec<RunStatus>>,
}

impl RecordingSink {
    pub fn statuses(&self) -> Vec<RunStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, status: &RunStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}
