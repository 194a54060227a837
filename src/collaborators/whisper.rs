use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::collaborators::{Transcriber, run_tool};
use crate::cue::{Chunk, Cue};
use crate::errors::StageError;
use crate::srt;

// @module: Speech recognition through a whisper-style CLI

/// Runs `<command> <media> --model M --language L --output_format srt --output_dir D`
/// and reads back `D/<media stem>.srt`
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    pub command: String,
    pub model: String,
    /// Spoken language; empty lets the model detect it
    pub language: String,
    pub extra_args: Vec<String>,
    pub timeout: Duration,
}

impl Default for WhisperTranscriber {
    fn default() -> Self {
        Self {
            command: "whisper".to_string(),
            model: "base".to_string(),
            language: "en".to_string(),
            extra_args: Vec::new(),
            timeout: Duration::from_secs(3_600),
        }
    }
}

impl WhisperTranscriber {
    fn output_file(media_path: &Path, work_dir: &Path) -> PathBuf {
        let stem = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        work_dir.join(format!("{}.srt", stem))
    }
}

/// Keep only cues with a valid range and no overlap, in start order
pub fn sanitize_cues(mut cues: Vec<Cue>, chunk_length_ms: u64) -> Vec<Cue> {
    cues.sort_by_key(|cue| cue.start_ms);
    let mut clean: Vec<Cue> = Vec::with_capacity(cues.len());
    for mut cue in cues {
        // Recognizers sometimes run a few ms past the end of the audio
        if chunk_length_ms > 0 && cue.end_ms > chunk_length_ms {
            cue.end_ms = chunk_length_ms;
        }
        if let Some(previous) = clean.last_mut() {
            if previous.end_ms > cue.start_ms {
                previous.end_ms = cue.start_ms;
            }
            if !previous.has_valid_range() {
                clean.pop();
            }
        }
        if cue.has_valid_range() {
            clean.push(cue);
        }
    }
    for (i, cue) in clean.iter_mut().enumerate() {
        cue.index = i + 1;
    }
    clean
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, chunk: &Chunk, work_dir: &Path) -> Result<Vec<Cue>, StageError> {
        let mut command = Command::new(&self.command);
        command
            .arg(&chunk.media_path)
            .args(["--model", &self.model, "--output_format", "srt", "--output_dir"])
            .arg(work_dir);
        if !self.language.is_empty() {
            command.args(["--language", &self.language]);
        }
        command.args(&self.extra_args);

        run_tool(command, &self.command, self.timeout)
            .await
            .map_err(StageError::Transcription)?;

        let srt_path = Self::output_file(&chunk.media_path, work_dir);
        let cues = srt::read_srt_file(&srt_path)
            .map_err(|e| StageError::Transcription(format!("{:#}", e)))?;
        let raw_count = cues.len();
        let cues = sanitize_cues(cues, chunk.length_ms);
        if cues.len() != raw_count {
            warn!(
                "Chunk {}: dropped {} overlapping or empty cues from transcript",
                chunk.index,
                raw_count - cues.len()
            );
        }
        debug!("Chunk {} transcribed into {} cues", chunk.index, cues.len());
        Ok(cues)
    }
}
