/*!
 * Bounded, fail-fast executor for per-chunk work.
 *
 * A fixed number of workers pull chunks from a shared queue. Each chunk is
 * transcribed, then translated, inside one task. The first failure sets a
 * cancellation flag so no further chunk is started; chunks already running
 * finish, but nothing they produce is returned.
 */

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinSet;

use crate::collaborators::{Transcriber, Translator};
use crate::cue::{Chunk, ChunkResult, Cue};
use crate::errors::{PipelineError, StageError, TranslationError};
use crate::pipeline::progress::{ChunkStage, ProgressTracker};
use crate::srt;

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct ChunkWorkerPool {
    /// Number of chunks processed at the same time
    pub workers: usize,

    /// Accept a chunk whose transcription has no cues
    pub allow_silent_chunks: bool,
}

impl Default for ChunkWorkerPool {
    fn default() -> Self {
        Self {
            workers: 4,
            allow_silent_chunks: false,
        }
    }
}

/// Everything a chunk task needs, shared between workers
#[derive(Clone)]
pub struct ChunkStages {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub progress: Arc<ProgressTracker>,

    /// Run temp dir; chunk artifacts are namespaced by chunk index inside it
    pub work_dir: PathBuf,
}

struct SharedState {
    queue: Mutex<VecDeque<Chunk>>,
    cancelled: AtomicBool,
    first_error: Mutex<Option<PipelineError>>,
    results: Mutex<Vec<ChunkResult>>,
}

impl ChunkWorkerPool {
    pub fn new(workers: usize, allow_silent_chunks: bool) -> Self {
        Self {
            workers: workers.max(1),
            allow_silent_chunks,
        }
    }

    /// Process every chunk, or fail with the first chunk error.
    ///
    /// Results come back in completion order; the reassembler sorts them.
    pub async fn process_all(
        &self,
        chunks: Vec<Chunk>,
        stages: ChunkStages,
    ) -> Result<Vec<ChunkResult>, PipelineError> {
        let total = chunks.len();
        stages.progress.begin_chunks(total);
        if total == 0 {
            return Ok(Vec::new());
        }

        let worker_count = self.workers.clamp(1, total);
        info!("Processing {} chunks with {} workers", total, worker_count);

        let shared = Arc::new(SharedState {
            queue: Mutex::new(chunks.into()),
            cancelled: AtomicBool::new(false),
            first_error: Mutex::new(None),
            results: Mutex::new(Vec::with_capacity(total)),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let shared = Arc::clone(&shared);
            let stages = stages.clone();
            let allow_silent = self.allow_silent_chunks;
            workers.spawn(async move { run_worker(worker_id, shared, stages, allow_silent).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                // A panicking collaborator must not leave the pool waiting
                error!("Chunk worker stopped abnormally: {}", e);
                shared.cancelled.store(true, Ordering::SeqCst);
                let mut first_error = shared.first_error.lock();
                if first_error.is_none() {
                    *first_error = Some(PipelineError::Io(std::io::Error::other(format!(
                        "chunk worker stopped abnormally: {}",
                        e
                    ))));
                }
            }
        }

        if let Some(err) = shared.first_error.lock().take() {
            let discarded = shared.results.lock().len();
            if discarded > 0 {
                debug!("Discarding {} completed chunk results after failure", discarded);
            }
            return Err(err);
        }

        let results = std::mem::take(&mut *shared.results.lock());
        Ok(results)
    }
}

async fn run_worker(worker_id: usize, shared: Arc<SharedState>, stages: ChunkStages, allow_silent: bool) {
    loop {
        if shared.cancelled.load(Ordering::SeqCst) {
            debug!("Worker {} stopping: run cancelled", worker_id);
            return;
        }
        let Some(chunk) = shared.queue.lock().pop_front() else {
            return;
        };

        let chunk_index = chunk.index;
        debug!("Worker {} picked chunk {}", worker_id, chunk_index);

        match process_chunk(chunk, &stages, allow_silent).await {
            Ok(result) => {
                if shared.cancelled.load(Ordering::SeqCst) {
                    debug!("Dropping result of chunk {} from a cancelled run", chunk_index);
                    return;
                }
                shared.results.lock().push(result);
            }
            Err(source) => {
                error!("Chunk {} failed: {}", chunk_index, source);
                let mut first_error = shared.first_error.lock();
                if !shared.cancelled.swap(true, Ordering::SeqCst) {
                    *first_error = Some(PipelineError::ChunkProcessing { chunk_index, source });
                }
                return;
            }
        }
    }
}

/// Transcribe then translate one chunk
async fn process_chunk(chunk: Chunk, stages: &ChunkStages, allow_silent: bool) -> Result<ChunkResult, StageError> {
    let chunk_dir = stages.work_dir.join(format!("chunk_{:04}", chunk.index));
    tokio::fs::create_dir_all(&chunk_dir).await?;

    let transcript = stages.transcriber.transcribe(&chunk, &chunk_dir).await?;
    if transcript.is_empty() && !allow_silent {
        return Err(StageError::Transcription(format!(
            "no speech recognized in chunk {} ({} ms)",
            chunk.index, chunk.length_ms
        )));
    }
    write_artifact(&stages.work_dir, &chunk, "transcript", &transcript).await?;
    stages.progress.chunk_stage_done(chunk.index, ChunkStage::Transcribed);

    let translated = if transcript.is_empty() {
        Vec::new()
    } else {
        let translated = stages.translator.translate(&transcript).await?;
        check_translation(&transcript, &translated)?;
        translated
    };
    write_artifact(&stages.work_dir, &chunk, "translated", &translated).await?;
    stages.progress.chunk_stage_done(chunk.index, ChunkStage::Translated);

    if chunk.owns_media {
        if let Err(e) = tokio::fs::remove_file(&chunk.media_path).await {
            warn!("Could not remove chunk media {}: {}", chunk.media_path.display(), e);
        }
    }

    Ok(ChunkResult {
        chunk,
        cues: translated,
    })
}

/// Translation must keep the number of cues and each cue's timing
pub fn check_translation(source: &[Cue], translated: &[Cue]) -> Result<(), TranslationError> {
    if source.len() != translated.len() {
        return Err(TranslationError::CardinalityMismatch {
            expected: source.len(),
            actual: translated.len(),
        });
    }
    match source.iter().zip(translated).position(|(a, b)| !a.same_timing(b)) {
        Some(position) => Err(TranslationError::TimingMismatch { position }),
        None => Ok(()),
    }
}

async fn write_artifact(work_dir: &Path, chunk: &Chunk, kind: &str, cues: &[Cue]) -> Result<(), StageError> {
    let path = work_dir.join(chunk.artifact_name(kind, "srt"));
    tokio::fs::write(&path, srt::compose_cues(cues)).await?;
    Ok(())
}
