/*!
 * Chunked processing pipeline.
 *
 * - `segmenter`: chunk boundaries and the short-media fast path
 * - `worker_pool`: bounded, fail-fast per-chunk transcription and translation
 * - `reassembler`: chunk-local cues to one global timeline
 * - `progress`: run state machine and progress sink
 * - `orchestrator`: drives a whole run
 */

pub mod orchestrator;
pub mod progress;
pub mod reassembler;
pub mod segmenter;
pub mod worker_pool;

pub use orchestrator::{PipelineOrchestrator, PipelineSettings, RunOutput};
pub use progress::{ChunkStage, LogProgressSink, NullProgressSink, ProgressSink, ProgressTracker, RunState, RunStatus};
pub use reassembler::merge;
pub use segmenter::{ChunkLength, Segmenter, auto_chunk_length_ms, plan};
pub use worker_pool::{ChunkStages, ChunkWorkerPool, check_translation};
