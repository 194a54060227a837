/*!
 * Tests for bounded, fail-fast parallel chunk processing
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use subforge::collaborators::Translator;
use subforge::cue::{Chunk, ChunkSpan};
use subforge::errors::{PipelineError, StageError, TranslationError};
use subforge::pipeline::{ChunkStages, ChunkWorkerPool, NullProgressSink, ProgressTracker, RunState};

use crate::common::{RecordingSink, ScriptedTranscriber, ShortTranslator, TaggingTranslator};

fn chunks_in(dir: &std::path::Path, count: usize, length_ms: u64) -> Vec<Chunk> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("chunk_{:04}.wav", i));
            std::fs::write(&path, b"chunk").unwrap();
            Chunk::from_span(
                ChunkSpan {
                    index: i,
                    start_offset_ms: i as u64 * length_ms,
                    length_ms,
                },
                path,
            )
        })
        .collect()
}

fn stages(
    work_dir: PathBuf,
    transcriber: Arc<ScriptedTranscriber>,
    translator: Arc<dyn Translator>,
    tracker: Arc<ProgressTracker>,
) -> ChunkStages {
    ChunkStages {
        transcriber,
        translator,
        progress: tracker,
        work_dir,
    }
}

fn tracker_in_transcribing() -> Arc<ProgressTracker> {
    let tracker = Arc::new(ProgressTracker::new("test-run", Arc::new(NullProgressSink)));
    tracker.transition(RunState::Downloading, "start").unwrap();
    tracker.transition(RunState::Transcribing, "chunks").unwrap();
    tracker
}

/// Test that the first failing chunk stops the run and no later chunk starts
#[tokio::test]
async fn test_process_all_withFailingChunk_shouldFailFastWithChunkIndex() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = chunks_in(dir.path(), 5, 60_000);
    let transcriber = Arc::new(ScriptedTranscriber::new(4).failing_at(3));
    let pool = ChunkWorkerPool::new(1, false);

    let result = pool
        .process_all(
            chunks,
            stages(
                dir.path().to_path_buf(),
                transcriber.clone(),
                Arc::new(TaggingTranslator),
                tracker_in_transcribing(),
            ),
        )
        .await;

    match result {
        Err(PipelineError::ChunkProcessing { chunk_index, source }) => {
            assert_eq!(chunk_index, 3);
            assert!(matches!(source, StageError::Transcription(_)));
        }
        other => panic!("expected ChunkProcessing error, got {:?}", other.map(|r| r.len())),
    }
    assert_eq!(transcriber.started(), vec![0, 1, 2, 3]);
}

/// Test that a translator returning too few cues is rejected
#[tokio::test]
async fn test_process_all_withShortTranslation_shouldReportCardinalityMismatch() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = chunks_in(dir.path(), 1, 60_000);
    let transcriber = Arc::new(ScriptedTranscriber::new(5));

    let result = ChunkWorkerPool::new(2, false)
        .process_all(
            chunks,
            stages(
                dir.path().to_path_buf(),
                transcriber,
                Arc::new(ShortTranslator),
                tracker_in_transcribing(),
            ),
        )
        .await;

    match result {
        Err(PipelineError::ChunkProcessing {
            chunk_index: 0,
            source: StageError::Translation(TranslationError::CardinalityMismatch { expected, actual }),
        }) => {
            assert_eq!(expected, 5);
            assert_eq!(actual, 4);
        }
        other => panic!("expected cardinality mismatch, got {:?}", other.map(|r| r.len())),
    }
}

/// Test that a chunk with no speech fails unless silent chunks are allowed
#[tokio::test]
async fn test_process_all_withSilentChunk_shouldRespectPolicy() {
    let dir = tempfile::tempdir().unwrap();
    let make_stages = || {
        stages(
            dir.path().to_path_buf(),
            Arc::new(ScriptedTranscriber::new(0)),
            Arc::new(TaggingTranslator),
            tracker_in_transcribing(),
        )
    };

    let strict = ChunkWorkerPool::new(1, false)
        .process_all(chunks_in(dir.path(), 1, 10_000), make_stages())
        .await;
    assert!(matches!(strict, Err(PipelineError::ChunkProcessing { chunk_index: 0, .. })));

    let lenient = ChunkWorkerPool::new(1, true)
        .process_all(chunks_in(dir.path(), 1, 10_000), make_stages())
        .await
        .unwrap();
    assert_eq!(lenient.len(), 1);
    assert!(lenient[0].cues.is_empty());
}

/// Test that every chunk is processed, artifacts are written and chunk media is removed
#[tokio::test]
async fn test_process_all_withParallelWorkers_shouldProcessEveryChunk() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = chunks_in(dir.path(), 6, 30_000);
    let media: Vec<PathBuf> = chunks.iter().map(|c| c.media_path.clone()).collect();
    let transcriber = Arc::new(ScriptedTranscriber::new(3).with_delay(Duration::from_millis(20)));
    let sink = Arc::new(RecordingSink::default());
    let tracker = Arc::new(ProgressTracker::new("parallel", sink.clone()));
    tracker.transition(RunState::Downloading, "start").unwrap();
    tracker.transition(RunState::Transcribing, "chunks").unwrap();

    let mut results = ChunkWorkerPool::new(3, false)
        .process_all(
            chunks,
            stages(dir.path().to_path_buf(), transcriber.clone(), Arc::new(TaggingTranslator), tracker.clone()),
        )
        .await
        .unwrap();

    results.sort_by_key(|r| r.chunk.index);
    assert_eq!(results.iter().map(|r| r.chunk.index).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    assert!(results.iter().all(|r| r.cues.len() == 3));
    assert!(results.iter().all(|r| r.cues.iter().all(|c| c.secondary_text.is_some())));

    for i in 0..6 {
        assert!(dir.path().join(format!("chunk_{:04}.transcript.srt", i)).exists());
        assert!(dir.path().join(format!("chunk_{:04}.translated.srt", i)).exists());
    }
    assert!(media.iter().all(|path| !path.exists()), "chunk media should be removed");

    let percents: Vec<f64> = sink.statuses().iter().map(|s| s.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!((tracker.percent() - 85.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_process_all_withNoChunks_shouldReturnEmpty() {
    let dir = tempfile::tempdir().unwrap();
    let results = ChunkWorkerPool::default()
        .process_all(
            Vec::new(),
            stages(
                dir.path().to_path_buf(),
                Arc::new(ScriptedTranscriber::new(1)),
                Arc::new(TaggingTranslator),
                tracker_in_transcribing(),
            ),
        )
        .await
        .unwrap();
    assert!(results.is_empty());
}

/// Test that a failure while other workers are busy stops the queue
#[tokio::test]
async fn test_process_all_withConcurrentFailure_shouldNotStartQueuedChunks() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = chunks_in(dir.path(), 5, 60_000);
    // Chunk 0 frees its worker early; chunk 3 then fails while 1 and 2 are still running
    let transcriber = Arc::new(
        ScriptedTranscriber::new(2)
            .failing_at(3)
            .with_chunk_delay(0, Duration::from_millis(10))
            .with_chunk_delay(1, Duration::from_millis(300))
            .with_chunk_delay(2, Duration::from_millis(300)),
    );
    let pool = ChunkWorkerPool::new(3, false);

    let result = pool
        .process_all(
            chunks,
            stages(
                dir.path().to_path_buf(),
                transcriber.clone(),
                Arc::new(TaggingTranslator),
                tracker_in_transcribing(),
            ),
        )
        .await;

    match result {
        Err(PipelineError::ChunkProcessing { chunk_index, source }) => {
            assert_eq!(chunk_index, 3);
            assert!(matches!(source, StageError::Transcription(_)));
        }
        other => panic!("expected ChunkProcessing error, got {:?}", other.map(|r| r.len())),
    }
    let mut started = transcriber.started();
    started.sort_unstable();
    assert_eq!(started, vec![0, 1, 2, 3]);
}
