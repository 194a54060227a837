/*!
 * End-to-end pipeline tests over mock collaborators
 */

use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

use subforge::app_config::Config;
use subforge::app_controller::Controller;
use subforge::errors::PipelineError;
use subforge::pipeline::{ChunkLength, ChunkWorkerPool, PipelineOrchestrator, PipelineSettings, RunState, Segmenter};
use subforge::subtitles::Paginator;

use crate::common::{FailingRenderer, RecordingSink, ScriptedTranscriber, create_media_file, mock_collaborators};

fn settings(work_dir: &Path, output_dir: &Path, chunk_secs: u64, workers: usize) -> PipelineSettings {
    PipelineSettings {
        segmenter: Segmenter::new(ChunkLength::Fixed(NonZeroU64::new(chunk_secs).unwrap()), 1_200_000),
        pool: ChunkWorkerPool::new(workers, false),
        paginator: Paginator::new(24.0, 500),
        work_dir: Some(work_dir.to_path_buf()),
        output_dir: output_dir.to_path_buf(),
        output_suffix: "zh".to_string(),
        burn_in: true,
    }
}

fn temp_dirs_left(work_dir: &Path) -> usize {
    std::fs::read_dir(work_dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Test a 20 minute source cut into four 5 minute chunks of ten cues each
#[tokio::test]
async fn test_run_withTwentyMinuteSource_shouldMergeFourChunks() {
    let root = tempfile::tempdir().unwrap();
    let work_dir = root.path().join("work");
    let output_dir = root.path().join("out");
    let source = create_media_file(root.path(), "lecture.mp4");

    let transcriber = Arc::new(ScriptedTranscriber::new(10));
    let (collaborators, splitter, renderer) = mock_collaborators(1_200_000, transcriber.clone());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator =
        PipelineOrchestrator::new(settings(&work_dir, &output_dir, 300, 4), collaborators, sink.clone());

    let output = orchestrator.run(source.to_str().unwrap()).await.unwrap();

    assert_eq!(splitter.recorded_spans().len(), 4);
    assert_eq!(output.timeline.len(), 40);
    assert!(output.timeline.is_monotonic());
    for (i, cue) in output.timeline.cues.iter().enumerate() {
        assert_eq!(cue.index, i + 1);
    }

    let from_second_chunk: Vec<_> = output
        .timeline
        .cues
        .iter()
        .filter(|c| c.primary_text.starts_with("chunk 1 "))
        .collect();
    assert_eq!(from_second_chunk.len(), 10);
    assert!(from_second_chunk.iter().all(|c| c.start_ms >= 300_000 && c.end_ms <= 600_000));

    // Subtitle file and rendered video land in the output dir, named after the source
    assert_eq!(output.subtitle_path, output_dir.join("lecture.zh.srt"));
    let written = std::fs::read_to_string(&output.subtitle_path).unwrap();
    assert!(written.contains("译 chunk 3 line 9"));
    assert_eq!(output.video_path, Some(output_dir.join("lecture.zh.mp4")));
    assert_eq!(renderer.calls(), vec![(source.clone(), output.pages.len())]);

    // Temp dir is gone, the source is untouched
    assert_eq!(temp_dirs_left(&work_dir), 0);
    assert!(source.exists());

    let statuses = sink.statuses();
    assert!(statuses.windows(2).all(|w| w[0].percent <= w[1].percent));
    let last = statuses.last().unwrap();
    assert_eq!(last.state, RunState::Completed);
    assert!((last.percent - 100.0).abs() < 1e-9);
    assert!(statuses.iter().all(|s| s.run_id == output.run_id));
}

/// Test that short media skips splitting and never deletes the source
#[tokio::test]
async fn test_run_withShortSource_shouldUseFastPath() {
    let root = tempfile::tempdir().unwrap();
    let work_dir = root.path().join("work");
    let output_dir = root.path().join("out");
    let source = create_media_file(root.path(), "clip.mp4");

    let transcriber = Arc::new(ScriptedTranscriber::new(6));
    let (collaborators, splitter, _renderer) = mock_collaborators(600_000, transcriber.clone());
    let mut settings = settings(&work_dir, &output_dir, 300, 4);
    settings.burn_in = false;
    let orchestrator = PipelineOrchestrator::new(settings, collaborators, Arc::new(RecordingSink::default()));

    let output = orchestrator.run(source.to_str().unwrap()).await.unwrap();

    assert!(splitter.recorded_spans().is_empty());
    assert_eq!(transcriber.seen_media(), vec![source.clone()]);
    assert_eq!(output.timeline.len(), 6);
    assert_eq!(output.video_path, None);
    assert!(output.subtitle_path.exists());
    assert!(source.exists(), "fast path must not delete the source media");
    assert_eq!(temp_dirs_left(&work_dir), 0);
}

/// Test that a failing chunk fails the run, publishes Failed and still cleans up
#[tokio::test]
async fn test_run_withFailingChunk_shouldFailAndCleanUp() {
    let root = tempfile::tempdir().unwrap();
    let work_dir = root.path().join("work");
    let output_dir = root.path().join("out");
    let source = create_media_file(root.path(), "broken.mp4");

    let transcriber = Arc::new(ScriptedTranscriber::new(5).failing_at(2));
    let (collaborators, _splitter, renderer) = mock_collaborators(1_500_000, transcriber);
    let sink = Arc::new(RecordingSink::default());
    let orchestrator =
        PipelineOrchestrator::new(settings(&work_dir, &output_dir, 300, 1), collaborators, sink.clone());

    let err = orchestrator.run(source.to_str().unwrap()).await.unwrap_err();

    assert!(matches!(err, PipelineError::ChunkProcessing { chunk_index: 2, .. }));
    assert!(!err.is_internal());
    assert!(renderer.calls().is_empty());
    assert!(!output_dir.join("broken.zh.srt").exists());
    assert_eq!(temp_dirs_left(&work_dir), 0);

    let statuses = sink.statuses();
    let last = statuses.last().unwrap();
    assert_eq!(last.state, RunState::Failed);
    let before = &statuses[statuses.len() - 2];
    assert!((last.percent - before.percent).abs() < 1e-9, "failure keeps the last percent");
}

#[tokio::test]
async fn test_run_withMissingSource_shouldReportDownloadError() {
    let root = tempfile::tempdir().unwrap();
    let (collaborators, _, _) = mock_collaborators(60_000, Arc::new(ScriptedTranscriber::new(1)));
    let orchestrator = PipelineOrchestrator::new(
        settings(&root.path().join("work"), &root.path().join("out"), 300, 2),
        collaborators,
        Arc::new(RecordingSink::default()),
    );

    let err = orchestrator.run("/no/such/file.mp4").await.unwrap_err();
    assert!(matches!(err, PipelineError::Download(_)));
}

/// Test the controller skip rule for sources that already have subtitles
#[test]
fn test_controller_withExistingOutput_shouldSkipUnlessForced() {
    let root = tempfile::tempdir().unwrap();
    let source = create_media_file(root.path(), "talk.mp4");
    let output_dir = root.path().join("out");
    std::fs::create_dir_all(&output_dir).unwrap();
    std::fs::write(output_dir.join("talk.zh.srt"), "old").unwrap();

    let mut config = Config::default();
    config.render.output_dir = output_dir.clone();
    config.render.burn_in = false;
    config.pipeline.work_dir = Some(root.path().join("work"));

    let (collaborators, _, _) = mock_collaborators(90_000, Arc::new(ScriptedTranscriber::new(3)));
    let controller = Controller::with_collaborators(config, collaborators, Arc::new(RecordingSink::default()));

    let (skipped, forced) = tokio_test::block_on(async {
        let skipped = controller.run(source.to_str().unwrap(), false).await.unwrap();
        let forced = controller.run(source.to_str().unwrap(), true).await.unwrap();
        (skipped, forced)
    });

    assert!(skipped.is_none(), "existing subtitles should be kept without -f");
    assert_eq!(forced.unwrap().timeline.len(), 3);
    assert_ne!(std::fs::read_to_string(output_dir.join("talk.zh.srt")).unwrap(), "old");
}

/// Test that a failed render leaves nothing behind for the skip rule to find
#[test]
fn test_controller_withFailingRenderer_shouldNotPublishSubtitles() {
    let root = tempfile::tempdir().unwrap();
    let source = create_media_file(root.path(), "talk.mp4");
    let output_dir = root.path().join("out");
    let work_dir = root.path().join("work");

    let mut config = Config::default();
    config.render.output_dir = output_dir.clone();
    config.render.burn_in = true;
    config.pipeline.work_dir = Some(work_dir.clone());

    let (mut collaborators, _, _) = mock_collaborators(90_000, Arc::new(ScriptedTranscriber::new(3)));
    let renderer = Arc::new(FailingRenderer::default());
    collaborators.renderer = renderer.clone();
    let controller = Controller::with_collaborators(config, collaborators, Arc::new(RecordingSink::default()));

    let (first, second) = tokio_test::block_on(async {
        let first = controller.run(source.to_str().unwrap(), false).await;
        let second = controller.run(source.to_str().unwrap(), false).await;
        (first, second)
    });

    assert!(first.is_err());
    assert!(second.is_err(), "a failed run must not be skipped as done");
    assert_eq!(renderer.calls(), 2);
    assert!(!output_dir.join("talk.zh.srt").exists());
    assert!(!output_dir.join("talk.zh.mp4").exists());
    assert_eq!(temp_dirs_left(&work_dir), 0);
}
