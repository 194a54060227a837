/*!
 * Tests for chunk planning and the fast path
 */

use std::num::NonZeroU64;
use std::path::PathBuf;

use subforge::cue::VideoSource;
use subforge::pipeline::{ChunkLength, Segmenter, auto_chunk_length_ms, plan};

use crate::common::StubSplitter;

fn target(ms: u64) -> NonZeroU64 {
    NonZeroU64::new(ms).unwrap()
}

/// Test that planned spans tile the whole duration without gaps or overlap
#[test]
fn test_plan_withAnyDuration_shouldCoverMediaExactly() {
    let durations = [1, 999, 1_000, 299_999, 300_000, 300_001, 1_200_000, 3_723_456];
    let targets = [1, 1_000, 7_777, 300_000];

    for &total in &durations {
        for &t in &targets {
            let spans = plan(total, target(t));
            assert_eq!(spans.len() as u64, total.div_ceil(t), "count for {} / {}", total, t);
            assert_eq!(spans.iter().map(|s| s.length_ms).sum::<u64>(), total);
            assert_eq!(spans[0].start_offset_ms, 0);
            for (i, pair) in spans.windows(2).enumerate() {
                assert_eq!(pair[0].end_offset_ms(), pair[1].start_offset_ms);
                assert_eq!(pair[0].length_ms, t, "only the last span may be short");
                assert_eq!(pair[0].index, i);
            }
            let last = spans.last().unwrap();
            assert!(last.length_ms > 0 && last.length_ms <= t);
            assert_eq!(last.end_offset_ms(), total);
        }
    }
}

#[test]
fn test_plan_withZeroDuration_shouldBeEmpty() {
    assert!(plan(0, target(300_000)).is_empty());
}

#[test]
fn test_auto_chunk_length_withLongerMedia_shouldShrinkChunks() {
    assert_eq!(auto_chunk_length_ms(20 * 60_000).get(), 300_000);
    assert_eq!(auto_chunk_length_ms(30 * 60_000).get(), 300_000);
    assert_eq!(auto_chunk_length_ms(45 * 60_000).get(), 240_000);
    assert_eq!(auto_chunk_length_ms(60 * 60_000).get(), 240_000);
    assert_eq!(auto_chunk_length_ms(90 * 60_000).get(), 180_000);
}

#[test]
fn test_fast_path_threshold_isStrict() {
    let segmenter = Segmenter::new(ChunkLength::Auto, 1_200_000);
    assert!(segmenter.uses_fast_path(1_199_999));
    assert!(!segmenter.uses_fast_path(1_200_000));
}

#[tokio::test]
async fn test_prepare_withShortMedia_shouldUseSourceWithoutSplitting() {
    let dir = tempfile::tempdir().unwrap();
    let splitter = StubSplitter::default();
    let segmenter = Segmenter::new(ChunkLength::Auto, 1_200_000);
    let source = VideoSource::new(PathBuf::from("/videos/short.mp4"), 90_000);

    let chunks = segmenter.prepare(&source, &splitter, dir.path()).await.unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].index, 0);
    assert_eq!(chunks[0].start_offset_ms, 0);
    assert_eq!(chunks[0].length_ms, 90_000);
    assert_eq!(chunks[0].media_path, source.path);
    assert!(!chunks[0].owns_media);
    assert!(splitter.recorded_spans().is_empty());
}

#[tokio::test]
async fn test_prepare_withFixedLength_shouldSplitEverySpan() {
    let dir = tempfile::tempdir().unwrap();
    let splitter = StubSplitter::default();
    let segmenter = Segmenter::new(ChunkLength::Fixed(NonZeroU64::new(300).unwrap()), 1_200_000);
    let source = VideoSource::new(PathBuf::from("/videos/long.mp4"), 1_250_000);

    let chunks = segmenter.prepare(&source, &splitter, dir.path()).await.unwrap();

    assert_eq!(chunks.len(), 5);
    assert_eq!(splitter.recorded_spans().len(), 5);
    assert_eq!(chunks[4].start_offset_ms, 1_200_000);
    assert_eq!(chunks[4].length_ms, 50_000);
    assert!(chunks.iter().all(|c| c.owns_media && c.media_path.exists()));
}
