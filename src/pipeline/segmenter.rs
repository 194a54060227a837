use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::path::Path;

use crate::collaborators::MediaSplitter;
use crate::cue::{Chunk, ChunkSpan, VideoSource};
use crate::errors::PipelineError;

// @module: Chunk planning

const HOUR_MS: u64 = 3_600_000;
const HALF_HOUR_MS: u64 = 1_800_000;

/// How long each chunk should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLength {
    /// Fixed length in seconds
    Fixed(NonZeroU64),
    /// Shorter chunks for longer media
    #[default]
    Auto,
}

impl ChunkLength {
    /// Target chunk length in ms for media of `total_ms`
    pub fn target_ms(&self, total_ms: u64) -> NonZeroU64 {
        match self {
            Self::Fixed(secs) => NonZeroU64::new(secs.get().saturating_mul(1_000)).unwrap_or(NonZeroU64::MAX),
            Self::Auto => auto_chunk_length_ms(total_ms),
        }
    }
}

/// 180 s for media over an hour, 240 s over half an hour, 300 s otherwise
pub fn auto_chunk_length_ms(total_ms: u64) -> NonZeroU64 {
    let secs: u64 = if total_ms > HOUR_MS {
        180
    } else if total_ms > HALF_HOUR_MS {
        240
    } else {
        300
    };
    NonZeroU64::new(secs * 1_000).unwrap_or(NonZeroU64::MIN)
}

/// Split `total_ms` into contiguous spans of `target_ms`.
///
/// Yields `ceil(total / target)` spans; every span but the last is exactly
/// `target_ms` long and the last one takes what is left, so the lengths add
/// up to `total_ms`. Zero duration yields no spans.
pub fn plan(total_ms: u64, target_ms: NonZeroU64) -> Vec<ChunkSpan> {
    let target = target_ms.get();
    let count = total_ms.div_ceil(target);

    (0..count)
        .map(|i| {
            let start_offset_ms = i * target;
            ChunkSpan {
                index: i as usize,
                start_offset_ms,
                length_ms: target.min(total_ms - start_offset_ms),
            }
        })
        .collect()
}

/// Decides between the single-chunk fast path and chunked processing
#[derive(Debug, Clone)]
pub struct Segmenter {
    pub chunk_length: ChunkLength,

    /// Media strictly shorter than this is processed as one chunk
    pub fast_path_threshold_ms: u64,
}

impl Segmenter {
    pub fn new(chunk_length: ChunkLength, fast_path_threshold_ms: u64) -> Self {
        Self {
            chunk_length,
            fast_path_threshold_ms,
        }
    }

    /// True when chunking is skipped for this duration
    pub fn uses_fast_path(&self, total_ms: u64) -> bool {
        total_ms < self.fast_path_threshold_ms
    }

    /// Spans for the chunked path
    pub fn plan(&self, total_ms: u64) -> Vec<ChunkSpan> {
        let target = self.chunk_length.target_ms(total_ms);
        let spans = plan(total_ms, target);
        debug!("Planned {} chunks of {} ms for {} ms of media", spans.len(), target, total_ms);
        spans
    }

    /// Chunks ready for the worker pool.
    ///
    /// On the fast path this is one chunk backed by the source file itself,
    /// otherwise every planned span is cut by `splitter` into `dest_dir`.
    pub async fn prepare(
        &self,
        source: &VideoSource,
        splitter: &dyn MediaSplitter,
        dest_dir: &Path,
    ) -> Result<Vec<Chunk>, PipelineError> {
        if self.uses_fast_path(source.total_duration_ms) {
            info!(
                "Media is {} s long, below the {} s threshold: processing as a single chunk",
                source.total_duration_ms / 1_000,
                self.fast_path_threshold_ms / 1_000
            );
            return Ok(vec![Chunk::whole(source)]);
        }

        let spans = self.plan(source.total_duration_ms);
        info!("Splitting media into {} chunks", spans.len());

        let mut chunks = Vec::with_capacity(spans.len());
        for span in spans {
            let media_path = splitter
                .split(&source.path, span, dest_dir)
                .await
                .map_err(|source| PipelineError::Split {
                    chunk_index: span.index,
                    source,
                })?;
            chunks.push(Chunk::from_span(span, media_path));
        }
        Ok(chunks)
    }
}
