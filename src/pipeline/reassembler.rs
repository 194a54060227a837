use log::{debug, warn};

use crate::cue::{ChunkResult, Cue, GlobalTimeline};
use crate::errors::PipelineError;

// @module: Merges chunk-local cues into one global timeline

/// Merge chunk results into a sorted, re-indexed, non-overlapping timeline.
///
/// Output depends only on the set of results, not on their order: cues are
/// ordered by global start, then chunk index, then position in the chunk.
/// An end that runs into the next cue's start is pulled back to it; if that
/// leaves a cue with no duration the collaborators broke their contract and
/// an internal error is returned.
pub fn merge(results: &[ChunkResult]) -> Result<GlobalTimeline, PipelineError> {
    let mut keyed: Vec<(usize, usize, Cue)> = Vec::new();

    for result in results {
        let offset = result.chunk.start_offset_ms;
        for (position, cue) in result.cues.iter().enumerate() {
            if cue.is_blank() {
                debug!("Dropping blank cue {} of chunk {}", position, result.chunk.index);
                continue;
            }
            if !cue.has_valid_range() {
                return Err(PipelineError::TimelineInvariant {
                    position,
                    detail: format!(
                        "chunk {} returned cue with empty range {}..{} ms",
                        result.chunk.index, cue.start_ms, cue.end_ms
                    ),
                });
            }
            keyed.push((result.chunk.index, position, cue.shifted(offset)));
        }
    }

    if keyed.is_empty() {
        return Err(PipelineError::EmptyTimeline);
    }

    keyed.sort_by(|(chunk_a, pos_a, a), (chunk_b, pos_b, b)| {
        a.start_ms
            .cmp(&b.start_ms)
            .then(chunk_a.cmp(chunk_b))
            .then(pos_a.cmp(pos_b))
    });

    let mut cues: Vec<Cue> = keyed.into_iter().map(|(_, _, cue)| cue).collect();
    for (i, cue) in cues.iter_mut().enumerate() {
        cue.index = i + 1;
    }

    normalize_overlaps(&mut cues)?;

    debug!("Merged {} chunk results into {} cues", results.len(), cues.len());
    Ok(GlobalTimeline { cues })
}

/// Trim each end back to the next cue's start where they overlap
fn normalize_overlaps(cues: &mut [Cue]) -> Result<(), PipelineError> {
    for i in 1..cues.len() {
        let next_start = cues[i].start_ms;
        let cue = &mut cues[i - 1];
        if cue.end_ms <= next_start {
            continue;
        }
        if next_start <= cue.start_ms {
            return Err(PipelineError::TimelineInvariant {
                position: i - 1,
                detail: format!(
                    "cue {} starts at {} ms together with the next cue, trimming would leave no duration",
                    cue.index, cue.start_ms
                ),
            });
        }
        warn!(
            "Cue {} overlaps the next cue by {} ms, trimming its end",
            cue.index,
            cue.end_ms - next_start
        );
        cue.end_ms = next_start;
    }
    Ok(())
}
