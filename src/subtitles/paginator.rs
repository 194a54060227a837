/*!
 * Bilingual pagination.
 *
 * A cue whose text does not fit on one line is split into pages. Each page
 * shows one wrapped primary line over one wrapped secondary line, and gets a
 * share of the cue's duration proportional to how much text it carries.
 * All arithmetic is on integer milliseconds, so the page durations of a cue
 * always add up to the cue's duration exactly.
 */

use log::debug;

use crate::cue::{Cue, Page};
use crate::subtitles::layout::{equivalent_width, normalize_line, wrap};

/// Splits cues into time-sliced pages
#[derive(Debug, Clone)]
pub struct Paginator {
    /// Widest line allowed, in equivalent width units
    pub max_equivalent_width: f64,

    /// Minimum page duration in ms, relaxed when the cue is too short
    pub min_page_ms: u64,
}

impl Paginator {
    pub fn new(max_equivalent_width: f64, min_page_ms: u64) -> Self {
        Self {
            max_equivalent_width,
            min_page_ms,
        }
    }

    /// Paginate one cue with this paginator's width and floor
    pub fn paginate(&self, cue: &Cue) -> Vec<Page> {
        paginate_with_floor(cue, self.max_equivalent_width, self.min_page_ms)
    }

    /// Paginate a whole timeline, in order
    pub fn paginate_all(&self, cues: &[Cue]) -> Vec<Page> {
        let pages: Vec<Page> = cues.iter().flat_map(|cue| self.paginate(cue)).collect();
        debug!("Paginated {} cues into {} pages", cues.len(), pages.len());
        pages
    }
}

/// Paginate a cue with no minimum page duration
pub fn paginate(cue: &Cue, max_equivalent_width: f64) -> Vec<Page> {
    paginate_with_floor(cue, max_equivalent_width, 0)
}

/// Paginate a cue, giving each page at least `min_page_ms` when the cue is
/// long enough for every page to get it.
pub fn paginate_with_floor(cue: &Cue, max_equivalent_width: f64, min_page_ms: u64) -> Vec<Page> {
    let primary = normalize_line(&cue.primary_text);
    let secondary = cue.secondary_text.as_deref().map(normalize_line).unwrap_or_default();

    let primary_lines = wrap(&primary, max_equivalent_width);
    let secondary_lines = wrap(&secondary, max_equivalent_width);

    if primary_lines.len() <= 1 && secondary_lines.len() <= 1 {
        return vec![Page {
            start_ms: cue.start_ms,
            end_ms: cue.end_ms,
            primary_line: primary,
            secondary_line: secondary,
        }];
    }

    let page_count = primary_lines.len().max(secondary_lines.len());
    let mut primary_iter = primary_lines.into_iter();
    let mut secondary_iter = secondary_lines.into_iter();
    let lines: Vec<(String, String)> = (0..page_count)
        .map(|_| {
            (
                primary_iter.next().unwrap_or_default(),
                secondary_iter.next().unwrap_or_default(),
            )
        })
        .collect();

    let weights: Vec<f64> = lines
        .iter()
        .map(|(p, s)| equivalent_width(p) + equivalent_width(s))
        .collect();
    let durations = allocate(cue.duration_ms(), &weights, min_page_ms);

    let mut pages = Vec::with_capacity(page_count);
    let mut cursor = cue.start_ms;
    for ((primary_line, secondary_line), duration) in lines.into_iter().zip(durations) {
        pages.push(Page {
            start_ms: cursor,
            end_ms: cursor + duration,
            primary_line,
            secondary_line,
        });
        cursor += duration;
    }
    if let Some(last) = pages.last_mut() {
        last.end_ms = cue.end_ms;
    }
    pages
}

/// Split `total` ms across pages proportionally to `weights`.
///
/// Pages whose proportional share is below `floor` are pinned to `floor` and
/// the rest is shared among the remaining pages, repeating until stable. If
/// `floor * n > total` the floor is dropped. Shares round down and the last
/// page takes the remainder, so the result always sums to `total`.
pub fn allocate(total: u64, weights: &[f64], floor: u64) -> Vec<u64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = if weights.iter().all(|w| *w <= 0.0) {
        vec![1.0; n]
    } else {
        weights.iter().map(|w| w.max(0.0)).collect()
    };

    let floor = if floor.saturating_mul(n as u64) > total { 0 } else { floor };

    let mut pinned = vec![false; n];
    loop {
        let pinned_count = pinned.iter().filter(|p| **p).count() as u64;
        let remaining = total - floor * pinned_count;
        let free_weight: f64 = weights
            .iter()
            .zip(&pinned)
            .filter(|(_, p)| !**p)
            .map(|(w, _)| *w)
            .sum();

        let mut changed = false;
        for i in 0..n {
            if pinned[i] {
                continue;
            }
            let share = if free_weight > 0.0 {
                remaining as f64 * weights[i] / free_weight
            } else {
                0.0
            };
            if share < floor as f64 {
                pinned[i] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let pinned_count = pinned.iter().filter(|p| **p).count() as u64;
    let remaining = total - floor * pinned_count;
    let free_weight: f64 = weights
        .iter()
        .zip(&pinned)
        .filter(|(_, p)| !**p)
        .map(|(w, _)| *w)
        .sum();

    let mut durations: Vec<u64> = (0..n)
        .map(|i| {
            if pinned[i] {
                floor
            } else if free_weight > 0.0 {
                ((remaining as f64 * weights[i] / free_weight).floor() as u64).min(remaining)
            } else {
                0
            }
        })
        .collect();

    let assigned: u64 = durations.iter().sum();
    // Float rounding can overshoot by a hair; take it back from the largest share
    if assigned > total {
        let excess = assigned - total;
        if let Some(max) = durations.iter_mut().max() {
            *max -= excess.min(*max);
        }
    }
    let assigned: u64 = durations.iter().sum();
    if let Some(last) = durations.last_mut() {
        *last += total - assigned;
    }
    durations
}
