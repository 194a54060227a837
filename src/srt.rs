/*!
 * SRT serialization for cues and pages.
 *
 * SRT is only a transport here: chunk artifacts, whisper output and the
 * final subtitle file handed to the renderer. Everything in between works
 * on in-memory `Cue`/`Page` values.
 */

use anyhow::{Context, Result, anyhow};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;

use crate::cue::{Cue, Page};

// @const: SRT timestamp line; whisper and some tools emit '.' for millis
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2,}):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("timestamp regex is valid")
});

/// Format milliseconds as `HH:MM:SS,mmm`
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn captures_to_ms(caps: &regex::Captures, first_group: usize) -> Result<u64> {
    let mut parts = [0u64; 4];
    for (offset, part) in parts.iter_mut().enumerate() {
        let raw = caps
            .get(first_group + offset)
            .ok_or_else(|| anyhow!("Missing timestamp component"))?
            .as_str();
        *part = raw.parse().with_context(|| format!("Invalid timestamp component: {}", raw))?;
    }
    let [hours, minutes, seconds, millis] = parts;
    if minutes >= 60 || seconds >= 60 {
        return Err(anyhow!("Invalid time components: {:02}:{:02}", minutes, seconds));
    }
    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Parse SRT content into cues; every text line goes to `primary_text`.
///
/// Entries with an invalid time range or no text are skipped with a warning,
/// matching how a subtitle player would treat them.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let mut cues = Vec::new();
    let mut seq: Option<usize> = None;
    let mut times: Option<(u64, u64)> = None;
    let mut text = String::new();

    let flush = |seq: usize, (start_ms, end_ms): (u64, u64), text: &str, cues: &mut Vec<Cue>| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            warn!("Skipping empty subtitle entry {}", seq);
        } else if end_ms <= start_ms {
            warn!("Skipping subtitle entry {} with invalid range {}..{}", seq, start_ms, end_ms);
        } else {
            cues.push(Cue::new(seq, start_ms, end_ms, trimmed));
        }
    };

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim().trim_start_matches('\u{feff}');

        if trimmed.is_empty() {
            if let (Some(n), Some(range)) = (seq, times) {
                flush(n, range, &text, &mut cues);
                seq = None;
                times = None;
                text.clear();
            }
            continue;
        }

        if seq.is_none() && text.is_empty() {
            if let Ok(n) = trimmed.parse::<usize>() {
                seq = Some(n);
                continue;
            }
        }

        if times.is_none() {
            if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                times = Some((captures_to_ms(&caps, 1)?, captures_to_ms(&caps, 5)?));
                // Some writers omit the sequence number
                seq.get_or_insert(cues.len() + 1);
                continue;
            }
        }

        if times.is_some() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(trimmed);
        } else {
            warn!("Unexpected text at line {} before a timestamp: {}", line_no + 1, trimmed);
        }
    }

    if let (Some(n), Some(range)) = (seq, times) {
        flush(n, range, &text, &mut cues);
    }

    Ok(cues)
}

/// Read and parse an SRT file
pub fn read_srt_file(path: &Path) -> Result<Vec<Cue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
    parse_srt(&content)
}

/// Compose cues as SRT, keeping each cue's own index
pub fn compose_cues(cues: &[Cue]) -> String {
    cues.iter().map(|cue| cue.to_string()).collect()
}

/// Compose pages as SRT, numbered from 1; bilingual pages take two lines
pub fn compose_pages(pages: &[Page]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(out, "{} --> {}", format_timestamp(page.start_ms), format_timestamp(page.end_ms));
        match (page.primary_line.is_empty(), page.secondary_line.is_empty()) {
            (false, false) => {
                let _ = writeln!(out, "{}\n{}", page.primary_line, page.secondary_line);
            }
            (false, true) => {
                let _ = writeln!(out, "{}", page.primary_line);
            }
            (true, false) => {
                let _ = writeln!(out, "{}", page.secondary_line);
            }
            // An SRT entry needs at least one text line
            (true, true) => {
                let _ = writeln!(out, " ");
            }
        }
        out.push('\n');
    }
    out
}
