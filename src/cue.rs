use std::fmt;
use std::path::PathBuf;

// @module: Value types flowing through the pipeline

/// Source media once it is available locally
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    /// Local path to the media file
    pub path: PathBuf,

    /// Total duration in ms, as reported by the prober
    pub total_duration_ms: u64,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>, total_duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            total_duration_ms,
        }
    }
}

/// Planned time range of a chunk, before any media has been cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    // @field: Zero-based chunk index
    pub index: usize,

    // @field: Offset of the chunk inside the source, in ms
    pub start_offset_ms: u64,

    // @field: Chunk length in ms
    pub length_ms: u64,
}

impl ChunkSpan {
    /// Offset of the first instant after this chunk
    pub fn end_offset_ms(&self) -> u64 {
        self.start_offset_ms + self.length_ms
    }
}

/// A contiguous slice of the source, backed by a media file
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    // @field: Zero-based chunk index
    pub index: usize,

    // @field: Offset of the chunk inside the source, in ms
    pub start_offset_ms: u64,

    // @field: Chunk length in ms
    pub length_ms: u64,

    // @field: Media file holding this chunk
    pub media_path: PathBuf,

    // @field: Whether the pipeline created media_path and may delete it
    pub owns_media: bool,
}

impl Chunk {
    /// Chunk backed by a file the splitter produced
    pub fn from_span(span: ChunkSpan, media_path: PathBuf) -> Self {
        Self {
            index: span.index,
            start_offset_ms: span.start_offset_ms,
            length_ms: span.length_ms,
            media_path,
            owns_media: true,
        }
    }

    /// Single synthetic chunk spanning the whole source (fast path)
    pub fn whole(source: &VideoSource) -> Self {
        Self {
            index: 0,
            start_offset_ms: 0,
            length_ms: source.total_duration_ms,
            media_path: source.path.clone(),
            owns_media: false,
        }
    }

    pub fn span(&self) -> ChunkSpan {
        ChunkSpan {
            index: self.index,
            start_offset_ms: self.start_offset_ms,
            length_ms: self.length_ms,
        }
    }

    /// Artifact file name for this chunk, namespaced by index
    pub fn artifact_name(&self, kind: &str, extension: &str) -> String {
        format!("chunk_{:04}.{}.{}", self.index, kind, extension)
    }
}

/// A timed subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    // @field: Sequence number (1-based once in a timeline)
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Text in the primary (top) language
    pub primary_text: String,

    // @field: Optional text in the secondary (bottom) language
    pub secondary_text: Option<String>,
}

impl Cue {
    pub fn new(index: usize, start_ms: u64, end_ms: u64, primary_text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms,
            end_ms,
            primary_text: primary_text.into(),
            secondary_text: None,
        }
    }

    pub fn with_secondary(mut self, secondary_text: impl Into<String>) -> Self {
        self.secondary_text = Some(secondary_text.into());
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// start < end
    pub fn has_valid_range(&self) -> bool {
        self.start_ms < self.end_ms
    }

    /// True when neither language carries any visible text
    pub fn is_blank(&self) -> bool {
        self.primary_text.trim().is_empty()
            && self
                .secondary_text
                .as_deref()
                .is_none_or(|text| text.trim().is_empty())
    }

    /// Copy of this cue moved by `offset_ms`
    pub fn shifted(&self, offset_ms: u64) -> Self {
        Self {
            start_ms: self.start_ms + offset_ms,
            end_ms: self.end_ms + offset_ms,
            ..self.clone()
        }
    }

    /// Both timings equal, text ignored
    pub fn same_timing(&self, other: &Cue) -> bool {
        self.start_ms == other.start_ms && self.end_ms == other.end_ms
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(
            f,
            "{} --> {}",
            crate::srt::format_timestamp(self.start_ms),
            crate::srt::format_timestamp(self.end_ms)
        )?;
        writeln!(f, "{}", self.primary_text)?;
        if let Some(secondary) = self.secondary_text.as_deref().filter(|s| !s.is_empty()) {
            writeln!(f, "{}", secondary)?;
        }
        writeln!(f)
    }
}

/// Per-chunk output, cues still in chunk-local time
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub chunk: Chunk,
    pub cues: Vec<Cue>,
}

/// Merged cues in global time, sorted and indexed 1..=N
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalTimeline {
    pub cues: Vec<Cue>,
}

impl GlobalTimeline {
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Checks end[i] <= start[i+1] and start < end for every cue
    pub fn is_monotonic(&self) -> bool {
        self.cues.iter().all(Cue::has_valid_range)
            && self.cues.windows(2).all(|pair| pair[0].end_ms <= pair[1].start_ms)
    }
}

/// A time slice of a cue, the unit handed to rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub start_ms: u64,
    pub end_ms: u64,
    pub primary_line: String,
    pub secondary_line: String,
}

impl Page {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}
