/*!
 * Error types for the subforge pipeline.
 *
 * Collaborator failures (download, probe, split, transcription, translation,
 * render) are `StageError`s. Anything that ends a run is a `PipelineError`;
 * a chunk failure is wrapped with the index of the chunk that raised it.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether retrying the same request can reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 429,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors raised by the translate collaborator
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API, after the collaborator's own retries
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The translation returned a different number of cues than it was given
    #[error("Cardinality mismatch: expected {expected} cues, got {actual}")]
    CardinalityMismatch {
        /// Number of cues handed to the translator
        expected: usize,
        /// Number of cues it returned
        actual: usize,
    },

    /// A translated cue no longer carries the timing of its source cue
    #[error("Timing mismatch at cue position {position}")]
    TimingMismatch {
        /// Zero-based position inside the translated batch
        position: usize,
    },

    /// The provider answered with nothing usable
    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Errors raised by the external collaborators the pipeline drives
#[derive(Error, Debug)]
pub enum StageError {
    /// The source could not be fetched
    #[error("Download failed: {0}")]
    Download(String),

    /// The media could not be probed for its duration
    #[error("Probe failed: {0}")]
    Probe(String),

    /// A chunk could not be cut out of the source media
    #[error("Split failed: {0}")]
    Split(String),

    /// Speech-to-text failed or produced no output
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// Translation failed
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// Subtitles could not be burned into the video
    #[error("Render failed: {0}")]
    Render(String),

    /// Local I/O around a collaborator call failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal failure of a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Fetching the source failed
    #[error("Source unavailable: {0}")]
    Download(StageError),

    /// The duration of the source could not be determined
    #[error("Could not probe source: {0}")]
    Probe(StageError),

    /// Cutting a chunk out of the source failed
    #[error("Could not split chunk {chunk_index}: {source}")]
    Split {
        /// Index of the chunk being cut
        chunk_index: usize,
        /// Underlying splitter error
        source: StageError,
    },

    /// The first chunk task that failed during parallel processing
    #[error("Chunk {chunk_index} failed: {source}")]
    ChunkProcessing {
        /// Index of the failing chunk
        chunk_index: usize,
        /// What the chunk task reported
        source: StageError,
    },

    /// Merging produced no cues at all
    #[error("No subtitle cues survived merging")]
    EmptyTimeline,

    /// A collaborator broke the timing contract; this is an internal error
    #[error("Internal error: timeline invariant violated at cue {position}: {detail}")]
    TimelineInvariant {
        /// Position in the sorted timeline where the violation was detected
        position: usize,
        /// Description of the violation
        detail: String,
    },

    /// The run tried to move between states in an order that is not allowed
    #[error("Internal error: invalid run state transition {from} -> {to}")]
    InvalidTransition {
        /// State the run was in
        from: String,
        /// State it was asked to enter
        to: String,
    },

    /// Burning subtitles failed
    #[error("Render failed: {0}")]
    Render(StageError),

    /// Invalid configuration or input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run-level I/O (temp dir, output files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Index of the chunk that triggered the failure, if any
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::ChunkProcessing { chunk_index, .. } | Self::Split { chunk_index, .. } => {
                Some(*chunk_index)
            }
            _ => None,
        }
    }

    /// Programming-invariant violations, as opposed to user-facing failures
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::TimelineInvariant { .. } | Self::InvalidTransition { .. })
    }
}
