/*!
 * Run state machine and progress reporting.
 *
 * Every state change and progress update goes through one `ProgressTracker`,
 * which holds the only lock shared by concurrent chunk tasks and forwards a
 * `RunStatus` snapshot to an injected `ProgressSink`.
 */

use log::{debug, info};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::errors::PipelineError;

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Pending,
    Downloading,
    /// Per-chunk transcription and translation, possibly in parallel
    Transcribing,
    Merging,
    Paginating,
    Rendering,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Progress band (start, end) owned by this state, in percent
    pub fn band(self) -> (f64, f64) {
        match self {
            Self::Pending => (0.0, 0.0),
            Self::Downloading => (0.0, 10.0),
            Self::Transcribing => (10.0, 85.0),
            Self::Merging => (85.0, 90.0),
            Self::Paginating => (90.0, 92.0),
            Self::Rendering => (92.0, 100.0),
            Self::Completed => (100.0, 100.0),
            Self::Failed => (0.0, 100.0),
        }
    }

    /// Whether `next` may follow this state
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Downloading)
            | (Downloading, Transcribing)
            | (Transcribing, Merging)
            | (Merging, Paginating)
            | (Paginating, Rendering)
            | (Paginating, Completed)
            | (Rendering, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Transcribing => "transcribing",
            Self::Merging => "merging",
            Self::Paginating => "paginating",
            Self::Rendering => "rendering",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot published on every update
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    pub run_id: String,
    pub state: RunState,
    /// 0.0..=100.0, never decreasing within a run
    pub percent: f64,
    pub message: String,
}

/// Receives run status updates
pub trait ProgressSink: Send + Sync {
    fn publish(&self, status: &RunStatus);
}

/// Sink that writes updates to the log
#[derive(Debug, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn publish(&self, status: &RunStatus) {
        info!("[{}] {:>5.1}% {}: {}", status.run_id, status.percent, status.state, status.message);
    }
}

/// Sink that drops every update
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn publish(&self, _status: &RunStatus) {}
}

/// Per-chunk milestones reported by the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStage {
    Transcribed,
    Translated,
}

struct TrackerState {
    state: RunState,
    percent: f64,
    completed_chunks: usize,
    total_chunks: usize,
}

/// Thread-safe state machine and progress counter for one run
pub struct ProgressTracker {
    run_id: String,
    sink: Arc<dyn ProgressSink>,
    inner: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new(run_id: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            run_id: run_id.into(),
            sink,
            inner: Mutex::new(TrackerState {
                state: RunState::Pending,
                percent: 0.0,
                completed_chunks: 0,
                total_chunks: 0,
            }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().state
    }

    pub fn percent(&self) -> f64 {
        self.inner.lock().percent
    }

    /// Move to `next`, publishing the start of its band
    pub fn transition(&self, next: RunState, message: impl Into<String>) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        if !inner.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: inner.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!("Run {} {} -> {}", self.run_id, inner.state, next);
        inner.state = next;
        let floor = match next {
            // Failure keeps the last reported percentage
            RunState::Failed => inner.percent,
            _ => next.band().0,
        };
        Self::advance(&mut inner, floor);
        self.publish(&inner, message.into());
        Ok(())
    }

    /// Report progress inside the current state's band, `fraction` in 0..=1
    pub fn update(&self, fraction: f64, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        let (start, end) = inner.state.band();
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        Self::advance(&mut inner, start + (end - start) * fraction);
        self.publish(&inner, message.into());
    }

    /// Set the number of chunks the parallel stage will process
    pub fn begin_chunks(&self, total_chunks: usize) {
        let mut inner = self.inner.lock();
        inner.total_chunks = total_chunks;
        inner.completed_chunks = 0;
    }

    /// Record a chunk milestone; a translated chunk counts as completed
    pub fn chunk_stage_done(&self, chunk_index: usize, stage: ChunkStage) {
        let mut inner = self.inner.lock();
        let message = match stage {
            ChunkStage::Transcribed => format!("Chunk {} transcribed", chunk_index),
            ChunkStage::Translated => {
                inner.completed_chunks += 1;
                format!(
                    "Chunk {} translated ({}/{})",
                    chunk_index, inner.completed_chunks, inner.total_chunks
                )
            }
        };
        if inner.total_chunks > 0 {
            let (start, end) = inner.state.band();
            let fraction = inner.completed_chunks as f64 / inner.total_chunks as f64;
            Self::advance(&mut inner, start + (end - start) * fraction.min(1.0));
        }
        self.publish(&inner, message);
    }

    /// Enter `Failed` unless the run already ended
    pub fn fail(&self, message: impl Into<String>) {
        if !self.state().is_terminal() {
            let _ = self.transition(RunState::Failed, message);
        }
    }

    fn advance(inner: &mut TrackerState, percent: f64) {
        inner.percent = inner.percent.max(percent.min(100.0));
    }

    // Called with the lock held so sink updates are serialized
    fn publish(&self, inner: &TrackerState, message: String) {
        self.sink.publish(&RunStatus {
            run_id: self.run_id.clone(),
            state: inner.state,
            percent: inner.percent,
            message,
        });
    }
}
