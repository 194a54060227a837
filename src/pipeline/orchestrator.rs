/*!
 * Top-level driver for one run.
 *
 * Download, probe, chunk (or take the fast path), process chunks in
 * parallel, merge, paginate and render. The run owns one temp directory
 * that is removed whether the run succeeds or fails.
 */

use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::collaborators::Collaborators;
use crate::cue::{GlobalTimeline, Page, VideoSource};
use crate::errors::PipelineError;
use crate::pipeline::progress::{ProgressSink, ProgressTracker, RunState};
use crate::pipeline::reassembler;
use crate::pipeline::segmenter::Segmenter;
use crate::pipeline::worker_pool::{ChunkStages, ChunkWorkerPool};
use crate::srt;
use crate::subtitles::Paginator;

/// Everything that shapes a run besides its collaborators
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub segmenter: Segmenter,
    pub pool: ChunkWorkerPool,
    pub paginator: Paginator,

    /// Parent of the per-run temp dir; the system temp dir when unset
    pub work_dir: Option<PathBuf>,

    /// Where the subtitle file and rendered video are written
    pub output_dir: PathBuf,

    /// Inserted before the extension of output files, e.g. the target language
    pub output_suffix: String,

    /// Burn subtitles into the video; when false the run stops after writing the SRT
    pub burn_in: bool,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: String,
    pub timeline: GlobalTimeline,
    pub pages: Vec<Page>,
    pub subtitle_path: PathBuf,
    pub video_path: Option<PathBuf>,
}

pub struct PipelineOrchestrator {
    settings: PipelineSettings,
    collaborators: Collaborators,
    sink: Arc<dyn ProgressSink>,
}

impl PipelineOrchestrator {
    pub fn new(settings: PipelineSettings, collaborators: Collaborators, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            settings,
            collaborators,
            sink,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the whole pipeline for `source`, a local path or URL
    pub async fn run(&self, source: &str) -> Result<RunOutput, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let tracker = Arc::new(ProgressTracker::new(run_id.clone(), Arc::clone(&self.sink)));

        let temp_dir = self.create_temp_dir()?;
        info!("Run {} started for {} (work dir {})", run_id, source, temp_dir.path().display());

        let outcome = self.execute(source, &tracker, temp_dir.path()).await;

        if let Err(e) = &outcome {
            if e.is_internal() {
                error!("Run {} hit an internal error: {}", run_id, e);
            } else {
                error!("Run {} failed: {}", run_id, e);
            }
            tracker.fail(e.to_string());
        }

        let temp_path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            warn!("Failed to remove temp dir {}: {}", temp_path.display(), e);
        }

        outcome
    }

    async fn execute(
        &self,
        source: &str,
        tracker: &Arc<ProgressTracker>,
        temp_dir: &Path,
    ) -> Result<RunOutput, PipelineError> {
        tracker.transition(RunState::Downloading, format!("Fetching {}", source))?;
        let media_path = self
            .collaborators
            .downloader
            .fetch(source, temp_dir)
            .await
            .map_err(PipelineError::Download)?;
        tracker.update(0.8, "Probing media");
        let total_duration_ms = self
            .collaborators
            .probe
            .probe_duration(&media_path)
            .await
            .map_err(PipelineError::Probe)?;
        let video = VideoSource::new(media_path, total_duration_ms);
        info!("Media {} is {:.1} s long", video.path.display(), total_duration_ms as f64 / 1_000.0);

        let chunks_dir = temp_dir.join("chunks");
        tokio::fs::create_dir_all(&chunks_dir).await?;
        let chunks = self
            .settings
            .segmenter
            .prepare(&video, self.collaborators.splitter.as_ref(), &chunks_dir)
            .await?;

        tracker.transition(RunState::Transcribing, format!("Processing {} chunk(s)", chunks.len()))?;
        let stages = ChunkStages {
            transcriber: Arc::clone(&self.collaborators.transcriber),
            translator: Arc::clone(&self.collaborators.translator),
            progress: Arc::clone(tracker),
            work_dir: temp_dir.to_path_buf(),
        };
        let results = self.settings.pool.process_all(chunks, stages).await?;

        tracker.transition(RunState::Merging, "Merging chunk subtitles")?;
        let timeline = reassembler::merge(&results)?;
        info!("Merged timeline has {} cues", timeline.len());

        tracker.transition(RunState::Paginating, "Paginating subtitles")?;
        let pages = self.settings.paginator.paginate_all(&timeline.cues);
        // Staged in the temp dir; output_dir only ever sees the SRT of a finished run
        let staged_subtitles = temp_dir.join("subtitles.srt");
        tokio::fs::write(&staged_subtitles, srt::compose_pages(&pages)).await?;
        let subtitle_path = self.output_path(&video.path, "srt");

        if !self.settings.burn_in {
            self.publish(&staged_subtitles, &subtitle_path).await?;
            tracker.transition(RunState::Completed, "Subtitles ready")?;
            return Ok(RunOutput {
                run_id: tracker.run_id().to_string(),
                timeline,
                pages,
                subtitle_path,
                video_path: None,
            });
        }

        tracker.transition(RunState::Rendering, "Burning subtitles into video")?;
        let extension = video
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp4")
            .to_string();
        let output_video = self.output_path(&video.path, &extension);
        if output_video == video.path {
            return Err(PipelineError::Config(format!(
                "Rendered video would overwrite the source {}",
                video.path.display()
            )));
        }
        let rendered = match self
            .collaborators
            .renderer
            .render(&video.path, &pages, &output_video)
            .await
        {
            Ok(rendered) => rendered,
            Err(e) => {
                discard_partial(&output_video).await;
                return Err(PipelineError::Render(e));
            }
        };

        if let Err(e) = self.publish(&staged_subtitles, &subtitle_path).await {
            discard_partial(&rendered).await;
            return Err(e);
        }
        tracker.transition(RunState::Completed, format!("Rendered {}", rendered.display()))?;
        Ok(RunOutput {
            run_id: tracker.run_id().to_string(),
            timeline,
            pages,
            subtitle_path,
            video_path: Some(rendered),
        })
    }

    /// Copy the staged subtitle file to its final place in output_dir
    async fn publish(&self, staged: &Path, subtitle_path: &Path) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(&self.settings.output_dir).await?;
        tokio::fs::copy(staged, subtitle_path).await?;
        info!("Subtitles written to {}", subtitle_path.display());
        Ok(())
    }

    fn create_temp_dir(&self) -> Result<TempDir, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("subforge-");
        let dir = match &self.settings.work_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// `<output_dir>/<stem>.<suffix>.<extension>`
    fn output_path(&self, media_path: &Path, extension: &str) -> PathBuf {
        let stem = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let name = if self.settings.output_suffix.is_empty() {
            format!("{}.{}", stem, extension)
        } else {
            format!("{}.{}.{}", stem, self.settings.output_suffix, extension)
        };
        self.settings.output_dir.join(name)
    }
}

/// Remove whatever a failed step left at `path`
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}
