use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::collaborators::downloader::{SourceLocation, classify_source};
use crate::collaborators::{Collaborators, FfmpegRenderer, LlmTranslator};
use crate::pipeline::{PipelineOrchestrator, ProgressSink, RunOutput, RunState, RunStatus};
use crate::providers::{self, ChatProvider};

// @module: Application controller wiring config into a pipeline run

/// Renders run status on an indicatif progress bar
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBarSink {
    fn publish(&self, status: &RunStatus) {
        self.bar.set_position(status.percent.round() as u64);
        self.bar.set_message(format!("{}: {}", status.state, status.message));
        match status.state {
            RunState::Completed => self.bar.finish_with_message(status.message.clone()),
            RunState::Failed => self.bar.abandon_with_message(format!("failed: {}", status.message)),
            _ => {}
        }
    }
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Pipeline built from the configuration
    orchestrator: PipelineOrchestrator,

    // @field: Translation provider, checked for reachability before each run
    provider: Option<Arc<dyn ChatProvider>>,
}

impl Controller {
    /// Build every collaborator the configuration names
    pub fn with_config(config: Config, sink: Arc<dyn ProgressSink>) -> Result<Self> {
        let provider = providers::build_provider(&config.translation)
            .context("Failed to create translation provider")?;
        info!(
            "Using {} ({}) to translate {} -> {}",
            config.translation.provider.display_name(),
            provider.default_model(),
            config.translation.source_language,
            config.translation.target_language
        );

        let tool = config.ffmpeg_tool();
        let collaborators = Collaborators {
            downloader: Arc::new(config.downloader()),
            probe: Arc::new(tool.clone()),
            splitter: Arc::new(tool.clone()),
            transcriber: Arc::new(config.transcriber()),
            translator: Arc::new(LlmTranslator::new(Arc::clone(&provider), config.translator_settings())),
            renderer: Arc::new(FfmpegRenderer::new(
                tool,
                config.render.content_scale,
                config.render.font_name.clone(),
                std::time::Duration::from_secs(config.render.render_timeout_secs),
            )),
        };

        let mut controller = Self::with_collaborators(config, collaborators, sink);
        controller.provider = Some(provider);
        Ok(controller)
    }

    /// Controller over caller-supplied collaborators
    pub fn with_collaborators(config: Config, collaborators: Collaborators, sink: Arc<dyn ProgressSink>) -> Self {
        let orchestrator = PipelineOrchestrator::new(config.pipeline_settings(), collaborators, sink);
        Self {
            config,
            orchestrator,
            provider: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline for one source.
    ///
    /// Returns `None` when a local source already has subtitles in the
    /// output directory and `force_overwrite` is off.
    pub async fn run(&self, source: &str, force_overwrite: bool) -> Result<Option<RunOutput>> {
        let start_time = Instant::now();

        if let Ok(SourceLocation::Local(path)) = classify_source(source) {
            if !path.exists() {
                return Err(anyhow!("Input file does not exist: {}", path.display()));
            }
            let existing = self.existing_output(&path);
            if let Some(existing) = existing.filter(|_| !force_overwrite) {
                warn!(
                    "Skipping {}, subtitles already exist at {} (use -f to force overwrite)",
                    path.display(),
                    existing.display()
                );
                return Ok(None);
            }
        }

        if let Some(provider) = &self.provider {
            // Warn only; translation errors surface from the run itself
            if let Err(e) = provider.test_connection().await {
                warn!("Translation provider {} is not reachable: {}", provider.name(), e);
            }
        }

        let output = self.orchestrator.run(source).await?;

        info!(
            "Finished in {:.1}s: {} cues, {} pages",
            start_time.elapsed().as_secs_f64(),
            output.timeline.len(),
            output.pages.len()
        );
        info!("Subtitles: {}", output.subtitle_path.display());
        if let Some(video) = &output.video_path {
            info!("Video: {}", video.display());
        }
        Ok(Some(output))
    }

    fn existing_output(&self, media_path: &Path) -> Option<std::path::PathBuf> {
        let stem = media_path.file_stem()?.to_string_lossy().to_string();
        let candidate = self
            .config
            .render
            .output_dir
            .join(format!("{}.{}.srt", stem, self.config.translation.target_language));
        candidate.exists().then_some(candidate)
    }
}
