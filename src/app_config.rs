use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collaborators::translator::TranslatorSettings;
use crate::collaborators::{FfmpegTool, WhisperTranscriber, YtDlpDownloader};
use crate::pipeline::{ChunkLength, ChunkWorkerPool, PipelineSettings, Segmenter};
use crate::subtitles::Paginator;

/// Application configuration module
/// This module handles loading, validating and saving the configuration
/// and turns it into the settings each pipeline component expects.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Chunking and parallelism
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Speech recognition
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Page layout
    #[serde(default)]
    pub subtitles: SubtitleConfig,

    /// Burn-in and output
    #[serde(default)]
    pub render: RenderConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Chunking and worker pool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    // @field: "auto" or {"fixed": seconds}
    #[serde(default)]
    pub chunk_length: ChunkLength,

    // @field: Media shorter than this is processed as a single chunk
    #[serde(default = "default_fast_path_threshold_secs")]
    pub fast_path_threshold_secs: u64,

    // @field: Chunks processed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    // @field: Accept chunks that transcribe to nothing
    #[serde(default)]
    pub allow_silent_chunks: bool,

    // @field: Parent of per-run temp dirs (system temp when unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    // @field: yt-dlp binary
    #[serde(default = "default_downloader_command")]
    pub downloader_command: String,

    // @field: Download timeout seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_length: ChunkLength::default(),
            fast_path_threshold_secs: default_fast_path_threshold_secs(),
            workers: default_workers(),
            allow_silent_chunks: false,
            work_dir: None,
            downloader_command: default_downloader_command(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// Whisper CLI configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Executable name or path
    #[serde(default = "default_whisper_command")]
    pub command: String,

    /// Model name passed as --model
    #[serde(default = "default_whisper_model")]
    pub model: String,

    /// Extra arguments appended to every invocation
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Timeout per chunk in seconds
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            command: default_whisper_command(),
            model: default_whisper_model(),
            extra_args: Vec::new(),
            timeout_secs: default_transcription_timeout_secs(),
        }
    }
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model_for(&provider_type),
            api_key: String::new(),
            endpoint: default_endpoint_for(&provider_type),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Language spoken in the video (ISO 639-1 or 639-2)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Language of the translated line
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Retry count for transient provider errors
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum characters of cue text per batch request
    #[serde(default = "default_batch_char_limit")]
    pub batch_char_limit: usize,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Model tried for lines the main model keeps failing on
    #[serde(default)]
    pub fallback_model: Option<String>,

    /// Names and terms to keep untranslated
    #[serde(default)]
    pub keep_terms: Vec<String>,

    /// File with more terms to keep, one per line; `#` starts a comment line
    #[serde(default)]
    pub terminology_file: Option<PathBuf>,

    /// Translate one line per request instead of batching
    #[serde(default)]
    pub line_by_line: bool,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            batch_char_limit: default_batch_char_limit(),
            temperature: default_temperature(),
            fallback_model: None,
            keep_terms: Vec::new(),
            terminology_file: None,
            line_by_line: false,
        }
    }
}

/// Page layout configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubtitleConfig {
    /// Widest line, in CJK-character equivalents
    #[serde(default = "default_max_equivalent_width")]
    pub max_equivalent_width: f64,

    /// Shortest page duration in milliseconds
    #[serde(default = "default_min_page_ms")]
    pub min_page_ms: u64,

    /// Source text on top, translation below
    #[serde(default = "default_true")]
    pub bilingual: bool,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            max_equivalent_width: default_max_equivalent_width(),
            min_page_ms: default_min_page_ms(),
            bilingual: true,
        }
    }
}

/// Rendering and output configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderConfig {
    /// Burn subtitles into a copy of the video
    #[serde(default = "default_true")]
    pub burn_in: bool,

    /// Multiplier on the computed font size
    #[serde(default = "default_content_scale")]
    pub content_scale: f64,

    /// Font override; the built-in default when unset
    #[serde(default)]
    pub font_name: Option<String>,

    /// Output directory for the subtitle file and rendered video
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    /// Timeout for probing and cutting one chunk, in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Timeout for the final burn-in, in seconds
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            burn_in: true,
            content_scale: default_content_scale(),
            font_name: None,
            output_dir: default_output_dir(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            tool_timeout_secs: default_tool_timeout_secs(),
            render_timeout_secs: default_render_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_fast_path_threshold_secs() -> u64 {
    1200
}

fn default_workers() -> usize {
    4
}

fn default_downloader_command() -> String {
    "yt-dlp".to_string()
}

fn default_download_timeout_secs() -> u64 {
    3600
}

fn default_whisper_command() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_transcription_timeout_secs() -> u64 {
    3600
}

/// Terms listed in a terminology file.
///
/// A missing or unreadable file is not an error: it is logged and yields no terms.
pub fn load_terminology(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_terminology(&content),
        Err(e) => {
            warn!("Terminology file {} not loaded: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// One term per line; blank lines and `#` comments are skipped
pub fn parse_terminology(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_batch_char_limit() -> usize {
    500
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_equivalent_width() -> f64 {
    24.0
}

fn default_min_page_ms() -> u64 {
    600
}

fn default_content_scale() -> f64 {
    1.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    300
}

fn default_render_timeout_secs() -> u64 {
    7200
}

fn default_true() -> bool {
    true
}

fn default_endpoint_for(provider: &TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "http://localhost:11434".to_string(),
        TranslationProvider::OpenAI => "https://api.openai.com/v1".to_string(),
        // LM Studio's OpenAI-compatible server
        TranslationProvider::LMStudio => "http://localhost:1234/v1".to_string(),
    }
}

fn default_model_for(provider: &TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "qwen2.5:7b".to_string(),
        TranslationProvider::OpenAI => "gpt-4o-mini".to_string(),
        TranslationProvider::LMStudio => "local-model".to_string(),
    }
}

impl Config {
    /// Load the config at `path`, writing a default one first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at '{}', creating default config.", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::get_language_name(&self.translation.source_language)
            .context("Invalid source language")?;
        crate::language_utils::get_language_name(&self.translation.target_language)
            .context("Invalid target language")?;

        if self.pipeline.workers == 0 {
            return Err(anyhow!("pipeline.workers must be at least 1"));
        }
        if self.pipeline.fast_path_threshold_secs == 0 && self.pipeline.chunk_length == ChunkLength::Auto {
            warn!("Fast path disabled: every source will be chunked");
        }
        if self.subtitles.max_equivalent_width.is_nan() || self.subtitles.max_equivalent_width <= 0.0 {
            return Err(anyhow!("subtitles.max_equivalent_width must be positive"));
        }
        if self.render.content_scale.is_nan() || self.render.content_scale <= 0.0 {
            return Err(anyhow!("render.content_scale must be positive"));
        }
        if self.translation.common.batch_char_limit == 0 {
            return Err(anyhow!("translation.common.batch_char_limit must be positive"));
        }
        if self.transcription.command.trim().is_empty() {
            return Err(anyhow!("transcription.command must not be empty"));
        }

        if self.translation.provider == TranslationProvider::OpenAI && self.translation.get_api_key().is_empty() {
            return Err(anyhow!("Translation API key is required for OpenAI provider"));
        }

        Ok(())
    }

    /// Settings for the orchestrator; `output_suffix` is the target language
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            segmenter: Segmenter::new(
                self.pipeline.chunk_length,
                self.pipeline.fast_path_threshold_secs.saturating_mul(1_000),
            ),
            pool: ChunkWorkerPool::new(self.pipeline.workers, self.pipeline.allow_silent_chunks),
            paginator: Paginator::new(self.subtitles.max_equivalent_width, self.subtitles.min_page_ms),
            work_dir: self.pipeline.work_dir.clone(),
            output_dir: self.render.output_dir.clone(),
            output_suffix: self.translation.target_language.clone(),
            burn_in: self.render.burn_in,
        }
    }

    pub fn translator_settings(&self) -> TranslatorSettings {
        let common = &self.translation.common;
        TranslatorSettings {
            source_language: self.translation.source_language.clone(),
            target_language: self.translation.target_language.clone(),
            bilingual: self.subtitles.bilingual,
            batch_char_limit: common.batch_char_limit,
            retry_count: common.retry_count,
            retry_backoff_ms: common.retry_backoff_ms,
            temperature: common.temperature,
            fallback_model: common.fallback_model.clone().filter(|m| !m.trim().is_empty()),
            keep_terms: self.keep_terms(),
            line_by_line: common.line_by_line,
        }
    }

    /// Inline terms followed by those of the terminology file, without duplicates
    fn keep_terms(&self) -> Vec<String> {
        let common = &self.translation.common;
        let mut terms = common.keep_terms.clone();
        if let Some(path) = &common.terminology_file {
            for term in load_terminology(path) {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        terms
    }

    pub fn downloader(&self) -> YtDlpDownloader {
        YtDlpDownloader {
            command: self.pipeline.downloader_command.clone(),
            timeout: Duration::from_secs(self.pipeline.download_timeout_secs),
        }
    }

    pub fn ffmpeg_tool(&self) -> FfmpegTool {
        FfmpegTool {
            ffmpeg: self.render.ffmpeg.clone(),
            ffprobe: self.render.ffprobe.clone(),
            timeout: Duration::from_secs(self.render.tool_timeout_secs),
        }
    }

    /// Whisper takes the source language unless it is left to auto-detect
    pub fn transcriber(&self) -> WhisperTranscriber {
        WhisperTranscriber {
            command: self.transcription.command.clone(),
            model: self.transcription.model.clone(),
            language: self.translation.source_language.clone(),
            extra_args: self.transcription.extra_args.clone(),
            timeout: Duration::from_secs(self.transcription.timeout_secs),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable access, used for CLI overrides
    pub fn get_active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let position = self.available_providers.iter().position(|p| p.provider_type == provider_str);
        let index = match position {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider.clone()));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model_for(&self.provider))
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        // Ollama doesn't use API keys
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint_for(&self.provider))
    }

    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_timeout_secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            source_language: default_source_language(),
            target_language: default_target_language(),
            common: TranslationCommonConfig::default(),
        }
    }
}
