// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::{IsTerminal, Write};
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::sync::Arc;

use subforge::app_config::{self, Config, TranslationProvider};
use subforge::app_controller::{Controller, ProgressBarSink};
use subforge::pipeline::{ChunkLength, LogProgressSink, ProgressSink};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcribe, translate and burn subtitles into a video
    Run(RunArgs),

    /// Generate shell completions for subforge
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Video file or URL to process
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'zh', 'ja', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Number of chunks processed at once
    #[arg(short, long)]
    workers: Option<usize>,

    /// Chunk length in seconds (default: chosen from the media duration)
    #[arg(long)]
    chunk_length: Option<NonZeroU64>,

    /// Directory for the subtitle file and rendered video
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only write the subtitle file, do not burn it in
    #[arg(long)]
    no_burn: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", env = "SUBFORGE_CONFIG")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// subforge - bilingual subtitles for long videos
#[derive(Parser, Debug)]
#[command(name = "subforge")]
#[command(version)]
#[command(about = "Chunked parallel transcription, translation and subtitle burning")]
#[command(long_about = "subforge splits a video into chunks, transcribes and translates them in parallel, \
merges the results onto one timeline and burns bilingual subtitles into the video.

EXAMPLES:
    subforge run talk.mp4                          # Use the default config
    subforge run -t ja -w 8 talk.mp4               # Japanese, eight workers
    subforge run --chunk-length 120 talk.mp4       # Two-minute chunks
    subforge run --no-burn https://youtu.be/xyz    # Download, write the SRT only
    subforge completions bash > subforge.bash      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation; filtering follows log::max_level()
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let mut stderr = std::io::stderr();
        let _ = writeln!(
            stderr,
            "{}{} {:<5} {}\x1B[0m",
            Self::color_for_level(record.level()),
            now,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subforge", &mut std::io::stdout());
            Ok(())
        }
        Commands::Run(args) => run(args).await,
    }
}

fn apply_overrides(config: &mut Config, options: &RunArgs) {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.get_active_provider_config_mut().model = model.clone();
    }
    if let Some(source_lang) = &options.source_language {
        config.translation.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.translation.target_language = target_lang.clone();
    }
    if let Some(workers) = options.workers {
        config.pipeline.workers = workers;
    }
    if let Some(secs) = options.chunk_length {
        config.pipeline.chunk_length = ChunkLength::Fixed(secs);
    }
    if let Some(output_dir) = &options.output_dir {
        config.render.output_dir = output_dir.clone();
    }
    if options.no_burn {
        config.render.burn_in = false;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

async fn run(options: RunArgs) -> Result<()> {
    // Apply the CLI log level before the config is even read
    if let Some(level) = &options.log_level {
        log::set_max_level(app_config::LogLevel::from(level.clone()).to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;
    apply_overrides(&mut config, &options);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    // Progress bars only make sense on a terminal; otherwise progress goes to the log
    let sink: Arc<dyn ProgressSink> = if std::io::stderr().is_terminal() {
        Arc::new(ProgressBarSink::new())
    } else {
        Arc::new(LogProgressSink)
    };
    let controller = Controller::with_config(config, sink)?;
    controller.run(&options.source, options.force_overwrite).await?;
    Ok(())
}
