// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{LevelFilter, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use subframes::acquisition::CommandAcquisition;
use subframes::app_config::{self, Config};
use subframes::batch::BatchRunner;
use subframes::errors::AppError;
use subframes::logger::ConsoleLogger;
use subframes::pipeline::PipelineOrchestrator;
use subframes::sampler::VideoSampler;
use subframes::transcoder::{FfmpegTranscoder, FrameExtractor};

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
    /// Sample frames for every video in the manifest
    Extract(ExtractArgs),

    /// Run one pipeline tick: acquisition, sampling of new records, packaging
    Pipeline,

    /// Run a pipeline tick every day at local midnight
    Schedule,

    /// Generate shell completions for subframes
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
struct ExtractArgs {
    /// Manifest file (JSON lines) listing videos and subtitles
    #[arg(short, long, env = "SUBFRAMES_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Root directory for extracted frames
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Maximum subtitle entries per video, 0 for all
    #[arg(long)]
    max_entries: Option<usize>,

    /// Maximum Hamming distance at which frames count as duplicates (0-64)
    #[arg(short = 't', long)]
    similarity_threshold: Option<u32>,

    /// Number of videos processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only process videos whose file name contains this text
    #[arg(long)]
    only_video: Option<String>,
}

/// subframes - subtitle-driven frame sampling
///
/// Extracts start/mid/end frames for every subtitle entry of downloaded
/// videos and keeps only frames that are not near-duplicates.
#[derive(Parser, Debug)]
#[command(name = "subframes")]
#[command(version)]
#[command(about = "Subtitle-driven frame sampling with near-duplicate suppression")]
#[command(long_about = "subframes samples representative still frames from videos using their subtitle timings.

EXAMPLES:
    subframes extract                               # Sample every video in the manifest
    subframes extract -m downloads/manifest.jsonl   # Use a specific manifest
    subframes extract -t 3 -w 4                     # Stricter dedup, 4 parallel videos
    subframes extract --only-video interview        # Only videos whose name contains 'interview'
    subframes pipeline                              # One acquisition + sampling + packaging run
    subframes schedule                              # Run the pipeline every night
    subframes completions bash > subframes.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    ConsoleLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "subframes", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    }
    if let Commands::Extract(args) = &cli.command {
        apply_extract_overrides(&mut config, args);
    }

    config
        .validate()
        .map_err(|e| AppError::Config(format!("{:#}", e)))?;
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Extract(_) => run_extract(&config).await,
        Commands::Pipeline => {
            let orchestrator = build_orchestrator(&config);
            let report = orchestrator.run_once().await?;
            info!(
                "{} new record(s), {} archive(s) written",
                report.new_records,
                report.archived.len()
            );
            Ok(())
        }
        Commands::Schedule => Arc::new(build_orchestrator(&config)).run_schedule().await,
        Commands::Completions { .. } => Err(anyhow!("completions are handled before configuration")),
    }
}

fn apply_extract_overrides(config: &mut Config, args: &ExtractArgs) {
    if let Some(manifest) = &args.manifest {
        config.manifest_path = manifest.clone();
    }
    if let Some(out) = &args.out {
        config.output_root = out.clone();
    }
    if let Some(max_entries) = args.max_entries {
        config.sampling.max_entries = max_entries;
    }
    if let Some(threshold) = args.similarity_threshold {
        config.sampling.similarity_threshold = threshold;
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(only_video) = &args.only_video {
        config.only_video = Some(only_video.clone());
    }
}

fn build_sampler(config: &Config) -> VideoSampler {
    let transcoder = Arc::new(FfmpegTranscoder::new(config.transcoder.clone()));
    VideoSampler::new(
        FrameExtractor::new(transcoder),
        config.sampling.clone(),
        config.output_root.clone(),
    )
}

fn build_orchestrator(config: &Config) -> PipelineOrchestrator {
    let acquisition = Arc::new(CommandAcquisition::new(config.acquisition.clone()));
    PipelineOrchestrator::new(build_sampler(config), acquisition, config.manifest_path.clone())
}

async fn run_extract(config: &Config) -> Result<()> {
    let runner = BatchRunner::new(build_sampler(config), config.effective_workers());
    let report = runner
        .run_manifest(&config.manifest_path, config.only_video.as_deref())
        .await?;

    for failure in &report.failed {
        warn!("Failed: {:?}: {}", failure.video, failure.error);
    }
    info!(
        "Done: {} video(s) sampled, {} failed, frames under {:?}",
        report.completed.len(),
        report.failed.len(),
        config.output_root
    );
    Ok(())
}
