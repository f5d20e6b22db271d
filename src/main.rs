//! remux command line
//!
//! Copies the streams of one container into another without re-encoding,
//! either for a single input/output pair or for every line of a batch file.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remux::config::{LogFormat, LoggingConfig, ReadErrorPolicy, RemuxConfig};
use remux::config_file::{generate_default_config, ConfigFile};
use remux::error::{RemuxError, Result};
use remux::{batch, ffmpeg_utils, FfmpegLibrary, TimeRange};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "remux";

/// Default configuration file, used when present and `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "remux.toml";

/// Remux media containers without re-encoding
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input media file
    #[arg(required_unless_present_any = ["batch", "write_default_config"])]
    input: Option<PathBuf>,

    /// Output media file
    #[arg(required_unless_present_any = ["batch", "write_default_config"])]
    output: Option<PathBuf>,

    /// Batch file with one "input output" pair per line
    #[arg(short, long, conflicts_with_all = ["input", "output"])]
    batch: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output container format (e.g. mp4, matroska, mpegts)
    #[arg(short, long)]
    format: Option<String>,

    /// Muxer option KEY=VALUE, may be repeated
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Ask the muxer to keep the input timebases
    #[arg(long)]
    preserve_time_base: bool,

    /// What to do when a packet cannot be read (fail, stop)
    #[arg(long, value_name = "POLICY")]
    on_read_error: Option<ReadErrorPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Maximum concurrent batch jobs
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Only start batch jobs while the clock is inside this daily window
    #[arg(long, requires = "batch", value_name = "HH:MM:SS-HH:MM:SS")]
    timer: Option<TimeRange>,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write a default configuration file to this path and exit
    #[arg(long, value_name = "FILE")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        return match generate_default_config(path) {
            Ok(()) => {
                println!("Wrote default configuration to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", APP_NAME, e);
                exit_code(&e)
            }
        };
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return exit_code(&e);
        }
    };

    init_logging(&config.logging);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    if let Err(e) = ffmpeg_utils::init() {
        tracing::error!("{}", e);
        return exit_code(&RemuxError::from(e));
    }
    ffmpeg_utils::install_log_forwarding(&config.logging.level);
    tracing::debug!("FFmpeg version: {}", ffmpeg_utils::version_info());

    let result = match &args.batch {
        Some(batch_file) => run_batch(batch_file, config, args.json).await,
        None => run_single(&args, &config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            exit_code(&e)
        }
    }
}

async fn run_single(args: &Args, config: &RemuxConfig) -> Result<()> {
    let (Some(input), Some(output)) = (args.input.clone(), args.output.clone()) else {
        return Err(RemuxError::Config(
            "an input and an output path are required".to_string(),
        ));
    };

    let config = config.clone();
    let summary = tokio::task::spawn_blocking(move || {
        remux::remux_file(&input, &output, &config)
    })
    .await
    .map_err(|e| RemuxError::Task(e.to_string()))??;

    if args.json {
        print_json(&summary)?;
    }
    Ok(())
}

async fn run_batch(batch_file: &Path, config: RemuxConfig, json: bool) -> Result<()> {
    let jobs = batch::load_batch_file(batch_file)?;
    let report = batch::run_batch(Arc::new(FfmpegLibrary), jobs, Arc::new(config)).await;
    if json {
        print_json(&report)?;
    }
    report.into_result().map(|_| ())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RemuxError::Config(format!("serialize summary: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Build the effective configuration: file values, then command line flags
fn load_config(args: &Args) -> Result<RemuxConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::from_file(path)?.into_remux_config(),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ConfigFile::from_file(DEFAULT_CONFIG_FILE)?.into_remux_config()
        }
        None => RemuxConfig::default(),
    };
    apply_overrides(&mut config, args)?;
    Ok(config)
}

fn apply_overrides(config: &mut RemuxConfig, args: &Args) -> Result<()> {
    if let Some(format) = &args.format {
        config.output_format = Some(format.clone());
    }
    for option in &args.options {
        config.set_muxer_option(option).map_err(RemuxError::Config)?;
    }
    if args.preserve_time_base {
        config.preserve_time_base = true;
    }
    if let Some(policy) = args.on_read_error {
        config.read_error_policy = policy;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if let Some(jobs) = args.jobs {
        if jobs == 0 {
            return Err(RemuxError::Config("--jobs must be at least 1".to_string()));
        }
        config.batch.max_parallel = jobs;
    }
    if let Some(window) = args.timer {
        config.batch.window = Some(window);
    }
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("remux={level},ffmpeg={level}", level = logging.level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn exit_code(error: &RemuxError) -> ExitCode {
    ExitCode::from(error.exit_code().clamp(1, 255) as u8)
}
