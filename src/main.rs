// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{Result, anyhow, Context};
use log::{warn, info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::fs::File;
use std::io::BufReader;
use clap::{Args, Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use crate::app_config::{Config, OutputMode};
use crate::codec::OutputFormat;
use crate::url_utils::Scope;
use app_controller::{convert_file, Controller};

mod app_config;
mod subtitle_processor;
mod codec;
mod sanitizer;
mod resolver;
mod fetcher;
mod aggregator;
mod archive;
mod file_utils;
mod app_controller;
mod language_utils;
mod url_utils;
mod providers;
mod errors;

/// CLI Wrapper for OutputFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputFormat {
    Srt,
    Vtt,
    Txt,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(cli_format: CliOutputFormat) -> Self {
        match cli_format {
            CliOutputFormat::Srt => OutputFormat::Srt,
            CliOutputFormat::Vtt => OutputFormat::Vtt,
            CliOutputFormat::Txt => OutputFormat::Txt,
        }
    }
}

/// CLI Wrapper for OutputMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputMode {
    Separate,
    Combined,
}

impl From<CliOutputMode> for OutputMode {
    fn from(cli_mode: CliOutputMode) -> Self {
        match cli_mode {
            CliOutputMode::Separate => OutputMode::Separate,
            CliOutputMode::Combined => OutputMode::Combined,
        }
    }
}

/// CLI Wrapper for Scope to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliScope {
    Playlist,
    Video,
}

impl From<CliScope> for Scope {
    fn from(cli_scope: CliScope) -> Self {
        match cli_scope {
            CliScope::Playlist => Scope::Playlist,
            CliScope::Video => Scope::Video,
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
    /// Download captions for a video or playlist (default command)
    #[command(alias = "get")]
    Download(DownloadArgs),

    /// Convert a local caption file to another format
    Convert(ConvertArgs),

    /// List the caption languages a video offers
    Languages(LanguagesArgs),

    /// Generate shell completions for subgrab
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Args, Debug, Clone)]
struct DownloadOptions {
    /// Caption languages in preference order (e.g. 'tr,en')
    #[arg(short, long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Output mode for playlists
    #[arg(short, long, value_enum)]
    mode: Option<CliOutputMode>,

    /// For a video opened inside a playlist, process the playlist or just the video
    #[arg(long, value_enum)]
    scope: Option<CliScope>,

    /// Use the automatically generated track instead of listed languages
    #[arg(long)]
    auto: bool,

    /// Never fall back to automatically generated tracks
    #[arg(long)]
    manual_only: bool,

    /// Take any available language when none of the requested ones exist
    #[arg(long)]
    any_language: bool,

    /// Keep advertisement markers and blank runs
    #[arg(long)]
    no_clean: bool,

    /// Netscape cookies file exported from a signed-in browser
    #[arg(long, value_name = "FILE")]
    cookies: Option<PathBuf>,

    /// Directory to write the output file into
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Only process these 1-based playlist positions (e.g. '1,3,4')
    #[arg(long, value_delimiter = ',')]
    items: Vec<usize>,

    /// Skip the transcript service and go straight to yt-dlp
    #[arg(long)]
    no_primary: bool,
}

#[derive(Parser, Debug)]
struct DownloadArgs {
    /// Video or playlist URL
    #[arg(value_name = "URL")]
    url: String,

    #[command(flatten)]
    options: DownloadOptions,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Caption file to convert
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Target format
    #[arg(short, long, value_enum)]
    to: CliOutputFormat,

    /// Output file (defaults to the input with the new extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Strip advertisement markers and collapse blank runs
    #[arg(long)]
    clean: bool,

    /// Set logging level
    #[arg(long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct LanguagesArgs {
    /// Video URL
    #[arg(value_name = "URL")]
    url: String,

    #[command(flatten)]
    common: CommonArgs,
}

/// subgrab - caption downloader and normalizer
///
/// Fetches caption tracks for videos and playlists, falls back to yt-dlp when
/// the transcript service fails, and writes SRT, WebVTT or plain text.
#[derive(Parser, Debug)]
#[command(name = "subgrab")]
#[command(version)]
#[command(about = "Caption downloader and normalizer")]
#[command(long_about = "subgrab fetches caption tracks for videos and playlists and normalizes them.

EXAMPLES:
    subgrab https://youtu.be/abc123                     # English SRT for one video
    subgrab -l tr,en -f txt <URL>                       # Turkish, else English, as plain text
    subgrab -m combined <PLAYLIST_URL>                  # One combined document for a playlist
    subgrab --items 1,3 <PLAYLIST_URL>                  # Only the first and third videos
    subgrab --cookies cookies.txt <URL>                 # Use a signed-in session for yt-dlp
    subgrab languages <URL>                             # List available caption languages
    subgrab convert talk.vtt --to srt                   # Convert a local file
    subgrab completions bash > subgrab.bash             # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Video or playlist URL
    #[arg(value_name = "URL")]
    url: Option<String>,

    #[command(flatten)]
    options: DownloadOptions,

    #[command(flatten)]
    common: CommonArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
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
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

// @returns: Filter matching a configured level
fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subgrab", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Download(args)) => run_download(args).await,
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Languages(args)) => run_languages(args).await,
        None => {
            let url = cli.url.ok_or_else(|| {
                anyhow!("URL is required when no subcommand is specified")
            })?;
            run_download(DownloadArgs {
                url,
                options: cli.options,
                common: cli.common,
            })
            .await
        }
    }
}

// Load the config file, writing a default one when it is missing
fn load_config(common: &CommonArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &common.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let config_path = &common.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    match &common.log_level {
        Some(log_level) => config.log_level = log_level.clone().into(),
        None => log::set_max_level(level_filter(&config.log_level)),
    }

    Ok(config)
}

// Fold command line overrides into the loaded config
fn apply_overrides(config: &mut Config, options: &DownloadOptions) {
    if !options.languages.is_empty() {
        config.languages = options.languages.iter().map(|l| l.trim().to_string()).collect();
    }
    if let Some(format) = &options.format {
        config.format = format.clone().into();
    }
    if let Some(mode) = &options.mode {
        config.output_mode = mode.clone().into();
    }
    if let Some(scope) = &options.scope {
        config.scope = scope.clone().into();
    }
    if options.auto {
        config.auto_captions = true;
    }
    if options.manual_only {
        config.prefer_manual_only = true;
    }
    if options.any_language {
        config.fallback_to_any = true;
    }
    if options.no_clean {
        config.clean_transcript = false;
    }
    if let Some(cookies) = &options.cookies {
        config.cookies_path = Some(cookies.clone());
    }
    if let Some(output_dir) = &options.output_dir {
        config.output_dir = output_dir.clone();
    }
    if options.no_primary {
        config.primary.enabled = false;
    }
}

async fn run_download(args: DownloadArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    apply_overrides(&mut config, &args.options);

    config.validate()
        .context("Configuration validation failed")?;

    let controller = Controller::with_config(config)?.with_progress(true);

    // Ctrl-C stops the batch between items; finished items are still saved
    let cancel = controller.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current video");
            cancel.cancel();
        }
    });

    let (report, path) = controller.run(&args.url, &args.options.items).await?;

    if report.cancelled {
        warn!("Batch cancelled; saved the {} video(s) finished so far", report.success_count);
    }
    if !report.warnings.is_empty() {
        warn!("{} video(s) had no usable subtitles", report.warnings.len());
    }
    info!("Success: {} document(s) written to {:?}", report.success_count, path);

    Ok(())
}

async fn run_languages(args: LanguagesArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    config.validate()
        .context("Configuration validation failed")?;

    let controller = Controller::with_config(config)?;
    let (item, catalog) = controller.list_languages(&args.url, false).await?;

    println!("Caption languages for '{}':", item.title);
    for (code, descriptor) in catalog.iter() {
        let kinds = match (descriptor.is_manual, descriptor.is_automatic) {
            (true, true) => "manual, auto-generated",
            (true, false) => "manual",
            (false, true) => "auto-generated",
            (false, false) => continue,
        };
        println!("  {:<10} {:<40} {}", code, language_utils::format_language_option(code), kinds);
    }

    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    if let Some(cmd_log_level) = &args.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let output = convert_file(&args.input, args.output.as_deref(), args.to.into(), args.clean)?;
    info!("Success: {:?}", output);

    Ok(())
}
