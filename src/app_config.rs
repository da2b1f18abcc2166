use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::OutputFormat;
use crate::file_utils::FileManager;
use crate::language_utils::validate_language_code;
use crate::url_utils::Scope;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Caption languages in preference order
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// How multiple documents are delivered
    #[serde(default)]
    pub output_mode: OutputMode,

    /// Which half of a video-in-playlist link to follow
    #[serde(default)]
    pub scope: Scope,

    /// Strip advertisement markers and collapse blank runs
    #[serde(default = "default_true")]
    pub clean_transcript: bool,

    /// Never accept automatic tracks for a requested language
    #[serde(default)]
    pub prefer_manual_only: bool,

    /// Take any available track when no requested language matches
    #[serde(default)]
    pub fallback_to_any: bool,

    /// Ask for the source's own automatic track instead of listed languages
    #[serde(default)]
    pub auto_captions: bool,

    /// Netscape cookies file used by the secondary source
    #[serde(default)]
    pub cookies_path: Option<PathBuf>,

    /// Directory the final file is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Upper bound for generated file names, in characters
    #[serde(default = "default_filename_max_chars")]
    pub filename_max_chars: usize,

    /// Lightweight transcript service
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// Download-based extractor
    #[serde(default)]
    pub secondary: SecondaryConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Delivery of a multi-item batch
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    // @mode: One archive entry per item
    #[default]
    Separate,
    // @mode: All items in one document
    Combined,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Separate => write!(f, "separate"),
            Self::Combined => write!(f, "combined"),
        }
    }
}

impl std::str::FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "separate" | "zip" => Ok(Self::Separate),
            "combined" | "single" => Ok(Self::Combined),
            _ => Err(anyhow!("Invalid output mode: {}", s)),
        }
    }
}

/// Retry ceiling and backoff schedule for one source
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    // @field: Attempts including the first one
    pub max_attempts: u32,

    // @field: Delay before the first retry, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    // @field: Delay ceiling
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Transcript service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrimaryConfig {
    // @field: Source is consulted at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Retry schedule
    #[serde(default = "default_primary_retry")]
    pub retry: RetryConfig,

    // @field: Request timeout in seconds
    #[serde(default = "default_primary_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: default_primary_retry(),
            timeout_secs: default_primary_timeout_secs(),
        }
    }
}

impl PrimaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Extractor configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SecondaryConfig {
    // @field: Source is consulted at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Retry schedule
    #[serde(default = "default_secondary_retry")]
    pub retry: RetryConfig,

    // @field: Process timeout in seconds
    #[serde(default = "default_secondary_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Extractor executable
    #[serde(default = "default_binary")]
    pub binary: String,

    // @field: User agent presented to the video site
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: default_secondary_retry(),
            timeout_secs: default_secondary_timeout_secs(),
            binary: default_binary(),
            user_agent: default_user_agent(),
        }
    }
}

impl SecondaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_filename_max_chars() -> usize {
    150
}

fn default_backoff_base_ms() -> u64 {
    2000 // doubled on each retry
}

fn default_backoff_max_ms() -> u64 {
    10000
}

fn default_primary_retry() -> RetryConfig {
    RetryConfig::with_attempts(3)
}

fn default_secondary_retry() -> RetryConfig {
    RetryConfig::with_attempts(5)
}

fn default_primary_timeout_secs() -> u64 {
    30
}

fn default_secondary_timeout_secs() -> u64 {
    300
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() && !self.auto_captions {
            return Err(anyhow!("At least one caption language is required"));
        }

        for code in &self.languages {
            validate_language_code(code)?;
        }

        if self.primary.retry.max_attempts == 0 || self.secondary.retry.max_attempts == 0 {
            return Err(anyhow!("Retry ceilings must be at least 1"));
        }

        if self.filename_max_chars == 0 {
            return Err(anyhow!("filename_max_chars must be greater than 0"));
        }

        if !self.primary.enabled && !self.secondary.enabled {
            return Err(anyhow!("At least one caption source must be enabled"));
        }

        if let Some(cookies) = &self.cookies_path {
            if !FileManager::file_exists(FileManager::expand_home(cookies)) {
                return Err(anyhow!("Cookies file does not exist: {:?}", cookies));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            format: OutputFormat::default(),
            output_mode: OutputMode::default(),
            scope: Scope::default(),
            clean_transcript: true,
            prefer_manual_only: false,
            fallback_to_any: false,
            auto_captions: false,
            cookies_path: None,
            output_dir: default_output_dir(),
            filename_max_chars: default_filename_max_chars(),
            primary: PrimaryConfig::default(),
            secondary: SecondaryConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
