//! Typed settings, one struct per TOML table.
//!
//! Every field has a serde default, so a partial file loads and the manager
//! can tell which keys were missing.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel, LogRedirectionStrategy};

/// Everything in `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Engine binaries and invocation.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Engine log level, printing and session log files.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Session history and async execution.
    #[serde(default)]
    pub sessions: SessionSettings,

    /// Preset file lookup.
    #[serde(default)]
    pub presets: PresetSettings,

    /// Environment handed to the engine.
    #[serde(default)]
    pub environment: EnvironmentSettings,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Transcoder binary; a bare name is looked up in `PATH`.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Probe binary; a bare name is looked up in `PATH`.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Arguments placed before every command.
    #[serde(default)]
    pub default_args: Vec<String>,

    /// Time limit for media information probes in milliseconds, 0 for none.
    #[serde(default)]
    pub media_information_timeout_ms: u64,

    /// Parse and validate ffmpeg commands before running them.
    #[serde(default = "default_true")]
    pub validate_commands: bool,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            default_args: Vec::new(),
            media_information_timeout_ms: 0,
            validate_commands: true,
        }
    }
}

impl EngineSettings {
    pub fn media_information_timeout(&self) -> Option<Duration> {
        (self.media_information_timeout_ms > 0)
            .then(|| Duration::from_millis(self.media_information_timeout_ms))
    }
}

/// `[logging]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Most verbose engine level delivered to sessions.
    #[serde(default)]
    pub level: LogLevel,

    /// When delivered entries are also printed.
    #[serde(default)]
    pub redirection: LogRedirectionStrategy,

    /// Write one log file per session into `logs_folder`.
    #[serde(default)]
    pub log_to_file: bool,

    /// Folder for session log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Number of recent lines kept for failure reports.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix log file lines with the time.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            redirection: LogRedirectionStrategy::default(),
            log_to_file: false,
            logs_folder: default_logs_folder(),
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

impl LoggingSettings {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            error_tail: self.error_tail as usize,
            show_timestamps: self.show_timestamps,
        }
    }

    /// Folder for session log files, when enabled.
    pub fn log_folder(&self) -> Option<PathBuf> {
        self.log_to_file.then(|| PathBuf::from(&self.logs_folder))
    }
}

/// Session history and executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Number of sessions kept in the history.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Number of asynchronous sessions that may run at once.
    #[serde(default = "default_concurrency_limit")]
    pub async_concurrency_limit: usize,
}

fn default_history_size() -> usize {
    10
}

fn default_concurrency_limit() -> usize {
    10
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            async_concurrency_limit: default_concurrency_limit(),
        }
    }
}

/// Preset lookup configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetSettings {
    /// Directories searched after the standard data directories.
    #[serde(default)]
    pub dirs: Vec<String>,
}

/// Engine environment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    /// Variables set for every engine run.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Font directories registered through fontconfig.
    #[serde(default)]
    pub font_dirs: Vec<String>,

    /// Font family substitutions (requested name to installed name).
    #[serde(default)]
    pub font_mapping: BTreeMap<String, String>,
}

/// The top-level tables, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Engine,
    Logging,
    Sessions,
    Presets,
    Environment,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Engine,
        ConfigSection::Logging,
        ConfigSection::Sessions,
        ConfigSection::Presets,
        ConfigSection::Environment,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Engine => "engine",
            ConfigSection::Logging => "logging",
            ConfigSection::Sessions => "sessions",
            ConfigSection::Presets => "presets",
            ConfigSection::Environment => "environment",
        }
    }

    /// Comment written above the section in generated files.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Engine => "Engine binaries and invocation",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Sessions => "Session history and async execution",
            ConfigSection::Presets => "Extra preset directories",
            ConfigSection::Environment => "Environment variables and fonts for the engine",
        }
    }
}
