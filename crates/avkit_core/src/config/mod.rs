//! Configuration management for avkit.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use avkit_core::config::{ConfigManager, ConfigSection};
//! use avkit_core::logging::LogLevel;
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("ffmpeg binary: {}", config.settings().engine.ffmpeg_path);
//!
//! config.settings_mut().logging.level = LogLevel::Debug;
//! config.update_section(ConfigSection::Logging).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, EngineSettings, EnvironmentSettings, LoggingSettings, PresetSettings,
    SessionSettings, Settings,
};
