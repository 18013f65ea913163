//! avkit core - session-oriented wrapper around an external ffmpeg/ffprobe
//! engine.
//!
//! The option parser validates transcode command lines before they reach
//! the engine; sessions record logs, statistics and results; the kit
//! registry ties them together.

pub mod config;
pub mod engine;
pub mod error_code;
pub mod kit;
pub mod logging;
pub mod models;
pub mod options;
pub mod probe;
pub mod session;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
