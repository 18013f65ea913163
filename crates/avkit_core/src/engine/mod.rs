//! External engine adapter.
//!
//! The transcoder and its probing companion run as external programs behind
//! the [`Engine`] trait:
//! - [`ProcessEngine`] spawns the configured binaries
//! - [`ScriptedEngine`] replays scripted output for tests
//!
//! Engines report through an [`EngineSink`]; the session layer owns the sink
//! and decides what is stored, forwarded or printed.

mod errors;
mod process;
pub mod progress;
mod scripted;

pub use errors::{EngineError, EngineResult};
pub use process::ProcessEngine;
pub use scripted::{EngineCall, ScriptStep, ScriptedEngine};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error_code;
use crate::logging::LogLevel;
use crate::models::InputFile;
use crate::probe::{MediaInformation, ProbeError, ProbeResult};
use crate::session::Statistics;

/// Which engine program to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Ffmpeg,
    Ffprobe,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Ffmpeg => f.write_str("ffmpeg"),
            EngineKind::Ffprobe => f.write_str("ffprobe"),
        }
    }
}

/// Opens input files for the option parser.
pub trait MediaProbe {
    /// Describe the container and streams at `url`, optionally forcing the
    /// demuxer.
    fn probe(&self, url: &str, format: Option<&str>) -> ProbeResult<InputFile>;
}

/// Receives everything a running engine reports.
pub trait EngineSink: Send + Sync {
    fn on_log(&self, level: LogLevel, message: &str);

    /// Text the engine wrote to standard output.
    fn on_output(&self, text: &str);

    fn on_statistics(&self, statistics: Statistics);
}

/// Per-run settings handed to [`Engine::run`].
pub struct ExecutionContext<'a> {
    pub session_id: i64,
    /// Level passed to the engine when the arguments do not set one.
    pub log_level: LogLevel,
    pub cancel: Arc<AtomicBool>,
    pub timeout: Option<Duration>,
    /// Extra environment variables for the engine process.
    pub env: Vec<(String, String)>,
    pub sink: &'a dyn EngineSink,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(session_id: i64, sink: &'a dyn EngineSink) -> Self {
        Self {
            session_id,
            log_level: LogLevel::Info,
            cancel: Arc::new(AtomicBool::new(false)),
            timeout: None,
            env: Vec::new(),
            sink,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// An external transcode/probe engine.
pub trait Engine: MediaProbe + Send + Sync {
    /// Run one engine program to completion and return its exit status.
    ///
    /// A run stopped through the cancel flag returns 255.
    fn run(&self, kind: EngineKind, args: &[String], ctx: &ExecutionContext<'_>)
        -> EngineResult<i32>;
}

/// [`MediaProbe`] view of a shared engine.
pub struct EngineProbe<'a>(pub &'a dyn Engine);

impl MediaProbe for EngineProbe<'_> {
    fn probe(&self, url: &str, format: Option<&str>) -> ProbeResult<InputFile> {
        self.0.probe(url, format)
    }
}

/// Exit status reported for a cancelled run.
pub const CANCEL_EXIT_CODE: i32 = 255;

/// Probe arguments printing the JSON media information document.
pub fn media_information_arguments(url: &str, format: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = [
        "-v",
        "error",
        "-hide_banner",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        "-show_chapters",
        "-show_programs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    if let Some(format) = format {
        args.push("-f".to_string());
        args.push(format.to_string());
    }
    args.push("-i".to_string());
    args.push(url.to_string());
    args
}

/// Sink that keeps the output and log lines of a run.
#[derive(Default)]
pub struct CollectingSink {
    output: Mutex<String>,
    logs: Mutex<Vec<(LogLevel, String)>>,
}

impl CollectingSink {
    pub fn output(&self) -> String {
        self.output.lock().clone()
    }

    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.logs.lock().clone()
    }

    /// Last non-empty log line, the engine's usual failure message.
    pub fn last_message(&self) -> Option<String> {
        self.logs
            .lock()
            .iter()
            .rev()
            .map(|(_, m)| m.trim())
            .find(|m| !m.is_empty())
            .map(str::to_string)
    }
}

impl EngineSink for CollectingSink {
    fn on_log(&self, level: LogLevel, message: &str) {
        self.logs.lock().push((level, message.to_string()));
    }

    fn on_output(&self, text: &str) {
        self.output.lock().push_str(text);
    }

    fn on_statistics(&self, _statistics: Statistics) {}
}

/// Failure for a probe run that exited with `status`.
pub fn probe_failure(status: i32, message: Option<String>) -> ProbeError {
    let message = message.unwrap_or_else(|| format!("probe exited with status {}", status));
    let code = error_code::from_message(&message).unwrap_or(error_code::INVALIDDATA);
    ProbeError::failed(code, message)
}

/// Run the probe for `args` and parse the document it prints.
pub fn run_media_information<E: Engine + ?Sized>(
    engine: &E,
    args: &[String],
    timeout: Option<Duration>,
) -> ProbeResult<MediaInformation> {
    let sink = CollectingSink::default();
    let ctx = ExecutionContext::new(0, &sink).with_timeout(timeout);
    let status = engine.run(EngineKind::Ffprobe, args, &ctx)?;
    if status != 0 {
        return Err(probe_failure(status, sink.last_message()));
    }
    MediaInformation::from_json(&sink.output())
}

/// [`MediaProbe::probe`] through an engine's probe program.
pub fn probe_with_engine<E: Engine + ?Sized>(
    engine: &E,
    url: &str,
    format: Option<&str>,
    timeout: Option<Duration>,
) -> ProbeResult<InputFile> {
    let info = run_media_information(engine, &media_information_arguments(url, format), timeout)?;
    tracing::debug!(
        "Probed {}: {} with {} streams",
        url,
        info.format.as_deref().unwrap_or("unknown format"),
        info.streams.len()
    );
    Ok(info.to_input_file(url))
}
