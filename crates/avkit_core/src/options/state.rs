//! Mutable state threaded through one parse.

use std::path::PathBuf;

use super::filtergraph::FilterGraph;
use super::globals::ParserGlobals;
use super::output::OutputFile;
use crate::logging::{LogLevel, LogSink};
use crate::models::InputFile;

/// Environment a parse runs in: where preset files live and whether codec
/// names are checked against the codec catalogue.
#[derive(Debug, Clone)]
pub struct ParseEnv {
    /// `$AVKIT_DATADIR`.
    pub avkit_datadir: Option<PathBuf>,
    /// `$FFMPEG_DATADIR`.
    pub ffmpeg_datadir: Option<PathBuf>,
    /// `$HOME`; presets are searched in `$HOME/.ffmpeg`.
    pub home_dir: Option<PathBuf>,
    /// Extra configured preset directories, searched last.
    pub preset_dirs: Vec<PathBuf>,
    /// Reject codec names missing from the codec catalogue.
    pub validate_codecs: bool,
}

impl Default for ParseEnv {
    fn default() -> Self {
        Self {
            avkit_datadir: None,
            ffmpeg_datadir: None,
            home_dir: None,
            preset_dirs: Vec::new(),
            validate_codecs: true,
        }
    }
}

impl ParseEnv {
    /// Read data directories from the process environment.
    pub fn from_environment() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            avkit_datadir: var("AVKIT_DATADIR"),
            ffmpeg_datadir: var("FFMPEG_DATADIR"),
            home_dir: var("HOME"),
            ..Self::default()
        }
    }

    pub fn with_preset_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.preset_dirs = dirs;
        self
    }

    pub fn with_codec_validation(mut self, validate: bool) -> Self {
        self.validate_codecs = validate;
        self
    }

    /// Preset directories in search order.
    pub fn preset_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        dirs.extend(self.avkit_datadir.clone());
        dirs.extend(self.ffmpeg_datadir.clone());
        dirs.extend(self.home_dir.as_ref().map(|h| h.join(".ffmpeg")));
        dirs.extend(self.preset_dirs.iter().cloned());
        dirs
    }
}

/// State of one parse: globals, opened files and filter graphs.
pub struct ParseState<'a> {
    pub globals: ParserGlobals,
    pub inputs: Vec<InputFile>,
    pub outputs: Vec<OutputFile>,
    pub filtergraphs: Vec<FilterGraph>,
    pub env: &'a ParseEnv,
    sink: &'a dyn LogSink,
}

impl<'a> ParseState<'a> {
    pub fn new(env: &'a ParseEnv, sink: &'a dyn LogSink) -> Self {
        Self {
            globals: ParserGlobals::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            filtergraphs: Vec::new(),
            env,
            sink,
        }
    }

    pub fn sink(&self) -> &'a dyn LogSink {
        self.sink
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.sink.log(level, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Verbose, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }
}
