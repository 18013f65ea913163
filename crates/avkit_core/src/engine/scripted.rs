//! Deterministic engine that replays scripted output.
//!
//! Used by tests and demos that must run without engine binaries. Probe runs
//! answer from registered media information documents; transcode runs play
//! the first script whose trigger appears among the arguments.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::errors::{EngineError, EngineResult};
use super::progress::parse_progress;
use super::{probe_with_engine, Engine, EngineKind, ExecutionContext, MediaProbe, CANCEL_EXIT_CODE};
use crate::logging::LogLevel;
use crate::models::InputFile;
use crate::probe::ProbeResult;

/// One step of a scripted run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Log(LogLevel, String),
    /// A progress line, delivered as statistics and as an `Info` log.
    Progress(String),
    Output(String),
    /// Pause, returning early with the cancel status if cancelled meanwhile.
    Sleep(Duration),
    Exit(i32),
}

impl ScriptStep {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log(level, message.into())
    }

    /// Progress line for `frame` frames at `time_ms`.
    pub fn progress(frame: u32, time_ms: u64) -> Self {
        let secs = time_ms / 1000;
        Self::Progress(format!(
            "frame={:5} fps= 25.0 q=28.0 size={:8}kB time={:02}:{:02}:{:02}.{:02} bitrate= 800.0kbits/s speed=1.00x",
            frame,
            frame * 4,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            (time_ms % 1000) / 10
        ))
    }
}

/// A run recorded by [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    pub kind: EngineKind,
    pub session_id: i64,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

#[derive(Default)]
pub struct ScriptedEngine {
    media: HashMap<String, String>,
    scripts: Vec<(String, Vec<ScriptStep>)>,
    default_script: Vec<ScriptStep>,
    calls: Mutex<Vec<EngineCall>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            default_script: vec![
                ScriptStep::log(LogLevel::Info, "Press [q] to stop, [?] for help"),
                ScriptStep::Exit(0),
            ],
            ..Default::default()
        }
    }

    /// Answer probes of `url` with the given JSON document.
    pub fn with_media(mut self, url: impl Into<String>, json: impl Into<String>) -> Self {
        self.media.insert(url.into(), json.into());
        self
    }

    /// Play `steps` for runs whose arguments contain `trigger`.
    pub fn with_script(mut self, trigger: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        self.scripts.push((trigger.into(), steps));
        self
    }

    /// Steps played when no trigger matches.
    pub fn with_default_script(mut self, steps: Vec<ScriptStep>) -> Self {
        self.default_script = steps;
        self
    }

    /// Every run so far, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, kind: EngineKind) -> Vec<EngineCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    fn script_for(&self, args: &[String]) -> &[ScriptStep] {
        self.scripts
            .iter()
            .find(|(trigger, _)| args.iter().any(|a| a == trigger))
            .map_or(self.default_script.as_slice(), |(_, steps)| steps.as_slice())
    }

    fn run_probe(&self, args: &[String], ctx: &ExecutionContext<'_>) -> i32 {
        let url = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .or_else(|| args.last());
        let Some(url) = url else {
            ctx.sink.on_log(LogLevel::Error, "No input specified");
            return 1;
        };
        match self.media.get(url) {
            Some(json) => {
                ctx.sink.on_output(json);
                0
            }
            None => {
                ctx.sink
                    .on_log(LogLevel::Error, &format!("{}: No such file or directory", url));
                1
            }
        }
    }

    fn play(&self, steps: &[ScriptStep], ctx: &ExecutionContext<'_>) -> EngineResult<i32> {
        let started = Instant::now();
        for step in steps {
            if ctx.is_cancelled() {
                return Ok(CANCEL_EXIT_CODE);
            }
            match step {
                ScriptStep::Log(level, message) => ctx.sink.on_log(*level, message),
                ScriptStep::Progress(line) => {
                    if let Some(stats) = parse_progress(ctx.session_id, line) {
                        ctx.sink.on_statistics(stats);
                    }
                    ctx.sink.on_log(LogLevel::Info, line);
                }
                ScriptStep::Output(text) => ctx.sink.on_output(text),
                ScriptStep::Sleep(duration) => {
                    let until = Instant::now() + *duration;
                    while Instant::now() < until {
                        if ctx.is_cancelled() {
                            return Ok(CANCEL_EXIT_CODE);
                        }
                        if let Some(limit) = ctx.timeout {
                            if started.elapsed() >= limit {
                                return Err(EngineError::Timeout(limit.as_millis() as u64));
                            }
                        }
                        thread::sleep(Duration::from_millis(5));
                    }
                }
                ScriptStep::Exit(code) => return Ok(*code),
            }
        }
        Ok(0)
    }
}

impl Engine for ScriptedEngine {
    fn run(
        &self,
        kind: EngineKind,
        args: &[String],
        ctx: &ExecutionContext<'_>,
    ) -> EngineResult<i32> {
        self.calls.lock().push(EngineCall {
            kind,
            session_id: ctx.session_id,
            args: args.to_vec(),
            env: ctx.env.clone(),
        });

        let has_script = self
            .scripts
            .iter()
            .any(|(trigger, _)| args.iter().any(|a| a == trigger));
        if kind == EngineKind::Ffprobe && !has_script {
            return Ok(self.run_probe(args, ctx));
        }
        self.play(self.script_for(args), ctx)
    }
}

impl MediaProbe for ScriptedEngine {
    fn probe(&self, url: &str, format: Option<&str>) -> ProbeResult<InputFile> {
        probe_with_engine(self, url, format, None)
    }
}
