//! Engine backed by the `ffmpeg` and `ffprobe` executables.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::errors::{EngineError, EngineResult};
use super::progress::{is_progress_line, parse_log_line, parse_progress};
use super::{
    probe_with_engine, Engine, EngineKind, EngineSink, ExecutionContext, MediaProbe,
    CANCEL_EXIT_CODE,
};
use crate::logging::LogLevel;
use crate::models::InputFile;
use crate::probe::ProbeResult;

/// How often the watcher checks the cancel flag and the timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the engine programs as child processes.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    default_args: Vec<String>,
    probe_timeout: Option<Duration>,
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl ProcessEngine {
    /// Engine using the given binaries (bare names are looked up in `PATH`).
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            default_args: Vec::new(),
            probe_timeout: None,
        }
    }

    /// Arguments placed before every command's own arguments.
    pub fn with_default_args(mut self, args: Vec<String>) -> Self {
        self.default_args = args;
        self
    }

    /// Time limit for probes made while parsing commands.
    pub fn with_probe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn program(&self, kind: EngineKind) -> &Path {
        match kind {
            EngineKind::Ffmpeg => &self.ffmpeg,
            EngineKind::Ffprobe => &self.ffprobe,
        }
    }

    /// Full argument list passed to the program.
    pub fn command_line(&self, kind: EngineKind, args: &[String], level: LogLevel) -> Vec<String> {
        let has = |name: &str| args.iter().any(|a| a == name);
        let mut full = Vec::with_capacity(args.len() + self.default_args.len() + 4);

        if !has("-hide_banner") {
            full.push("-hide_banner".to_string());
        }
        if kind == EngineKind::Ffmpeg && !has("-nostdin") {
            full.push("-nostdin".to_string());
        }
        if !has("-loglevel") && !has("-v") {
            let name = match level {
                LogLevel::Stderr => "quiet",
                other => other.name(),
            };
            full.push("-loglevel".to_string());
            full.push(format!("level+{}", name));
        }
        full.extend(self.default_args.iter().cloned());
        full.extend(args.iter().cloned());
        full
    }
}

enum Finish {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

impl Engine for ProcessEngine {
    fn run(
        &self,
        kind: EngineKind,
        args: &[String],
        ctx: &ExecutionContext<'_>,
    ) -> EngineResult<i32> {
        let program = self.program(kind);
        let full_args = self.command_line(kind, args, ctx.log_level);

        let mut cmd = Command::new(program);
        cmd.args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &ctx.env {
            cmd.env(key, value);
        }

        tracing::debug!(
            "Session {}: running {} {}",
            ctx.session_id,
            program.display(),
            full_args.join(" ")
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::spawn(program, e))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let started = Instant::now();

        let finish = thread::scope(|scope| {
            if let Some(out) = stdout {
                scope.spawn(move || read_stdout(out, ctx.sink));
            }
            if let Some(err) = stderr {
                scope.spawn(move || read_stderr(err, ctx.session_id, ctx.sink));
            }
            watch(&mut child, ctx, started)
        })?;

        match finish {
            Finish::Exited(status) => {
                let code = status.code().unwrap_or(CANCEL_EXIT_CODE);
                tracing::debug!(
                    "Session {}: {} exited with {} after {:.2}s",
                    ctx.session_id,
                    kind,
                    code,
                    started.elapsed().as_secs_f64()
                );
                Ok(code)
            }
            Finish::Cancelled => {
                tracing::info!("Session {}: {} cancelled", ctx.session_id, kind);
                Ok(CANCEL_EXIT_CODE)
            }
            Finish::TimedOut(limit) => {
                tracing::warn!(
                    "Session {}: {} timed out after {} ms",
                    ctx.session_id,
                    kind,
                    limit.as_millis()
                );
                Err(EngineError::Timeout(limit.as_millis() as u64))
            }
        }
    }
}

impl MediaProbe for ProcessEngine {
    fn probe(&self, url: &str, format: Option<&str>) -> ProbeResult<InputFile> {
        probe_with_engine(self, url, format, self.probe_timeout)
    }
}

/// Wait for the child, killing it on cancel or timeout.
fn watch(child: &mut Child, ctx: &ExecutionContext<'_>, started: Instant) -> EngineResult<Finish> {
    loop {
        if ctx.is_cancelled() {
            stop(child);
            return Ok(Finish::Cancelled);
        }
        if let Some(limit) = ctx.timeout {
            if started.elapsed() >= limit {
                stop(child);
                return Ok(Finish::TimedOut(limit));
            }
        }
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Finish::Exited(status)),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                stop(child);
                return Err(EngineError::io("waiting for the engine", e));
            }
        }
    }
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("Kill failed: {}", e);
    }
    let _ = child.wait();
}

fn read_stdout(mut out: impl Read, sink: &dyn EngineSink) {
    let mut buffer = [0u8; 8192];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match out.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buffer[..n]);
                // Hold back an incomplete UTF-8 sequence for the next read.
                let valid = match std::str::from_utf8(&pending) {
                    Ok(_) => pending.len(),
                    Err(e) if e.error_len().is_none() => e.valid_up_to(),
                    Err(_) => pending.len(),
                };
                if valid > 0 {
                    let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
                    sink.on_output(&text);
                    pending.drain(..valid);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Reading engine stdout failed: {}", e);
                break;
            }
        }
    }
    if !pending.is_empty() {
        sink.on_output(&String::from_utf8_lossy(&pending));
    }
}

fn read_stderr(mut err: impl Read, session_id: i64, sink: &dyn EngineSink) {
    let mut buffer = [0u8; 4096];
    let mut line: Vec<u8> = Vec::new();
    loop {
        match err.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                for &byte in &buffer[..n] {
                    if byte == b'\r' || byte == b'\n' {
                        deliver_line(&line, session_id, sink);
                        line.clear();
                    } else {
                        line.push(byte);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Reading engine stderr failed: {}", e);
                break;
            }
        }
    }
    deliver_line(&line, session_id, sink);
}

fn deliver_line(raw: &[u8], session_id: i64, sink: &dyn EngineSink) {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return;
    }
    let (level, message) = parse_log_line(&text);
    if is_progress_line(&message) {
        if let Some(stats) = parse_progress(session_id, &message) {
            sink.on_statistics(stats);
        }
    }
    sink.on_log(level, &message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CollectingSink;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_line_adds_engine_defaults() {
        let engine = ProcessEngine::default();
        let full = engine.command_line(EngineKind::Ffmpeg, &args(&["-i", "in.mp4", "out.mkv"]), LogLevel::Info);
        assert_eq!(
            full,
            args(&["-hide_banner", "-nostdin", "-loglevel", "level+info", "-i", "in.mp4", "out.mkv"])
        );
    }

    #[test]
    fn user_level_is_kept() {
        let engine = ProcessEngine::new("/opt/ff/ffmpeg", "/opt/ff/ffprobe")
            .with_default_args(args(&["-threads", "2"]));
        let full = engine.command_line(EngineKind::Ffprobe, &args(&["-v", "error", "in.mp4"]), LogLevel::Debug);
        assert_eq!(full, args(&["-hide_banner", "-threads", "2", "-v", "error", "in.mp4"]));
        assert_eq!(engine.program(EngineKind::Ffprobe), Path::new("/opt/ff/ffprobe"));
    }

    #[test]
    fn stderr_splits_on_carriage_returns() {
        let sink = CollectingSink::default();
        let data: &[u8] = b"[info] Stream mapping:\n[info] frame=   10 fps=0.0 q=28.0 size=       0kB time=00:00:00.40 bitrate=   0.0kbits/s speed=0.8x\r[error] failed\n";
        read_stderr(data, 3, &sink);
        let logs = sink.logs();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0], (LogLevel::Info, "Stream mapping:".to_string()));
        assert!(logs[1].1.starts_with("frame="));
        assert_eq!(logs[2], (LogLevel::Error, "failed".to_string()));
    }

    #[test]
    fn stdout_keeps_multibyte_text_intact() {
        let sink = CollectingSink::default();
        read_stdout("{\"title\": \"Ünïcode\"}".as_bytes(), &sink);
        assert_eq!(sink.output(), "{\"title\": \"Ünïcode\"}");
    }

    #[test]
    fn missing_binary_fails_to_spawn() {
        let engine = ProcessEngine::new("/definitely/not/ffmpeg", "/definitely/not/ffprobe");
        let sink = CollectingSink::default();
        let ctx = ExecutionContext::new(1, &sink);
        let err = engine.run(EngineKind::Ffmpeg, &[], &ctx).unwrap_err();
        assert_eq!(err.code(), crate::error_code::ENOENT);
    }
}
