//! Routing of engine and parser output into sessions and callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::config::KitConfig;
use crate::engine::EngineSink;
use crate::logging::{self, LogLevel, LogSink};
use crate::session::{FfmpegSession, Log, SessionCore, Statistics};

/// Run a user callback, logging instead of unwinding when it panics.
pub(crate) fn guarded(what: &str, session_id: i64, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::error!("{} callback panicked for session {}", what, session_id);
    }
}

/// Whether an entry at `level` passes the active level.
pub(crate) fn accepts(active: LogLevel, level: LogLevel) -> bool {
    if active == LogLevel::Quiet && level != LogLevel::Stderr {
        return false;
    }
    level <= active
}

/// Sink bound to one session for the length of a run.
pub(crate) struct SessionSink<'a> {
    config: &'a KitConfig,
    core: &'a SessionCore,
    ffmpeg: Option<&'a FfmpegSession>,
}

impl<'a> SessionSink<'a> {
    pub(crate) fn new(config: &'a KitConfig, core: &'a SessionCore) -> Self {
        Self {
            config,
            core,
            ffmpeg: None,
        }
    }

    pub(crate) fn for_ffmpeg(config: &'a KitConfig, session: &'a FfmpegSession) -> Self {
        Self {
            config,
            core: session.core(),
            ffmpeg: Some(session),
        }
    }

    /// Store, forward and maybe print one log entry.
    pub(crate) fn deliver_log(&self, level: LogLevel, message: &str) {
        if !accepts(self.config.log_level(), level) {
            return;
        }

        let log = Log {
            session_id: self.core.id(),
            level,
            message: message.to_string(),
        };
        self.core.append_log(log.clone());

        let session_callback = self.core.log_callback();
        if let Some(callback) = session_callback {
            guarded("Log", log.session_id, || callback(&log));
        }
        let global_callback = self.config.log_callback();
        if let Some(callback) = &global_callback {
            guarded("Global log", log.session_id, || callback(&log));
        }

        let strategy = self
            .core
            .log_redirection_strategy()
            .unwrap_or_else(|| self.config.log_redirection_strategy());
        if strategy.should_print(session_callback.is_some(), global_callback.is_some()) {
            logging::emit(level, message);
        }
    }

    pub(crate) fn deliver_statistics(&self, statistics: Statistics) {
        let Some(session) = self.ffmpeg else {
            return;
        };
        session.add_statistics(statistics.clone());
        if let Some(callback) = session.statistics_callback() {
            guarded("Statistics", statistics.session_id, || callback(&statistics));
        }
        if let Some(callback) = self.config.statistics_callback() {
            guarded("Global statistics", statistics.session_id, || callback(&statistics));
        }
    }
}

impl LogSink for SessionSink<'_> {
    fn log(&self, level: LogLevel, message: &str) {
        self.deliver_log(level, message);
    }
}

impl EngineSink for SessionSink<'_> {
    fn on_log(&self, level: LogLevel, message: &str) {
        self.deliver_log(level, message);
    }

    fn on_output(&self, text: &str) {
        self.core.append_output(text);
    }

    fn on_statistics(&self, statistics: Statistics) {
        self.deliver_statistics(statistics);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::logging::{LogConfig, LogRedirectionStrategy, SessionLogger};
    use crate::session::{LogCallback, SessionKind};

    fn core(callback: Option<LogCallback>) -> SessionCore {
        SessionCore::new(
            7,
            SessionKind::Ffmpeg,
            vec![],
            callback,
            Some(LogRedirectionStrategy::NeverPrintLogs),
            SessionLogger::in_memory(7, LogConfig::default()),
        )
    }

    #[test]
    fn level_filter() {
        assert!(accepts(LogLevel::Info, LogLevel::Error));
        assert!(accepts(LogLevel::Info, LogLevel::Info));
        assert!(!accepts(LogLevel::Info, LogLevel::Debug));
        assert!(accepts(LogLevel::Quiet, LogLevel::Stderr));
        assert!(!accepts(LogLevel::Quiet, LogLevel::Panic));
    }

    #[test]
    fn session_callback_runs_before_global() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let config = KitConfig::new();
        let seen = order.clone();
        config.set_log_callback(Some(Arc::new(move |log: &Log| {
            seen.lock().push(format!("global:{}", log.message))
        })));
        let seen = order.clone();
        let core = core(Some(Arc::new(move |log: &Log| {
            seen.lock().push(format!("session:{}", log.message))
        })));

        let sink = SessionSink::new(&config, &core);
        sink.deliver_log(LogLevel::Info, "hello");
        sink.deliver_log(LogLevel::Debug, "dropped");

        assert_eq!(*order.lock(), vec!["session:hello", "global:hello"]);
        assert_eq!(core.all_logs_as_string(), "hello");
    }

    #[test]
    fn panicking_callback_does_not_stop_delivery() {
        let config = KitConfig::new();
        let core = core(Some(Arc::new(|_: &Log| panic!("boom"))));
        let sink = SessionSink::new(&config, &core);
        sink.deliver_log(LogLevel::Error, "still stored");
        assert_eq!(core.logs().len(), 1);
    }

    #[test]
    fn output_is_collected() {
        let config = KitConfig::new();
        let core = core(None);
        let sink = SessionSink::new(&config, &core);
        sink.on_output("{\"a\":");
        sink.on_output("1}");
        assert_eq!(core.output(), "{\"a\":1}");
    }
}
