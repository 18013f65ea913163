//! State shared by every session kind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::{Condvar, Mutex};

use super::types::{Log, ReturnCode, SessionKind, SessionState};
use crate::logging::{LogRedirectionStrategy, SessionLogger};

/// Per-session log callback.
pub type LogCallback = Arc<dyn Fn(&Log) + Send + Sync>;

struct Lifecycle {
    state: SessionState,
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    return_code: Option<ReturnCode>,
    fail_stack_trace: Option<String>,
    /// Terminal state reached and completion callbacks done.
    released: bool,
}

/// Data and lifecycle common to ffmpeg, ffprobe and media information
/// sessions.
pub struct SessionCore {
    id: i64,
    kind: SessionKind,
    create_time: DateTime<Local>,
    arguments: Vec<String>,
    lifecycle: Mutex<Lifecycle>,
    finished: Condvar,
    logs: Mutex<Vec<Log>>,
    output: Mutex<String>,
    log_callback: Option<LogCallback>,
    log_redirection_strategy: Option<LogRedirectionStrategy>,
    cancel: Arc<AtomicBool>,
    logger: SessionLogger,
}

impl SessionCore {
    pub fn new(
        id: i64,
        kind: SessionKind,
        arguments: Vec<String>,
        log_callback: Option<LogCallback>,
        log_redirection_strategy: Option<LogRedirectionStrategy>,
        logger: SessionLogger,
    ) -> Self {
        Self {
            id,
            kind,
            create_time: Local::now(),
            arguments,
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Created,
                start_time: None,
                end_time: None,
                return_code: None,
                fail_stack_trace: None,
                released: false,
            }),
            finished: Condvar::new(),
            logs: Mutex::new(Vec::new()),
            output: Mutex::new(String::new()),
            log_callback,
            log_redirection_strategy,
            cancel: Arc::new(AtomicBool::new(false)),
            logger,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn create_time(&self) -> DateTime<Local> {
        self.create_time
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.lifecycle.lock().start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.lifecycle.lock().end_time
    }

    /// Run time in milliseconds; still growing while the session runs.
    pub fn duration(&self) -> i64 {
        let lifecycle = self.lifecycle.lock();
        match (lifecycle.start_time, lifecycle.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds(),
            (Some(start), None) => (Local::now() - start).num_milliseconds(),
            _ => 0,
        }
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Arguments joined with single spaces.
    pub fn command(&self) -> String {
        self.arguments.join(" ")
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    pub fn return_code(&self) -> Option<ReturnCode> {
        self.lifecycle.lock().return_code
    }

    pub fn fail_stack_trace(&self) -> Option<String> {
        self.lifecycle.lock().fail_stack_trace.clone()
    }

    pub fn logs(&self) -> Vec<Log> {
        self.logs.lock().clone()
    }

    /// Every stored log message, one per line, in arrival order.
    pub fn all_logs_as_string(&self) -> String {
        self.logs
            .lock()
            .iter()
            .map(|l| l.message.trim_end_matches(['\n', '\r']))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Standard output of the engine.
    pub fn output(&self) -> String {
        self.output.lock().clone()
    }

    pub fn log_callback(&self) -> Option<&LogCallback> {
        self.log_callback.as_ref()
    }

    /// Strategy set for this session, overriding the global one.
    pub fn log_redirection_strategy(&self) -> Option<LogRedirectionStrategy> {
        self.log_redirection_strategy
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Ask the running engine to stop. Has no effect once finished.
    pub fn cancel(&self) {
        if !self.state().is_terminal() {
            tracing::debug!("Cancel requested for session {}", self.id);
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) fn append_log(&self, log: Log) {
        self.logger.record(log.level, &log.message);
        self.logs.lock().push(log);
    }

    pub(crate) fn append_output(&self, text: &str) {
        self.output.lock().push_str(text);
    }

    pub(crate) fn start_running(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = SessionState::Running;
        lifecycle.start_time = Some(Local::now());
    }

    /// Engine finished with `code`.
    pub(crate) fn complete(&self, code: ReturnCode) {
        self.finish(SessionState::Completed, code, None);
    }

    /// Session could not run: parse failure or engine launch failure.
    pub(crate) fn fail(&self, trace: impl Into<String>, code: i32) {
        self.finish(SessionState::Failed, ReturnCode(code), Some(trace.into()));
    }

    fn finish(&self, state: SessionState, code: ReturnCode, trace: Option<String>) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.state = state;
            lifecycle.return_code = Some(code);
            lifecycle.fail_stack_trace = trace;
            lifecycle.end_time = Some(Local::now());
            if lifecycle.start_time.is_none() {
                lifecycle.start_time = lifecycle.end_time;
            }
        }
        self.logger.flush();
    }

    /// Wake [`wait`](Self::wait) callers once completion callbacks ran.
    pub(crate) fn release_waiters(&self) {
        self.lifecycle.lock().released = true;
        self.finished.notify_all();
    }

    /// Block until the session finished and its completion callbacks ran.
    ///
    /// Returns `false` when `timeout` elapsed first.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        match timeout {
            None => {
                while !lifecycle.released {
                    self.finished.wait(&mut lifecycle);
                }
                true
            }
            Some(limit) => {
                let deadline = std::time::Instant::now() + limit;
                while !lifecycle.released {
                    if self.finished.wait_until(&mut lifecycle, deadline).timed_out() {
                        return lifecycle.released;
                    }
                }
                true
            }
        }
    }
}

impl std::fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCore")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("command", &self.command())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogConfig, LogLevel};

    fn core(args: &[&str]) -> SessionCore {
        SessionCore::new(
            1,
            SessionKind::Ffmpeg,
            args.iter().map(|s| s.to_string()).collect(),
            None,
            None,
            SessionLogger::in_memory(1, LogConfig::default()),
        )
    }

    #[test]
    fn lifecycle_transitions() {
        let session = core(&["-i", "in.mp4", "out.mkv"]);
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.command(), "-i in.mp4 out.mkv");
        assert_eq!(session.duration(), 0);

        session.start_running();
        assert_eq!(session.state(), SessionState::Running);
        session.complete(ReturnCode::SUCCESS);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.return_code(), Some(ReturnCode(0)));
        assert!(session.duration() >= 0);
        assert!(!session.wait(Some(Duration::from_millis(1))));
        session.release_waiters();
        assert!(session.wait(None));
    }

    #[test]
    fn failure_keeps_trace_and_code() {
        let session = core(&[]);
        session.fail("Unrecognized option 'bogus'", crate::error_code::OPTION_NOT_FOUND);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.fail_stack_trace().as_deref(), Some("Unrecognized option 'bogus'"));
        assert!(session.return_code().is_some_and(|c| c.is_error()));
        assert!(session.start_time().is_some());
    }

    #[test]
    fn cancel_after_finish_is_ignored() {
        let session = core(&[]);
        session.complete(ReturnCode::SUCCESS);
        session.cancel();
        assert!(!session.is_cancel_requested());
    }

    #[test]
    fn logs_concatenate() {
        let session = core(&[]);
        for message in ["a\n", "b"] {
            session.append_log(Log {
                session_id: 1,
                level: LogLevel::Info,
                message: message.to_string(),
            });
        }
        assert_eq!(session.all_logs_as_string(), "a\nb");
        assert_eq!(session.logger().tail(), vec!["a", "b"]);
    }

    #[test]
    fn wait_times_out_while_running() {
        let session = core(&[]);
        session.start_running();
        assert!(!session.wait(Some(Duration::from_millis(10))));
    }
}
