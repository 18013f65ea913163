//! Transcode entry points.

use std::sync::Arc;

use super::config::KitConfig;
use super::runner;
use crate::logging::LogRedirectionStrategy;
use crate::options::tokenize_command;
use crate::session::{
    FfmpegSession, FfmpegSessionCompleteCallback, LogCallback, SessionCore, SessionError,
    SessionKind, SessionResult, StatisticsCallback,
};

/// Runs transcode commands as [`FfmpegSession`]s.
///
/// `FfmpegKit::default()` uses the process-wide [`KitConfig`].
#[derive(Clone)]
pub struct FfmpegKit {
    config: Arc<KitConfig>,
}

impl Default for FfmpegKit {
    fn default() -> Self {
        Self::new(KitConfig::global())
    }
}

impl FfmpegKit {
    pub fn new(config: Arc<KitConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<KitConfig> {
        &self.config
    }

    /// Register a session without running it.
    pub fn create_session(
        &self,
        arguments: Vec<String>,
        complete_callback: Option<FfmpegSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
        statistics_callback: Option<StatisticsCallback>,
        log_redirection_strategy: Option<LogRedirectionStrategy>,
    ) -> Arc<FfmpegSession> {
        let id = self.config.next_session_id();
        let core = SessionCore::new(
            id,
            SessionKind::Ffmpeg,
            arguments,
            log_callback,
            log_redirection_strategy,
            self.config.create_session_logger(id, "ffmpeg"),
        );
        let session = Arc::new(FfmpegSession::new(core, complete_callback, statistics_callback));
        self.config.add_session(session.clone().into());
        session
    }

    /// Run `command` on the calling thread and return the finished session.
    pub fn execute(&self, command: &str) -> Arc<FfmpegSession> {
        self.execute_with_arguments(tokenize_command(command))
    }

    pub fn execute_with_arguments(&self, arguments: Vec<String>) -> Arc<FfmpegSession> {
        let session = self.create_session(arguments, None, None, None, None);
        self.execute_session(&session);
        session
    }

    /// Run a session created with [`create_session`](Self::create_session).
    pub fn execute_session(&self, session: &Arc<FfmpegSession>) {
        runner::run_ffmpeg(&self.config, session);
    }

    /// Queue `command` on the executor and return the session immediately.
    pub fn execute_async(
        &self,
        command: &str,
        complete_callback: Option<FfmpegSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
        statistics_callback: Option<StatisticsCallback>,
    ) -> Arc<FfmpegSession> {
        self.execute_with_arguments_async(
            tokenize_command(command),
            complete_callback,
            log_callback,
            statistics_callback,
        )
    }

    pub fn execute_with_arguments_async(
        &self,
        arguments: Vec<String>,
        complete_callback: Option<FfmpegSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
        statistics_callback: Option<StatisticsCallback>,
    ) -> Arc<FfmpegSession> {
        let session = self.create_session(
            arguments,
            complete_callback,
            log_callback,
            statistics_callback,
            None,
        );
        self.execute_session_async(&session);
        session
    }

    pub fn execute_session_async(&self, session: &Arc<FfmpegSession>) {
        let config = Arc::clone(&self.config);
        let job_session = Arc::clone(session);
        let queued = self
            .config
            .submit(move || runner::run_ffmpeg(&config, &job_session));
        if !queued {
            let core = session.core();
            tracing::error!("Executor rejected session {}", core.id());
            core.fail("Async executor is not running", crate::error_code::EIO);
            core.release_waiters();
        }
    }

    /// Cancel every transcode session that has not finished.
    pub fn cancel(&self) {
        for session in self.config.ffmpeg_sessions() {
            session.core().cancel();
        }
    }

    pub fn cancel_session(&self, session_id: i64) -> SessionResult<()> {
        match self.config.session(session_id) {
            Some(handle) if handle.is_ffmpeg() => {
                handle.core().cancel();
                Ok(())
            }
            _ => Err(SessionError::NotFound(session_id)),
        }
    }

    /// Transcode sessions in the history, oldest first.
    pub fn list_sessions(&self) -> Vec<Arc<FfmpegSession>> {
        self.config.ffmpeg_sessions()
    }
}
