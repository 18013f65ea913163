//! Probe entry points.

use std::sync::Arc;
use std::time::Duration;

use super::config::KitConfig;
use super::runner;
use crate::engine::media_information_arguments;
use crate::logging::LogRedirectionStrategy;
use crate::options::tokenize_command;
use crate::session::{
    FfprobeSession, FfprobeSessionCompleteCallback, LogCallback, MediaInformationSession,
    MediaInformationSessionCompleteCallback, SessionCore, SessionKind,
};

/// Runs probe commands as [`FfprobeSession`]s and media information
/// requests as [`MediaInformationSession`]s.
#[derive(Clone)]
pub struct FfprobeKit {
    config: Arc<KitConfig>,
}

impl Default for FfprobeKit {
    fn default() -> Self {
        Self::new(KitConfig::global())
    }
}

impl FfprobeKit {
    pub fn new(config: Arc<KitConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<KitConfig> {
        &self.config
    }

    fn core(
        &self,
        kind: SessionKind,
        arguments: Vec<String>,
        log_callback: Option<LogCallback>,
        log_redirection_strategy: Option<LogRedirectionStrategy>,
    ) -> SessionCore {
        let id = self.config.next_session_id();
        SessionCore::new(
            id,
            kind,
            arguments,
            log_callback,
            log_redirection_strategy,
            self.config.create_session_logger(id, "ffprobe"),
        )
    }

    /// Register a probe session without running it.
    pub fn create_session(
        &self,
        arguments: Vec<String>,
        complete_callback: Option<FfprobeSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
        log_redirection_strategy: Option<LogRedirectionStrategy>,
    ) -> Arc<FfprobeSession> {
        let core = self.core(
            SessionKind::Ffprobe,
            arguments,
            log_callback,
            log_redirection_strategy,
        );
        let session = Arc::new(FfprobeSession::new(core, complete_callback));
        self.config.add_session(session.clone().into());
        session
    }

    /// Register a media information session without running it.
    pub fn create_media_information_session(
        &self,
        arguments: Vec<String>,
        complete_callback: Option<MediaInformationSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
        log_redirection_strategy: Option<LogRedirectionStrategy>,
    ) -> Arc<MediaInformationSession> {
        let core = self.core(
            SessionKind::MediaInformation,
            arguments,
            log_callback,
            log_redirection_strategy,
        );
        let session = Arc::new(MediaInformationSession::new(core, complete_callback));
        self.config.add_session(session.clone().into());
        session
    }

    pub fn execute(&self, command: &str) -> Arc<FfprobeSession> {
        self.execute_with_arguments(tokenize_command(command))
    }

    pub fn execute_with_arguments(&self, arguments: Vec<String>) -> Arc<FfprobeSession> {
        let session = self.create_session(arguments, None, None, None);
        runner::run_ffprobe(&self.config, &session);
        session
    }

    pub fn execute_async(
        &self,
        command: &str,
        complete_callback: Option<FfprobeSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
    ) -> Arc<FfprobeSession> {
        self.execute_with_arguments_async(tokenize_command(command), complete_callback, log_callback)
    }

    pub fn execute_with_arguments_async(
        &self,
        arguments: Vec<String>,
        complete_callback: Option<FfprobeSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
    ) -> Arc<FfprobeSession> {
        let session = self.create_session(arguments, complete_callback, log_callback, None);
        let config = Arc::clone(&self.config);
        let job_session = Arc::clone(&session);
        if !self
            .config
            .submit(move || runner::run_ffprobe(&config, &job_session))
        {
            reject(session.core());
        }
        session
    }

    /// Probe `path` with the configured default timeout.
    pub fn get_media_information(&self, path: &str) -> Arc<MediaInformationSession> {
        self.get_media_information_with_timeout(path, self.config.media_information_timeout())
    }

    pub fn get_media_information_with_timeout(
        &self,
        path: &str,
        timeout: Option<Duration>,
    ) -> Arc<MediaInformationSession> {
        let session = self.create_media_information_session(
            media_information_arguments(path, None),
            None,
            None,
            None,
        );
        runner::run_media_information(&self.config, &session, timeout);
        session
    }

    /// Run a custom probe command whose output is a JSON media information
    /// document.
    pub fn get_media_information_from_command(&self, command: &str) -> Arc<MediaInformationSession> {
        let session =
            self.create_media_information_session(tokenize_command(command), None, None, None);
        runner::run_media_information(&self.config, &session, self.config.media_information_timeout());
        session
    }

    pub fn get_media_information_async(
        &self,
        path: &str,
        complete_callback: Option<MediaInformationSessionCompleteCallback>,
        log_callback: Option<LogCallback>,
    ) -> Arc<MediaInformationSession> {
        let session = self.create_media_information_session(
            media_information_arguments(path, None),
            complete_callback,
            log_callback,
            None,
        );
        let config = Arc::clone(&self.config);
        let job_session = Arc::clone(&session);
        let timeout = self.config.media_information_timeout();
        if !self
            .config
            .submit(move || runner::run_media_information(&config, &job_session, timeout))
        {
            reject(session.core());
        }
        session
    }

    /// Plain probe sessions in the history, oldest first.
    pub fn list_sessions(&self) -> Vec<Arc<FfprobeSession>> {
        self.config.ffprobe_sessions()
    }

    pub fn list_media_information_sessions(&self) -> Vec<Arc<MediaInformationSession>> {
        self.config.media_information_sessions()
    }
}

fn reject(core: &SessionCore) {
    tracing::error!("Executor rejected session {}", core.id());
    core.fail("Async executor is not running", crate::error_code::EIO);
    core.release_waiters();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use crate::session::SessionState;

    const DOC: &str = r#"{"format":{"filename":"clip.mkv","format_name":"matroska,webm",
        "duration":"12.500000","bit_rate":"800000"},
        "streams":[{"index":0,"codec_type":"audio","codec_name":"opus","sample_rate":"48000","channels":2}]}"#;

    fn kit() -> FfprobeKit {
        let engine = ScriptedEngine::new().with_media("clip.mkv", DOC);
        FfprobeKit::new(Arc::new(KitConfig::with_engine(Arc::new(engine))))
    }

    #[test]
    fn media_information_is_parsed() {
        let kit = kit();
        let session = kit.get_media_information("clip.mkv");
        assert_eq!(session.core().state(), SessionState::Completed);
        let info = session.media_information().unwrap();
        assert_eq!(info.format.as_deref(), Some("matroska,webm"));
        assert_eq!(info.streams.len(), 1);
        assert_eq!(kit.list_media_information_sessions().len(), 1);
        assert!(kit.list_sessions().is_empty());
    }

    #[test]
    fn missing_file_completes_with_error_status() {
        let session = kit().get_media_information("absent.mkv");
        assert_eq!(session.core().state(), SessionState::Completed);
        assert_eq!(session.core().return_code().map(|c| c.value()), Some(1));
        assert!(session.media_information().is_none());
        assert!(session.core().all_logs_as_string().contains("No such file or directory"));
    }

    #[test]
    fn plain_probe_collects_output() {
        let kit = kit();
        let session = kit.execute("-show_format -i clip.mkv");
        assert_eq!(session.core().state(), SessionState::Completed);
        assert!(session.core().output().contains("matroska"));
        assert_eq!(kit.list_sessions().len(), 1);
    }
}
