//! Process-wide configuration and callback registry.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use super::executor::Executor;
use super::fonts::{write_fonts_conf, FONTCONFIG_PATH};
use crate::config::Settings;
use crate::engine::{Engine, ProcessEngine};
use crate::logging::{LogConfig, LogLevel, LogRedirectionStrategy, SessionLogger};
use crate::options::ParseEnv;
use crate::session::{
    FfmpegSession, FfmpegSessionCompleteCallback, FfprobeSession, FfprobeSessionCompleteCallback,
    LogCallback, MediaInformationSession, MediaInformationSessionCompleteCallback, SessionError,
    SessionHandle, SessionResult, SessionState, StatisticsCallback,
};

const DEFAULT_SESSION_HISTORY_SIZE: usize = 10;
const DEFAULT_ASYNC_CONCURRENCY_LIMIT: usize = 10;

static GLOBAL: Lazy<Arc<KitConfig>> = Lazy::new(|| Arc::new(KitConfig::new()));

struct History {
    size: usize,
    sessions: VecDeque<SessionHandle>,
}

impl History {
    /// Drop the oldest sessions that are not running until within `size`.
    fn evict(&mut self) {
        while self.sessions.len() > self.size {
            let position = self
                .sessions
                .iter()
                .position(|s| s.core().state() != SessionState::Running);
            match position {
                Some(index) => {
                    if let Some(evicted) = self.sessions.remove(index) {
                        tracing::trace!("Evicted session {} from history", evicted.id());
                    }
                }
                None => break,
            }
        }
    }
}

/// Registry shared by every session: log settings, callbacks, session
/// history, engine environment and the async executor.
///
/// [`KitConfig::global`] is the instance used by the kit entry points;
/// separate instances keep tests isolated.
pub struct KitConfig {
    next_session_id: AtomicI64,
    log_level: RwLock<LogLevel>,
    log_redirection_strategy: RwLock<LogRedirectionStrategy>,
    log_callback: RwLock<Option<LogCallback>>,
    statistics_callback: RwLock<Option<StatisticsCallback>>,
    ffmpeg_complete_callback: RwLock<Option<FfmpegSessionCompleteCallback>>,
    ffprobe_complete_callback: RwLock<Option<FfprobeSessionCompleteCallback>>,
    media_information_complete_callback: RwLock<Option<MediaInformationSessionCompleteCallback>>,
    history: Mutex<History>,
    environment: RwLock<BTreeMap<String, String>>,
    font_config_dir: RwLock<PathBuf>,
    async_concurrency_limit: AtomicUsize,
    executor: Mutex<Option<Executor>>,
    engine: RwLock<Arc<dyn Engine>>,
    parse_env: RwLock<ParseEnv>,
    validate_commands: AtomicBool,
    log_folder: RwLock<Option<PathBuf>>,
    session_log_config: RwLock<LogConfig>,
    media_information_timeout: RwLock<Option<Duration>>,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl KitConfig {
    /// Fresh registry with default settings and the process engine.
    pub fn new() -> Self {
        Self {
            next_session_id: AtomicI64::new(1),
            log_level: RwLock::new(LogLevel::Info),
            log_redirection_strategy: RwLock::new(LogRedirectionStrategy::default()),
            log_callback: RwLock::new(None),
            statistics_callback: RwLock::new(None),
            ffmpeg_complete_callback: RwLock::new(None),
            ffprobe_complete_callback: RwLock::new(None),
            media_information_complete_callback: RwLock::new(None),
            history: Mutex::new(History {
                size: DEFAULT_SESSION_HISTORY_SIZE,
                sessions: VecDeque::new(),
            }),
            environment: RwLock::new(BTreeMap::new()),
            font_config_dir: RwLock::new(std::env::temp_dir().join("avkit").join("fontconfig")),
            async_concurrency_limit: AtomicUsize::new(DEFAULT_ASYNC_CONCURRENCY_LIMIT),
            executor: Mutex::new(None),
            engine: RwLock::new(Arc::new(ProcessEngine::default())),
            parse_env: RwLock::new(ParseEnv::from_environment()),
            validate_commands: AtomicBool::new(true),
            log_folder: RwLock::new(None),
            session_log_config: RwLock::new(LogConfig::default()),
            media_information_timeout: RwLock::new(None),
        }
    }

    /// Registry with a specific engine.
    pub fn with_engine(engine: Arc<dyn Engine>) -> Self {
        let config = Self::new();
        config.set_engine(engine);
        config
    }

    /// The process-wide registry.
    pub fn global() -> Arc<KitConfig> {
        Arc::clone(&GLOBAL)
    }

    /// Push loaded settings into this registry.
    pub fn apply(&self, settings: &Settings) -> SessionResult<()> {
        let engine = ProcessEngine::new(&settings.engine.ffmpeg_path, &settings.engine.ffprobe_path)
            .with_default_args(settings.engine.default_args.clone())
            .with_probe_timeout(settings.engine.media_information_timeout());
        self.set_engine(Arc::new(engine));
        self.set_validate_commands(settings.engine.validate_commands);
        self.set_media_information_timeout(settings.engine.media_information_timeout());

        self.set_log_level(settings.logging.level);
        self.set_log_redirection_strategy(settings.logging.redirection);
        self.set_log_folder(settings.logging.log_folder());
        *self.session_log_config.write() = settings.logging.log_config();

        self.set_session_history_size(settings.sessions.history_size)?;
        self.set_async_concurrency_limit(settings.sessions.async_concurrency_limit)?;

        self.set_preset_dirs(settings.presets.dirs.iter().map(PathBuf::from).collect());

        for (name, value) in &settings.environment.variables {
            self.set_environment_variable(name, value);
        }
        if !settings.environment.font_dirs.is_empty() {
            let dirs: Vec<PathBuf> = settings.environment.font_dirs.iter().map(PathBuf::from).collect();
            self.set_font_directory_list(&dirs, &settings.environment.font_mapping)?;
        }

        tracing::debug!(
            "Applied settings: level={}, history={}, concurrency={}",
            settings.logging.level,
            settings.sessions.history_size,
            settings.sessions.async_concurrency_limit
        );
        Ok(())
    }

    pub(crate) fn next_session_id(&self) -> i64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }

    // Logging

    pub fn log_level(&self) -> LogLevel {
        *self.log_level.read()
    }

    pub fn set_log_level(&self, level: LogLevel) {
        *self.log_level.write() = level;
    }

    pub fn log_redirection_strategy(&self) -> LogRedirectionStrategy {
        *self.log_redirection_strategy.read()
    }

    pub fn set_log_redirection_strategy(&self, strategy: LogRedirectionStrategy) {
        *self.log_redirection_strategy.write() = strategy;
    }

    /// Write one log file per session into `folder`; `None` keeps logs in
    /// memory only.
    pub fn set_log_folder(&self, folder: Option<PathBuf>) {
        *self.log_folder.write() = folder;
    }

    pub(crate) fn create_session_logger(&self, session_id: i64, name: &str) -> SessionLogger {
        let config = self.session_log_config.read().clone();
        let folder = self.log_folder.read().clone();
        match folder {
            Some(folder) => SessionLogger::with_file(session_id, name, &folder, config.clone())
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        "Cannot create log file for session {} in {}: {}",
                        session_id,
                        folder.display(),
                        e
                    );
                    SessionLogger::in_memory(session_id, config)
                }),
            None => SessionLogger::in_memory(session_id, config),
        }
    }

    // Callbacks

    pub fn set_log_callback(&self, callback: Option<LogCallback>) {
        *self.log_callback.write() = callback;
    }

    pub fn log_callback(&self) -> Option<LogCallback> {
        self.log_callback.read().clone()
    }

    pub fn set_statistics_callback(&self, callback: Option<StatisticsCallback>) {
        *self.statistics_callback.write() = callback;
    }

    pub fn statistics_callback(&self) -> Option<StatisticsCallback> {
        self.statistics_callback.read().clone()
    }

    pub fn set_ffmpeg_session_complete_callback(
        &self,
        callback: Option<FfmpegSessionCompleteCallback>,
    ) {
        *self.ffmpeg_complete_callback.write() = callback;
    }

    pub fn ffmpeg_session_complete_callback(&self) -> Option<FfmpegSessionCompleteCallback> {
        self.ffmpeg_complete_callback.read().clone()
    }

    pub fn set_ffprobe_session_complete_callback(
        &self,
        callback: Option<FfprobeSessionCompleteCallback>,
    ) {
        *self.ffprobe_complete_callback.write() = callback;
    }

    pub fn ffprobe_session_complete_callback(&self) -> Option<FfprobeSessionCompleteCallback> {
        self.ffprobe_complete_callback.read().clone()
    }

    pub fn set_media_information_session_complete_callback(
        &self,
        callback: Option<MediaInformationSessionCompleteCallback>,
    ) {
        *self.media_information_complete_callback.write() = callback;
    }

    pub fn media_information_session_complete_callback(
        &self,
    ) -> Option<MediaInformationSessionCompleteCallback> {
        self.media_information_complete_callback.read().clone()
    }

    // Session history

    pub fn session_history_size(&self) -> usize {
        self.history.lock().size
    }

    /// Number of sessions kept; older non-running sessions are dropped.
    pub fn set_session_history_size(&self, size: usize) -> SessionResult<()> {
        if size == 0 {
            return Err(SessionError::invalid("Session history size must be at least 1"));
        }
        let mut history = self.history.lock();
        history.size = size;
        history.evict();
        Ok(())
    }

    pub(crate) fn add_session(&self, session: SessionHandle) {
        let mut history = self.history.lock();
        history.sessions.push_back(session);
        history.evict();
    }

    pub fn session(&self, session_id: i64) -> Option<SessionHandle> {
        self.history
            .lock()
            .sessions
            .iter()
            .find(|s| s.id() == session_id)
            .cloned()
    }

    pub fn last_session(&self) -> Option<SessionHandle> {
        self.history.lock().sessions.back().cloned()
    }

    pub fn last_completed_session(&self) -> Option<SessionHandle> {
        self.history
            .lock()
            .sessions
            .iter()
            .rev()
            .find(|s| s.core().state() == SessionState::Completed)
            .cloned()
    }

    /// Every session in the history, oldest first.
    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.history.lock().sessions.iter().cloned().collect()
    }

    pub fn ffmpeg_sessions(&self) -> Vec<Arc<FfmpegSession>> {
        self.history
            .lock()
            .sessions
            .iter()
            .filter_map(|s| s.as_ffmpeg().cloned())
            .collect()
    }

    pub fn ffprobe_sessions(&self) -> Vec<Arc<FfprobeSession>> {
        self.history
            .lock()
            .sessions
            .iter()
            .filter_map(|s| s.as_ffprobe().cloned())
            .collect()
    }

    pub fn media_information_sessions(&self) -> Vec<Arc<MediaInformationSession>> {
        self.history
            .lock()
            .sessions
            .iter()
            .filter_map(|s| s.as_media_information().cloned())
            .collect()
    }

    pub fn sessions_by_state(&self, state: SessionState) -> Vec<SessionHandle> {
        self.history
            .lock()
            .sessions
            .iter()
            .filter(|s| s.core().state() == state)
            .cloned()
            .collect()
    }

    pub fn clear_sessions(&self) {
        self.history.lock().sessions.clear();
    }

    // Engine environment

    pub fn set_environment_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.environment.write().insert(name.into(), value.into());
    }

    /// Variables set for every engine run.
    pub fn environment(&self) -> Vec<(String, String)> {
        self.environment
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Where the generated `fonts.conf` is written.
    pub fn set_font_config_dir(&self, dir: impl Into<PathBuf>) {
        *self.font_config_dir.write() = dir.into();
    }

    pub fn set_font_directory(
        &self,
        dir: impl AsRef<Path>,
        mapping: &BTreeMap<String, String>,
    ) -> SessionResult<()> {
        self.set_font_directory_list(&[dir.as_ref().to_path_buf()], mapping)
    }

    /// Register font directories for subtitle rendering.
    pub fn set_font_directory_list(
        &self,
        dirs: &[PathBuf],
        mapping: &BTreeMap<String, String>,
    ) -> SessionResult<()> {
        let config_dir = self.font_config_dir.read().clone();
        let path = write_fonts_conf(&config_dir, dirs, mapping)?;
        self.set_environment_variable(FONTCONFIG_PATH, path.display().to_string());
        Ok(())
    }

    // Engine and parser

    pub fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.engine.read())
    }

    pub fn set_engine(&self, engine: Arc<dyn Engine>) {
        *self.engine.write() = engine;
    }

    pub fn parse_env(&self) -> ParseEnv {
        self.parse_env.read().clone()
    }

    pub fn set_preset_dirs(&self, dirs: Vec<PathBuf>) {
        self.parse_env.write().preset_dirs = dirs;
    }

    pub fn validate_commands(&self) -> bool {
        self.validate_commands.load(Ordering::SeqCst)
    }

    /// Parse ffmpeg commands before running them. Disabled, commands go
    /// straight to the engine.
    pub fn set_validate_commands(&self, validate: bool) {
        self.validate_commands.store(validate, Ordering::SeqCst);
    }

    pub fn media_information_timeout(&self) -> Option<Duration> {
        *self.media_information_timeout.read()
    }

    pub fn set_media_information_timeout(&self, timeout: Option<Duration>) {
        *self.media_information_timeout.write() = timeout;
    }

    // Async execution

    pub fn async_concurrency_limit(&self) -> usize {
        self.async_concurrency_limit.load(Ordering::SeqCst)
    }

    /// Number of async sessions that may run at once. Sessions already
    /// queued finish on the previous pool.
    pub fn set_async_concurrency_limit(&self, limit: usize) -> SessionResult<()> {
        if limit == 0 {
            return Err(SessionError::invalid("Async concurrency limit must be at least 1"));
        }
        if self.async_concurrency_limit.swap(limit, Ordering::SeqCst) != limit {
            if let Some(mut old) = self.executor.lock().take() {
                old.shutdown();
            }
        }
        Ok(())
    }

    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        let mut executor = self.executor.lock();
        let executor =
            executor.get_or_insert_with(|| Executor::new(self.async_concurrency_limit()));
        executor.submit(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use crate::session::{ReturnCode, SessionCore, SessionKind};

    fn config() -> KitConfig {
        KitConfig::with_engine(Arc::new(ScriptedEngine::new()))
    }

    fn ffmpeg_session(config: &KitConfig) -> Arc<FfmpegSession> {
        let id = config.next_session_id();
        let core = SessionCore::new(
            id,
            SessionKind::Ffmpeg,
            vec![],
            None,
            None,
            config.create_session_logger(id, "ffmpeg"),
        );
        let session = Arc::new(FfmpegSession::new(core, None, None));
        config.add_session(session.clone().into());
        session
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let config = config();
        assert_eq!(config.next_session_id(), 1);
        assert_eq!(config.next_session_id(), 2);
    }

    #[test]
    fn history_evicts_oldest_finished() {
        let config = config();
        config.set_session_history_size(2).unwrap();
        let first = ffmpeg_session(&config);
        first.core().start_running();
        let second = ffmpeg_session(&config);
        second.core().complete(ReturnCode::SUCCESS);
        let third = ffmpeg_session(&config);

        let ids: Vec<i64> = config.sessions().iter().map(|s| s.id()).collect();
        // The running session survives; the finished one is dropped.
        assert_eq!(ids, vec![first.core().id(), third.core().id()]);
        assert!(config.session(second.core().id()).is_none());
    }

    #[test]
    fn zero_history_size_is_rejected() {
        let err = config().set_session_history_size(0).unwrap_err();
        assert_eq!(err.code(), crate::error_code::EINVAL);
    }

    #[test]
    fn queries_filter_by_state_and_kind() {
        let config = config();
        let a = ffmpeg_session(&config);
        let b = ffmpeg_session(&config);
        b.core().complete(ReturnCode(1));
        assert_eq!(config.sessions_by_state(SessionState::Created).len(), 1);
        assert_eq!(config.last_completed_session().map(|s| s.id()), Some(b.core().id()));
        assert_eq!(config.last_session().map(|s| s.id()), Some(b.core().id()));
        assert_eq!(config.ffmpeg_sessions().len(), 2);
        assert!(config.ffprobe_sessions().is_empty());
        assert_eq!(config.session(a.core().id()).map(|s| s.is_ffmpeg()), Some(true));
        config.clear_sessions();
        assert!(config.sessions().is_empty());
    }

    #[test]
    fn apply_pushes_settings() {
        let config = config();
        let mut settings = Settings::default();
        settings.logging.level = LogLevel::Warning;
        settings.sessions.history_size = 3;
        settings.sessions.async_concurrency_limit = 2;
        settings.environment.variables.insert("A".into(), "1".into());
        settings.presets.dirs = vec!["/srv/presets".into()];
        config.apply(&settings).unwrap();

        assert_eq!(config.log_level(), LogLevel::Warning);
        assert_eq!(config.session_history_size(), 3);
        assert_eq!(config.async_concurrency_limit(), 2);
        assert_eq!(config.environment(), vec![("A".to_string(), "1".to_string())]);
        assert_eq!(config.parse_env().preset_dirs, vec![PathBuf::from("/srv/presets")]);
    }

    #[test]
    fn fonts_set_fontconfig_path() {
        let fonts = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let config = config();
        config.set_font_config_dir(target.path());
        config
            .set_font_directory(fonts.path(), &BTreeMap::new())
            .unwrap();
        let env = config.environment();
        assert!(env
            .iter()
            .any(|(k, v)| k == FONTCONFIG_PATH && Path::new(v) == target.path()));
    }
}
