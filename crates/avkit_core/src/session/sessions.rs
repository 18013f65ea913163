//! The three session kinds and a handle over all of them.

use std::sync::Arc;

use parking_lot::Mutex;

use super::common::SessionCore;
use super::types::{SessionKind, Statistics};
use crate::probe::MediaInformation;

pub type StatisticsCallback = Arc<dyn Fn(&Statistics) + Send + Sync>;
pub type FfmpegSessionCompleteCallback = Arc<dyn Fn(&Arc<FfmpegSession>) + Send + Sync>;
pub type FfprobeSessionCompleteCallback = Arc<dyn Fn(&Arc<FfprobeSession>) + Send + Sync>;
pub type MediaInformationSessionCompleteCallback =
    Arc<dyn Fn(&Arc<MediaInformationSession>) + Send + Sync>;

/// A transcode run.
pub struct FfmpegSession {
    core: SessionCore,
    statistics: Mutex<Vec<Statistics>>,
    statistics_callback: Option<StatisticsCallback>,
    complete_callback: Option<FfmpegSessionCompleteCallback>,
}

impl FfmpegSession {
    pub fn new(
        core: SessionCore,
        complete_callback: Option<FfmpegSessionCompleteCallback>,
        statistics_callback: Option<StatisticsCallback>,
    ) -> Self {
        Self {
            core,
            statistics: Mutex::new(Vec::new()),
            statistics_callback,
            complete_callback,
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn statistics(&self) -> Vec<Statistics> {
        self.statistics.lock().clone()
    }

    pub fn last_received_statistics(&self) -> Option<Statistics> {
        self.statistics.lock().last().cloned()
    }

    pub fn statistics_callback(&self) -> Option<&StatisticsCallback> {
        self.statistics_callback.as_ref()
    }

    pub fn complete_callback(&self) -> Option<&FfmpegSessionCompleteCallback> {
        self.complete_callback.as_ref()
    }

    pub(crate) fn add_statistics(&self, statistics: Statistics) {
        self.statistics.lock().push(statistics);
    }
}

/// A probe run printing whatever its arguments ask for.
pub struct FfprobeSession {
    core: SessionCore,
    complete_callback: Option<FfprobeSessionCompleteCallback>,
}

impl FfprobeSession {
    pub fn new(core: SessionCore, complete_callback: Option<FfprobeSessionCompleteCallback>) -> Self {
        Self {
            core,
            complete_callback,
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn complete_callback(&self) -> Option<&FfprobeSessionCompleteCallback> {
        self.complete_callback.as_ref()
    }
}

/// A probe run whose JSON output is parsed into [`MediaInformation`].
pub struct MediaInformationSession {
    core: SessionCore,
    complete_callback: Option<MediaInformationSessionCompleteCallback>,
    media_information: Mutex<Option<MediaInformation>>,
}

impl MediaInformationSession {
    pub fn new(
        core: SessionCore,
        complete_callback: Option<MediaInformationSessionCompleteCallback>,
    ) -> Self {
        Self {
            core,
            complete_callback,
            media_information: Mutex::new(None),
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn complete_callback(&self) -> Option<&MediaInformationSessionCompleteCallback> {
        self.complete_callback.as_ref()
    }

    pub fn media_information(&self) -> Option<MediaInformation> {
        self.media_information.lock().clone()
    }

    pub(crate) fn set_media_information(&self, info: MediaInformation) {
        *self.media_information.lock() = Some(info);
    }
}

/// Any session kept in the session history.
#[derive(Clone)]
pub enum SessionHandle {
    Ffmpeg(Arc<FfmpegSession>),
    Ffprobe(Arc<FfprobeSession>),
    MediaInformation(Arc<MediaInformationSession>),
}

impl SessionHandle {
    pub fn core(&self) -> &SessionCore {
        match self {
            SessionHandle::Ffmpeg(s) => s.core(),
            SessionHandle::Ffprobe(s) => s.core(),
            SessionHandle::MediaInformation(s) => s.core(),
        }
    }

    pub fn id(&self) -> i64 {
        self.core().id()
    }

    pub fn kind(&self) -> SessionKind {
        self.core().kind()
    }

    pub fn is_ffmpeg(&self) -> bool {
        matches!(self, SessionHandle::Ffmpeg(_))
    }

    /// Probe sessions, including media information ones.
    pub fn is_ffprobe(&self) -> bool {
        !self.is_ffmpeg()
    }

    pub fn is_media_information(&self) -> bool {
        matches!(self, SessionHandle::MediaInformation(_))
    }

    pub fn as_ffmpeg(&self) -> Option<&Arc<FfmpegSession>> {
        match self {
            SessionHandle::Ffmpeg(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ffprobe(&self) -> Option<&Arc<FfprobeSession>> {
        match self {
            SessionHandle::Ffprobe(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_media_information(&self) -> Option<&Arc<MediaInformationSession>> {
        match self {
            SessionHandle::MediaInformation(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.core().fmt(f)
    }
}

impl From<Arc<FfmpegSession>> for SessionHandle {
    fn from(s: Arc<FfmpegSession>) -> Self {
        SessionHandle::Ffmpeg(s)
    }
}

impl From<Arc<FfprobeSession>> for SessionHandle {
    fn from(s: Arc<FfprobeSession>) -> Self {
        SessionHandle::Ffprobe(s)
    }
}

impl From<Arc<MediaInformationSession>> for SessionHandle {
    fn from(s: Arc<MediaInformationSession>) -> Self {
        SessionHandle::MediaInformation(s)
    }
}
