//! Session value types.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Created,
    Running,
    Failed,
    Completed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Completed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(session_state_to_string(*self))
    }
}

pub fn session_state_to_string(state: SessionState) -> &'static str {
    match state {
        SessionState::Created => "CREATED",
        SessionState::Running => "RUNNING",
        SessionState::Failed => "FAILED",
        SessionState::Completed => "COMPLETED",
    }
}

/// Exit status of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    pub const SUCCESS: ReturnCode = ReturnCode(0);
    /// Status reported after a cancel request stopped the engine.
    pub const CANCEL: ReturnCode = ReturnCode(255);

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_cancel(self) -> bool {
        self == Self::CANCEL
    }

    pub fn is_error(self) -> bool {
        !self.is_success() && !self.is_cancel()
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One log entry delivered to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    pub session_id: i64,
    pub level: LogLevel,
    pub message: String,
}

/// One progress report of a running transcode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub session_id: i64,
    pub video_frame_number: i32,
    pub video_fps: f32,
    pub video_quality: f32,
    /// Output size in bytes.
    pub size: i64,
    /// Output time in milliseconds.
    pub time: f64,
    /// Output bitrate in kbit/s.
    pub bitrate: f64,
    pub speed: f64,
}

/// Which entry point created a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Ffmpeg,
    Ffprobe,
    MediaInformation,
}
