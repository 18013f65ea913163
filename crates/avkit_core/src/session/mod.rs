//! Session objects.
//!
//! A session records one engine run: its arguments, lifecycle, logs,
//! output and, for transcodes, progress statistics. Sessions are shared
//! through `Arc` between the caller, the executing thread and the session
//! history.

mod common;
mod errors;
mod sessions;
mod types;

pub use common::{LogCallback, SessionCore};
pub use errors::{SessionError, SessionResult};
pub use sessions::{
    FfmpegSession, FfmpegSessionCompleteCallback, FfprobeSession, FfprobeSessionCompleteCallback,
    MediaInformationSession, MediaInformationSessionCompleteCallback, SessionHandle,
    StatisticsCallback,
};
pub use types::{session_state_to_string, Log, ReturnCode, SessionKind, SessionState, Statistics};
