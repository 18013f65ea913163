//! Media information types.
//!
//! These mirror the sections of the ffprobe JSON document. Scalar values
//! are kept as the strings ffprobe prints; the complete document stays
//! available through `all_properties`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_code;

/// Errors raised while probing media.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe ran but reported a failure.
    #[error("{message}")]
    Failed { code: i32, message: String },

    /// The probe output is not a valid media information document.
    #[error("Failed to parse media information: {0}")]
    Parse(String),

    /// The probe did not finish in time.
    #[error("Media information probe timed out after {0} ms")]
    Timeout(u64),

    /// The probe binary could not be run.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            code,
            message: message.into(),
        }
    }

    /// Engine error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            ProbeError::Failed { code, .. } => *code,
            ProbeError::Parse(_) => error_code::INVALIDDATA,
            ProbeError::Timeout(_) => error_code::EXIT,
            ProbeError::Spawn { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => error_code::ENOENT,
                _ => error_code::EIO,
            },
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(e: serde_json::Error) -> Self {
        ProbeError::Parse(e.to_string())
    }
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// `disposition` section of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposition {
    #[serde(default)]
    pub default: i32,
    #[serde(default)]
    pub forced: i32,
    #[serde(default)]
    pub attached_pic: i32,
    #[serde(default)]
    pub hearing_impaired: i32,
    #[serde(default)]
    pub visual_impaired: i32,
}

/// One stream of a probed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInformation {
    #[serde(default)]
    pub index: usize,
    /// Container stream id, usually hexadecimal (`0x1e0`).
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "codec_type", default)]
    pub stream_type: Option<String>,
    #[serde(rename = "codec_name", default)]
    pub codec: Option<String>,
    #[serde(rename = "codec_long_name", default)]
    pub codec_long: Option<String>,
    #[serde(rename = "pix_fmt", default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub sample_aspect_ratio: Option<String>,
    #[serde(default)]
    pub display_aspect_ratio: Option<String>,
    #[serde(rename = "bit_rate", default)]
    pub bitrate: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<String>,
    #[serde(default)]
    pub sample_fmt: Option<String>,
    #[serde(default)]
    pub channel_layout: Option<String>,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(rename = "r_frame_rate", default)]
    pub real_frame_rate: Option<String>,
    #[serde(rename = "avg_frame_rate", default)]
    pub average_frame_rate: Option<String>,
    #[serde(default)]
    pub time_base: Option<String>,
    #[serde(default)]
    pub codec_time_base: Option<String>,
    #[serde(default)]
    pub start_pts: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub disposition: Disposition,
    /// The stream's entry of the raw document.
    #[serde(skip)]
    pub all_properties: serde_json::Value,
}

/// One chapter of a probed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub time_base: Option<String>,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Program membership as listed by `-show_programs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramInformation {
    #[serde(default)]
    pub program_id: i64,
    #[serde(default)]
    pub streams: Vec<ProgramStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramStream {
    #[serde(default)]
    pub index: usize,
}

/// `format` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct FormatSection {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub format_name: Option<String>,
    #[serde(default)]
    pub format_long_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(rename = "bit_rate", default)]
    pub bitrate: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Whole ffprobe document, as far as it is typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ProbeDocument {
    #[serde(default)]
    pub format: Option<FormatSection>,
    #[serde(default)]
    pub streams: Vec<StreamInformation>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub programs: Vec<ProgramInformation>,
}
