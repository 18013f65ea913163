//! Core enums used throughout the library.

use serde::{Deserialize, Serialize};

/// Type of a media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl MediaType {
    /// Map an ffprobe `codec_type` value.
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            "subtitle" => MediaType::Subtitle,
            "data" => MediaType::Data,
            "attachment" => MediaType::Attachment,
            _ => MediaType::Unknown,
        }
    }

    /// Media type for a stream specifier character (`v`, `a`, `s`, `d`, `t`).
    pub fn from_specifier(c: char) -> Option<Self> {
        match c {
            'v' | 'V' => Some(MediaType::Video),
            'a' => Some(MediaType::Audio),
            's' => Some(MediaType::Subtitle),
            'd' => Some(MediaType::Data),
            't' => Some(MediaType::Attachment),
            _ => None,
        }
    }

    /// Stream specifier character for this type.
    pub fn specifier_char(self) -> Option<char> {
        match self {
            MediaType::Video => Some('v'),
            MediaType::Audio => Some('a'),
            MediaType::Subtitle => Some('s'),
            MediaType::Data => Some('d'),
            MediaType::Attachment => Some('t'),
            MediaType::Unknown => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
            MediaType::Subtitle => write!(f, "subtitle"),
            MediaType::Data => write!(f, "data"),
            MediaType::Attachment => write!(f, "attachment"),
            MediaType::Unknown => write!(f, "unknown"),
        }
    }
}
