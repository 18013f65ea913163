//! Parsed media information and its conversion into the parser's input view.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{Chapter, ProbeDocument, ProbeResult, ProgramInformation, StreamInformation};
use crate::models::{InputFile, MediaType, Rational, StreamInfo};

/// Media information for one file, as reported by the probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInformation {
    pub filename: Option<String>,
    pub format: Option<String>,
    pub long_format: Option<String>,
    pub start_time: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bitrate: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub streams: Vec<StreamInformation>,
    pub chapters: Vec<Chapter>,
    pub programs: Vec<ProgramInformation>,
    /// The complete probe document.
    pub all_properties: serde_json::Value,
}

impl MediaInformation {
    /// Parse a JSON document printed with `-print_format json`.
    pub fn from_json(text: &str) -> ProbeResult<Self> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(super::ProbeError::Parse(
                "media information document is not an object".to_string(),
            ));
        }
        let doc: ProbeDocument = serde_json::from_value(raw.clone())?;

        let raw_streams = raw.get("streams").and_then(|s| s.as_array());
        let streams = doc
            .streams
            .into_iter()
            .enumerate()
            .map(|(i, mut stream)| {
                if let Some(entry) = raw_streams.and_then(|list| list.get(i)) {
                    stream.all_properties = entry.clone();
                }
                stream
            })
            .collect();

        let format = doc.format.unwrap_or_default();
        Ok(Self {
            filename: format.filename,
            format: format.format_name,
            long_format: format.format_long_name,
            start_time: format.start_time,
            duration: format.duration,
            size: format.size,
            bitrate: format.bitrate,
            tags: format.tags,
            streams,
            chapters: doc.chapters,
            programs: doc.programs,
            all_properties: raw,
        })
    }

    /// Value of a top-level `format` property not covered by a typed field.
    pub fn format_property(&self, key: &str) -> Option<&serde_json::Value> {
        self.all_properties.get("format").and_then(|f| f.get(key))
    }

    pub fn streams_of(&self, media_type: MediaType) -> impl Iterator<Item = &StreamInformation> {
        self.streams
            .iter()
            .filter(move |s| s.media_type() == media_type)
    }

    /// Container duration in seconds.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.as_deref().and_then(parse_seconds)
    }

    /// Convert into the parser's [`InputFile`] view.
    pub fn to_input_file(&self, url: &str) -> InputFile {
        let mut file = InputFile::new(url, self.format.clone().unwrap_or_default());
        file.start_time = self.start_time.as_deref().and_then(parse_micros);
        file.duration = self.duration.as_deref().and_then(parse_micros);

        for info in &self.streams {
            let mut stream = info.to_stream_info();
            stream.program_ids = self
                .programs
                .iter()
                .filter(|p| p.streams.iter().any(|ps| ps.index == info.index))
                .map(|p| p.program_id)
                .collect();
            file = file.with_stream(stream);
        }
        file
    }
}

impl StreamInformation {
    pub fn media_type(&self) -> MediaType {
        self.stream_type
            .as_deref()
            .map_or(MediaType::Unknown, MediaType::from_codec_type)
    }

    /// Container stream id, accepting both `0x1e0` and decimal forms.
    pub fn numeric_id(&self) -> Option<i64> {
        let id = self.id.as_deref()?.trim();
        match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => id.parse().ok(),
        }
    }

    /// Average frame rate, falling back to the real base rate.
    pub fn frame_rate(&self) -> Option<Rational> {
        [&self.average_frame_rate, &self.real_frame_rate]
            .into_iter()
            .filter_map(|r| r.as_deref().and_then(Rational::parse))
            .find(|r| r.num > 0 && r.den > 0)
    }

    pub fn to_stream_info(&self) -> StreamInfo {
        let mut stream = StreamInfo::new(self.index, self.media_type());
        stream.id = self.numeric_id();
        stream.codec_name = self.codec.clone();
        if let Some(tb) = self
            .time_base
            .as_deref()
            .and_then(Rational::parse)
            .filter(|tb| tb.num > 0 && tb.den > 0)
        {
            stream.time_base = tb;
        }
        stream.frame_rate = self.frame_rate();
        stream.start_time = self.start_pts.or_else(|| {
            let secs = self.start_time.as_deref().and_then(parse_seconds)?;
            let tb = stream.time_base;
            Some((secs * tb.den as f64 / tb.num as f64).round() as i64)
        });
        stream.width = self.width.filter(|w| *w > 0);
        stream.height = self.height.filter(|h| *h > 0);
        stream.sample_rate = self.sample_rate.as_deref().and_then(|r| r.parse().ok());
        stream.channels = self.channels;
        stream.attached_pic = self.disposition.attached_pic != 0;
        stream.default_disposition = self.disposition.default != 0;
        stream.tags = self.tags.clone();
        stream
    }
}

/// Seconds as printed by the probe; `N/A` and garbage yield `None`.
fn parse_seconds(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_micros(text: &str) -> Option<i64> {
    parse_seconds(text).map(|secs| (secs * 1_000_000.0).round() as i64)
}
