//! Per-file options context.

use std::collections::HashMap;

use serde::Serialize;

use super::dict::OptionDict;
use super::errors::OptionsResult;
use super::specifier::{StreamLike, StreamSpecifier};
use super::table::OptValue;
use crate::models::MediaType;

/// Specifier-qualified per-file option lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecField {
    CodecName,
    Presets,
    MetadataMap,
    TsScale,
    Metadata,
    Program,
    MaxFrames,
    Apad,
    DumpAttachment,
    MaxMuxingQueueSize,
    Discard,
    Disposition,
    CodecTag,
    Qscale,
    Filter,
    FilterScript,
    Bsf,
    FrameRate,
    MaxFrameRate,
    FrameSize,
    Aspect,
    PixFmt,
    FpsMode,
    HwAccel,
    HwAccelDevice,
    HwAccelOutputFormat,
    SampleRate,
    AudioChannels,
    SampleFmt,
}

/// One `-opt:specifier value` occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecifierOpt {
    pub specifier: String,
    pub value: OptValue,
}

/// A `-map` entry after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMap {
    /// Removed by a later negative map.
    pub disabled: bool,
    pub file_index: usize,
    pub stream_index: usize,
    /// Filter-graph output label for `[label]` maps.
    pub linklabel: Option<String>,
}

/// A `-map_channel` entry after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioChannelMap {
    /// Input file and stream; `None` for a muted channel.
    pub source: Option<(usize, usize)>,
    /// Channel of the source stream, `-1` when muted.
    pub channel_index: i32,
    /// Output file and stream the map is restricted to.
    pub output: Option<(i32, i32)>,
}

/// Options collected for one input or output file.
///
/// Created when the file's option group is parsed and dropped once the file
/// has been opened.
#[derive(Debug, Clone)]
pub struct OptionsContext {
    /// Engine pass-through codec options for this file.
    pub codec_opts: OptionDict,
    /// Engine pass-through format options for this file.
    pub format_opts: OptionDict,

    // input/output
    pub start_time: Option<i64>,
    pub start_time_eof: Option<i64>,
    pub seek_timestamp: bool,
    pub format: Option<String>,
    pub recording_time: Option<i64>,
    pub stop_time: Option<i64>,
    pub bitexact: bool,
    pub video_disable: bool,
    pub audio_disable: bool,
    pub subtitle_disable: bool,
    pub data_disable: bool,

    // input
    pub accurate_seek: bool,
    pub thread_queue_size: i32,
    pub input_sync_ref: i32,
    pub find_stream_info: bool,
    pub input_ts_offset: i64,
    pub stream_loop: i32,
    pub rate_emu: bool,
    pub readrate: f32,

    // output
    pub stream_maps: Vec<StreamMap>,
    pub audio_channel_maps: Vec<AudioChannelMap>,
    pub chapters_input_file: Option<i32>,
    pub limit_filesize: Option<i64>,
    pub mux_preload: f32,
    pub mux_max_delay: f32,
    pub shortest: bool,
    pub shortest_buf_duration: f32,
    pub streamid: OptionDict,
    pub attachments: Vec<String>,

    spec: HashMap<SpecField, Vec<SpecifierOpt>>,
}

impl Default for OptionsContext {
    fn default() -> Self {
        Self {
            codec_opts: OptionDict::new(),
            format_opts: OptionDict::new(),
            start_time: None,
            start_time_eof: None,
            seek_timestamp: false,
            format: None,
            recording_time: None,
            stop_time: None,
            bitexact: false,
            video_disable: false,
            audio_disable: false,
            subtitle_disable: false,
            data_disable: false,
            accurate_seek: true,
            thread_queue_size: -1,
            input_sync_ref: -1,
            find_stream_info: true,
            input_ts_offset: 0,
            stream_loop: 0,
            rate_emu: false,
            readrate: 0.0,
            stream_maps: Vec::new(),
            audio_channel_maps: Vec::new(),
            chapters_input_file: None,
            limit_filesize: None,
            mux_preload: 0.0,
            mux_max_delay: 0.7,
            shortest: false,
            shortest_buf_duration: 10.0,
            streamid: OptionDict::new(),
            attachments: Vec::new(),
            spec: HashMap::new(),
        }
    }
}

impl OptionsContext {
    /// Fresh context carrying the group's pass-through options.
    pub fn new(codec_opts: OptionDict, format_opts: OptionDict) -> Self {
        Self {
            codec_opts,
            format_opts,
            ..Self::default()
        }
    }

    pub fn push_spec(&mut self, field: SpecField, specifier: impl Into<String>, value: OptValue) {
        self.spec.entry(field).or_default().push(SpecifierOpt {
            specifier: specifier.into(),
            value,
        });
    }

    /// Every occurrence of a specifier-qualified option, in command order.
    pub fn specs(&self, field: SpecField) -> &[SpecifierOpt] {
        self.spec.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Value of `field` for `streams[index]`: the last occurrence whose
    /// specifier matches wins.
    pub fn stream_value<S: StreamLike>(
        &self,
        field: SpecField,
        streams: &[S],
        index: usize,
    ) -> OptionsResult<Option<&OptValue>> {
        let mut found = None;
        for opt in self.specs(field) {
            if StreamSpecifier::parse(&opt.specifier)?.matches(streams, index) {
                found = Some(&opt.value);
            }
        }
        Ok(found)
    }

    /// String value of `field` for `streams[index]`.
    pub fn stream_str<S: StreamLike>(
        &self,
        field: SpecField,
        streams: &[S],
        index: usize,
    ) -> OptionsResult<Option<&str>> {
        Ok(self.stream_value(field, streams, index)?.map(OptValue::as_str))
    }

    /// Value of `field` whose specifier is exactly the type letter of
    /// `media_type`; the last occurrence wins.
    pub fn type_value(&self, field: SpecField, media_type: MediaType) -> Option<&OptValue> {
        let letter = media_type.specifier_char()?;
        self.specs(field)
            .iter()
            .rev()
            .find(|opt| {
                let mut chars = opt.specifier.chars();
                chars.next() == Some(letter) && chars.next().is_none()
            })
            .map(|opt| &opt.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreamInfo;

    fn streams() -> Vec<StreamInfo> {
        vec![
            StreamInfo::new(0, MediaType::Video),
            StreamInfo::new(1, MediaType::Audio),
            StreamInfo::new(2, MediaType::Audio),
        ]
    }

    #[test]
    fn defaults() {
        let o = OptionsContext::default();
        assert!(o.accurate_seek);
        assert!(o.find_stream_info);
        assert_eq!(o.thread_queue_size, -1);
        assert_eq!(o.input_sync_ref, -1);
        assert!((o.mux_max_delay - 0.7).abs() < f32::EPSILON);
        assert!((o.shortest_buf_duration - 10.0).abs() < f32::EPSILON);
        assert!(o.recording_time.is_none());
    }

    #[test]
    fn last_matching_specifier_wins() {
        let mut o = OptionsContext::default();
        o.push_spec(SpecField::CodecName, "", OptValue::Str("copy".into()));
        o.push_spec(SpecField::CodecName, "a", OptValue::Str("aac".into()));
        o.push_spec(SpecField::CodecName, "a:1", OptValue::Str("libopus".into()));
        let s = streams();
        assert_eq!(o.stream_str(SpecField::CodecName, &s, 0).unwrap(), Some("copy"));
        assert_eq!(o.stream_str(SpecField::CodecName, &s, 1).unwrap(), Some("aac"));
        assert_eq!(o.stream_str(SpecField::CodecName, &s, 2).unwrap(), Some("libopus"));
    }

    #[test]
    fn later_general_specifier_overrides_earlier_specific() {
        let mut o = OptionsContext::default();
        o.push_spec(SpecField::CodecName, "a:1", OptValue::Str("libopus".into()));
        o.push_spec(SpecField::CodecName, "a", OptValue::Str("aac".into()));
        let s = streams();
        assert_eq!(o.stream_str(SpecField::CodecName, &s, 2).unwrap(), Some("aac"));
    }

    #[test]
    fn invalid_specifier_is_an_error() {
        let mut o = OptionsContext::default();
        o.push_spec(SpecField::CodecName, "zz", OptValue::Str("aac".into()));
        assert!(o.stream_value(SpecField::CodecName, &streams(), 0).is_err());
    }

    #[test]
    fn type_value_needs_exact_letter() {
        let mut o = OptionsContext::default();
        o.push_spec(SpecField::CodecName, "v", OptValue::Str("h264".into()));
        o.push_spec(SpecField::CodecName, "v:0", OptValue::Str("hevc".into()));
        assert_eq!(
            o.type_value(SpecField::CodecName, MediaType::Video).map(OptValue::as_str),
            Some("h264")
        );
        assert!(o.type_value(SpecField::CodecName, MediaType::Audio).is_none());
    }
}
