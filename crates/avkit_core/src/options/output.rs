//! Opening output files.
//!
//! An output is resolved into its muxer and the list of streams it will
//! carry, each with the encoder and per-stream settings the engine is going
//! to apply. Nothing is written here apart from the overwrite check.

use std::path::Path;

use serde::Serialize;

use super::codecs::find_codec;
use super::context::{AudioChannelMap, OptionsContext, SpecField, StreamMap};
use super::dict::OptionDict;
use super::errors::{OptionError, OptionsResult};
use super::globals::VideoSyncMethod;
use super::parser::apply_time_limits;
use super::preset::load_stream_preset;
use super::specifier::{StreamLike, StreamSpecifier};
use super::state::ParseState;
use super::stream_map::{auto_select_streams, AutoSelect};
use super::table::OptValue;
use super::value::{parse_frame_rate, parse_frame_size};
use crate::logging::LogLevel;
use crate::models::{MediaType, Rational};

/// Output container and its default encoders.
#[derive(Debug, Clone, Copy)]
pub struct Muxer {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub video_codec: Option<&'static str>,
    pub audio_codec: Option<&'static str>,
    pub subtitle_codec: Option<&'static str>,
    /// Writes nothing to the URL (`null`).
    pub nofile: bool,
}

const fn muxer(
    name: &'static str,
    extensions: &'static [&'static str],
    video_codec: Option<&'static str>,
    audio_codec: Option<&'static str>,
    subtitle_codec: Option<&'static str>,
) -> Muxer {
    Muxer {
        name,
        extensions,
        video_codec,
        audio_codec,
        subtitle_codec,
        nofile: false,
    }
}

/// Muxers known to the parser, in extension lookup order.
pub static MUXERS: &[Muxer] = &[
    muxer("mp4", &["mp4", "m4v"], Some("libx264"), Some("aac"), Some("mov_text")),
    muxer("mov", &["mov"], Some("libx264"), Some("aac"), Some("mov_text")),
    muxer("ipod", &["m4a", "m4b"], Some("libx264"), Some("aac"), Some("mov_text")),
    muxer("matroska", &["mkv", "mka"], Some("libx264"), Some("libvorbis"), Some("ass")),
    muxer("webm", &["webm"], Some("libvpx-vp9"), Some("libopus"), Some("webvtt")),
    muxer("avi", &["avi"], Some("mpeg4"), Some("libmp3lame"), None),
    muxer("flv", &["flv"], Some("flv"), Some("libmp3lame"), None),
    muxer("mpegts", &["ts", "m2t", "m2ts", "mts"], Some("mpeg2video"), Some("mp2"), Some("dvbsub")),
    muxer("mpeg", &["mpg", "mpeg"], Some("mpeg1video"), Some("mp2"), None),
    muxer("vcd", &[], Some("mpeg1video"), Some("mp2"), None),
    muxer("svcd", &[], Some("mpeg2video"), Some("mp2"), None),
    muxer("dvd", &["dvd"], Some("mpeg2video"), Some("mp2"), None),
    muxer("vob", &["vob"], Some("mpeg2video"), Some("mp2"), None),
    muxer("dv", &["dv"], Some("dvvideo"), Some("pcm_s16le"), None),
    muxer("hls", &["m3u8"], Some("libx264"), Some("aac"), Some("webvtt")),
    muxer("ogg", &["ogg", "ogv", "oga"], Some("libtheora"), Some("libvorbis"), None),
    muxer("opus", &["opus"], None, Some("libopus"), None),
    muxer("mp3", &["mp3"], None, Some("libmp3lame"), None),
    muxer("adts", &["aac"], None, Some("aac"), None),
    muxer("ac3", &["ac3"], None, Some("ac3"), None),
    muxer("wav", &["wav"], None, Some("pcm_s16le"), None),
    muxer("flac", &["flac"], None, Some("flac"), None),
    muxer("gif", &["gif"], Some("gif"), None, None),
    muxer("image2", &["png", "jpg", "jpeg", "bmp", "tiff", "webp"], Some("png"), None, None),
    muxer("srt", &["srt"], None, None, Some("srt")),
    muxer("ass", &["ass", "ssa"], None, None, Some("ass")),
    muxer("webvtt", &["vtt"], None, None, Some("webvtt")),
    Muxer {
        name: "null",
        extensions: &[],
        video_codec: Some("wrapped_avframe"),
        audio_codec: Some("pcm_s16le"),
        subtitle_codec: None,
        nofile: true,
    },
];

/// Accepted by `-f` when codec validation is off: no default encoders.
static GENERIC_MUXER: Muxer = muxer("", &[], None, None, None);

const BITMAP_SUBTITLES: &[&str] = &["dvd_subtitle", "dvdsub", "dvb_subtitle", "dvbsub", "hdmv_pgs_subtitle", "pgssub", "xsub"];

impl Muxer {
    fn default_codec(&self, media_type: MediaType, url: &str) -> Option<&'static str> {
        match media_type {
            MediaType::Video if self.name == "image2" => Some(match extension(url).as_deref() {
                Some("jpg") | Some("jpeg") => "mjpeg",
                Some("bmp") => "bmp",
                Some("tiff") => "tiff",
                Some("webp") => "libwebp",
                _ => "png",
            }),
            MediaType::Video => self.video_codec,
            MediaType::Audio => self.audio_codec,
            MediaType::Subtitle => self.subtitle_codec,
            _ => None,
        }
    }
}

fn extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Muxer named by `-f`, or guessed from the file extension.
pub fn find_muxer(format: Option<&str>, url: &str) -> Option<&'static Muxer> {
    match format {
        Some(name) => MUXERS.iter().find(|m| m.name == name),
        None => {
            let ext = extension(url)?;
            MUXERS.iter().find(|m| m.extensions.contains(&ext.as_str()))
        }
    }
}

/// Protocol of a URL; plain paths are `file`.
fn protocol_name(url: &str) -> &str {
    if url == "-" {
        return "pipe";
    }
    match url.split_once(':') {
        // a single letter is a drive, not a scheme
        Some((scheme, _))
            if scheme.len() > 1
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-') =>
        {
            scheme
        }
        _ => "file",
    }
}

fn local_path(url: &str) -> &str {
    url.strip_prefix("file:").unwrap_or(url)
}

/// Where an output stream takes its data from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamSource {
    Input { file_index: usize, stream_index: usize },
    Filter { graph: usize, output: usize },
    Attachment { path: String },
}

/// One stream of an output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputStream {
    pub index: usize,
    pub file_index: usize,
    pub media_type: MediaType,
    pub source: StreamSource,
    /// Encoder implementation; `None` when copying or when the default is unknown.
    pub encoder: Option<String>,
    pub stream_copy: bool,
    pub frame_rate: Option<Rational>,
    pub max_frame_rate: Option<Rational>,
    pub frame_size: Option<(u32, u32)>,
    pub pix_fmt: Option<String>,
    pub aspect: Option<Rational>,
    pub sample_rate: Option<i32>,
    pub channels: Option<i32>,
    pub sample_fmt: Option<String>,
    /// Simple filter graph (`-filter`, `-vf`, `-af`).
    pub filter: Option<String>,
    pub max_frames: Option<i64>,
    pub qscale: Option<f64>,
    pub codec_tag: Option<String>,
    pub disposition: Option<String>,
    pub bsf: Option<String>,
    pub fps_mode: VideoSyncMethod,
    pub apad: Option<String>,
    pub max_muxing_queue_size: i32,
    pub stream_id: Option<String>,
    pub encoder_opts: OptionDict,
    pub metadata: OptionDict,
}

impl OutputStream {
    fn new(file_index: usize, index: usize, media_type: MediaType, source: StreamSource) -> Self {
        Self {
            index,
            file_index,
            media_type,
            source,
            encoder: None,
            stream_copy: false,
            frame_rate: None,
            max_frame_rate: None,
            frame_size: None,
            pix_fmt: None,
            aspect: None,
            sample_rate: None,
            channels: None,
            sample_fmt: None,
            filter: None,
            max_frames: None,
            qscale: None,
            codec_tag: None,
            disposition: None,
            bsf: None,
            fps_mode: VideoSyncMethod::Auto,
            apad: None,
            max_muxing_queue_size: 128,
            stream_id: None,
            encoder_opts: OptionDict::new(),
            metadata: OptionDict::new(),
        }
    }
}

impl StreamLike for OutputStream {
    fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn stream_id(&self) -> Option<i64> {
        self.stream_id.as_deref().and_then(|id| id.parse().ok())
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.metadata.get(key)
    }
}

/// Metadata attached to a chapter or program by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedMetadata {
    pub index: i64,
    pub key: String,
    pub value: String,
}

/// A validated `-map_metadata` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataMap {
    /// Source input, -1 to drop metadata.
    pub input_file: i64,
    pub input_spec: String,
    pub output_spec: String,
}

/// A program declared with `-program`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputProgram {
    pub id: i64,
    pub title: Option<String>,
    pub stream_indices: Vec<usize>,
}

/// An opened output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFile {
    pub index: usize,
    pub url: String,
    pub format: String,
    pub streams: Vec<OutputStream>,
    pub programs: Vec<OutputProgram>,
    pub recording_time: Option<i64>,
    pub start_time: Option<i64>,
    pub limit_filesize: Option<i64>,
    pub shortest: bool,
    pub shortest_buf_duration: f32,
    pub mux_preload: f32,
    pub mux_max_delay: f32,
    pub bitexact: bool,
    pub metadata: OptionDict,
    pub chapter_metadata: Vec<IndexedMetadata>,
    pub program_metadata: Vec<IndexedMetadata>,
    pub metadata_maps: Vec<MetadataMap>,
    pub audio_channel_maps: Vec<AudioChannelMap>,
    /// Input whose chapters are copied; `None` picks the first input with chapters.
    pub chapters_input_file: Option<i32>,
    pub format_opts: OptionDict,
}

fn fatal(state: &ParseState<'_>, message: impl Into<String>) -> OptionError {
    let message = message.into();
    state.log(LogLevel::Fatal, &message);
    OptionError::invalid(message)
}

/// Refuse to clobber existing files or inputs.
///
/// There is no interactive prompt: an existing file without `-y` ends the
/// parse with [`OptionError::Exit`].
pub fn assert_file_overwrite(state: &ParseState<'_>, url: &str) -> OptionsResult<()> {
    let globals = &state.globals;
    if globals.file_overwrite && globals.no_file_overwrite {
        state.log(LogLevel::Stderr, "Error, both -y and -n supplied. Exiting.");
        return Err(OptionError::invalid("Error, both -y and -n supplied. Exiting."));
    }

    if protocol_name(url) != "file" {
        return Ok(());
    }

    if !globals.file_overwrite && Path::new(local_path(url)).exists() {
        state.log(LogLevel::Fatal, format!("File '{}' already exists. Exiting.", url));
        return Err(OptionError::Exit);
    }

    for (i, input) in state.inputs.iter().enumerate() {
        if input.no_file {
            continue;
        }
        if input.url == url {
            let err = fatal(state, format!("Output {} same as Input #{} - exiting", url, i));
            state.warning("FFmpeg cannot edit existing files in-place.");
            return Err(err);
        }
    }
    Ok(())
}

fn choose_encoder(
    state: &ParseState<'_>,
    muxer: &Muxer,
    url: &str,
    media_type: MediaType,
    codec_name: Option<&str>,
) -> OptionsResult<(Option<String>, bool)> {
    if !matches!(media_type, MediaType::Video | MediaType::Audio | MediaType::Subtitle) {
        return match codec_name {
            Some(name) if name != "copy" => {
                let message = format!("Encoding of {} streams is not supported", media_type);
                state.log(LogLevel::Fatal, &message);
                Err(OptionError::Unsupported(message))
            }
            _ => Ok((None, true)),
        };
    }

    match codec_name {
        Some("copy") => Ok((None, true)),
        Some(name) => Ok((Some(find_codec(state, name, media_type, true)?), false)),
        None => match muxer.default_codec(media_type, url) {
            Some(name) => Ok((Some(name.to_string()), false)),
            None if !state.env.validate_codecs => Ok((None, false)),
            None => {
                state.log(
                    LogLevel::Fatal,
                    format!(
                        "Automatic encoder selection failed for output stream of type {}. Default encoder for format {} is probably disabled. Please choose an encoder manually.",
                        media_type, muxer.name
                    ),
                );
                Err(OptionError::EncoderNotFound(format!("{} default", muxer.name)))
            }
        },
    }
}

fn parse_fps_mode(arg: &str) -> Option<VideoSyncMethod> {
    match arg.to_ascii_lowercase().as_str() {
        "cfr" => Some(VideoSyncMethod::Cfr),
        "vfr" => Some(VideoSyncMethod::Vfr),
        "passthrough" => Some(VideoSyncMethod::Passthrough),
        "drop" => Some(VideoSyncMethod::Drop),
        "auto" => Some(VideoSyncMethod::Auto),
        _ => None,
    }
}

/// `-filter` or `-filter_script` for one stream.
fn stream_filter(
    state: &ParseState<'_>,
    o: &OptionsContext,
    streams: &[OutputStream],
    index: usize,
    id: &str,
) -> OptionsResult<Option<String>> {
    let filter = o.stream_str(SpecField::Filter, streams, index)?;
    let script = o.stream_str(SpecField::FilterScript, streams, index)?;
    match (filter, script) {
        (Some(_), Some(_)) => Err(fatal(
            state,
            format!("Both -filter and -filter_script set for output stream {}.", id),
        )),
        (Some(filter), None) => Ok(Some(filter.to_string())),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                state.error(format!("Error opening file {}.", path));
                OptionError::io(format!("reading {}", path), e)
            })?;
            Ok(Some(text.trim_end().to_string()))
        }
        (None, None) => Ok(None),
    }
}

/// Append a stream to `of` and resolve its per-stream options.
fn new_output_stream(
    state: &ParseState<'_>,
    o: &OptionsContext,
    of: &mut OutputFile,
    muxer: &Muxer,
    media_type: MediaType,
    source: StreamSource,
) -> OptionsResult<()> {
    let index = of.streams.len();
    of.streams.push(OutputStream::new(of.index, index, media_type, source));
    let streams = &of.streams;
    let id = format!("#{}:{}", of.index, index);

    let codec_name = o.stream_str(SpecField::CodecName, streams, index)?;
    let (encoder, stream_copy) = choose_encoder(state, muxer, &of.url, media_type, codec_name)?;

    let max_frames = o.stream_value(SpecField::MaxFrames, streams, index)?.map(OptValue::as_i64);
    let qscale = o.stream_value(SpecField::Qscale, streams, index)?.map(OptValue::as_f64);
    let codec_tag = o.stream_str(SpecField::CodecTag, streams, index)?.map(str::to_string);
    let disposition = o.stream_str(SpecField::Disposition, streams, index)?.map(str::to_string);
    let bsf = o.stream_str(SpecField::Bsf, streams, index)?.map(str::to_string);
    let max_muxing_queue_size = o
        .stream_value(SpecField::MaxMuxingQueueSize, streams, index)?
        .map_or(128, OptValue::as_i32);
    let stream_id = o.streamid.get(&index.to_string()).map(str::to_string);

    let mut ost_frame_rate = None;
    let mut ost_max_frame_rate = None;
    let mut ost_frame_size = None;
    let mut ost_pix_fmt = None;
    let mut ost_aspect = None;
    let mut ost_fps_mode = state.globals.video_sync_method;
    let mut ost_sample_rate = None;
    let mut ost_channels = None;
    let mut ost_sample_fmt = None;
    let mut ost_apad = None;
    let mut ost_filter = None;

    if media_type == MediaType::Video {
        if let Some(rate) = o.stream_str(SpecField::FrameRate, streams, index)? {
            ost_frame_rate = Some(
                parse_frame_rate(rate)
                    .map_err(|_| fatal(state, format!("Invalid framerate value: {}", rate)))?,
            );
        }
        if let Some(rate) = o.stream_str(SpecField::MaxFrameRate, streams, index)? {
            ost_max_frame_rate = Some(
                parse_frame_rate(rate)
                    .map_err(|_| fatal(state, format!("Invalid maximum framerate value: {}", rate)))?,
            );
        }
        if ost_frame_rate.is_some() && ost_max_frame_rate.is_some() {
            return Err(fatal(state, "Only one of -fpsmax and -r can be set for a stream."));
        }

        if let Some(aspect) = o.stream_str(SpecField::Aspect, streams, index)? {
            ost_aspect = match Rational::parse(aspect) {
                Some(r) if r.num > 0 && r.den > 0 => Some(r.reduced()),
                _ => return Err(fatal(state, format!("Invalid aspect ratio: {}", aspect))),
            };
        }

        if let Some(mode) = o.stream_str(SpecField::FpsMode, streams, index)? {
            ost_fps_mode = parse_fps_mode(mode).ok_or_else(|| {
                fatal(
                    state,
                    format!(
                        "Invalid value {} specified for fps_mode of #{}:{}.",
                        mode, of.index, index
                    ),
                )
            })?;
        }

        if !stream_copy {
            if let Some(size) = o.stream_str(SpecField::FrameSize, streams, index)? {
                ost_frame_size = Some(
                    parse_frame_size(size)
                        .map_err(|_| fatal(state, format!("Invalid frame size: {}.", size)))?,
                );
            }
            ost_pix_fmt = o.stream_str(SpecField::PixFmt, streams, index)?.map(str::to_string);
        }
    }

    if media_type == MediaType::Audio {
        ost_sample_rate = o.stream_value(SpecField::SampleRate, streams, index)?.map(OptValue::as_i32);
        ost_channels = o.stream_value(SpecField::AudioChannels, streams, index)?.map(OptValue::as_i32);
        ost_sample_fmt = o.stream_str(SpecField::SampleFmt, streams, index)?.map(str::to_string);
        ost_apad = o.stream_str(SpecField::Apad, streams, index)?.map(str::to_string);
    }

    if media_type == MediaType::Subtitle && !stream_copy {
        if let Some(size) = o.stream_str(SpecField::FrameSize, streams, index)? {
            ost_frame_size = Some(
                parse_frame_size(size)
                    .map_err(|_| fatal(state, format!("Invalid frame size: {}.", size)))?,
            );
        }
    }

    if matches!(media_type, MediaType::Video | MediaType::Audio) {
        ost_filter = stream_filter(state, o, streams, index, &id)?;
    }

    let from_graph = matches!(streams[index].source, StreamSource::Filter { .. });
    if stream_copy {
        if let Some(filter) = &ost_filter {
            let message = format!(
                "Filtergraph '{}' was defined, but codec copy was selected.\nFiltering and streamcopy cannot be used together.",
                filter
            );
            state.error(&message);
            return Err(OptionError::invalid(message));
        }
        if from_graph {
            return Err(fatal(
                state,
                "Streamcopy requested for output stream fed from a complex filtergraph. Filtering and streamcopy cannot be used together.",
            ));
        }
    }
    if from_graph {
        if let Some(filter) = &ost_filter {
            return Err(fatal(
                state,
                format!(
                    "Filtergraph '{}' was specified through the -vf/-af/-filter option for output stream {}:{}, which is fed from a complex filtergraph.\n-vf/-af/-filter and -filter_complex cannot be used together for the same stream.",
                    filter, of.index, index
                ),
            ));
        }
    }

    let ost = &mut of.streams[index];
    ost.encoder = encoder;
    ost.stream_copy = stream_copy;
    ost.frame_rate = ost_frame_rate;
    ost.max_frame_rate = ost_max_frame_rate;
    ost.frame_size = ost_frame_size;
    ost.pix_fmt = ost_pix_fmt;
    ost.aspect = ost_aspect;
    ost.sample_rate = ost_sample_rate;
    ost.channels = ost_channels;
    ost.sample_fmt = ost_sample_fmt;
    ost.filter = ost_filter;
    ost.max_frames = max_frames;
    ost.qscale = qscale;
    ost.codec_tag = codec_tag;
    ost.disposition = disposition;
    ost.bsf = bsf;
    ost.fps_mode = ost_fps_mode;
    ost.apad = ost_apad;
    ost.max_muxing_queue_size = max_muxing_queue_size;
    ost.stream_id = stream_id;
    Ok(())
}

fn map_manual(
    state: &mut ParseState<'_>,
    o: &OptionsContext,
    of: &mut OutputFile,
    muxer: &Muxer,
    map: &StreamMap,
) -> OptionsResult<()> {
    if map.disabled {
        return Ok(());
    }

    if let Some(label) = &map.linklabel {
        let found = state
            .filtergraphs
            .iter()
            .find_map(|g| g.find_output(label).map(|k| (g.index, k)));
        let Some((graph, output)) = found else {
            return Err(fatal(
                state,
                format!(
                    "Output with label '{}' does not exist in any defined filter graph, or was already used elsewhere.",
                    label
                ),
            ));
        };
        let media_type = state.filtergraphs[graph].outputs[output].media_type;
        new_output_stream(state, o, of, muxer, media_type, StreamSource::Filter { graph, output })?;
        state.filtergraphs[graph].outputs[output].bound = Some((of.index, of.streams.len() - 1));
        return Ok(());
    }

    let stream = &state.inputs[map.file_index].streams[map.stream_index];
    if stream.discard {
        return Err(fatal(
            state,
            format!(
                "Stream #{}:{} is disabled and cannot be mapped.",
                map.file_index, map.stream_index
            ),
        ));
    }
    let media_type = stream.media_type;
    let skipped = match media_type {
        MediaType::Video => o.video_disable,
        MediaType::Audio => o.audio_disable,
        MediaType::Subtitle => o.subtitle_disable,
        MediaType::Data => o.data_disable,
        _ => false,
    };
    if skipped {
        return Ok(());
    }

    if media_type == MediaType::Unknown && !state.globals.copy_unknown_streams {
        let ignore = state.globals.ignore_unknown_streams;
        let message = format!(
            "Cannot map stream #{}:{} - unsupported type.",
            map.file_index, map.stream_index
        );
        if ignore {
            state.warning(&message);
            return Ok(());
        }
        state.log(LogLevel::Fatal, &message);
        state.log(
            LogLevel::Fatal,
            "If you want unsupported types ignored instead of failing, please use the -ignore_unknown option\nIf you want them copied, please use -copy_unknown",
        );
        return Err(OptionError::invalid(message));
    }

    new_output_stream(
        state,
        o,
        of,
        muxer,
        media_type,
        StreamSource::Input {
            file_index: map.file_index,
            stream_index: map.stream_index,
        },
    )
}

fn add_attachments(state: &ParseState<'_>, o: &OptionsContext, of: &mut OutputFile, muxer: &Muxer) -> OptionsResult<()> {
    for path in &o.attachments {
        let len = std::fs::metadata(path)
            .map_err(|_| fatal(state, format!("Could not open attachment file {}.", path)))?
            .len();
        if len == 0 {
            return Err(fatal(state, format!("Could not get size of the attachment {}.", path)));
        }
        new_output_stream(
            state,
            o,
            of,
            muxer,
            MediaType::Attachment,
            StreamSource::Attachment { path: path.clone() },
        )?;
        let filename = path.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or(path);
        if let Some(ost) = of.streams.last_mut() {
            ost.metadata.set_if_absent("filename", filename);
        }
    }
    Ok(())
}

/// Streams created automatically, and the types they exclude from
/// automatic selection.
fn create_streams(
    state: &mut ParseState<'_>,
    o: &OptionsContext,
    of: &mut OutputFile,
    muxer: &Muxer,
) -> OptionsResult<()> {
    let mut disable_video = o.video_disable;
    let mut disable_audio = o.audio_disable;
    let mut disable_subtitle = o.subtitle_disable;

    // unlabeled complex graph outputs go to the first output opened
    for g in 0..state.filtergraphs.len() {
        for k in 0..state.filtergraphs[g].outputs.len() {
            let output = &state.filtergraphs[g].outputs[k];
            if output.label.is_some() || output.bound.is_some() {
                continue;
            }
            let media_type = output.media_type;
            match media_type {
                MediaType::Video => disable_video = true,
                MediaType::Audio => disable_audio = true,
                MediaType::Subtitle => disable_subtitle = true,
                _ => {}
            }
            new_output_stream(state, o, of, muxer, media_type, StreamSource::Filter { graph: g, output: k })?;
            state.filtergraphs[g].outputs[k].bound = Some((of.index, of.streams.len() - 1));
        }
    }

    if o.stream_maps.is_empty() {
        let can = |t| muxer.name.is_empty() || muxer.default_codec(t, &of.url).is_some();
        let want = AutoSelect {
            video: !disable_video && can(MediaType::Video),
            audio: !disable_audio && can(MediaType::Audio),
            subtitle: !disable_subtitle && can(MediaType::Subtitle),
        };
        let text_subtitles = muxer
            .subtitle_codec
            .map_or(false, |c| !BITMAP_SUBTITLES.contains(&c));

        for (file_index, stream_index) in auto_select_streams(&state.inputs, want) {
            let stream = &state.inputs[file_index].streams[stream_index];
            if stream.media_type == MediaType::Subtitle && text_subtitles {
                let bitmap = stream
                    .codec_name
                    .as_deref()
                    .map_or(false, |c| BITMAP_SUBTITLES.contains(&c));
                if bitmap {
                    continue;
                }
            }
            let media_type = stream.media_type;
            new_output_stream(
                state,
                o,
                of,
                muxer,
                media_type,
                StreamSource::Input { file_index, stream_index },
            )?;
        }
    } else {
        for map in &o.stream_maps {
            map_manual(state, o, of, muxer, map)?;
        }
    }

    add_attachments(state, o, of, muxer)?;

    if of.streams.is_empty() {
        state.error("Output file does not contain any stream");
        return Err(OptionError::invalid(format!(
            "Output file #{} does not contain any stream",
            of.index
        )));
    }
    Ok(())
}

/// Per-stream codec options and `-pre` presets.
fn apply_encoder_options(state: &ParseState<'_>, o: &OptionsContext, of: &mut OutputFile) -> OptionsResult<()> {
    for i in 0..of.streams.len() {
        let mut opts = OptionDict::new();
        for (key, value) in o.codec_opts.iter() {
            let (name, spec) = key.split_once(':').unwrap_or((key, ""));
            if StreamSpecifier::parse(spec)?.matches(&of.streams, i) {
                opts.set(name, value);
            }
        }

        let preset = o.stream_str(SpecField::Presets, &of.streams, i)?;
        if let (Some(preset), false) = (preset, of.streams[i].stream_copy) {
            let pairs = load_stream_preset(state.env, preset, of.streams[i].encoder.as_deref())
                .map_err(|_| {
                    fatal(
                        state,
                        format!(
                            "Preset {} specified for stream {}:{}, but could not be opened.",
                            preset, of.index, i
                        ),
                    )
                })?;
            for (key, value) in pairs {
                opts.set_if_absent(key, value);
            }
        }

        of.streams[i].encoder_opts = opts;
    }
    Ok(())
}

enum MetaTarget<'s> {
    Global,
    Stream(&'s str),
    Chapter(i64),
    Program(i64),
}

/// Leading integer of `text`, 0 when there is none.
fn leading_int(text: &str) -> i64 {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().unwrap_or(0)
}

fn parse_meta_type<'s>(state: &ParseState<'_>, spec: &'s str) -> OptionsResult<MetaTarget<'s>> {
    let Some(kind) = spec.chars().next() else {
        return Ok(MetaTarget::Global);
    };
    let rest = &spec[kind.len_utf8()..];
    match kind {
        'g' => Ok(MetaTarget::Global),
        's' => match rest.strip_prefix(':') {
            Some(stream_spec) => Ok(MetaTarget::Stream(stream_spec)),
            None if rest.is_empty() => Ok(MetaTarget::Stream("")),
            None => Err(fatal(state, format!("Invalid metadata specifier {}.", rest))),
        },
        'c' => Ok(MetaTarget::Chapter(rest.strip_prefix(':').map_or(0, leading_int))),
        'p' => Ok(MetaTarget::Program(rest.strip_prefix(':').map_or(0, leading_int))),
        other => Err(fatal(state, format!("Invalid metadata type {}.", other))),
    }
}

fn set_or_remove(dict: &mut OptionDict, key: &str, value: &str) {
    if value.is_empty() {
        dict.remove(key);
    } else {
        dict.set(key, value);
    }
}

fn add_programs(state: &ParseState<'_>, o: &OptionsContext, of: &mut OutputFile) -> OptionsResult<()> {
    for (i, program) in o.specs(SpecField::Program).iter().enumerate() {
        let text = program.value.as_str();
        let pairs: Vec<(&str, &str)> = text
            .split(':')
            .filter_map(|item| item.split_once('='))
            .collect();

        let id = pairs
            .iter()
            .find(|(k, _)| *k == "program_num")
            .map_or(i as i64 + 1, |(_, v)| leading_int(v));
        let mut out = OutputProgram {
            id,
            title: None,
            stream_indices: Vec::new(),
        };
        for (key, value) in pairs {
            match key {
                "title" => out.title = Some(value.to_string()),
                "program_num" => {}
                "st" => {
                    let st = leading_int(value);
                    if let Some(index) = usize::try_from(st).ok().filter(|&s| s < of.streams.len()) {
                        out.stream_indices.push(index);
                    }
                }
                _ => return Err(fatal(state, format!("Unknown program key {}.", key))),
            }
        }
        of.programs.push(out);
    }
    Ok(())
}

fn add_metadata(state: &ParseState<'_>, o: &OptionsContext, of: &mut OutputFile) -> OptionsResult<()> {
    for entry in o.specs(SpecField::Metadata) {
        let text = entry.value.as_str();
        let Some((key, value)) = text.split_once('=') else {
            return Err(fatal(state, format!("No '=' character in metadata string {}.", text)));
        };

        match parse_meta_type(state, &entry.specifier)? {
            MetaTarget::Global => set_or_remove(&mut of.metadata, key, value),
            MetaTarget::Stream(spec) => {
                let spec = StreamSpecifier::parse(spec)?;
                for i in 0..of.streams.len() {
                    if spec.matches(&of.streams, i) {
                        set_or_remove(&mut of.streams[i].metadata, key, value);
                    }
                }
            }
            MetaTarget::Chapter(index) => {
                if index < 0 {
                    return Err(fatal(
                        state,
                        format!("Invalid chapter index {} in metadata specifier.", index),
                    ));
                }
                of.chapter_metadata.push(IndexedMetadata {
                    index,
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
            MetaTarget::Program(index) => {
                if index < 0 || index as usize >= of.programs.len() {
                    return Err(fatal(
                        state,
                        format!("Invalid program index {} in metadata specifier.", index),
                    ));
                }
                of.program_metadata.push(IndexedMetadata {
                    index,
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn add_metadata_maps(state: &ParseState<'_>, o: &OptionsContext, of: &mut OutputFile) -> OptionsResult<()> {
    for entry in o.specs(SpecField::MetadataMap) {
        let text = entry.value.as_str();
        let input_file = leading_int(text);
        if input_file >= state.inputs.len() as i64 {
            return Err(fatal(
                state,
                format!(
                    "Invalid input file index {} while processing metadata maps",
                    input_file
                ),
            ));
        }
        let input_spec = text.split_once(':').map_or("", |(_, s)| s);

        for spec in [input_spec, entry.specifier.as_str()] {
            if let MetaTarget::Stream(stream_spec) = parse_meta_type(state, spec)? {
                StreamSpecifier::parse(stream_spec)?;
            }
        }
        if let MetaTarget::Program(index) = parse_meta_type(state, &entry.specifier)? {
            if index < 0 || index as usize >= of.programs.len() {
                return Err(fatal(
                    state,
                    format!("Invalid program index {} while processing metadata maps.", index),
                ));
            }
        }

        of.metadata_maps.push(MetadataMap {
            input_file,
            input_spec: input_spec.to_string(),
            output_spec: entry.specifier.clone(),
        });
    }
    Ok(())
}

/// Resolve the output `url` with the options collected in `o`.
pub fn open_output(state: &mut ParseState<'_>, o: &mut OptionsContext, url: &str) -> OptionsResult<()> {
    apply_time_limits(state, o)?;

    let url = if url == "-" { "pipe:" } else { url };
    let index = state.outputs.len();

    let muxer = match find_muxer(o.format.as_deref(), url) {
        Some(muxer) => muxer,
        None if !state.env.validate_codecs && o.format.is_some() => &GENERIC_MUXER,
        None => {
            let message = match &o.format {
                Some(name) => format!("Requested output format '{}' is not a suitable output format", name),
                None => format!(
                    "Unable to choose an output format for '{}'; use a standard extension for the filename or specify the format manually.",
                    url
                ),
            };
            return Err(fatal(state, message));
        }
    };
    let format = o.format.clone().unwrap_or_else(|| muxer.name.to_string());

    let mut of = OutputFile {
        index,
        url: url.to_string(),
        format,
        streams: Vec::new(),
        programs: Vec::new(),
        recording_time: o.recording_time,
        start_time: o.start_time,
        limit_filesize: o.limit_filesize,
        shortest: o.shortest,
        shortest_buf_duration: o.shortest_buf_duration,
        mux_preload: o.mux_preload,
        mux_max_delay: o.mux_max_delay,
        bitexact: o.bitexact,
        metadata: OptionDict::new(),
        chapter_metadata: Vec::new(),
        program_metadata: Vec::new(),
        metadata_maps: Vec::new(),
        audio_channel_maps: o.audio_channel_maps.clone(),
        chapters_input_file: None,
        format_opts: o.format_opts.clone(),
    };

    create_streams(state, o, &mut of, muxer)?;
    apply_encoder_options(state, o, &mut of)?;

    if !muxer.nofile {
        assert_file_overwrite(state, url)?;
    }

    if let Some(chapters) = o.chapters_input_file {
        if chapters >= 0 && chapters as usize >= state.inputs.len() {
            return Err(fatal(
                state,
                format!("Invalid input file index {} in chapter mapping.", chapters),
            ));
        }
        of.chapters_input_file = Some(chapters);
    }

    add_metadata_maps(state, o, &mut of)?;
    add_programs(state, o, &mut of)?;
    add_metadata(state, o, &mut of)?;

    state.info(format!("Output #{}, {}, to '{}':", index, of.format, url));
    for ost in &of.streams {
        let action = match (&ost.encoder, ost.stream_copy) {
            (_, true) => "copy".to_string(),
            (Some(encoder), false) => encoder.clone(),
            (None, false) => "default".to_string(),
        };
        state.verbose(format!(
            "  Stream #{}:{} ({}): {}",
            index, ost.index, ost.media_type, action
        ));
    }
    state.outputs.push(of);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::models::{InputFile, StreamInfo};
    use crate::options::filtergraph::opt_filter_complex;
    use crate::options::state::ParseEnv;

    fn movie() -> InputFile {
        InputFile::new("/media/movie.mkv", "matroska,webm")
            .with_stream(StreamInfo::new(0, MediaType::Video).with_codec("h264").with_size(1920, 1080))
            .with_stream(StreamInfo::new(1, MediaType::Audio).with_codec("aac").with_audio(48000, 2))
            .with_stream(StreamInfo::new(2, MediaType::Audio).with_codec("ac3").with_audio(48000, 6))
            .with_stream(StreamInfo::new(3, MediaType::Subtitle).with_codec("hdmv_pgs_subtitle"))
    }

    struct Fixture {
        env: ParseEnv,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                env: ParseEnv::default(),
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn state(&self) -> ParseState<'_> {
            let mut state = ParseState::new(&self.env, &TracingSink);
            state.inputs.push(movie());
            state
        }
    }

    fn spec(o: &mut OptionsContext, field: SpecField, specifier: &str, value: &str) {
        o.push_spec(field, specifier, OptValue::Str(value.to_string()));
    }

    #[test]
    fn automatic_selection_uses_format_defaults() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        open_output(&mut state, &mut o, &fx.path("out.mp4")).unwrap();

        let of = &state.outputs[0];
        assert_eq!(of.format, "mp4");
        let picked: Vec<_> = of.streams.iter().map(|s| (s.source.clone(), s.encoder.clone())).collect();
        assert_eq!(
            picked,
            vec![
                (StreamSource::Input { file_index: 0, stream_index: 0 }, Some("libx264".to_string())),
                (StreamSource::Input { file_index: 0, stream_index: 2 }, Some("aac".to_string())),
            ]
        );
    }

    #[test]
    fn bitmap_subtitles_go_to_bitmap_formats_only() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        open_output(&mut state, &mut o, &fx.path("out.ts")).unwrap();
        assert!(state.outputs[0].streams.iter().any(|s| s.media_type == MediaType::Subtitle));
    }

    #[test]
    fn manual_maps_with_copy() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        crate::options::stream_map::opt_map(&mut state, &mut o, "map", "0:a").unwrap();
        spec(&mut o, SpecField::CodecName, "", "copy");
        spec(&mut o, SpecField::CodecName, "a:1", "libopus");
        open_output(&mut state, &mut o, &fx.path("out.mkv")).unwrap();

        let streams = &state.outputs[0].streams;
        assert_eq!(streams.len(), 2);
        assert!(streams[0].stream_copy);
        assert_eq!(streams[1].encoder.as_deref(), Some("libopus"));
    }

    #[test]
    fn disabled_types_are_skipped() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        o.video_disable = true;
        open_output(&mut state, &mut o, &fx.path("out.mkv")).unwrap();
        assert!(state.outputs[0].streams.iter().all(|s| s.media_type != MediaType::Video));

        let mut o = OptionsContext::default();
        o.video_disable = true;
        o.audio_disable = true;
        let err = open_output(&mut state, &mut o, &fx.path("empty.mp4")).unwrap_err();
        assert!(err.to_string().contains("does not contain any stream"));
    }

    #[test]
    fn filter_graph_outputs() {
        let fx = Fixture::new();
        let mut state = fx.state();
        opt_filter_complex(&mut state, "filter_complex", "[0:v]split[a][b];[a]hflip[left];[b]vflip").unwrap();
        crate::options::filtergraph::init_complex_filters(&mut state).unwrap();

        let mut o = OptionsContext::default();
        crate::options::stream_map::opt_map(&mut state, &mut o, "map", "[left]").unwrap();
        open_output(&mut state, &mut o, &fx.path("a.mp4")).unwrap();

        let streams = &state.outputs[0].streams;
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].source, StreamSource::Filter { graph: 0, output: 1 });
        assert_eq!(streams[1].source, StreamSource::Filter { graph: 0, output: 0 });
        assert!(state.filtergraphs[0].outputs.iter().all(|out| out.bound.is_some()));

        let mut o = OptionsContext::default();
        crate::options::stream_map::opt_map(&mut state, &mut o, "map", "[left]").unwrap();
        let err = open_output(&mut state, &mut o, &fx.path("b.mp4")).unwrap_err();
        assert!(err.to_string().contains("was already used elsewhere"));
    }

    #[test]
    fn copy_conflicts_with_filters() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::CodecName, "v", "copy");
        spec(&mut o, SpecField::Filter, "v", "scale=640:-2");
        let err = open_output(&mut state, &mut o, &fx.path("out.mp4")).unwrap_err();
        assert!(err.to_string().contains("Filtering and streamcopy cannot be used together"));
    }

    #[test]
    fn unknown_formats() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        let err = open_output(&mut state, &mut o, &fx.path("out.xyz")).unwrap_err();
        assert!(err.to_string().starts_with("Unable to choose an output format"));

        let mut o = OptionsContext::default();
        o.format = Some("null".into());
        open_output(&mut state, &mut o, "-").unwrap();
        assert_eq!(state.outputs[0].url, "pipe:");
    }

    #[test]
    fn overwrite_rules() {
        let fx = Fixture::new();
        let existing = fx.path("exists.mp4");
        std::fs::write(&existing, b"x").unwrap();

        let state = fx.state();
        assert!(assert_file_overwrite(&state, &existing).unwrap_err().is_exit());
        assert!(assert_file_overwrite(&state, "pipe:1").is_ok());
        assert!(assert_file_overwrite(&state, "rtmp://host/live").is_ok());

        let mut state = fx.state();
        state.globals.file_overwrite = true;
        assert!(assert_file_overwrite(&state, &existing).is_ok());
        let err = assert_file_overwrite(&state, "/media/movie.mkv").unwrap_err();
        assert_eq!(err.to_string(), "Output /media/movie.mkv same as Input #0 - exiting");

        state.globals.no_file_overwrite = true;
        assert_eq!(
            assert_file_overwrite(&state, &existing).unwrap_err().code(),
            crate::error_code::EINVAL
        );
    }

    #[test]
    fn video_stream_settings() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::FrameRate, "v", "ntsc");
        spec(&mut o, SpecField::FrameSize, "", "hd720");
        spec(&mut o, SpecField::Aspect, "", "16:9");
        spec(&mut o, SpecField::FpsMode, "v", "cfr");
        o.push_spec(SpecField::MaxFrames, "v", OptValue::Int64(100));
        o.codec_opts.set("b:v", "2M");
        o.codec_opts.set("b:a", "128k");
        o.codec_opts.set("threads", "4");
        open_output(&mut state, &mut o, &fx.path("out.mp4")).unwrap();

        let v = &state.outputs[0].streams[0];
        assert_eq!(v.frame_rate, Some(Rational::new(30000, 1001)));
        assert_eq!(v.frame_size, Some((1280, 720)));
        assert_eq!(v.aspect, Some(Rational::new(16, 9)));
        assert_eq!(v.fps_mode, VideoSyncMethod::Cfr);
        assert_eq!(v.max_frames, Some(100));
        assert_eq!(v.encoder_opts.get("b"), Some("2M"));
        assert_eq!(v.encoder_opts.get("threads"), Some("4"));

        let a = &state.outputs[0].streams[1];
        assert_eq!(a.encoder_opts.get("b"), Some("128k"));
        assert_eq!(a.frame_rate, None);
    }

    #[test]
    fn invalid_stream_settings() {
        let fx = Fixture::new();

        let mut state = fx.state();
        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::FrameRate, "v", "25");
        spec(&mut o, SpecField::MaxFrameRate, "v", "30");
        let err = open_output(&mut state, &mut o, &fx.path("a.mp4")).unwrap_err();
        assert_eq!(err.to_string(), "Only one of -fpsmax and -r can be set for a stream.");

        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::FpsMode, "", "sometimes");
        let err = open_output(&mut state, &mut o, &fx.path("b.mp4")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value sometimes specified for fps_mode of #0:0.");

        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::CodecName, "d", "mpeg4");
        o.stream_maps.push(StreamMap { disabled: false, file_index: 0, stream_index: 0, linklabel: None });
        state.inputs[0].streams[0].media_type = MediaType::Data;
        let err = open_output(&mut state, &mut o, &fx.path("c.ts")).unwrap_err();
        assert_eq!(err.code(), crate::error_code::ENOSYS);
    }

    #[test]
    fn metadata_programs_and_streamids() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::Metadata, "", "title=Movie");
        spec(&mut o, SpecField::Metadata, "s:a", "language=eng");
        spec(&mut o, SpecField::Program, "", "title=Main:st=0:st=1");
        spec(&mut o, SpecField::Metadata, "p:0", "service_name=Avkit");
        spec(&mut o, SpecField::MetadataMap, "", "-1");
        o.streamid.set("1", "0x101");
        open_output(&mut state, &mut o, &fx.path("out.ts")).unwrap();

        let of = &state.outputs[0];
        assert_eq!(of.metadata.get("title"), Some("Movie"));
        assert_eq!(of.streams[1].metadata.get("language"), Some("eng"));
        assert_eq!(of.streams[1].stream_id.as_deref(), Some("0x101"));
        assert_eq!(of.programs[0].stream_indices, vec![0, 1]);
        assert_eq!(of.program_metadata[0].value, "Avkit");
        assert_eq!(of.metadata_maps[0].input_file, -1);

        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::Metadata, "", "novalue");
        let err = open_output(&mut state, &mut o, &fx.path("x.mp4")).unwrap_err();
        assert_eq!(err.to_string(), "No '=' character in metadata string novalue.");

        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::Metadata, "x", "a=b");
        assert!(open_output(&mut state, &mut o, &fx.path("y.mp4")).is_err());
    }

    #[test]
    fn attachments() {
        let fx = Fixture::new();
        let font = fx.path("font.ttf");
        std::fs::write(&font, b"font").unwrap();

        let mut state = fx.state();
        let mut o = OptionsContext::default();
        o.attachments.push(font.clone());
        open_output(&mut state, &mut o, &fx.path("out.mkv")).unwrap();
        let last = state.outputs[0].streams.last().unwrap();
        assert_eq!(last.media_type, MediaType::Attachment);
        assert!(last.stream_copy);
        assert_eq!(last.metadata.get("filename"), Some("font.ttf"));

        let mut o = OptionsContext::default();
        o.attachments.push(fx.path("missing.ttf"));
        let err = open_output(&mut state, &mut o, &fx.path("b.mkv")).unwrap_err();
        assert!(err.to_string().starts_with("Could not open attachment file"));
    }

    #[test]
    fn stream_presets_fill_encoder_options() {
        let fx = Fixture::new();
        std::fs::write(fx.dir.path().join("libx264-web.avpreset"), "crf=23\nb=1M\n").unwrap();
        let env = ParseEnv::default().with_preset_dirs(vec![fx.dir.path().to_path_buf()]);
        let mut state = ParseState::new(&env, &TracingSink);
        state.inputs.push(movie());

        let mut o = OptionsContext::default();
        o.codec_opts.set("b:v", "3M");
        spec(&mut o, SpecField::Presets, "v", "web");
        open_output(&mut state, &mut o, &fx.path("out.mp4")).unwrap();
        let v = &state.outputs[0].streams[0];
        assert_eq!(v.encoder_opts.get("crf"), Some("23"));
        assert_eq!(v.encoder_opts.get("b"), Some("3M"));

        let mut o = OptionsContext::default();
        spec(&mut o, SpecField::Presets, "v", "nothere");
        let err = open_output(&mut state, &mut o, &fx.path("b.mp4")).unwrap_err();
        assert!(err.to_string().contains("could not be opened"));
    }

    #[test]
    fn chapter_mapping_is_checked() {
        let fx = Fixture::new();
        let mut state = fx.state();
        let mut o = OptionsContext::default();
        o.chapters_input_file = Some(3);
        let err = open_output(&mut state, &mut o, &fx.path("out.mp4")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input file index 3 in chapter mapping.");
    }
}
