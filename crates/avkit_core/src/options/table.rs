//! Static option descriptor table.

use std::ops::BitOr;

use once_cell::sync::Lazy;

use super::context::{OptionsContext, SpecField};
use super::errors::{OptionError, OptionsResult};
use super::globals::ParserGlobals;
use super::state::ParseState;
use super::value::{parse_number, parse_time, NumberKind};
use super::{filtergraph, handlers, help, preset, stream_map, target};

/// Option applicability and value-type flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptFlags(u32);

impl OptFlags {
    pub const NONE: OptFlags = OptFlags(0);
    pub const HAS_ARG: OptFlags = OptFlags(0x0001);
    pub const BOOL: OptFlags = OptFlags(0x0002);
    pub const EXPERT: OptFlags = OptFlags(0x0004);
    pub const STRING: OptFlags = OptFlags(0x0008);
    pub const VIDEO: OptFlags = OptFlags(0x0010);
    pub const AUDIO: OptFlags = OptFlags(0x0020);
    pub const INT: OptFlags = OptFlags(0x0080);
    pub const FLOAT: OptFlags = OptFlags(0x0100);
    pub const SUBTITLE: OptFlags = OptFlags(0x0200);
    pub const INT64: OptFlags = OptFlags(0x0400);
    pub const EXIT: OptFlags = OptFlags(0x0800);
    pub const DATA: OptFlags = OptFlags(0x1000);
    pub const PERFILE: OptFlags = OptFlags(0x2000);
    pub const OFFSET: OptFlags = OptFlags(0x4000);
    pub const SPEC: OptFlags = OptFlags(0x8000);
    pub const TIME: OptFlags = OptFlags(0x10000);
    pub const DOUBLE: OptFlags = OptFlags(0x20000);
    pub const INPUT: OptFlags = OptFlags(0x40000);
    pub const OUTPUT: OptFlags = OptFlags(0x80000);

    /// Flags marking an option that belongs to a file group.
    pub const PER_FILE: OptFlags = OptFlags(0x2000 | 0x4000 | 0x8000);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// All bits of `other` are set.
    pub const fn contains(self, other: OptFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set.
    pub const fn intersects(self, other: OptFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for OptFlags {
    type Output = OptFlags;

    fn bitor(self, rhs: OptFlags) -> OptFlags {
        OptFlags(self.0 | rhs.0)
    }
}

/// A parsed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Bool(bool),
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    /// Microseconds.
    Time(i64),
    Str(String),
}

impl OptValue {
    pub fn as_bool(&self) -> bool {
        match self {
            OptValue::Bool(b) => *b,
            OptValue::Str(s) => !s.is_empty() && s != "0",
            _ => self.as_i64() != 0,
        }
    }

    pub fn as_i32(&self) -> i32 {
        self.as_i64().clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            OptValue::Bool(b) => *b as i64,
            OptValue::Int(v) => *v as i64,
            OptValue::Int64(v) | OptValue::Time(v) => *v,
            OptValue::Float(v) => *v as i64,
            OptValue::Double(v) => *v as i64,
            OptValue::Str(s) => s.parse().unwrap_or(0),
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            OptValue::Float(v) => *v as f64,
            OptValue::Double(v) => *v,
            OptValue::Str(s) => s.parse().unwrap_or(0.0),
            _ => self.as_i64() as f64,
        }
    }

    /// String payload; empty for non-string values.
    pub fn as_str(&self) -> &str {
        match self {
            OptValue::Str(s) => s,
            _ => "",
        }
    }
}

impl std::fmt::Display for OptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptValue::Bool(b) => write!(f, "{}", *b as i32),
            OptValue::Int(v) => write!(f, "{}", v),
            OptValue::Int64(v) | OptValue::Time(v) => write!(f, "{}", v),
            OptValue::Float(v) => write!(f, "{}", v),
            OptValue::Double(v) => write!(f, "{}", v),
            OptValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Convert the raw argument of an option according to its value-type flags.
pub fn parse_value(flags: OptFlags, opt: &str, arg: &str) -> OptionsResult<OptValue> {
    if flags.contains(OptFlags::STRING) {
        Ok(OptValue::Str(arg.to_string()))
    } else if flags.contains(OptFlags::BOOL) || flags.contains(OptFlags::INT) {
        let v = parse_number(opt, arg, NumberKind::Int64, i32::MIN as f64, i32::MAX as f64)?;
        if flags.contains(OptFlags::BOOL) {
            Ok(OptValue::Bool(v != 0.0))
        } else {
            Ok(OptValue::Int(v as i32))
        }
    } else if flags.contains(OptFlags::INT64) {
        let v = parse_number(opt, arg, NumberKind::Int64, i64::MIN as f64, i64::MAX as f64)?;
        Ok(OptValue::Int64(v as i64))
    } else if flags.contains(OptFlags::TIME) {
        Ok(OptValue::Time(parse_time(opt, arg, true)?))
    } else if flags.contains(OptFlags::FLOAT) {
        let v = parse_number(opt, arg, NumberKind::Float, f64::NEG_INFINITY, f64::INFINITY)?;
        Ok(OptValue::Float(v as f32))
    } else if flags.contains(OptFlags::DOUBLE) {
        let v = parse_number(opt, arg, NumberKind::Double, f64::NEG_INFINITY, f64::INFINITY)?;
        Ok(OptValue::Double(v))
    } else {
        Err(OptionError::invalid(format!(
            "Option {} has no value type",
            opt
        )))
    }
}

pub type GlobalSetter = fn(&mut ParserGlobals, OptValue);
pub type FileSetter = fn(&mut OptionsContext, OptValue);
pub type GlobalHandler = fn(&mut ParseState<'_>, &str, &str) -> OptionsResult<()>;
pub type FileHandler =
    fn(&mut ParseState<'_>, &mut OptionsContext, &str, &str) -> OptionsResult<()>;

/// Where an option's value goes.
#[derive(Clone, Copy)]
pub enum OptionKind {
    /// Scalar stored into the per-session globals.
    Global(GlobalSetter),
    /// Scalar stored into the per-file context.
    File(FileSetter),
    /// Specifier-qualified value appended to the per-file context.
    Spec(SpecField),
    /// Handler operating on the session state.
    GlobalFunc(GlobalHandler),
    /// Handler operating on the per-file context.
    FileFunc(FileHandler),
}

impl std::fmt::Debug for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionKind::Global(_) => write!(f, "Global"),
            OptionKind::File(_) => write!(f, "File"),
            OptionKind::Spec(field) => write!(f, "Spec({:?})", field),
            OptionKind::GlobalFunc(_) => write!(f, "GlobalFunc"),
            OptionKind::FileFunc(_) => write!(f, "FileFunc"),
        }
    }
}

/// One entry of the option table.
#[derive(Debug, Clone, Copy)]
pub struct OptionDef {
    pub name: &'static str,
    pub flags: OptFlags,
    pub kind: OptionKind,
    pub help: &'static str,
    pub arg_name: &'static str,
}

impl OptionDef {
    /// Option goes into a file group rather than the global group.
    pub fn is_per_file(&self) -> bool {
        self.flags.intersects(OptFlags::PER_FILE)
    }
}

/// Look up an option by name; a `:specifier` suffix is ignored.
pub fn find_option(name: &str) -> Option<&'static OptionDef> {
    let base = name.split(':').next().unwrap_or(name);
    OPTIONS.iter().find(|def| def.name == base)
}

fn def(
    name: &'static str,
    flags: OptFlags,
    kind: OptionKind,
    help: &'static str,
    arg_name: &'static str,
) -> OptionDef {
    OptionDef {
        name,
        flags,
        kind,
        help,
        arg_name,
    }
}

use OptFlags as F;
use OptionKind::{File, FileFunc, Global, GlobalFunc, Spec};

/// The option table.
pub static OPTIONS: Lazy<Vec<OptionDef>> = Lazy::new(|| {
    vec![
        // information and exit options
        def("h", F::EXIT, GlobalFunc(help::show_help), "show help", "topic"),
        def("?", F::EXIT, GlobalFunc(help::show_help), "show help", "topic"),
        def("help", F::EXIT, GlobalFunc(help::show_help), "show help", "topic"),
        def("-help", F::EXIT, GlobalFunc(help::show_help), "show help", "topic"),
        def("version", F::EXIT, GlobalFunc(help::show_version), "show version", ""),
        def("codecs", F::EXIT, GlobalFunc(help::show_codecs), "show available codecs", ""),
        def("encoders", F::EXIT, GlobalFunc(help::show_encoders), "show available encoders", ""),
        def("decoders", F::EXIT, GlobalFunc(help::show_decoders), "show available decoders", ""),
        def("hwaccels", F::EXIT, GlobalFunc(help::show_hwaccels), "show available HW acceleration methods", ""),
        def("loglevel", F::HAS_ARG, GlobalFunc(handlers::opt_loglevel), "set logging level", "loglevel"),
        def("v", F::HAS_ARG, GlobalFunc(handlers::opt_loglevel), "set logging level", "loglevel"),
        def("report", F::EXPERT, GlobalFunc(handlers::opt_report), "generate a report", ""),
        def("hide_banner", F::BOOL | F::EXPERT, Global(|g, v| g.hide_banner = v.as_bool()), "do not show program banner", "hide_banner"),

        // main options
        def("f", F::HAS_ARG | F::STRING | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.format = Some(v.as_str().to_string())), "force format", "fmt"),
        def("y", F::BOOL, Global(|g, v| g.file_overwrite = v.as_bool()), "overwrite output files", ""),
        def("n", F::BOOL, Global(|g, v| g.no_file_overwrite = v.as_bool()), "never overwrite output files", ""),
        def("ignore_unknown", F::BOOL, Global(|g, v| g.ignore_unknown_streams = v.as_bool()), "Ignore unknown stream types", ""),
        def("copy_unknown", F::BOOL | F::EXPERT, Global(|g, v| g.copy_unknown_streams = v.as_bool()), "Copy unknown stream types", ""),
        def("recast_media", F::BOOL | F::EXPERT, Global(|g, v| g.recast_media = v.as_bool()), "allow recasting stream type in order to force a decoder of different media type", ""),
        def("c", F::HAS_ARG | F::STRING | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::CodecName), "codec name", "codec"),
        def("codec", F::HAS_ARG | F::STRING | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::CodecName), "codec name", "codec"),
        def("pre", F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::Presets), "preset name", "preset"),
        def("map", F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(stream_map::opt_map), "set input stream mapping", "[-]input_file_id[:stream_specifier][?]"),
        def("map_channel", F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(stream_map::opt_map_channel), "map an audio channel from one stream to another (deprecated)", "file.stream.channel[:syncfile.syncstream]"),
        def("map_metadata", F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT | F::EXPERT, Spec(SpecField::MetadataMap), "set metadata information of outfile from infile", "outfile[,metadata]:infile[,metadata]"),
        def("map_chapters", F::HAS_ARG | F::INT | F::EXPERT | F::OFFSET | F::OUTPUT, File(|o, v| o.chapters_input_file = Some(v.as_i32())), "set chapters mapping", "input_file_index"),
        def("t", F::HAS_ARG | F::TIME | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.recording_time = Some(v.as_i64())), "record or transcode \"duration\" seconds of audio/video", "duration"),
        def("to", F::HAS_ARG | F::TIME | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.stop_time = Some(v.as_i64())), "record or transcode stop time", "time_stop"),
        def("fs", F::HAS_ARG | F::INT64 | F::OFFSET | F::OUTPUT, File(|o, v| o.limit_filesize = Some(v.as_i64())), "set the limit file size in bytes", "limit_size"),
        def("ss", F::HAS_ARG | F::TIME | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.start_time = Some(v.as_i64())), "set the start time offset", "time_off"),
        def("sseof", F::HAS_ARG | F::TIME | F::OFFSET | F::INPUT, File(|o, v| o.start_time_eof = Some(v.as_i64())), "set the start time offset relative to EOF", "time_off"),
        def("seek_timestamp", F::HAS_ARG | F::INT | F::OFFSET | F::INPUT, File(|o, v| o.seek_timestamp = v.as_bool()), "enable/disable seeking by timestamp with -ss", ""),
        def("accurate_seek", F::BOOL | F::OFFSET | F::EXPERT | F::INPUT, File(|o, v| o.accurate_seek = v.as_bool()), "enable/disable accurate seeking with -ss", ""),
        def("isync", F::HAS_ARG | F::INT | F::OFFSET | F::EXPERT | F::INPUT, File(|o, v| o.input_sync_ref = v.as_i32()), "Indicate the input index for sync reference", "sync ref"),
        def("itsoffset", F::HAS_ARG | F::TIME | F::OFFSET | F::EXPERT | F::INPUT, File(|o, v| o.input_ts_offset = v.as_i64()), "set the input ts offset", "time_off"),
        def("itsscale", F::HAS_ARG | F::DOUBLE | F::SPEC | F::EXPERT | F::INPUT, Spec(SpecField::TsScale), "set the input ts scale", "scale"),
        def("timestamp", F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_recording_timestamp), "set the recording timestamp ('now' to set the current time)", "time"),
        def("metadata", F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::Metadata), "add metadata", "string=string"),
        def("program", F::HAS_ARG | F::STRING | F::SPEC | F::EXPERT | F::OUTPUT, Spec(SpecField::Program), "add program with specified streams", "title=string:st=number..."),
        def("dframes", F::HAS_ARG | F::PERFILE | F::EXPERT | F::OUTPUT, FileFunc(handlers::opt_data_frames), "set the number of data frames to output", "number"),
        def("frames", F::HAS_ARG | F::INT64 | F::SPEC | F::OUTPUT, Spec(SpecField::MaxFrames), "set the number of frames to output", "number"),
        def("target", F::HAS_ARG | F::PERFILE | F::EXPERT | F::OUTPUT, FileFunc(target::opt_target), "specify target file type (\"vcd\", \"svcd\", \"dvd\", \"dv\" or \"dv50\" with optional prefixes \"pal-\", \"ntsc-\" or \"film-\")", "type"),
        def("apad", F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::Apad), "audio pad", ""),
        def("shortest", F::BOOL | F::EXPERT | F::OFFSET | F::OUTPUT, File(|o, v| o.shortest = v.as_bool()), "finish encoding within shortest input", ""),
        def("shortest_buf_duration", F::HAS_ARG | F::FLOAT | F::EXPERT | F::OFFSET | F::OUTPUT, File(|o, v| o.shortest_buf_duration = v.as_f32()), "maximum buffering duration (in seconds) for the -shortest option", ""),
        def("bitexact", F::BOOL | F::EXPERT | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.bitexact = v.as_bool()), "bitexact mode", ""),
        def("dcodec", F::HAS_ARG | F::PERFILE | F::EXPERT | F::INPUT | F::OUTPUT, FileFunc(handlers::opt_data_codec), "force data codec ('copy' to copy stream)", "codec"),
        def("streamid", F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_streamid), "set the value of an outfile streamid", "streamIndex:value"),
        def("attach", F::HAS_ARG | F::PERFILE | F::EXPERT | F::OUTPUT, FileFunc(handlers::opt_attach), "add an attachment to the output file", "filename"),
        def("dump_attachment", F::HAS_ARG | F::STRING | F::SPEC | F::EXPERT | F::INPUT, Spec(SpecField::DumpAttachment), "extract an attachment into a file", "filename"),
        def("thread_queue_size", F::HAS_ARG | F::INT | F::OFFSET | F::EXPERT | F::INPUT, File(|o, v| o.thread_queue_size = v.as_i32()), "set the maximum number of queued packets from the demuxer", ""),
        def("find_stream_info", F::BOOL | F::INPUT | F::EXPERT | F::OFFSET, File(|o, v| o.find_stream_info = v.as_bool()), "read and decode the streams to fill missing information with heuristics", ""),
        def("re", F::BOOL | F::EXPERT | F::OFFSET | F::INPUT, File(|o, v| o.rate_emu = v.as_bool()), "read input at native frame rate; equivalent to -readrate 1", ""),
        def("readrate", F::HAS_ARG | F::FLOAT | F::OFFSET | F::EXPERT | F::INPUT, File(|o, v| o.readrate = v.as_f32()), "read input at specified rate", "speed"),
        def("stream_loop", F::HAS_ARG | F::INT | F::EXPERT | F::INPUT | F::OFFSET, File(|o, v| o.stream_loop = v.as_i32()), "set number of times input stream shall be looped", "loop count"),
        def("muxdelay", F::HAS_ARG | F::FLOAT | F::EXPERT | F::OFFSET | F::OUTPUT, File(|o, v| o.mux_max_delay = v.as_f32()), "set the maximum demux-decode delay", "seconds"),
        def("muxpreload", F::HAS_ARG | F::FLOAT | F::EXPERT | F::OFFSET | F::OUTPUT, File(|o, v| o.mux_preload = v.as_f32()), "set the initial demux-decode delay", "seconds"),
        def("max_muxing_queue_size", F::HAS_ARG | F::INT | F::SPEC | F::EXPERT | F::OUTPUT, Spec(SpecField::MaxMuxingQueueSize), "maximum number of packets that can be buffered while waiting for all streams to initialize", "packets"),
        def("fpre", F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(preset::opt_preset), "set options from indicated preset file", "filename"),
        def("discard", F::HAS_ARG | F::STRING | F::SPEC | F::INPUT, Spec(SpecField::Discard), "discard", ""),
        def("disposition", F::HAS_ARG | F::STRING | F::SPEC | F::EXPERT | F::OUTPUT, Spec(SpecField::Disposition), "disposition", ""),
        def("tag", F::HAS_ARG | F::STRING | F::SPEC | F::EXPERT | F::INPUT | F::OUTPUT, Spec(SpecField::CodecTag), "force codec tag/fourcc", "fourcc/tag"),
        def("q", F::HAS_ARG | F::EXPERT | F::DOUBLE | F::SPEC | F::OUTPUT, Spec(SpecField::Qscale), "use fixed quality scale (VBR)", "q"),
        def("qscale", F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_qscale), "use fixed quality scale (VBR)", "q"),
        def("profile", F::HAS_ARG | F::EXPERT | F::PERFILE | F::INPUT | F::OUTPUT, FileFunc(handlers::opt_profile), "set profile", "profile"),
        def("filter", F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::Filter), "set stream filtergraph", "filter_graph"),
        def("filter_script", F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::FilterScript), "read stream filtergraph description from a file", "filename"),
        def("filter_threads", F::HAS_ARG, GlobalFunc(handlers::opt_filter_threads), "number of non-complex filter threads", ""),
        def("filter_complex", F::HAS_ARG | F::EXPERT, GlobalFunc(filtergraph::opt_filter_complex), "create a complex filtergraph", "graph_description"),
        def("filter_complex_threads", F::HAS_ARG | F::INT, Global(|g, v| g.filter_complex_nbthreads = v.as_i32()), "number of threads for -filter_complex", ""),
        def("lavfi", F::HAS_ARG | F::EXPERT, GlobalFunc(filtergraph::opt_filter_complex), "create a complex filtergraph", "graph_description"),
        def("filter_complex_script", F::HAS_ARG | F::EXPERT, GlobalFunc(filtergraph::opt_filter_complex_script), "read complex filtergraph description from a file", "filename"),
        def("auto_conversion_filters", F::BOOL | F::EXPERT, Global(|g, v| g.auto_conversion_filters = v.as_bool()), "enable automatic conversion filters globally", ""),
        def("stats", F::BOOL, Global(|g, v| g.print_stats = v.as_i32()), "print progress report during encoding", ""),
        def("stats_period", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_stats_period), "set the period at which ffmpeg updates stats and -progress output", "time"),
        def("progress", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_progress), "write program-readable progress information", "url"),
        def("stdin", F::BOOL | F::EXPERT, Global(|g, v| g.stdin_interaction = v.as_bool()), "enable or disable interaction on standard input", ""),
        def("timelimit", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_timelimit), "set max runtime in seconds in CPU user time", "limit"),
        def("dump", F::BOOL | F::EXPERT, Global(|g, v| g.do_pkt_dump = v.as_bool()), "dump each input packet", ""),
        def("hex", F::BOOL | F::EXPERT, Global(|g, v| g.do_hex_dump = v.as_bool()), "when dumping packets, also dump the payload", ""),
        def("benchmark", F::BOOL | F::EXPERT, Global(|g, v| g.do_benchmark = v.as_bool()), "add timings for benchmarking", ""),
        def("benchmark_all", F::BOOL | F::EXPERT, Global(|g, v| g.do_benchmark_all = v.as_bool()), "add timings for each task", ""),
        def("vsync", F::HAS_ARG | F::EXPERT | F::VIDEO, GlobalFunc(handlers::opt_vsync), "set video sync method globally; deprecated, use -fps_mode", ""),
        def("frame_drop_threshold", F::HAS_ARG | F::FLOAT | F::EXPERT, Global(|g, v| g.frame_drop_threshold = v.as_f32()), "frame drop threshold", ""),
        def("adrift_threshold", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_no_effect), "deprecated, does nothing", "threshold"),
        def("copyts", F::BOOL | F::EXPERT, Global(|g, v| g.copy_ts = v.as_bool()), "copy timestamps", ""),
        def("start_at_zero", F::BOOL | F::EXPERT, Global(|g, v| g.start_at_zero = v.as_bool()), "shift input timestamps to start at 0 when using copyts", ""),
        def("copytb", F::HAS_ARG | F::INT | F::EXPERT, Global(|g, v| g.copy_tb = v.as_i32()), "copy input stream time base when stream copying", "mode"),
        def("dts_delta_threshold", F::HAS_ARG | F::FLOAT | F::EXPERT, Global(|g, v| g.dts_delta_threshold = v.as_f32()), "timestamp discontinuity delta threshold", "threshold"),
        def("dts_error_threshold", F::HAS_ARG | F::FLOAT | F::EXPERT, Global(|g, v| g.dts_error_threshold = v.as_f32()), "timestamp error delta threshold", "threshold"),
        def("xerror", F::BOOL | F::EXPERT, Global(|g, v| g.exit_on_error = v.as_bool()), "exit on error", "error"),
        def("abort_on", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_abort_on), "abort on the specified condition flags", "flags"),
        def("debug_ts", F::BOOL | F::EXPERT, Global(|g, v| g.debug_ts = v.as_bool()), "print timestamp debugging info", ""),
        def("max_error_rate", F::HAS_ARG | F::FLOAT, Global(|g, v| g.max_error_rate = v.as_f32()), "ratio of decoding errors (0.0: no errors, 1.0: 100% errors) above which ffmpeg returns an error instead of success.", "maximum error rate"),
        def("bsf", F::HAS_ARG | F::STRING | F::SPEC | F::EXPERT | F::OUTPUT, Spec(SpecField::Bsf), "A comma-separated list of bitstream filters", "bitstream_filters"),
        def("sdp_file", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_sdp_file), "specify a file in which to print sdp information", "file"),
        def("init_hw_device", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_init_hw_device), "initialise hardware device", "args"),
        def("filter_hw_device", F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_filter_hw_device), "set hardware device used when filtering", "device"),
        def("b", F::VIDEO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_bitrate), "video bitrate (please use -b:v)", "bitrate"),

        // video options
        def("vframes", F::VIDEO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_video_frames), "set the number of video frames to output", "number"),
        def("r", F::VIDEO | F::HAS_ARG | F::STRING | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::FrameRate), "set frame rate (Hz value, fraction or abbreviation)", "rate"),
        def("qphist", F::VIDEO | F::EXPERT, GlobalFunc(handlers::opt_no_effect), "deprecated, does nothing", ""),
        def("fpsmax", F::VIDEO | F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::MaxFrameRate), "set max frame rate (Hz value, fraction or abbreviation)", "rate"),
        def("s", F::VIDEO | F::HAS_ARG | F::STRING | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::FrameSize), "set frame size (WxH or abbreviation)", "size"),
        def("aspect", F::VIDEO | F::HAS_ARG | F::STRING | F::SPEC | F::OUTPUT, Spec(SpecField::Aspect), "set aspect ratio (4:3, 16:9 or 1.3333, 1.7777)", "aspect"),
        def("pix_fmt", F::VIDEO | F::EXPERT | F::HAS_ARG | F::STRING | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::PixFmt), "set pixel format", "format"),
        def("vn", F::VIDEO | F::BOOL | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.video_disable = v.as_bool()), "disable video", ""),
        def("vcodec", F::VIDEO | F::HAS_ARG | F::PERFILE | F::INPUT | F::OUTPUT, FileFunc(handlers::opt_video_codec), "force video codec ('copy' to copy stream)", "codec"),
        def("timecode", F::VIDEO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_timecode), "set initial TimeCode value.", "hh:mm:ss[:;.]ff"),
        def("vstats", F::VIDEO | F::EXPERT, GlobalFunc(handlers::opt_vstats), "dump video coding statistics to file", ""),
        def("vstats_file", F::VIDEO | F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_vstats_file), "dump video coding statistics to file", "file"),
        def("vstats_version", F::VIDEO | F::INT | F::HAS_ARG | F::EXPERT, Global(|g, v| g.vstats_version = v.as_i32()), "Version of the vstats format to use.", ""),
        def("vf", F::VIDEO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_video_filters), "set video filters", "filter_graph"),
        def("vtag", F::VIDEO | F::HAS_ARG | F::EXPERT | F::PERFILE | F::INPUT | F::OUTPUT, FileFunc(handlers::opt_old2new), "force video tag/fourcc", "fourcc/tag"),
        def("fps_mode", F::VIDEO | F::HAS_ARG | F::STRING | F::EXPERT | F::SPEC | F::OUTPUT, Spec(SpecField::FpsMode), "set framerate mode for matching video streams; overrides vsync", ""),
        def("vpre", F::VIDEO | F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(preset::opt_preset), "set the video options to the indicated preset", "preset"),
        def("hwaccel", F::VIDEO | F::HAS_ARG | F::STRING | F::EXPERT | F::SPEC | F::INPUT, Spec(SpecField::HwAccel), "use HW accelerated decoding", "hwaccel name"),
        def("hwaccel_device", F::VIDEO | F::HAS_ARG | F::STRING | F::EXPERT | F::SPEC | F::INPUT, Spec(SpecField::HwAccelDevice), "select a device for HW acceleration", "devicename"),
        def("hwaccel_output_format", F::VIDEO | F::HAS_ARG | F::STRING | F::EXPERT | F::SPEC | F::INPUT, Spec(SpecField::HwAccelOutputFormat), "select output format used with HW accelerated decoding", "format"),
        def("vaapi_device", F::VIDEO | F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_vaapi_device), "set VAAPI hardware device (DirectX adapter index, DRM path or X11 display name)", "device"),
        def("qsv_device", F::VIDEO | F::HAS_ARG | F::EXPERT, GlobalFunc(handlers::opt_qsv_device), "set QSV hardware device (DirectX adapter index, DRM path or X11 display name)", "device"),

        // audio options
        def("aframes", F::AUDIO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_audio_frames), "set the number of audio frames to output", "number"),
        def("aq", F::AUDIO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_audio_qscale), "set audio quality (codec-specific)", "quality"),
        def("ar", F::AUDIO | F::HAS_ARG | F::INT | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::SampleRate), "set audio sampling rate (in Hz)", "rate"),
        def("ac", F::AUDIO | F::HAS_ARG | F::INT | F::SPEC | F::INPUT | F::OUTPUT, Spec(SpecField::AudioChannels), "set number of audio channels", "channels"),
        def("an", F::AUDIO | F::BOOL | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.audio_disable = v.as_bool()), "disable audio", ""),
        def("acodec", F::AUDIO | F::HAS_ARG | F::PERFILE | F::INPUT | F::OUTPUT, FileFunc(handlers::opt_audio_codec), "force audio codec ('copy' to copy stream)", "codec"),
        def("ab", F::AUDIO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_bitrate), "audio bitrate (please use -b:a)", "bitrate"),
        def("atag", F::AUDIO | F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_old2new), "force audio tag/fourcc", "fourcc/tag"),
        def("sample_fmt", F::AUDIO | F::HAS_ARG | F::EXPERT | F::SPEC | F::STRING | F::INPUT | F::OUTPUT, Spec(SpecField::SampleFmt), "set sample format", "format"),
        def("af", F::AUDIO | F::HAS_ARG | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_audio_filters), "set audio filters", "filter_graph"),
        def("apre", F::AUDIO | F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(preset::opt_preset), "set the audio options to the indicated preset", "preset"),

        // subtitle options
        def("sn", F::SUBTITLE | F::BOOL | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.subtitle_disable = v.as_bool()), "disable subtitle", ""),
        def("scodec", F::SUBTITLE | F::HAS_ARG | F::PERFILE | F::INPUT | F::OUTPUT, FileFunc(handlers::opt_subtitle_codec), "force subtitle codec ('copy' to copy stream)", "codec"),
        def("stag", F::SUBTITLE | F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(handlers::opt_old2new), "force subtitle tag/fourcc", "fourcc/tag"),
        def("spre", F::SUBTITLE | F::HAS_ARG | F::EXPERT | F::PERFILE | F::OUTPUT, FileFunc(preset::opt_preset), "set the subtitle options to the indicated preset", "preset"),

        // data options
        def("dn", F::DATA | F::BOOL | F::OFFSET | F::INPUT | F::OUTPUT, File(|o, v| o.data_disable = v.as_bool()), "disable data", ""),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_strips_specifier() {
        assert_eq!(find_option("c:v").map(|d| d.name), Some("c"));
        assert_eq!(find_option("metadata:s:a:0").map(|d| d.name), Some("metadata"));
        assert!(find_option("nonexistent").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = OPTIONS.iter().map(|d| d.name).collect();
        names.sort_unstable();
        let len = names.len();
        names.dedup();
        assert_eq!(names.len(), len);
    }

    #[test]
    fn per_file_classification() {
        assert!(find_option("map").unwrap().is_per_file());
        assert!(find_option("c").unwrap().is_per_file());
        assert!(find_option("ss").unwrap().is_per_file());
        assert!(!find_option("y").unwrap().is_per_file());
        assert!(!find_option("filter_complex").unwrap().is_per_file());
    }

    #[test]
    fn value_conversion_follows_flags() {
        assert_eq!(parse_value(F::BOOL, "y", "1").unwrap(), OptValue::Bool(true));
        assert_eq!(parse_value(F::HAS_ARG | F::INT, "ac", "2").unwrap(), OptValue::Int(2));
        assert_eq!(parse_value(F::HAS_ARG | F::TIME, "t", "1.5").unwrap(), OptValue::Time(1_500_000));
        assert_eq!(
            parse_value(F::HAS_ARG | F::STRING, "c", "libx264").unwrap(),
            OptValue::Str("libx264".into())
        );
        assert!(parse_value(F::HAS_ARG | F::INT, "ac", "x").is_err());
    }
}
