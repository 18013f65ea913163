//! Engine command-line parser.
//!
//! Turns an ffmpeg-style argument list into resolved input files, output
//! files and filter graphs before anything is handed to the engine:
//! - splitting into global, input and output option groups
//! - the option descriptor table and its handlers
//! - stream specifiers, stream maps and automatic stream selection
//! - presets, `-target` and complex filter graph binding
//! - start-time correction and `-isync` offsets
//!
//! Every parse owns its own [`ParserGlobals`], so concurrent sessions never
//! observe each other's settings.

mod codecs;
mod context;
mod dict;
mod errors;
mod filtergraph;
mod globals;
mod handlers;
mod help;
mod input;
mod output;
mod parser;
mod preset;
mod specifier;
mod split;
mod state;
mod stream_map;
mod sync;
mod table;
mod target;
mod value;

pub use codecs::{codec_media_type, codec_names, find_codec, CodecEntry, CODECS};
pub use context::{AudioChannelMap, OptionsContext, SpecField, SpecifierOpt, StreamMap};
pub use dict::OptionDict;
pub use errors::{OptionError, OptionsResult};
pub use filtergraph::{FilterGraph, FilterInput, FilterOutput};
pub use globals::{
    current_session_id, HwDevice, ParserGlobals, SessionScope, VideoSyncMethod,
    ABORT_ON_FLAG_EMPTY_OUTPUT, ABORT_ON_FLAG_EMPTY_OUTPUT_STREAM,
};
pub use output::{
    assert_file_overwrite, find_muxer, IndexedMetadata, MetadataMap, Muxer, OutputFile,
    OutputProgram, OutputStream, StreamSource, MUXERS,
};
pub use parser::{parse_ffmpeg_options, parse_option, ParsedCommand};
pub use preset::find_preset_file;
pub use specifier::{check_stream_specifier, StreamLike, StreamSpecifier};
pub use split::{split_commandline, tokenize_command, GroupKind, OptionGroup, OptionParseContext};
pub use state::{ParseEnv, ParseState};
pub use stream_map::{auto_select_streams, AutoSelect};
pub use sync::{apply_sync_offsets, correct_input_start_times};
pub use table::{find_option, OptFlags, OptValue, OptionDef, OptionKind, OPTIONS};
pub use value::{parse_bool, parse_frame_rate, parse_frame_size, parse_time};
