//! Data models shared by the option parser, the probe and the engine adapter.

mod enums;
mod media;

pub use enums::MediaType;
pub use media::{
    format_has_discontinuous_timestamps, format_reads_without_file, rescale, InputFile, Rational,
    StreamInfo, TIME_BASE_Q,
};
