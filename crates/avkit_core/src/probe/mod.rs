//! Media information returned by the probe engine.

mod media_information;
mod types;

pub use media_information::MediaInformation;
pub use types::{
    Chapter, Disposition, ProbeError, ProbeResult, ProgramInformation, ProgramStream,
    StreamInformation,
};
