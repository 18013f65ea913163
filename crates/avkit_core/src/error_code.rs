//! Engine error space.
//!
//! The engine reports failures as negative integers: either a negated POSIX
//! errno (`AVERROR(EINVAL)`) or a negated four-character tag
//! (`FFERRTAG('E','X','I','T')`). Sessions surface these values unchanged so
//! callers can compare them against the engine's documentation.

/// Build a four-character tag the way the engine does (`MKTAG`).
const fn mktag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    (a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24) as i32
}

/// Negated tag (`FFERRTAG`).
const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    -mktag(a, b, c, d)
}

/// No such file or directory.
pub const ENOENT: i32 = -2;
/// Input/output error.
pub const EIO: i32 = -5;
/// Out of memory.
pub const ENOMEM: i32 = -12;
/// Invalid argument.
pub const EINVAL: i32 = -22;
/// Function not implemented.
pub const ENOSYS: i32 = -38;

/// Immediate exit requested (help, listings, refused overwrite).
pub const EXIT: i32 = fferrtag(b'E', b'X', b'I', b'T');
/// End of file.
pub const EOF: i32 = fferrtag(b'E', b'O', b'F', b' ');
/// Invalid data found when processing input.
pub const INVALIDDATA: i32 = fferrtag(b'I', b'N', b'D', b'A');
/// Encoder not found.
pub const ENCODER_NOT_FOUND: i32 = fferrtag(0xF8, b'E', b'N', b'C');
/// Decoder not found.
pub const DECODER_NOT_FOUND: i32 = fferrtag(0xF8, b'D', b'E', b'C');
/// Option not found.
pub const OPTION_NOT_FOUND: i32 = fferrtag(0xF8, b'O', b'P', b'T');
/// Stream not found.
pub const STREAM_NOT_FOUND: i32 = fferrtag(0xF8, b'S', b'T', b'R');
/// Filter not found.
pub const FILTER_NOT_FOUND: i32 = fferrtag(0xF8, b'F', b'I', b'L');
/// Generic error in an external library.
pub const EXTERNAL: i32 = fferrtag(b'E', b'X', b'T', b' ');
/// Unknown error.
pub const UNKNOWN: i32 = fferrtag(b'U', b'N', b'K', b'N');

/// Human-readable description of an engine error code (`av_err2str`).
pub fn describe(code: i32) -> String {
    let text = match code {
        0 => "Success",
        ENOENT => "No such file or directory",
        EIO => "I/O error",
        ENOMEM => "Cannot allocate memory",
        EINVAL => "Invalid argument",
        ENOSYS => "Function not implemented",
        EXIT => "Immediate exit requested",
        EOF => "End of file",
        INVALIDDATA => "Invalid data found when processing input",
        ENCODER_NOT_FOUND => "Encoder not found",
        DECODER_NOT_FOUND => "Decoder not found",
        OPTION_NOT_FOUND => "Option not found",
        STREAM_NOT_FOUND => "Stream not found",
        FILTER_NOT_FOUND => "Filter not found",
        EXTERNAL => "Generic error in an external library",
        UNKNOWN => "Unknown error occurred",
        _ => return format!("Error number {} occurred", code),
    };
    text.to_string()
}

const KNOWN: [i32; 15] = [
    ENOENT,
    EIO,
    ENOMEM,
    EINVAL,
    ENOSYS,
    EXIT,
    EOF,
    INVALIDDATA,
    ENCODER_NOT_FOUND,
    DECODER_NOT_FOUND,
    OPTION_NOT_FOUND,
    STREAM_NOT_FOUND,
    FILTER_NOT_FOUND,
    EXTERNAL,
    UNKNOWN,
];

/// Recover the code from an engine message ending in a [`describe`] text,
/// such as `in.mp4: No such file or directory`.
pub fn from_message(message: &str) -> Option<i32> {
    let message = message.trim_end();
    KNOWN
        .iter()
        .copied()
        .find(|&code| message.ends_with(describe(code).as_str()))
}
