//! Help, version and capability listings.
//!
//! Output goes through the parse sink at [`LogLevel::Stderr`], which is
//! never filtered, so callers see it in their log callbacks.

use super::codecs::{codec_names, CodecEntry};
use super::errors::OptionsResult;
use super::handlers::HW_DEVICE_TYPES;
use super::state::ParseState;
use super::table::{OptFlags, OptionDef, OPTIONS};
use crate::logging::LogLevel;
use crate::models::MediaType;

fn print(state: &ParseState<'_>, text: impl AsRef<str>) {
    state.log(LogLevel::Stderr, text);
}

fn option_line(def: &OptionDef) -> String {
    let mut name = def.name.to_string();
    if !def.arg_name.is_empty() {
        name.push(' ');
        name.push_str(def.arg_name);
    }
    format!("-{:<17}  {}", name, def.help)
}

/// Options with every `required` flag, none of `rejected`, and at least one
/// of `alternative` when that is non-empty.
fn help_section(
    state: &ParseState<'_>,
    title: &str,
    required: OptFlags,
    rejected: OptFlags,
    alternative: OptFlags,
) {
    let lines: Vec<String> = OPTIONS
        .iter()
        .filter(|def| {
            def.flags.contains(required)
                && (alternative == OptFlags::NONE || def.flags.intersects(alternative))
                && !def.flags.intersects(rejected)
        })
        .map(option_line)
        .collect();
    if lines.is_empty() {
        return;
    }
    print(state, title);
    for line in lines {
        print(state, line);
    }
    print(state, "");
}

fn show_usage(state: &ParseState<'_>) {
    state.info("Hyper fast Audio and Video encoder");
    state.info("usage: ffmpeg [options] [[infile options] -i infile]... {[outfile options] outfile}...");
    state.info("");
}

fn show_help_default(state: &ParseState<'_>, topic: &str) {
    let per_file = OptFlags::PER_FILE;
    let show_advanced = matches!(topic, "long" | "full");
    if !topic.is_empty() && !show_advanced {
        state.error(format!("Unknown help option '{}'.", topic));
    }

    show_usage(state);

    print(
        state,
        "Getting help:\n    -h      -- print basic options\n    -h long -- print more options\n    -h full -- print all options (including all format and codec specific options, very long)\n    -h type=name -- print all options for the named decoder/encoder\n",
    );

    help_section(state, "Print help / information / capabilities:", OptFlags::EXIT, OptFlags::NONE, OptFlags::NONE);
    help_section(
        state,
        "Global options (affect whole program instead of just one file):",
        OptFlags::NONE,
        per_file | OptFlags::EXIT | OptFlags::EXPERT,
        OptFlags::NONE,
    );
    if show_advanced {
        help_section(state, "Advanced global options:", OptFlags::EXPERT, per_file | OptFlags::EXIT, OptFlags::NONE);
    }

    let media = OptFlags::AUDIO | OptFlags::VIDEO | OptFlags::SUBTITLE;
    help_section(
        state,
        "Per-file main options:",
        OptFlags::NONE,
        OptFlags::EXPERT | media | OptFlags::EXIT,
        per_file,
    );
    if show_advanced {
        help_section(state, "Advanced per-file options:", OptFlags::EXPERT, media, per_file);
    }

    help_section(state, "Video options:", OptFlags::VIDEO, OptFlags::EXPERT | OptFlags::AUDIO, OptFlags::NONE);
    if show_advanced {
        help_section(state, "Advanced Video options:", OptFlags::EXPERT | OptFlags::VIDEO, OptFlags::AUDIO, OptFlags::NONE);
    }

    help_section(state, "Audio options:", OptFlags::AUDIO, OptFlags::EXPERT | OptFlags::VIDEO, OptFlags::NONE);
    if show_advanced {
        help_section(state, "Advanced Audio options:", OptFlags::EXPERT | OptFlags::AUDIO, OptFlags::VIDEO, OptFlags::NONE);
    }
    help_section(state, "Subtitle options:", OptFlags::SUBTITLE, OptFlags::NONE, OptFlags::NONE);
}

fn show_help_codec(state: &ParseState<'_>, name: &str, encoder: bool) {
    let kind = if encoder { "Encoder" } else { "Decoder" };
    let entry = codec_names(Some(encoder)).find(|c| c.name == name || c.id == name);
    match entry {
        Some(c) => {
            print(state, format!("{} {} [{}]:", kind, c.name, c.id));
            print(state, format!("    Media type: {}", c.media_type));
            print(state, "");
        }
        None => state.error(format!(
            "Codec '{}' is not recognized by avkit.",
            name
        )),
    }
}

/// `-h [topic]`.
pub fn show_help(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    match arg.split_once('=') {
        Some(("encoder", name)) => show_help_codec(state, name, true),
        Some(("decoder", name)) => show_help_codec(state, name, false),
        _ => show_help_default(state, arg),
    }
    Ok(())
}

pub fn show_version(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    print(state, format!("avkit version {}", crate::version()));
    Ok(())
}

fn type_letter(media_type: MediaType) -> char {
    match media_type {
        MediaType::Video => 'V',
        MediaType::Audio => 'A',
        MediaType::Subtitle => 'S',
        MediaType::Data => 'D',
        MediaType::Attachment => 'T',
        MediaType::Unknown => '?',
    }
}

pub fn show_codecs(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    print(
        state,
        "Codecs:\n D... = Decoding supported\n .E.. = Encoding supported\n ..V. = Video codec\n ..A. = Audio codec\n ..S. = Subtitle codec\n ..D. = Data codec\n -----",
    );

    let mut ids: Vec<&str> = Vec::new();
    for entry in codec_names(None) {
        if !ids.contains(&entry.id) {
            ids.push(entry.id);
        }
    }
    for id in ids {
        let entries: Vec<&CodecEntry> = codec_names(None).filter(|c| c.id == id).collect();
        let decode = entries.iter().any(|c| c.decoder);
        let encode = entries.iter().any(|c| c.encoder);
        let media_type = entries.first().map_or(MediaType::Unknown, |c| c.media_type);
        print(
            state,
            format!(
                " {}{}{}. {}",
                if decode { 'D' } else { '.' },
                if encode { 'E' } else { '.' },
                type_letter(media_type),
                id
            ),
        );
    }
    Ok(())
}

fn show_codec_list(state: &ParseState<'_>, encoder: bool) {
    let title = if encoder { "Encoders:" } else { "Decoders:" };
    print(state, format!("{}\n V = Video\n A = Audio\n S = Subtitle\n D = Data\n ------", title));
    for entry in codec_names(Some(encoder)) {
        let suffix = if entry.name != entry.id {
            format!(" (codec {})", entry.id)
        } else {
            String::new()
        };
        print(
            state,
            format!(" {} {:<20}{}", type_letter(entry.media_type), entry.name, suffix),
        );
    }
}

pub fn show_encoders(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    show_codec_list(state, true);
    Ok(())
}

pub fn show_decoders(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    show_codec_list(state, false);
    Ok(())
}

pub fn show_hwaccels(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    print(state, "Hardware acceleration methods:");
    for kind in HW_DEVICE_TYPES {
        print(state, kind);
    }
    print(state, "");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogSink;
    use crate::options::state::ParseEnv;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(LogLevel, String)>>);

    impl LogSink for Capture {
        fn log(&self, level: LogLevel, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    impl Capture {
        fn text(&self) -> String {
            self.0
                .lock()
                .iter()
                .map(|(_, m)| m.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    fn run(f: fn(&mut ParseState<'_>, &str, &str) -> OptionsResult<()>, arg: &str) -> String {
        let env = ParseEnv::default();
        let sink = Capture::default();
        let mut state = ParseState::new(&env, &sink);
        f(&mut state, "", arg).unwrap();
        sink.text()
    }

    #[test]
    fn basic_help_hides_expert_options() {
        let text = run(show_help, "");
        assert!(text.contains("Per-file main options:"));
        assert!(text.contains("-y                  overwrite output files"));
        assert!(!text.contains("Advanced global options:"));
        assert!(!text.contains("-copyts"));
    }

    #[test]
    fn long_help_adds_advanced_sections() {
        let text = run(show_help, "long");
        assert!(text.contains("Advanced global options:"));
        assert!(text.contains("-copyts"));
    }

    #[test]
    fn unknown_topic_is_reported() {
        let env = ParseEnv::default();
        let sink = Capture::default();
        let mut state = ParseState::new(&env, &sink);
        show_help(&mut state, "h", "bogus").unwrap();
        assert!(sink
            .0
            .lock()
            .iter()
            .any(|(level, m)| *level == LogLevel::Error && m == "Unknown help option 'bogus'."));
    }

    #[test]
    fn codec_help() {
        assert!(run(show_help, "encoder=libx264").contains("Encoder libx264 [h264]:"));
        assert!(run(show_help, "decoder=nope").contains("not recognized"));
    }

    #[test]
    fn listings() {
        assert!(run(show_version, "").starts_with("avkit version "));
        assert!(run(show_hwaccels, "").contains("vaapi"));
        assert!(run(show_encoders, "").contains("libx264"));
        assert!(run(show_codecs, "").contains(" DEV. h264"));
    }
}
