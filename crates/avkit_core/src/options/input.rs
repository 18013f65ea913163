//! Opening input files.

use super::codecs::find_codec;
use super::context::{OptionsContext, SpecField};
use super::errors::{OptionError, OptionsResult};
use super::handlers::HW_DEVICE_TYPES;
use super::parser::apply_time_limits;
use super::specifier::StreamSpecifier;
use super::state::ParseState;
use super::table::OptValue;
use super::value::parse_frame_rate;
use crate::engine::MediaProbe;
use crate::logging::LogLevel;
use crate::models::{InputFile, MediaType};

const DISCARD_VALUES: &[&str] = &["none", "default", "noref", "bidir", "nokey", "nointra", "all"];

fn disabled_by_flag(o: &OptionsContext, media_type: MediaType) -> bool {
    match media_type {
        MediaType::Video => o.video_disable,
        MediaType::Audio => o.audio_disable,
        MediaType::Subtitle => o.subtitle_disable,
        MediaType::Data => o.data_disable,
        _ => false,
    }
}

/// Apply per-stream input options to every stream of `file`.
fn add_input_streams(state: &ParseState<'_>, o: &OptionsContext, file: &mut InputFile) -> OptionsResult<()> {
    for i in 0..file.streams.len() {
        let streams = &file.streams;
        let media_type = streams[i].media_type;

        let mut discard = disabled_by_flag(o, media_type);
        if let Some(value) = o.stream_str(SpecField::Discard, streams, i)? {
            if !DISCARD_VALUES.contains(&value) {
                let message = format!("Error parsing discard {}.", value);
                state.error(&message);
                return Err(OptionError::invalid(message));
            }
            discard |= value == "all";
        }

        let ts_scale = o
            .stream_value(SpecField::TsScale, streams, i)?
            .map(OptValue::as_f64)
            .unwrap_or(1.0);

        let decoder = match o.stream_str(SpecField::CodecName, streams, i)? {
            Some(name) => Some(find_codec(state, name, media_type, false)?),
            None => None,
        };

        let mut frame_rate = None;
        let mut hwaccel = None;
        if media_type == MediaType::Video {
            if let Some(rate) = o.stream_str(SpecField::FrameRate, streams, i)? {
                frame_rate = Some(parse_frame_rate(rate).map_err(|_| {
                    let message = format!("Error parsing framerate {}.", rate);
                    state.error(&message);
                    OptionError::invalid(message)
                })?);
            }

            if let Some(method) = o.stream_str(SpecField::HwAccel, streams, i)? {
                if method != "none" && method != "auto" && !HW_DEVICE_TYPES.contains(&method) {
                    state.log(LogLevel::Fatal, format!("Unrecognized hwaccel: {}.", method));
                    state.log(
                        LogLevel::Fatal,
                        format!("Supported hwaccels: {}", HW_DEVICE_TYPES.join(" ")),
                    );
                    return Err(OptionError::invalid(format!("Unrecognized hwaccel: {}.", method)));
                }
                hwaccel = Some(method.to_string());
            }
        }

        let stream = &mut file.streams[i];
        stream.discard = discard;
        stream.ts_scale = ts_scale;
        if decoder.is_some() {
            stream.decoder = decoder;
        }
        if frame_rate.is_some() {
            stream.frame_rate = frame_rate;
        }
        stream.hwaccel = hwaccel;
    }
    Ok(())
}

/// Resolve `-dump_attachment` requests against the attachment streams.
fn collect_attachment_dumps(o: &OptionsContext, file: &mut InputFile) -> OptionsResult<()> {
    for request in o.specs(SpecField::DumpAttachment) {
        let spec = StreamSpecifier::parse(&request.specifier)?;
        for (i, stream) in file.streams.iter().enumerate() {
            if stream.media_type != MediaType::Attachment || !spec.matches(&file.streams, i) {
                continue;
            }
            let mut name = request.value.as_str().to_string();
            if name.is_empty() {
                name = stream.tags.get("filename").cloned().ok_or_else(|| {
                    OptionError::invalid(format!(
                        "No filename specified and no 'filename' tag in stream #{}:{}.",
                        file.index, i
                    ))
                })?;
            }
            file.attachment_dumps.push((i, name));
        }
    }
    Ok(())
}

/// Probe `url` and record it as the next input file.
pub fn open_input(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    url: &str,
    probe: &dyn MediaProbe,
) -> OptionsResult<()> {
    apply_time_limits(state, o)?;

    let url = if url == "-" { "pipe:" } else { url };
    if url.starts_with("pipe:") || url == "/dev/stdin" {
        state.globals.stdin_interaction = false;
    }

    let mut file = probe.probe(url, o.format.as_deref()).map_err(|e| {
        let message = e.to_string();
        state.error(format!("{}: {}", url, message));
        OptionError::OpenInput {
            url: url.to_string(),
            message,
            code: e.code(),
        }
    })?;
    file.index = state.inputs.len();
    file.url = url.to_string();
    file.forced_format = o.format.clone();

    if o.start_time.is_some() && o.start_time_eof.is_some() {
        state.warning(format!(
            "Cannot use -ss and -sseof both, using -ss for {}",
            url
        ));
        o.start_time_eof = None;
    }

    if let Some(eof) = o.start_time_eof {
        if eof >= 0 {
            state.error("-sseof value must be negative; aborting");
            return Err(OptionError::invalid("-sseof value must be negative; aborting"));
        }
        match file.duration {
            Some(duration) if duration > 0 => {
                let start = eof + duration;
                if start < 0 {
                    state.warning(format!(
                        "-sseof value seeks to before start of file {}; ignored",
                        url
                    ));
                } else {
                    o.start_time = Some(start);
                }
            }
            _ => state.warning(format!(
                "Cannot use -sseof, duration of {} not known",
                url
            )),
        }
    }

    let mut timestamp = o.start_time.unwrap_or(0);
    if !o.seek_timestamp {
        timestamp += file.start_time.unwrap_or(0);
    }

    add_input_streams(state, o, &mut file)?;
    collect_attachment_dumps(o, &mut file)?;

    let globals = &state.globals;
    file.ts_offset = o.input_ts_offset
        - if globals.copy_ts {
            if globals.start_at_zero {
                file.start_time.unwrap_or(0)
            } else {
                0
            }
        } else {
            timestamp
        };
    file.seek_start = o.start_time;
    file.recording_time = o.recording_time;
    file.input_sync_ref = o.input_sync_ref;
    file.input_ts_offset = o.input_ts_offset;
    file.accurate_seek = o.accurate_seek;
    file.stream_loop = o.stream_loop;
    file.thread_queue_size = o.thread_queue_size;

    let readrate = o.readrate as f64;
    if readrate < 0.0 {
        let message = format!(
            "Option -readrate for Input #{} is {:.3}; it must be non-negative.",
            file.index, readrate
        );
        state.error(&message);
        return Err(OptionError::invalid(message));
    }
    if readrate > 0.0 && o.rate_emu {
        state.warning(format!(
            "Both -readrate and -re set for Input #{}. Using -readrate {:.3}.",
            file.index, readrate
        ));
    }
    file.readrate = if readrate > 0.0 {
        readrate
    } else if o.rate_emu {
        1.0
    } else {
        0.0
    };

    state.info(format!(
        "Input #{}, {}, from '{}':",
        file.index, file.format_name, url
    ));
    state.inputs.push(file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::logging::TracingSink;
    use crate::models::StreamInfo;
    use crate::options::state::ParseEnv;
    use crate::probe::{ProbeError, ProbeResult};

    struct FakeProbe(HashMap<String, InputFile>);

    impl MediaProbe for FakeProbe {
        fn probe(&self, url: &str, _format: Option<&str>) -> ProbeResult<InputFile> {
            self.0.get(url).cloned().ok_or_else(|| ProbeError::Failed {
                code: crate::error_code::ENOENT,
                message: "No such file or directory".to_string(),
            })
        }
    }

    fn probe() -> FakeProbe {
        let movie = InputFile::new("movie.mp4", "mov,mp4,m4a,3gp,3g2,mj2")
            .with_start_time(1_000)
            .with_duration(60_000_000)
            .with_stream(StreamInfo::new(0, MediaType::Video).with_codec("h264").with_size(1280, 720))
            .with_stream(StreamInfo::new(1, MediaType::Audio).with_codec("aac").with_audio(48000, 2))
            .with_stream(
                StreamInfo::new(2, MediaType::Attachment)
                    .with_codec("ttf")
                    .with_tag("filename", "font.ttf"),
            );
        let mut map = HashMap::new();
        map.insert("movie.mp4".to_string(), movie.clone());
        map.insert("pipe:".to_string(), movie);
        FakeProbe(map)
    }

    fn open(o: &mut OptionsContext, url: &str) -> (OptionsResult<()>, Vec<InputFile>, bool) {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        state.globals.stdin_interaction = true;
        let result = open_input(&mut state, o, url, &probe());
        (result, state.inputs, state.globals.stdin_interaction)
    }

    #[test]
    fn seek_sets_offset() {
        let mut o = OptionsContext::default();
        o.start_time = Some(5_000_000);
        o.input_ts_offset = 10;
        let (result, inputs, _) = open(&mut o, "movie.mp4");
        result.unwrap();
        assert_eq!(inputs[0].seek_start, Some(5_000_000));
        assert_eq!(inputs[0].ts_offset, 10 - 5_001_000);
    }

    #[test]
    fn sseof_is_relative_to_duration() {
        let mut o = OptionsContext::default();
        o.start_time_eof = Some(-10_000_000);
        let (result, inputs, _) = open(&mut o, "movie.mp4");
        result.unwrap();
        assert_eq!(inputs[0].seek_start, Some(50_000_000));

        let mut o = OptionsContext::default();
        o.start_time_eof = Some(1);
        let (result, _, _) = open(&mut o, "movie.mp4");
        assert_eq!(
            result.unwrap_err().to_string(),
            "-sseof value must be negative; aborting"
        );
    }

    #[test]
    fn stdin_is_detected() {
        let mut o = OptionsContext::default();
        let (result, inputs, stdin) = open(&mut o, "-");
        result.unwrap();
        assert_eq!(inputs[0].url, "pipe:");
        assert!(!stdin);
    }

    #[test]
    fn probe_failures_become_open_errors() {
        let mut o = OptionsContext::default();
        let (result, _, _) = open(&mut o, "missing.mp4");
        let err = result.unwrap_err();
        assert_eq!(err.code(), crate::error_code::ENOENT);
        assert!(matches!(err, OptionError::OpenInput { .. }));
    }

    #[test]
    fn per_stream_options() {
        let mut o = OptionsContext::default();
        o.audio_disable = true;
        o.push_spec(SpecField::CodecName, "v", OptValue::Str("h264".into()));
        o.push_spec(SpecField::TsScale, "v", OptValue::Double(2.0));
        o.push_spec(SpecField::FrameRate, "v", OptValue::Str("24000/1001".into()));
        o.push_spec(SpecField::HwAccel, "", OptValue::Str("vaapi".into()));
        o.push_spec(SpecField::DumpAttachment, "t", OptValue::Str(String::new()));
        let (result, inputs, _) = open(&mut o, "movie.mp4");
        result.unwrap();

        let file = &inputs[0];
        assert_eq!(file.streams[0].decoder.as_deref(), Some("h264"));
        assert_eq!(file.streams[0].ts_scale, 2.0);
        assert_eq!(file.streams[0].hwaccel.as_deref(), Some("vaapi"));
        assert!(file.streams[1].discard);
        assert_eq!(file.attachment_dumps, vec![(2, "font.ttf".to_string())]);
    }

    #[test]
    fn bad_stream_options() {
        let mut o = OptionsContext::default();
        o.push_spec(SpecField::Discard, "a", OptValue::Str("some".into()));
        let (result, _, _) = open(&mut o, "movie.mp4");
        assert_eq!(result.unwrap_err().to_string(), "Error parsing discard some.");

        let mut o = OptionsContext::default();
        o.push_spec(SpecField::HwAccel, "", OptValue::Str("magic".into()));
        let (result, _, _) = open(&mut o, "movie.mp4");
        assert!(result.is_err());
    }

    #[test]
    fn readrate_rules() {
        let mut o = OptionsContext::default();
        o.rate_emu = true;
        let (result, inputs, _) = open(&mut o, "movie.mp4");
        result.unwrap();
        assert_eq!(inputs[0].readrate, 1.0);

        let mut o = OptionsContext::default();
        o.readrate = -1.0;
        let (result, _, _) = open(&mut o, "movie.mp4");
        assert!(result.is_err());
    }
}
