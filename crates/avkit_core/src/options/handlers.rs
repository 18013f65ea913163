//! Handler functions behind the option table.
//!
//! Handlers mirror the engine's option callbacks: shorthands re-dispatch to
//! their specifier form (`-vcodec` to `codec:v`), the rest validate and store
//! into the per-file context or the per-parse globals.

use chrono::{Local, TimeZone, Utc};

use super::context::OptionsContext;
use super::errors::{OptionError, OptionsResult};
use super::globals::{
    HwDevice, VideoSyncMethod, ABORT_ON_FLAG_EMPTY_OUTPUT, ABORT_ON_FLAG_EMPTY_OUTPUT_STREAM,
};
use super::parser::parse_option;
use super::state::ParseState;
use super::value::{parse_number, parse_time, NumberKind};
use crate::logging::LogLevel;

/// Upper bound on stream indices accepted by `-streamid`.
const MAX_STREAMS: f64 = 1024.0;

/// Hardware device types accepted by `-init_hw_device`.
pub const HW_DEVICE_TYPES: &[&str] = &[
    "cuda",
    "drm",
    "dxva2",
    "d3d11va",
    "mediacodec",
    "opencl",
    "qsv",
    "vaapi",
    "vdpau",
    "videotoolbox",
    "vulkan",
];

pub fn opt_video_codec(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "codec:v", arg)
}

pub fn opt_audio_codec(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "codec:a", arg)
}

pub fn opt_subtitle_codec(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "codec:s", arg)
}

pub fn opt_data_codec(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "codec:d", arg)
}

pub fn opt_video_frames(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "frames:v", arg)
}

pub fn opt_audio_frames(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "frames:a", arg)
}

pub fn opt_data_frames(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "frames:d", arg)
}

pub fn opt_video_filters(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "filter:v", arg)
}

pub fn opt_audio_filters(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "filter:a", arg)
}

pub fn opt_audio_qscale(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "q:a", arg)
}

/// `-vtag`, `-atag`, `-stag` become `tag:v`, `tag:a`, `tag:s`.
pub fn opt_old2new(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    let mut chars = opt.chars();
    let letter = chars.next().unwrap_or('v');
    let name = format!("{}:{}", chars.as_str(), letter);
    parse_option(state, Some(o), &name, arg)
}

/// `-b`, `-ab` and `-b:<spec>` are codec pass-through options.
pub fn opt_bitrate(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    match opt {
        "ab" => o.codec_opts.set("b:a", arg),
        "b" => {
            state.warning("Please use -b:a or -b:v, -b is ambiguous");
            o.codec_opts.set("b:v", arg);
        }
        _ => o.codec_opts.set(opt, arg),
    }
    Ok(())
}

pub fn opt_qscale(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    if opt == "qscale" {
        state.warning("Please use -q:a or -q:v, -qscale is ambiguous");
        return parse_option(state, Some(o), "q:v", arg);
    }
    let name = format!("q{}", &opt["qscale".len()..]);
    parse_option(state, Some(o), &name, arg)
}

pub fn opt_profile(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    if opt == "profile" {
        state.warning("Please use -profile:a or -profile:v, -profile is ambiguous");
        o.codec_opts.set("profile:v", arg);
    } else {
        o.codec_opts.set(opt, arg);
    }
    Ok(())
}

pub fn opt_streamid(
    _state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    let (index, value) = arg.split_once(':').ok_or_else(|| {
        OptionError::invalid(format!(
            "Invalid value '{}' for option '{}', required syntax is 'index:value'",
            arg, opt
        ))
    })?;
    parse_number(opt, index, NumberKind::Int, 0.0, MAX_STREAMS - 1.0)?;
    o.streamid.set(index, value);
    Ok(())
}

pub fn opt_attach(
    _state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    o.attachments.push(arg.to_string());
    Ok(())
}

/// `-timestamp` sets the `creation_time` metadata tag.
pub fn opt_recording_timestamp(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    let micros = parse_time(opt, arg, false)?;
    let time = Utc
        .timestamp_opt(micros.div_euclid(1_000_000), 0)
        .single()
        .ok_or_else(|| OptionError::invalid(format!("Invalid date specification for {}: {}", opt, arg)))?;
    let tag = format!("creation_time={}", time.format("%Y-%m-%dT%H:%M:%S%z"));
    parse_option(state, Some(o), "metadata", &tag)?;
    state.warning(format!(
        "{} is deprecated, set the 'creation_time' metadata tag instead.",
        opt
    ));
    Ok(())
}

/// `-timecode` sets the global `timecode` tag and the `gop_timecode` codec option.
pub fn opt_timecode(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    parse_option(state, Some(o), "metadata:g", &format!("timecode={}", arg))?;
    o.codec_opts.set("gop_timecode", arg);
    Ok(())
}

pub fn opt_loglevel(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    let mut level_seen = false;
    for token in arg.split('+') {
        let flag = token.trim_start_matches('-');
        if token.is_empty() || matches!(flag, "repeat" | "level" | "time" | "datetime") {
            continue;
        }
        if LogLevel::from_name(token).is_none() || level_seen {
            let names: Vec<_> = LogLevel::ALL
                .iter()
                .filter(|l| **l != LogLevel::Stderr)
                .map(|l| format!("\"{}\"", l.name()))
                .collect();
            return Err(OptionError::invalid(format!(
                "Invalid loglevel \"{}\". Possible levels are numbers or: {}",
                arg,
                names.join(", ")
            )));
        }
        level_seen = true;
    }
    state.globals.log_level = Some(arg.to_string());
    Ok(())
}

pub fn opt_report(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    state.globals.report = true;
    Ok(())
}

pub fn opt_filter_threads(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    state.globals.filter_nbthreads = Some(arg.to_string());
    Ok(())
}

pub fn opt_stats_period(state: &mut ParseState<'_>, opt: &str, arg: &str) -> OptionsResult<()> {
    let period = parse_time(opt, arg, true)?;
    if period <= 0 {
        return Err(OptionError::invalid(format!(
            "stats_period {} must be positive.",
            arg
        )));
    }
    state.globals.stats_period = period;
    Ok(())
}

pub fn opt_progress(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    let url = if arg == "-" { "pipe:" } else { arg };
    state.globals.progress_url = Some(url.to_string());
    Ok(())
}

pub fn opt_timelimit(state: &mut ParseState<'_>, opt: &str, arg: &str) -> OptionsResult<()> {
    let limit = parse_number(opt, arg, NumberKind::Int64, 0.0, i32::MAX as f64)?;
    state.globals.time_limit = Some(limit as i32);
    Ok(())
}

pub fn opt_vsync(state: &mut ParseState<'_>, opt: &str, arg: &str) -> OptionsResult<()> {
    state.warning("-vsync is deprecated. Use -fps_mode");
    let named = match arg.to_ascii_lowercase().as_str() {
        "cfr" | "vfr" | "passthrough" | "drop" => VideoSyncMethod::from_arg(arg),
        _ => None,
    };
    let method = match named {
        Some(method) => method,
        None => {
            let value = parse_number(opt, arg, NumberKind::Int, -1.0, 2.0)?;
            state.warning(
                "Passing a number to -vsync is deprecated, use a string argument as described in the manual.",
            );
            VideoSyncMethod::from_arg(&(value as i32).to_string()).unwrap_or_default()
        }
    };
    state.globals.video_sync_method = method;
    Ok(())
}

pub fn opt_abort_on(state: &mut ParseState<'_>, opt: &str, arg: &str) -> OptionsResult<()> {
    let mut flags = 0;
    for token in arg.split('+').filter(|t| !t.is_empty()) {
        flags |= match token {
            "empty_output" => ABORT_ON_FLAG_EMPTY_OUTPUT,
            "empty_output_stream" => ABORT_ON_FLAG_EMPTY_OUTPUT_STREAM,
            _ => {
                return Err(OptionError::invalid(format!(
                    "Unable to parse option value \"{}\" for {}",
                    arg, opt
                )))
            }
        };
    }
    state.globals.abort_on_flags = flags;
    Ok(())
}

/// `-qphist` and `-adrift_threshold` are accepted but do nothing.
pub fn opt_no_effect(state: &mut ParseState<'_>, opt: &str, _arg: &str) -> OptionsResult<()> {
    state.warning(format!("Option -{} is deprecated and has no effect", opt));
    Ok(())
}

pub fn opt_sdp_file(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    state.globals.sdp_filename = Some(arg.to_string());
    Ok(())
}

/// `-vstats` writes to `vstats_HHMMSS.log` in the working directory.
pub fn opt_vstats(state: &mut ParseState<'_>, _opt: &str, _arg: &str) -> OptionsResult<()> {
    let now = Local::now();
    state.globals.vstats_filename = Some(format!("vstats_{}.log", now.format("%H%M%S")));
    Ok(())
}

pub fn opt_vstats_file(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    state.globals.vstats_filename = Some(arg.to_string());
    Ok(())
}

/// Register a device from `type[=name][:device[,key=value...]]` or
/// `type[=name]@source`.
fn hw_device_init_from_string(state: &mut ParseState<'_>, spec: &str) -> OptionsResult<()> {
    let invalid = |reason: &str| {
        OptionError::invalid(format!(
            "Invalid device specification \"{}\": {}",
            spec, reason
        ))
    };

    let head_end = spec.find([':', '@']).unwrap_or(spec.len());
    let (head, args) = spec.split_at(head_end);
    let (kind, name) = match head.split_once('=') {
        Some((kind, name)) => (kind, Some(name)),
        None => (head, None),
    };

    if !HW_DEVICE_TYPES.contains(&kind) {
        return Err(invalid("unknown device type"));
    }

    let name = match name {
        Some("") => return Err(invalid("invalid device name")),
        Some(name) => name.to_string(),
        None => {
            let index = state.globals.hw_devices.iter().filter(|d| d.kind == kind).count();
            format!("{}{}", kind, index)
        }
    };

    if state.globals.hw_device(&name).is_some() {
        return Err(invalid("named device already exists"));
    }

    if let Some(source) = args.strip_prefix('@') {
        if state.globals.hw_device(source).is_none() {
            return Err(invalid("invalid source device name"));
        }
    }

    state.debug(format!("Device creation requested: {} ({}).", name, kind));
    state.globals.hw_devices.push(HwDevice {
        name,
        kind: kind.to_string(),
        args: args.trim_start_matches(':').to_string(),
    });
    Ok(())
}

pub fn opt_init_hw_device(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    if arg == "list" {
        state.info("Supported hardware device types:");
        for kind in HW_DEVICE_TYPES {
            state.info(*kind);
        }
        return Err(OptionError::Exit);
    }
    hw_device_init_from_string(state, arg)
}

pub fn opt_filter_hw_device(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    if state.globals.filter_hw_device.is_some() {
        return Err(OptionError::invalid("Only one filter device can be used."));
    }
    if state.globals.hw_device(arg).is_none() {
        return Err(OptionError::invalid(format!("Invalid filter device {}.", arg)));
    }
    state.globals.filter_hw_device = Some(arg.to_string());
    Ok(())
}

pub fn opt_vaapi_device(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    hw_device_init_from_string(state, &format!("vaapi:{}", arg))
}

pub fn opt_qsv_device(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    hw_device_init_from_string(
        state,
        &format!("qsv=__qsv_device:hw_any,child_device={}", arg),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::options::context::SpecField;
    use crate::options::state::ParseEnv;
    use crate::options::table::OptValue;

    fn with_state<T>(f: impl FnOnce(&mut ParseState<'_>) -> T) -> T {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        f(&mut state)
    }

    fn specs(o: &OptionsContext, field: SpecField) -> Vec<(String, String)> {
        o.specs(field)
            .iter()
            .map(|s| (s.specifier.clone(), s.value.to_string()))
            .collect()
    }

    #[test]
    fn shorthands_dispatch_to_specifier_options() {
        with_state(|state| {
            let mut o = OptionsContext::default();
            opt_video_codec(state, &mut o, "vcodec", "libx264").unwrap();
            opt_audio_codec(state, &mut o, "acodec", "aac").unwrap();
            opt_video_frames(state, &mut o, "vframes", "10").unwrap();
            opt_old2new(state, &mut o, "atag", "mp4a").unwrap();
            opt_audio_filters(state, &mut o, "af", "volume=2").unwrap();

            assert_eq!(
                specs(&o, SpecField::CodecName),
                vec![("v".into(), "libx264".into()), ("a".into(), "aac".into())]
            );
            assert_eq!(specs(&o, SpecField::MaxFrames), vec![("v".into(), "10".into())]);
            assert_eq!(specs(&o, SpecField::CodecTag), vec![("a".into(), "mp4a".into())]);
            assert_eq!(specs(&o, SpecField::Filter), vec![("a".into(), "volume=2".into())]);
        });
    }

    #[test]
    fn bitrate_variants() {
        with_state(|state| {
            let mut o = OptionsContext::default();
            opt_bitrate(state, &mut o, "b", "1M").unwrap();
            opt_bitrate(state, &mut o, "ab", "128k").unwrap();
            opt_bitrate(state, &mut o, "b:v:1", "500k").unwrap();
            assert_eq!(o.codec_opts.get("b:v"), Some("1M"));
            assert_eq!(o.codec_opts.get("b:a"), Some("128k"));
            assert_eq!(o.codec_opts.get("b:v:1"), Some("500k"));
        });
    }

    #[test]
    fn qscale_maps_to_q() {
        with_state(|state| {
            let mut o = OptionsContext::default();
            opt_qscale(state, &mut o, "qscale", "2").unwrap();
            opt_qscale(state, &mut o, "qscale:a", "4").unwrap();
            let q = o.specs(SpecField::Qscale);
            assert_eq!(q[0].specifier, "v");
            assert_eq!(q[0].value, OptValue::Double(2.0));
            assert_eq!(q[1].specifier, "a");
        });
    }

    #[test]
    fn streamid_needs_index_and_value() {
        with_state(|state| {
            let mut o = OptionsContext::default();
            opt_streamid(state, &mut o, "streamid", "0:33").unwrap();
            assert_eq!(o.streamid.get("0"), Some("33"));
            let err = opt_streamid(state, &mut o, "streamid", "33").unwrap_err();
            assert!(err.to_string().contains("required syntax is 'index:value'"));
            assert!(opt_streamid(state, &mut o, "streamid", "5000:1").is_err());
        });
    }

    #[test]
    fn timecode_sets_metadata_and_codec_option() {
        with_state(|state| {
            let mut o = OptionsContext::default();
            opt_timecode(state, &mut o, "timecode", "01:00:00:00").unwrap();
            assert_eq!(
                specs(&o, SpecField::Metadata),
                vec![("g".into(), "timecode=01:00:00:00".into())]
            );
            assert_eq!(o.codec_opts.get("gop_timecode"), Some("01:00:00:00"));
        });
    }

    #[test]
    fn recording_timestamp_becomes_creation_time() {
        with_state(|state| {
            let mut o = OptionsContext::default();
            opt_recording_timestamp(state, &mut o, "timestamp", "2020-01-02T03:04:05Z").unwrap();
            assert_eq!(
                specs(&o, SpecField::Metadata),
                vec![("".into(), "creation_time=2020-01-02T03:04:05+0000".into())]
            );
        });
    }

    #[test]
    fn stats_period_must_be_positive() {
        with_state(|state| {
            opt_stats_period(state, "stats_period", "0.25").unwrap();
            assert_eq!(state.globals.stats_period, 250_000);
            assert!(opt_stats_period(state, "stats_period", "0").is_err());
        });
    }

    #[test]
    fn abort_on_flags() {
        with_state(|state| {
            opt_abort_on(state, "abort_on", "empty_output+empty_output_stream").unwrap();
            assert_eq!(state.globals.abort_on_flags, 3);
            assert!(opt_abort_on(state, "abort_on", "nope").is_err());
        });
    }

    #[test]
    fn vsync_accepts_names_and_numbers() {
        with_state(|state| {
            opt_vsync(state, "vsync", "vfr").unwrap();
            assert_eq!(state.globals.video_sync_method, VideoSyncMethod::Vfr);
            opt_vsync(state, "vsync", "1").unwrap();
            assert_eq!(state.globals.video_sync_method, VideoSyncMethod::Cfr);
            assert!(opt_vsync(state, "vsync", "7").is_err());
        });
    }

    #[test]
    fn progress_dash_is_pipe() {
        with_state(|state| {
            opt_progress(state, "progress", "-").unwrap();
            assert_eq!(state.globals.progress_url.as_deref(), Some("pipe:"));
        });
    }

    #[test]
    fn loglevel_validation() {
        with_state(|state| {
            opt_loglevel(state, "loglevel", "repeat+level+warning").unwrap();
            assert_eq!(state.globals.log_level.as_deref(), Some("repeat+level+warning"));
            opt_loglevel(state, "v", "24").unwrap();
            assert!(opt_loglevel(state, "v", "chatty").is_err());
        });
    }

    #[test]
    fn hardware_devices() {
        with_state(|state| {
            opt_init_hw_device(state, "init_hw_device", "vaapi=va:/dev/dri/renderD128").unwrap();
            opt_vaapi_device(state, "vaapi_device", "/dev/dri/renderD129").unwrap();
            assert_eq!(state.globals.hw_devices[1].name, "vaapi1");
            assert_eq!(state.globals.hw_devices[0].args, "/dev/dri/renderD128");

            let err = opt_init_hw_device(state, "init_hw_device", "vaapi=va").unwrap_err();
            assert!(err.to_string().contains("named device already exists"));
            assert!(opt_init_hw_device(state, "init_hw_device", "glide").is_err());

            assert!(opt_filter_hw_device(state, "filter_hw_device", "missing").is_err());
            opt_filter_hw_device(state, "filter_hw_device", "va").unwrap();
            let err = opt_filter_hw_device(state, "filter_hw_device", "vaapi1").unwrap_err();
            assert_eq!(err.to_string(), "Only one filter device can be used.");

            assert!(matches!(
                opt_init_hw_device(state, "init_hw_device", "list"),
                Err(OptionError::Exit)
            ));
        });
    }
}
