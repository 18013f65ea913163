//! `-target`: VCD, SVCD, DVD and DV presets.

use super::context::OptionsContext;
use super::errors::{OptionError, OptionsResult};
use super::handlers::{opt_audio_codec, opt_video_codec};
use super::parser::parse_option;
use super::state::ParseState;
use crate::logging::LogLevel;
use crate::models::{InputFile, MediaType, Rational};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Norm {
    Pal,
    Ntsc,
    Film,
}

impl Norm {
    fn frame_rate(self) -> &'static str {
        match self {
            Norm::Pal => "25",
            Norm::Ntsc => "30000/1001",
            Norm::Film => "24000/1001",
        }
    }

    fn gop(self) -> &'static str {
        if self == Norm::Pal {
            "15"
        } else {
            "18"
        }
    }
}

/// Guess the norm from the frame rate of the first recognisable video stream.
fn detect_norm(inputs: &[InputFile]) -> Option<Norm> {
    inputs
        .iter()
        .flat_map(|file| file.streams.iter())
        .filter(|s| s.media_type == MediaType::Video)
        .find_map(|s| {
            let rate = s
                .frame_rate
                .filter(Rational::is_valid)
                .unwrap_or(Rational::new(s.time_base.den, s.time_base.num));
            if rate.den == 0 {
                return None;
            }
            match rate.num * 1000 / rate.den {
                25000 => Some(Norm::Pal),
                29970 | 23976 => Some(Norm::Ntsc),
                _ => None,
            }
        })
}

pub fn opt_target(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    let (norm, target) = if let Some(rest) = arg.strip_prefix("pal-") {
        (Some(Norm::Pal), rest)
    } else if let Some(rest) = arg.strip_prefix("ntsc-") {
        (Some(Norm::Ntsc), rest)
    } else if let Some(rest) = arg.strip_prefix("film-") {
        (Some(Norm::Film), rest)
    } else {
        let norm = detect_norm(&state.inputs);
        if let Some(norm) = norm {
            let name = if norm == Norm::Pal { "PAL" } else { "NTSC" };
            state.info(format!("Assuming {} for target.", name));
        }
        (norm, arg)
    };

    let Some(norm) = norm else {
        state.log(LogLevel::Fatal, "Could not determine norm (PAL/NTSC/NTSC-Film) for target.");
        state.log(LogLevel::Fatal, "Please prefix target with \"pal-\", \"ntsc-\" or \"film-\",");
        state.log(LogLevel::Fatal, "or set a framerate with \"-r xxx\".");
        return Err(OptionError::invalid(
            "Could not determine norm (PAL/NTSC/NTSC-Film) for target.",
        ));
    };
    let pal = norm == Norm::Pal;

    match target {
        "vcd" => {
            opt_video_codec(state, o, "c:v", "mpeg1video")?;
            opt_audio_codec(state, o, "c:a", "mp2")?;
            parse_option(state, Some(o), "f", "vcd")?;
            parse_option(state, Some(o), "s", if pal { "352x288" } else { "352x240" })?;
            parse_option(state, Some(o), "r", norm.frame_rate())?;
            o.codec_opts.set_if_absent("g", norm.gop());

            o.codec_opts.set_if_absent("b:v", "1150000");
            o.codec_opts.set_if_absent("maxrate:v", "1150000");
            o.codec_opts.set_if_absent("minrate:v", "1150000");
            o.codec_opts.set_if_absent("bufsize:v", "327680");

            o.codec_opts.set_if_absent("b:a", "224000");
            parse_option(state, Some(o), "ar", "44100")?;
            parse_option(state, Some(o), "ac", "2")?;

            o.format_opts.set_if_absent("packetsize", "2324");
            o.format_opts.set_if_absent("muxrate", "1411200");

            // 36000 + 3 * 1200 ticks of the 90 kHz clock
            o.mux_preload = 0.44;
        }
        "svcd" => {
            opt_video_codec(state, o, "c:v", "mpeg2video")?;
            opt_audio_codec(state, o, "c:a", "mp2")?;
            parse_option(state, Some(o), "f", "svcd")?;
            parse_option(state, Some(o), "s", if pal { "480x576" } else { "480x480" })?;
            parse_option(state, Some(o), "r", norm.frame_rate())?;
            parse_option(state, Some(o), "pix_fmt", "yuv420p")?;
            o.codec_opts.set_if_absent("g", norm.gop());

            o.codec_opts.set_if_absent("b:v", "2040000");
            o.codec_opts.set_if_absent("maxrate:v", "2516000");
            o.codec_opts.set_if_absent("minrate:v", "0");
            o.codec_opts.set_if_absent("bufsize:v", "1835008");
            o.codec_opts.set_if_absent("scan_offset", "1");

            o.codec_opts.set_if_absent("b:a", "224000");
            parse_option(state, Some(o), "ar", "44100")?;

            o.format_opts.set_if_absent("packetsize", "2324");
        }
        "dvd" => {
            opt_video_codec(state, o, "c:v", "mpeg2video")?;
            opt_audio_codec(state, o, "c:a", "ac3")?;
            parse_option(state, Some(o), "f", "dvd")?;
            parse_option(state, Some(o), "s", if pal { "720x576" } else { "720x480" })?;
            parse_option(state, Some(o), "r", norm.frame_rate())?;
            parse_option(state, Some(o), "pix_fmt", "yuv420p")?;
            o.codec_opts.set_if_absent("g", norm.gop());

            o.codec_opts.set_if_absent("b:v", "6000000");
            o.codec_opts.set_if_absent("maxrate:v", "9000000");
            o.codec_opts.set_if_absent("minrate:v", "0");
            o.codec_opts.set_if_absent("bufsize:v", "1835008");

            // one DVD sector per pack
            o.format_opts.set_if_absent("packetsize", "2048");
            o.format_opts.set_if_absent("muxrate", "10080000");

            o.codec_opts.set_if_absent("b:a", "448000");
            parse_option(state, Some(o), "ar", "48000")?;
        }
        t if t.starts_with("dv") => {
            parse_option(state, Some(o), "f", "dv")?;
            parse_option(state, Some(o), "s", if pal { "720x576" } else { "720x480" })?;
            let pix_fmt = if t.starts_with("dv50") {
                "yuv422p"
            } else if pal {
                "yuv420p"
            } else {
                "yuv411p"
            };
            parse_option(state, Some(o), "pix_fmt", pix_fmt)?;
            parse_option(state, Some(o), "r", norm.frame_rate())?;
            parse_option(state, Some(o), "ar", "48000")?;
            parse_option(state, Some(o), "ac", "2")?;
        }
        _ => {
            let message = format!("Unknown target: {}", target);
            state.error(&message);
            return Err(OptionError::invalid(message));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::models::StreamInfo;
    use crate::options::context::SpecField;
    use crate::options::state::ParseEnv;

    fn last(o: &OptionsContext, field: SpecField) -> String {
        o.specs(field).last().map(|s| s.value.to_string()).unwrap_or_default()
    }

    #[test]
    fn pal_dvd() {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();
        opt_target(&mut state, &mut o, "target", "pal-dvd").unwrap();

        assert_eq!(o.format.as_deref(), Some("dvd"));
        assert_eq!(last(&o, SpecField::FrameSize), "720x576");
        assert_eq!(last(&o, SpecField::FrameRate), "25");
        assert_eq!(last(&o, SpecField::SampleRate), "48000");
        assert_eq!(o.codec_opts.get("g"), Some("15"));
        assert_eq!(o.format_opts.get("muxrate"), Some("10080000"));
        let codecs: Vec<_> = o.specs(SpecField::CodecName).iter().map(|s| s.value.to_string()).collect();
        assert_eq!(codecs, vec!["mpeg2video", "ac3"]);
    }

    #[test]
    fn user_codec_options_are_kept() {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();
        o.codec_opts.set("b:v", "3000000");
        opt_target(&mut state, &mut o, "target", "ntsc-vcd").unwrap();
        assert_eq!(o.codec_opts.get("b:v"), Some("3000000"));
        assert_eq!(o.codec_opts.get("g"), Some("18"));
        assert!((o.mux_preload - 0.44).abs() < f32::EPSILON);
    }

    #[test]
    fn dv_pixel_formats() {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);

        let mut o = OptionsContext::default();
        opt_target(&mut state, &mut o, "target", "ntsc-dv").unwrap();
        assert_eq!(last(&o, SpecField::PixFmt), "yuv411p");

        let mut o = OptionsContext::default();
        opt_target(&mut state, &mut o, "target", "film-dv50").unwrap();
        assert_eq!(last(&o, SpecField::PixFmt), "yuv422p");
        assert_eq!(last(&o, SpecField::FrameRate), "24000/1001");
    }

    #[test]
    fn norm_is_detected_from_inputs() {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        state.inputs.push(
            InputFile::new("in.mpg", "mpeg")
                .with_stream(StreamInfo::new(0, MediaType::Video).with_frame_rate(Rational::new(30000, 1001))),
        );
        let mut o = OptionsContext::default();
        opt_target(&mut state, &mut o, "target", "svcd").unwrap();
        assert_eq!(last(&o, SpecField::FrameSize), "480x480");
    }

    #[test]
    fn detected_norm_is_reported() {
        #[derive(Default)]
        struct Info(parking_lot::Mutex<Vec<String>>);

        impl crate::logging::LogSink for Info {
            fn log(&self, level: LogLevel, message: &str) {
                if level == LogLevel::Info {
                    self.0.lock().push(message.to_string());
                }
            }
        }

        let env = ParseEnv::default();
        let sink = Info::default();
        let mut state = ParseState::new(&env, &sink);
        state.inputs.push(
            InputFile::new("in.mpg", "mpeg")
                .with_stream(StreamInfo::new(0, MediaType::Video).with_frame_rate(Rational::new(25, 1))),
        );
        let mut o = OptionsContext::default();
        opt_target(&mut state, &mut o, "target", "dvd").unwrap();
        assert!(sink.0.lock().iter().any(|m| m == "Assuming PAL for target."));
    }

    #[test]
    fn unknown_norm_and_target() {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();
        let err = opt_target(&mut state, &mut o, "target", "vcd").unwrap_err();
        assert_eq!(err.code(), crate::error_code::EINVAL);

        let err = opt_target(&mut state, &mut o, "target", "pal-bluray").unwrap_err();
        assert_eq!(err.to_string(), "Unknown target: bluray");
    }
}
