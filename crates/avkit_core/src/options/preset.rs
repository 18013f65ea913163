//! Preset files: `-fpre`/`-vpre`/`-apre`/`-spre` and per-stream `-pre`.
//!
//! Preset files hold one `key=value` pair per line; empty lines and lines
//! starting with `#` are skipped.

use std::path::{Path, PathBuf};

use super::context::{OptionsContext, SpecField};
use super::errors::{OptionError, OptionsResult};
use super::handlers::{opt_audio_codec, opt_data_codec, opt_subtitle_codec, opt_video_codec};
use super::split::is_format_option;
use super::state::{ParseEnv, ParseState};
use crate::logging::LogLevel;
use crate::models::MediaType;

/// Locate `<name>.<ext>`, then `<codec>-<name>.<ext>`, in each preset
/// directory in turn.
pub fn find_preset_file(env: &ParseEnv, name: &str, codec: Option<&str>, ext: &str) -> Option<PathBuf> {
    env.preset_search_dirs().into_iter().find_map(|dir| {
        let plain = dir.join(format!("{}.{}", name, ext));
        if plain.is_file() {
            return Some(plain);
        }
        let with_codec = dir.join(format!("{}-{}.{}", codec?, name, ext));
        with_codec.is_file().then_some(with_codec)
    })
}

/// Parse preset text into key/value pairs.
///
/// `Err` carries the offending line.
fn parse_preset_lines(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                pairs.push((key.to_string(), value.to_string()));
            }
            _ => return Err(line.to_string()),
        }
    }
    Ok(pairs)
}

fn read_preset(path: &Path) -> OptionsResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| OptionError::io(format!("reading preset {}", path.display()), e))
}

fn media_type_of(opt: &str) -> Option<MediaType> {
    opt.chars().next().and_then(MediaType::from_specifier)
}

/// `-fpre file`, `-vpre name`, `-apre name`, `-spre name`.
pub fn opt_preset(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    let codec = media_type_of(opt)
        .and_then(|t| o.type_value(SpecField::CodecName, t))
        .map(|v| v.as_str().to_string());

    let path = if opt.starts_with('f') {
        Some(PathBuf::from(arg)).filter(|p| p.is_file())
    } else {
        find_preset_file(state.env, arg, codec.as_deref(), "ffpreset")
    };

    let Some(path) = path else {
        let message = if arg.starts_with("libx264-lossless") {
            "Please use -preset <speed> -qp 0".to_string()
        } else {
            format!("File for preset '{}' not found", arg)
        };
        state.log(LogLevel::Fatal, &message);
        return Err(OptionError::not_found(message));
    };

    let filename = path.display().to_string();
    let pairs = parse_preset_lines(&read_preset(&path)?).map_err(|line| {
        let message = format!("{}: Invalid syntax: '{}'", filename, line);
        state.log(LogLevel::Fatal, &message);
        OptionError::invalid(message)
    })?;

    for (key, value) in pairs {
        state.debug(format!("ffpreset[{}]: set '{}' = '{}'", filename, key, value));
        match key.as_str() {
            "acodec" => opt_audio_codec(state, o, &key, &value)?,
            "vcodec" => opt_video_codec(state, o, &key, &value)?,
            "scodec" => opt_subtitle_codec(state, o, &key, &value)?,
            "dcodec" => opt_data_codec(state, o, &key, &value)?,
            _ if is_format_option(&key) => o.format_opts.set(key, value),
            _ => o.codec_opts.set(key, value),
        }
    }
    Ok(())
}

/// Encoder options from the `-pre` preset of one output stream.
pub fn load_stream_preset(
    env: &ParseEnv,
    preset: &str,
    encoder: Option<&str>,
) -> OptionsResult<Vec<(String, String)>> {
    let path = find_preset_file(env, preset, encoder, "avpreset")
        .ok_or_else(|| OptionError::not_found(format!("Preset {} could not be opened.", preset)))?;
    parse_preset_lines(&read_preset(&path)?)
        .map_err(|_| OptionError::invalid("Invalid line found in the preset file."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::options::table::OptValue;

    fn env_for(dir: &Path) -> ParseEnv {
        ParseEnv::default().with_preset_dirs(vec![dir.to_path_buf()])
    }

    #[test]
    fn named_preset_applies_options() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("libx264-fast.ffpreset"),
            "# speed\n\nvcodec=libx264\ncoder=1\nflags=+loop\npacketsize=188\n",
        )
        .unwrap();

        let env = env_for(dir.path());
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();
        o.push_spec(SpecField::CodecName, "v", OptValue::Str("libx264".into()));
        opt_preset(&mut state, &mut o, "vpre", "fast").unwrap();

        assert_eq!(o.codec_opts.get("coder"), Some("1"));
        assert_eq!(o.codec_opts.get("flags"), Some("+loop"));
        assert_eq!(o.format_opts.get("packetsize"), Some("188"));
        assert_eq!(o.specs(SpecField::CodecName).len(), 2);
    }

    #[test]
    fn plain_name_is_found_before_codec_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hq.ffpreset"), "g=250\n").unwrap();
        std::fs::write(dir.path().join("libx264-hq.ffpreset"), "g=1\n").unwrap();
        let env = env_for(dir.path());
        let found = find_preset_file(&env, "hq", Some("libx264"), "ffpreset").unwrap();
        assert_eq!(found.file_name().unwrap(), "hq.ffpreset");
    }

    #[test]
    fn preset_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.txt");
        std::fs::write(&path, "b=1M\r\n").unwrap();

        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();
        opt_preset(&mut state, &mut o, "fpre", path.to_str().unwrap()).unwrap();
        assert_eq!(o.codec_opts.get("b"), Some("1M"));
    }

    #[test]
    fn missing_and_malformed_presets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.ffpreset"), "novalue\n").unwrap();
        let env = env_for(dir.path());
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();

        let err = opt_preset(&mut state, &mut o, "vpre", "nothere").unwrap_err();
        assert_eq!(err.to_string(), "File for preset 'nothere' not found");
        assert_eq!(err.code(), crate::error_code::ENOENT);

        let err = opt_preset(&mut state, &mut o, "vpre", "libx264-lossless_fast").unwrap_err();
        assert_eq!(err.to_string(), "Please use -preset <speed> -qp 0");

        let err = opt_preset(&mut state, &mut o, "vpre", "bad").unwrap_err();
        assert!(err.to_string().ends_with("Invalid syntax: 'novalue'"));
    }

    #[test]
    fn stream_presets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libvpx-720p.avpreset"), "crf=10\nqmax=42\n").unwrap();
        let env = env_for(dir.path());
        let pairs = load_stream_preset(&env, "720p", Some("libvpx")).unwrap();
        assert_eq!(pairs[0], ("crf".to_string(), "10".to_string()));
        assert!(load_stream_preset(&env, "720p", Some("libx264")).is_err());
    }
}
