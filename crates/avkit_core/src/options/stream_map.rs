//! `-map` parsing and automatic stream selection.

use super::context::{AudioChannelMap, OptionsContext, StreamMap};
use super::errors::{OptionError, OptionsResult};
use super::specifier::StreamSpecifier;
use super::state::ParseState;
use crate::logging::LogLevel;
use crate::models::{InputFile, MediaType};

/// Split a leading decimal file index from a map argument; no digits means
/// file 0.
fn split_file_index(map: &str) -> (i64, &str) {
    let end = map
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(map.len());
    (map[..end].parse().unwrap_or(0), &map[end..])
}

/// `-map [-]input_file_id[:stream_specifier][?]` or `-map [linklabel]`.
pub fn opt_map(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    _opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    let (negative, body) = match arg.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, arg),
    };

    let mut map = body;
    if let Some((head, _sync)) = map.split_once(',') {
        state.warning("Specifying a sync stream is deprecated and has no effect");
        map = head;
    }

    if let Some(label) = map.strip_prefix('[') {
        let label = match label.split_once(']') {
            Some((label, _)) if !label.is_empty() => label,
            _ => {
                let message = format!("Invalid output link label: {}.", map);
                state.error(&message);
                return Err(OptionError::invalid(message));
            }
        };
        o.stream_maps.push(StreamMap {
            disabled: false,
            file_index: 0,
            stream_index: 0,
            linklabel: Some(label.to_string()),
        });
        return Ok(());
    }

    let (map, allow_unused) = match map.split_once('?') {
        Some((head, _)) => (head, true),
        None => (map, false),
    };

    let (index, rest) = split_file_index(map);
    let file_index = match usize::try_from(index) {
        Ok(i) if i < state.inputs.len() => i,
        _ => {
            let message = format!("Invalid input file index: {}.", index);
            state.log(LogLevel::Fatal, &message);
            return Err(OptionError::invalid(message));
        }
    };
    let spec = StreamSpecifier::parse(rest.strip_prefix(':').unwrap_or(rest))?;
    let file = &state.inputs[file_index];

    let mut matched = false;
    let mut disabled = false;

    if negative {
        // Only a negative map with nothing before it counts as unmatched.
        matched = !o.stream_maps.is_empty();
        for m in o.stream_maps.iter_mut() {
            if m.linklabel.is_none()
                && m.file_index == file_index
                && spec.matches(&file.streams, m.stream_index)
            {
                m.disabled = true;
            }
        }
    } else {
        for (i, stream) in file.streams.iter().enumerate() {
            if !spec.matches(&file.streams, i) {
                continue;
            }
            if stream.discard {
                disabled = true;
                continue;
            }
            o.stream_maps.push(StreamMap {
                disabled: false,
                file_index,
                stream_index: i,
                linklabel: None,
            });
            matched = true;
        }
    }

    if !matched {
        if allow_unused {
            state.verbose(format!("Stream map '{}' matches no streams; ignoring.", arg));
        } else if disabled {
            let message = format!(
                "Stream map '{}' matches disabled streams.\nTo ignore this, add a trailing '?' to the map.",
                arg
            );
            state.log(LogLevel::Fatal, &message);
            return Err(OptionError::invalid(message));
        } else {
            let message = format!(
                "Stream map '{}' matches no streams.\nTo ignore this, add a trailing '?' to the map.",
                arg
            );
            state.log(LogLevel::Fatal, &message);
            return Err(OptionError::invalid(message));
        }
    }

    Ok(())
}

/// Leading integers of `arg` separated by `separators`, stopping at the
/// first mismatch.
fn scan_ints(arg: &str, separators: &[char]) -> Vec<i32> {
    let mut values = Vec::new();
    let mut rest = arg;
    loop {
        let digits = rest.strip_prefix(['-', '+']).unwrap_or(rest);
        let sign_len = rest.len() - digits.len();
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        let Some(value) = (end > 0)
            .then(|| rest[..sign_len + end].parse::<i32>().ok())
            .flatten()
        else {
            break;
        };
        values.push(value);
        rest = &digits[end..];

        let Some(&sep) = separators.get(values.len() - 1) else {
            break;
        };
        match rest.strip_prefix(sep) {
            Some(next) => rest = next,
            None => break,
        }
    }
    values
}

fn fail(state: &ParseState<'_>, message: String) -> OptionsResult<()> {
    state.log(LogLevel::Fatal, &message);
    Err(OptionError::invalid(message))
}

/// `-map_channel [file.stream.channel|-1][:ofile.ostream][?]`.
pub fn opt_map_channel(
    state: &mut ParseState<'_>,
    o: &mut OptionsContext,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    state.warning(format!(
        "The -{} option is deprecated and will be removed. It can be replaced by the 'pan' filter, \
         or in some cases by combinations of 'channelsplit', 'channelmap', 'amerge' filters.",
        opt
    ));

    let muted = scan_ints(arg, &[':', '.']);
    if muted.first() == Some(&-1) && matches!(muted.len(), 1 | 3) {
        o.audio_channel_maps.push(AudioChannelMap {
            source: None,
            channel_index: -1,
            output: (muted.len() == 3).then(|| (muted[1], muted[2])),
        });
        return Ok(());
    }

    let fields = scan_ints(arg, &['.', '.', ':', '.']);
    let (file, stream, channel, output) = match fields.as_slice() {
        [f, s, c] => (*f, *s, *c, None),
        [f, s, c, of, os] => (*f, *s, *c, Some((*of, *os))),
        _ => {
            return fail(
                state,
                "Syntax error, mapchan usage: [file.stream.channel|-1][:syncfile:syncstream]".into(),
            )
        }
    };

    let Some(input) = usize::try_from(file).ok().and_then(|f| state.inputs.get(f)) else {
        return fail(state, format!("mapchan: invalid input file index: {}", file));
    };
    let Some(st) = usize::try_from(stream).ok().and_then(|s| input.streams.get(s)) else {
        return fail(
            state,
            format!("mapchan: invalid input file stream index #{}.{}", file, stream),
        );
    };
    if st.media_type != MediaType::Audio {
        return fail(
            state,
            format!("mapchan: stream #{}.{} is not an audio stream.", file, stream),
        );
    }

    let channels = st.channels.unwrap_or(0);
    let usable = u32::try_from(channel).is_ok_and(|c| c < channels) && !st.discard;
    if !usable {
        let message = format!("mapchan: invalid audio channel #{}.{}.{}", file, stream, channel);
        if arg.contains('?') {
            state.verbose(&message);
            return Ok(());
        }
        return fail(
            state,
            format!("{}\nTo ignore this, add a trailing '?' to the map_channel.", message),
        );
    }

    o.audio_channel_maps.push(AudioChannelMap {
        source: Some((file as usize, stream as usize)),
        channel_index: channel,
        output,
    });
    Ok(())
}

/// Stream types an output format can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSelect {
    pub video: bool,
    pub audio: bool,
    pub subtitle: bool,
}

fn usable(file: &InputFile, index: usize) -> bool {
    !file.streams[index].discard
}

/// Pick streams for an output without `-map`: the largest video (cover art
/// only as a last resort), the audio with most channels and the first
/// subtitle. Returns `(file, stream)` pairs.
pub fn auto_select_streams(inputs: &[InputFile], want: AutoSelect) -> Vec<(usize, usize)> {
    let mut selected = Vec::new();

    if want.video {
        let mut best: Option<((usize, usize), u64)> = None;
        for (f, file) in inputs.iter().enumerate() {
            for (s, stream) in file.streams.iter().enumerate() {
                if stream.media_type != MediaType::Video || !usable(file, s) {
                    continue;
                }
                let score = if stream.attached_pic { 1 } else { 2 + stream.area() };
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some(((f, s), score));
                }
            }
        }
        selected.extend(best.map(|(idx, _)| idx));
    }

    if want.audio {
        let mut best: Option<((usize, usize), u32)> = None;
        for (f, file) in inputs.iter().enumerate() {
            for (s, stream) in file.streams.iter().enumerate() {
                if stream.media_type != MediaType::Audio || !usable(file, s) {
                    continue;
                }
                let score = 1 + stream.channels.unwrap_or(0);
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some(((f, s), score));
                }
            }
        }
        selected.extend(best.map(|(idx, _)| idx));
    }

    if want.subtitle {
        let first = inputs.iter().enumerate().find_map(|(f, file)| {
            file.streams
                .iter()
                .enumerate()
                .find(|(s, stream)| stream.media_type == MediaType::Subtitle && usable(file, *s))
                .map(|(s, _)| (f, s))
        });
        selected.extend(first);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::models::StreamInfo;
    use crate::options::state::ParseEnv;

    fn movie() -> InputFile {
        InputFile::new("movie.mkv", "matroska,webm")
            .with_stream(StreamInfo::new(0, MediaType::Video).with_size(1920, 1080))
            .with_stream(StreamInfo::new(0, MediaType::Audio).with_audio(48000, 2))
            .with_stream(StreamInfo::new(0, MediaType::Audio).with_audio(48000, 6))
            .with_stream(StreamInfo::new(0, MediaType::Subtitle))
    }

    fn run(inputs: Vec<InputFile>, args: &[&str]) -> (OptionsResult<()>, OptionsContext) {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        state.inputs = inputs;
        let mut o = OptionsContext::default();
        let mut result = Ok(());
        for arg in args {
            result = opt_map(&mut state, &mut o, "map", arg);
            if result.is_err() {
                break;
            }
        }
        (result, o)
    }

    fn active(o: &OptionsContext) -> Vec<(usize, usize)> {
        o.stream_maps
            .iter()
            .filter(|m| !m.disabled && m.linklabel.is_none())
            .map(|m| (m.file_index, m.stream_index))
            .collect()
    }

    #[test]
    fn positive_maps_add_matching_streams() {
        let (result, o) = run(vec![movie()], &["0:a"]);
        result.unwrap();
        assert_eq!(active(&o), vec![(0, 1), (0, 2)]);

        let (result, o) = run(vec![movie()], &["0"]);
        result.unwrap();
        assert_eq!(active(&o).len(), 4);
    }

    #[test]
    fn negative_maps_disable_previous_entries() {
        let (result, o) = run(vec![movie()], &["0", "-0:a:1"]);
        result.unwrap();
        assert_eq!(active(&o), vec![(0, 0), (0, 1), (0, 3)]);
    }

    #[test]
    fn optional_maps_are_ignored() {
        let (result, o) = run(vec![movie()], &["0:d?"]);
        result.unwrap();
        assert!(o.stream_maps.is_empty());

        let (result, _) = run(vec![movie()], &["0:d"]);
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("Stream map '0:d' matches no streams."));
    }

    #[test]
    fn discarded_streams_have_their_own_error() {
        let mut file = movie();
        file.streams[3].discard = true;
        let (result, _) = run(vec![file], &["0:s"]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("matches disabled streams"));
    }

    #[test]
    fn negative_map_needs_an_earlier_map() {
        let (result, _) = run(vec![movie()], &["-0:v"]);
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("Stream map '-0:v' matches no streams."));
        assert_eq!(err.code(), crate::error_code::EINVAL);

        let (result, o) = run(vec![movie()], &["0:a", "-0:v"]);
        result.unwrap();
        assert_eq!(active(&o), vec![(0, 1), (0, 2)]);
    }

    fn map_channels(inputs: Vec<InputFile>, args: &[&str]) -> (OptionsResult<()>, OptionsContext) {
        let env = ParseEnv::default();
        let mut state = ParseState::new(&env, &TracingSink);
        state.inputs = inputs;
        let mut o = OptionsContext::default();
        let mut result = Ok(());
        for arg in args {
            result = opt_map_channel(&mut state, &mut o, "map_channel", arg);
            if result.is_err() {
                break;
            }
        }
        (result, o)
    }

    #[test]
    fn channel_maps_parse_both_forms() {
        let (result, o) = map_channels(vec![movie()], &["0.2.5", "0.1.0:0.1", "-1", "-1:0.2"]);
        result.unwrap();
        assert_eq!(
            o.audio_channel_maps,
            vec![
                AudioChannelMap { source: Some((0, 2)), channel_index: 5, output: None },
                AudioChannelMap { source: Some((0, 1)), channel_index: 0, output: Some((0, 1)) },
                AudioChannelMap { source: None, channel_index: -1, output: None },
                AudioChannelMap { source: None, channel_index: -1, output: Some((0, 2)) },
            ]
        );
    }

    #[test]
    fn channel_maps_reject_bad_sources() {
        let cases = [
            ("0.1", "Syntax error, mapchan usage"),
            ("0.1.0:0", "Syntax error, mapchan usage"),
            ("-1:0", "Syntax error, mapchan usage"),
            ("1.0.0", "mapchan: invalid input file index: 1"),
            ("0.9.0", "mapchan: invalid input file stream index #0.9"),
            ("0.0.0", "mapchan: stream #0.0 is not an audio stream."),
            ("0.1.2", "mapchan: invalid audio channel #0.1.2"),
        ];
        for (arg, expected) in cases {
            let (result, o) = map_channels(vec![movie()], &[arg]);
            let err = result.unwrap_err();
            assert!(err.to_string().starts_with(expected), "{}: {}", arg, err);
            assert_eq!(err.code(), crate::error_code::EINVAL);
            assert!(o.audio_channel_maps.is_empty());
        }
    }

    #[test]
    fn optional_channel_maps_are_ignored() {
        let mut file = movie();
        file.streams[2].discard = true;
        let (result, o) = map_channels(vec![file], &["0.1.7?", "0.2.0?"]);
        result.unwrap();
        assert!(o.audio_channel_maps.is_empty());

        let (result, _) = map_channels(vec![movie()], &["0.1.7"]);
        assert!(result.unwrap_err().to_string().contains("add a trailing '?' to the map_channel"));
    }

    #[test]
    fn bad_file_index() {
        let (result, _) = run(vec![movie()], &["3:v"]);
        assert_eq!(result.unwrap_err().to_string(), "Invalid input file index: 3.");
        let (result, _) = run(vec![movie()], &["x"]);
        assert!(result.is_err());
    }

    #[test]
    fn labels() {
        let (result, o) = run(vec![], &["[out]"]);
        result.unwrap();
        assert_eq!(o.stream_maps[0].linklabel.as_deref(), Some("out"));

        let (result, _) = run(vec![], &["[out"]);
        assert!(result.unwrap_err().to_string().starts_with("Invalid output link label"));
    }

    #[test]
    fn sync_suffix_is_dropped() {
        let (result, o) = run(vec![movie()], &["0:v,0:a"]);
        result.unwrap();
        assert_eq!(active(&o), vec![(0, 0)]);
    }

    #[test]
    fn automatic_selection() {
        let mut cover = InputFile::new("cover.mp3", "mp3")
            .with_stream(StreamInfo::new(0, MediaType::Audio).with_audio(44100, 2))
            .with_stream(StreamInfo::new(0, MediaType::Video).with_size(3000, 3000));
        cover.streams[1].attached_pic = true;
        let inputs = vec![cover, movie()];

        let all = AutoSelect { video: true, audio: true, subtitle: true };
        assert_eq!(auto_select_streams(&inputs, all), vec![(1, 0), (1, 2), (1, 3)]);

        let audio_only = AutoSelect { video: false, audio: true, subtitle: false };
        assert_eq!(auto_select_streams(&inputs[..1], audio_only), vec![(0, 0)]);

        let video_only = AutoSelect { video: true, audio: false, subtitle: false };
        assert_eq!(auto_select_streams(&inputs[..1], video_only), vec![(0, 1)]);
    }
}
