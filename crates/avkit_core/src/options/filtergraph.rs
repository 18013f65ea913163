//! Complex filter graph descriptions (`-filter_complex`).
//!
//! Graphs are executed by the engine. Here they are only split into chains
//! to learn their unconnected inputs and outputs, so that `[N:spec]` inputs
//! can be checked against the opened files and every output can be bound to
//! an output stream.

use serde::Serialize;

use super::errors::{OptionError, OptionsResult};
use super::specifier::StreamSpecifier;
use super::state::ParseState;
use crate::logging::LogLevel;
use crate::models::MediaType;

/// Filters whose pads carry audio.
const AUDIO_FILTERS: &[&str] = &[
    "abuffer", "abuffersink", "acompressor", "acrossfade", "adelay", "aecho", "aevalsrc",
    "afade", "afftdn", "afir", "aformat", "agate", "ahistogram", "aloop", "amerge", "amix",
    "amovie", "anull", "anullsink", "anullsrc", "apad", "aresample", "areverse", "aselect",
    "asetpts", "asetrate", "asplit", "astats", "atempo", "atrim", "channelmap", "channelsplit",
    "dynaudnorm", "earwax", "equalizer", "highpass", "join", "loudnorm", "lowpass", "pan",
    "sidechaincompress", "silencedetect", "silenceremove", "sine", "anoisesrc", "volume",
    "volumedetect",
];

/// Filters without inputs.
const SOURCE_FILTERS: &[&str] = &[
    "abuffer", "aevalsrc", "allrgb", "allyuv", "amovie", "anoisesrc", "anullsrc", "buffer",
    "cellauto", "color", "haldclutsrc", "life", "mandelbrot", "movie", "nullsrc",
    "rgbtestsrc", "sine", "smptebars", "smptehdbars", "testsrc", "testsrc2", "yuvtestsrc",
];

/// Filters without outputs.
const SINK_FILTERS: &[&str] = &["abuffersink", "anullsink", "buffersink", "nullsink"];

fn filter_media_type(name: &str) -> MediaType {
    if AUDIO_FILTERS.contains(&name) {
        MediaType::Audio
    } else {
        MediaType::Video
    }
}

/// An unconnected graph input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterInput {
    pub label: Option<String>,
    /// Filter the pad belongs to.
    pub filter: String,
    pub media_type: MediaType,
    /// Input stream feeding the pad, `(file, stream)`.
    pub source: Option<(usize, usize)>,
}

/// An unconnected graph output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutput {
    pub label: Option<String>,
    pub filter: String,
    pub media_type: MediaType,
    /// Output stream consuming the pad, `(file, stream)`.
    pub bound: Option<(usize, usize)>,
}

impl FilterOutput {
    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.filter)
    }
}

/// One `-filter_complex` graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterGraph {
    pub index: usize,
    pub description: String,
    pub inputs: Vec<FilterInput>,
    pub outputs: Vec<FilterOutput>,
}

struct ParsedFilter {
    name: String,
    in_labels: Vec<String>,
    out_labels: Vec<String>,
}

/// Split at `sep` outside quotes and brackets.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut depth = 0usize;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\'' => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => depth = depth.saturating_sub(1),
            c if c == sep && !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Read consecutive `[label]` groups at the start of `text`.
fn take_labels<'t>(mut text: &'t str, description: &str) -> OptionsResult<(Vec<String>, &'t str)> {
    let mut labels = Vec::new();
    loop {
        text = text.trim_start();
        let Some(rest) = text.strip_prefix('[') else {
            return Ok((labels, text));
        };
        let Some((label, tail)) = rest.split_once(']') else {
            return Err(OptionError::invalid(format!(
                "Unterminated label in filtergraph description: {}",
                description
            )));
        };
        if label.is_empty() {
            return Err(OptionError::invalid(format!(
                "Bad (empty?) label found in the following: \"{}\".",
                description
            )));
        }
        labels.push(label.to_string());
        text = tail;
    }
}

fn parse_filter(text: &str, description: &str) -> OptionsResult<ParsedFilter> {
    let (in_labels, rest) = take_labels(text, description)?;

    // filter body ends where the trailing labels start
    let body_end = {
        let mut end = rest.len();
        let mut quoted = false;
        for (i, c) in rest.char_indices() {
            match c {
                '\'' => quoted = !quoted,
                '[' if !quoted => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }
        end
    };
    let body = rest[..body_end].trim();
    let (out_labels, tail) = take_labels(&rest[body_end..], description)?;
    if !tail.trim().is_empty() {
        return Err(OptionError::invalid(format!(
            "Invalid filtergraph description: {}",
            description
        )));
    }

    let name_end = body.find(['=', '@']).unwrap_or(body.len());
    let name = body[..name_end].trim();
    if name.is_empty() {
        return Err(OptionError::invalid(format!(
            "No such filter: '' in filtergraph description {}",
            description
        )));
    }

    Ok(ParsedFilter {
        name: name.to_string(),
        in_labels,
        out_labels,
    })
}

impl FilterGraph {
    /// Split `description` into its unconnected inputs and outputs.
    pub fn parse(index: usize, description: &str) -> OptionsResult<FilterGraph> {
        let mut inputs: Vec<FilterInput> = Vec::new();
        let mut outputs: Vec<FilterOutput> = Vec::new();

        for chain in split_top_level(description, ';') {
            if chain.trim().is_empty() {
                continue;
            }
            let filters = split_top_level(chain, ',')
                .into_iter()
                .map(|f| parse_filter(f, description))
                .collect::<OptionsResult<Vec<_>>>()?;
            let last = filters.len().saturating_sub(1);

            for (position, filter) in filters.iter().enumerate() {
                let media_type = filter_media_type(&filter.name);
                for label in &filter.in_labels {
                    inputs.push(FilterInput {
                        label: Some(label.clone()),
                        filter: filter.name.clone(),
                        media_type,
                        source: None,
                    });
                }
                if position == 0
                    && filter.in_labels.is_empty()
                    && !SOURCE_FILTERS.contains(&filter.name.as_str())
                {
                    inputs.push(FilterInput {
                        label: None,
                        filter: filter.name.clone(),
                        media_type,
                        source: None,
                    });
                }
                for label in &filter.out_labels {
                    outputs.push(FilterOutput {
                        label: Some(label.clone()),
                        filter: filter.name.clone(),
                        media_type,
                        bound: None,
                    });
                }
                if position == last
                    && filter.out_labels.is_empty()
                    && !SINK_FILTERS.contains(&filter.name.as_str())
                {
                    outputs.push(FilterOutput {
                        label: None,
                        filter: filter.name.clone(),
                        media_type,
                        bound: None,
                    });
                }
            }
        }

        // labels produced and consumed inside the graph are internal links
        let mut i = 0;
        while i < outputs.len() {
            let linked = outputs[i].label.as_ref().and_then(|label| {
                inputs
                    .iter()
                    .position(|input| input.label.as_ref() == Some(label))
            });
            match linked {
                Some(pos) => {
                    inputs.remove(pos);
                    outputs.remove(i);
                }
                None => i += 1,
            }
        }

        Ok(FilterGraph {
            index,
            description: description.to_string(),
            inputs,
            outputs,
        })
    }

    /// First unbound output carrying `label`.
    pub fn find_output(&self, label: &str) -> Option<usize> {
        self.outputs
            .iter()
            .position(|o| o.bound.is_none() && o.label.as_deref() == Some(label))
    }
}

/// `-filter_complex` / `-lavfi`.
pub fn opt_filter_complex(state: &mut ParseState<'_>, _opt: &str, arg: &str) -> OptionsResult<()> {
    let index = state.filtergraphs.len();
    let graph = FilterGraph::parse(index, arg)?;
    state.filtergraphs.push(graph);
    Ok(())
}

/// `-filter_complex_script`: the graph description is read from a file.
pub fn opt_filter_complex_script(state: &mut ParseState<'_>, opt: &str, arg: &str) -> OptionsResult<()> {
    let description = std::fs::read_to_string(arg).map_err(|e| {
        state.error(format!("Error opening file {}.", arg));
        OptionError::io(format!("reading {}", arg), e)
    })?;
    opt_filter_complex(state, opt, description.trim_end())
}

/// Bind graph inputs to input streams once the input files are open.
///
/// `[N:spec]` takes the first stream of file N matching `spec`; an
/// unlabeled input takes the first unused stream of the pad's type.
pub fn init_complex_filters(state: &mut ParseState<'_>) -> OptionsResult<()> {
    let mut used: Vec<(usize, usize)> = Vec::new();

    for g in 0..state.filtergraphs.len() {
        for p in 0..state.filtergraphs[g].inputs.len() {
            let description = state.filtergraphs[g].description.clone();
            let input = &state.filtergraphs[g].inputs[p];

            let source = match input.label.as_deref() {
                Some(label) => {
                    let end = label.find(|c: char| !c.is_ascii_digit()).unwrap_or(label.len());
                    let file_index: usize = match label[..end].parse() {
                        Ok(i) if i < state.inputs.len() => i,
                        _ => {
                            let message = format!(
                                "Invalid file index {} in filtergraph description {}.",
                                &label[..end],
                                description
                            );
                            state.log(LogLevel::Fatal, &message);
                            return Err(OptionError::invalid(message));
                        }
                    };
                    let rest = &label[end..];
                    let spec = StreamSpecifier::parse(rest.strip_prefix(':').unwrap_or(rest))?;
                    let streams = &state.inputs[file_index].streams;
                    let found = (0..streams.len())
                        .find(|&s| !streams[s].discard && spec.matches(streams, s));
                    match found {
                        Some(s) => (file_index, s),
                        None => {
                            let message = format!(
                                "Stream specifier '{}' in filtergraph description {} matches no streams.",
                                rest.trim_start_matches(':'),
                                description
                            );
                            state.log(LogLevel::Fatal, &message);
                            return Err(OptionError::invalid(message));
                        }
                    }
                }
                None => {
                    let wanted = input.media_type;
                    let found = state.inputs.iter().enumerate().find_map(|(f, file)| {
                        file.streams
                            .iter()
                            .enumerate()
                            .find(|(s, st)| {
                                st.media_type == wanted && !st.discard && !used.contains(&(f, *s))
                            })
                            .map(|(s, _)| (f, s))
                    });
                    match found {
                        Some(source) => source,
                        None => {
                            let message = format!(
                                "Cannot find a matching stream for unlabeled input pad {} on filter {}",
                                p, input.filter
                            );
                            state.log(LogLevel::Fatal, &message);
                            return Err(OptionError::invalid(message));
                        }
                    }
                }
            };

            let media_type = state.inputs[source.0].streams[source.1].media_type;
            used.push(source);
            let input = &mut state.filtergraphs[g].inputs[p];
            input.source = Some(source);
            input.media_type = media_type;
        }

        // a graph fed only by audio produces audio
        let graph = &mut state.filtergraphs[g];
        if !graph.inputs.is_empty() && graph.inputs.iter().all(|i| i.media_type == MediaType::Audio) {
            for output in graph.outputs.iter_mut() {
                output.media_type = MediaType::Audio;
            }
        }
    }
    Ok(())
}

/// Every graph output must feed an output stream.
pub fn check_filter_outputs(state: &ParseState<'_>) -> OptionsResult<()> {
    for graph in &state.filtergraphs {
        if let Some(output) = graph.outputs.iter().find(|o| o.bound.is_none()) {
            let message = format!("Filter {} has an unconnected output", output.name());
            state.log(LogLevel::Fatal, &message);
            return Err(OptionError::invalid(message));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::models::{InputFile, StreamInfo};
    use crate::options::state::ParseEnv;

    fn labels<T>(items: &[T], f: impl Fn(&T) -> Option<&String>) -> Vec<Option<String>> {
        items.iter().map(|i| f(i).cloned()).collect()
    }

    #[test]
    fn internal_links_are_removed() {
        let graph = FilterGraph::parse(0, "[0:v]split[a][b];[a]scale=640:360[small];[b][1:v]overlay[out]").unwrap();
        assert_eq!(
            labels(&graph.inputs, |i| i.label.as_ref()),
            vec![Some("0:v".into()), Some("1:v".into())]
        );
        assert_eq!(
            labels(&graph.outputs, |o| o.label.as_ref()),
            vec![Some("small".into()), Some("out".into())]
        );
    }

    #[test]
    fn unlabeled_pads() {
        let graph = FilterGraph::parse(0, "scale=1280:-2,format=yuv420p").unwrap();
        assert_eq!(graph.inputs.len(), 1);
        assert_eq!(graph.inputs[0].label, None);
        assert_eq!(graph.outputs.len(), 1);
        assert_eq!(graph.outputs[0].filter, "format");

        let graph = FilterGraph::parse(0, "testsrc=size=320x240,nullsink").unwrap();
        assert!(graph.inputs.is_empty());
        assert!(graph.outputs.is_empty());
    }

    #[test]
    fn quoted_separators_are_kept() {
        let graph = FilterGraph::parse(0, "[0:v]drawtext=text='a;b,c'[v]").unwrap();
        assert_eq!(graph.outputs.len(), 1);
        assert_eq!(graph.outputs[0].filter, "drawtext");
    }

    #[test]
    fn unterminated_label() {
        assert!(FilterGraph::parse(0, "[0:v scale=1:1").is_err());
    }

    fn state_with_inputs<'a>(env: &'a ParseEnv) -> ParseState<'a> {
        let mut state = ParseState::new(env, &TracingSink);
        state.inputs = vec![
            InputFile::new("a.mp4", "mp4")
                .with_stream(StreamInfo::new(0, MediaType::Video))
                .with_stream(StreamInfo::new(0, MediaType::Audio)),
            InputFile::new("b.wav", "wav").with_stream(StreamInfo::new(0, MediaType::Audio)),
        ];
        state
    }

    #[test]
    fn inputs_bind_to_streams() {
        let env = ParseEnv::default();
        let mut state = state_with_inputs(&env);
        opt_filter_complex(&mut state, "filter_complex", "[0:a][1:a]amix=inputs=2[mix]").unwrap();
        opt_filter_complex(&mut state, "filter_complex", "hflip").unwrap();
        init_complex_filters(&mut state).unwrap();

        let mix = &state.filtergraphs[0];
        assert_eq!(mix.inputs[0].source, Some((0, 1)));
        assert_eq!(mix.inputs[1].source, Some((1, 0)));
        assert_eq!(mix.outputs[0].media_type, MediaType::Audio);

        let flip = &state.filtergraphs[1];
        assert_eq!(flip.inputs[0].source, Some((0, 0)));
        assert_eq!(flip.outputs[0].media_type, MediaType::Video);
    }

    #[test]
    fn bad_input_references() {
        let env = ParseEnv::default();
        let mut state = state_with_inputs(&env);
        opt_filter_complex(&mut state, "filter_complex", "[5:v]hflip[o]").unwrap();
        let err = init_complex_filters(&mut state).unwrap_err();
        assert!(err.to_string().starts_with("Invalid file index 5"));

        let mut state = state_with_inputs(&env);
        opt_filter_complex(&mut state, "filter_complex", "[1:v]hflip[o]").unwrap();
        let err = init_complex_filters(&mut state).unwrap_err();
        assert!(err.to_string().contains("matches no streams"));
    }

    #[test]
    fn unconnected_outputs_fail() {
        let env = ParseEnv::default();
        let mut state = state_with_inputs(&env);
        opt_filter_complex(&mut state, "filter_complex", "[0:v]hflip[flipped]").unwrap();
        let err = check_filter_outputs(&state).unwrap_err();
        assert_eq!(err.to_string(), "Filter flipped has an unconnected output");

        state.filtergraphs[0].outputs[0].bound = Some((0, 0));
        check_filter_outputs(&state).unwrap();
    }

    #[test]
    fn script_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");
        std::fs::write(&path, "[0:v]vflip[v]\n").unwrap();

        let env = ParseEnv::default();
        let mut state = state_with_inputs(&env);
        opt_filter_complex_script(&mut state, "filter_complex_script", path.to_str().unwrap()).unwrap();
        assert_eq!(state.filtergraphs[0].description, "[0:v]vflip[v]");

        let missing = dir.path().join("missing.txt");
        assert!(opt_filter_complex_script(&mut state, "x", missing.to_str().unwrap()).is_err());
    }
}
