//! Splitting an argument list into global, input and output option groups.

use super::dict::OptionDict;
use super::errors::{OptionError, OptionsResult};
use super::table::{find_option, OptFlags, OptionDef};
use crate::logging::{LogLevel, LogSink};

/// Which kind of group an option group is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Global,
    Input,
    Output,
}

/// One option occurrence as found on the command line.
#[derive(Debug, Clone)]
pub struct ParsedOption {
    pub def: &'static OptionDef,
    /// Name as written, including any `:specifier`.
    pub key: String,
    pub value: String,
}

/// Options belonging to the global scope or to one file.
#[derive(Debug, Clone)]
pub struct OptionGroup {
    pub kind: GroupKind,
    /// File URL for input and output groups.
    pub arg: String,
    pub opts: Vec<ParsedOption>,
    /// Engine pass-through options addressed to codecs.
    pub codec_opts: OptionDict,
    /// Engine pass-through options addressed to (de)muxers and protocols.
    pub format_opts: OptionDict,
}

impl OptionGroup {
    fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            arg: String::new(),
            opts: Vec::new(),
            codec_opts: OptionDict::new(),
            format_opts: OptionDict::new(),
        }
    }
}

/// Result of splitting a command line.
#[derive(Debug, Clone)]
pub struct OptionParseContext {
    pub global: OptionGroup,
    pub inputs: Vec<OptionGroup>,
    pub outputs: Vec<OptionGroup>,
}

/// Pass-through options known to belong to (de)muxers or protocols.
const FORMAT_OPTIONS: &[&str] = &[
    "analyzeduration",
    "probesize",
    "fflags",
    "avioflags",
    "packetsize",
    "muxrate",
    "movflags",
    "brand",
    "fpsprobesize",
    "max_delay",
    "max_interleave_delta",
    "rtbufsize",
    "rtsp_transport",
    "rtsp_flags",
    "protocol_whitelist",
    "safe",
    "hls_time",
    "hls_list_size",
    "hls_flags",
    "hls_segment_filename",
    "hls_playlist_type",
    "segment_time",
    "segment_format",
    "segment_list",
    "reconnect",
    "reconnect_streamed",
    "reconnect_delay_max",
    "timeout",
    "user_agent",
    "headers",
    "framerate",
    "video_size",
    "pixel_format",
    "sample_rate",
    "channels",
    "f_strict",
    "write_xing",
    "id3v2_version",
];

/// Route a pass-through option to the codec or format dictionary.
pub fn is_format_option(name: &str) -> bool {
    let base = name.split(':').next().unwrap_or(name);
    FORMAT_OPTIONS.contains(&base)
}

fn looks_like_value(arg: &str) -> bool {
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some('-'), Some(c)) => !c.is_ascii_alphabetic(),
        _ => true,
    }
}

struct Splitter<'s> {
    sink: &'s dyn LogSink,
    global: OptionGroup,
    current: OptionGroup,
    inputs: Vec<OptionGroup>,
    outputs: Vec<OptionGroup>,
}

impl<'s> Splitter<'s> {
    fn finish_group(&mut self, kind: GroupKind, arg: &str) {
        let mut group = std::mem::replace(&mut self.current, OptionGroup::new(GroupKind::Output));
        group.kind = kind;
        group.arg = arg.to_string();
        match kind {
            GroupKind::Input => self.inputs.push(group),
            _ => self.outputs.push(group),
        }
    }

    fn add_opt(&mut self, def: &'static OptionDef, key: &str, value: &str) {
        let target = if def.is_per_file() {
            &mut self.current
        } else {
            &mut self.global
        };
        target.opts.push(ParsedOption {
            def,
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn add_passthrough(&mut self, key: &str, value: &str) {
        if is_format_option(key) {
            self.current.format_opts.set(key, value);
        } else {
            self.current.codec_opts.set(key, value);
        }
    }
}

/// Split `args` (without the program name) into option groups.
///
/// `-i URL` closes an input group, any non-option argument closes an output
/// group. Options missing from the table are kept as engine pass-through
/// options when followed by a value.
pub fn split_commandline(args: &[String], sink: &dyn LogSink) -> OptionsResult<OptionParseContext> {
    let mut s = Splitter {
        sink,
        global: OptionGroup::new(GroupKind::Global),
        current: OptionGroup::new(GroupKind::Output),
        inputs: Vec::new(),
        outputs: Vec::new(),
    };

    s.sink.log(
        LogLevel::Debug,
        &format!("Splitting the commandline: {}", args.join(" ")),
    );

    let missing = |opt: &str| {
        OptionError::invalid(format!("Missing argument for option '{}'.", opt))
    };

    let mut index = 0;
    let mut dashdash: Option<usize> = None;

    while index < args.len() {
        let raw = args[index].as_str();
        index += 1;

        if raw == "--" {
            dashdash = Some(index);
            continue;
        }

        if !raw.starts_with('-') || raw.len() == 1 || dashdash == Some(index - 1) {
            s.sink.log(
                LogLevel::Debug,
                &format!("Reading option '{}' ... matched as output url.", raw),
            );
            s.finish_group(GroupKind::Output, raw);
            continue;
        }

        let opt = &raw[1..];

        if opt == "i" {
            let url = args.get(index).ok_or_else(|| missing(opt))?;
            index += 1;
            s.sink.log(
                LogLevel::Debug,
                &format!("Reading option '-i' ... matched as input url with argument '{}'.", url),
            );
            s.finish_group(GroupKind::Input, url);
            continue;
        }

        if let Some(def) = find_option(opt) {
            let value = if def.flags.contains(OptFlags::EXIT) {
                // optional argument, e.g. -h long
                match args.get(index) {
                    Some(arg) => {
                        index += 1;
                        arg.clone()
                    }
                    None => String::new(),
                }
            } else if def.flags.contains(OptFlags::HAS_ARG) {
                let arg = args.get(index).ok_or_else(|| missing(opt))?;
                index += 1;
                arg.clone()
            } else {
                "1".to_string()
            };
            s.sink.log(
                LogLevel::Debug,
                &format!(
                    "Reading option '{}' ... matched as option '{}' ({}) with argument '{}'.",
                    raw, def.name, def.help, value
                ),
            );
            s.add_opt(def, opt, &value);
            continue;
        }

        if let Some(def) = opt.strip_prefix("no").and_then(find_option) {
            if def.flags.contains(OptFlags::BOOL) {
                s.sink.log(
                    LogLevel::Debug,
                    &format!(
                        "Reading option '{}' ... matched as option '{}' ({}) with argument 0.",
                        raw, def.name, def.help
                    ),
                );
                s.add_opt(def, opt, "0");
                continue;
            }
        }

        match args.get(index) {
            Some(value) if looks_like_value(value) => {
                index += 1;
                s.sink.log(
                    LogLevel::Debug,
                    &format!(
                        "Reading option '{}' ... matched as AVOption '{}' with argument '{}'.",
                        raw, opt, value
                    ),
                );
                s.add_passthrough(opt, value);
            }
            _ => {
                s.sink
                    .log(LogLevel::Error, &format!("Unrecognized option '{}'.", opt));
                return Err(OptionError::OptionNotFound(opt.to_string()));
            }
        }
    }

    if !s.current.opts.is_empty()
        || !s.current.codec_opts.is_empty()
        || !s.current.format_opts.is_empty()
    {
        s.sink.log(
            LogLevel::Warning,
            "Trailing option(s) found in the command: may be ignored.",
        );
    }

    s.sink.log(LogLevel::Debug, "Finished splitting the commandline.");

    Ok(OptionParseContext {
        global: s.global,
        inputs: s.inputs,
        outputs: s.outputs,
    })
}

/// Split a command string into arguments.
///
/// Single and double quotes group words and are removed; a quote preceded
/// by a backslash is kept literally.
pub fn tokenize_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut single = false;
    let mut double = false;
    let mut previous: Option<char> = None;

    for c in command.chars() {
        let escaped = previous == Some('\\');
        match c {
            ' ' if !single && !double => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            '\'' if !escaped => {
                if single {
                    single = false;
                } else if double {
                    current.push(c);
                } else {
                    single = true;
                }
            }
            '"' if !escaped => {
                if double {
                    double = false;
                } else if single {
                    current.push(c);
                } else {
                    double = true;
                }
            }
            _ => current.push(c),
        }
        previous = Some(c);
    }

    if !current.is_empty() {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(LogLevel, String)>>);

    impl LogSink for Collect {
        fn log(&self, level: LogLevel, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    fn args(line: &str) -> Vec<String> {
        tokenize_command(line)
    }

    fn split(line: &str) -> OptionsResult<OptionParseContext> {
        split_commandline(&args(line), &Collect::default())
    }

    #[test]
    fn groups_inputs_and_outputs() {
        let ctx = split("-y -ss 5 -i a.mp4 -i b.wav -c:v libx264 -map 0:v out.mp4 -an second.mkv").unwrap();

        assert_eq!(ctx.global.opts.len(), 1);
        assert_eq!(ctx.global.opts[0].def.name, "y");

        assert_eq!(ctx.inputs.len(), 2);
        assert_eq!(ctx.inputs[0].arg, "a.mp4");
        assert_eq!(ctx.inputs[0].opts[0].key, "ss");
        assert_eq!(ctx.inputs[0].opts[0].value, "5");
        assert!(ctx.inputs[1].opts.is_empty());

        assert_eq!(ctx.outputs.len(), 2);
        assert_eq!(ctx.outputs[0].arg, "out.mp4");
        let keys: Vec<_> = ctx.outputs[0].opts.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["c:v", "map"]);
        assert_eq!(ctx.outputs[1].opts[0].value, "1");
    }

    #[test]
    fn negated_bool_options() {
        let ctx = split("-i in.mp4 -nostdin -noaccurate_seek out.mp4").unwrap();
        assert_eq!(ctx.global.opts[0].def.name, "stdin");
        assert_eq!(ctx.global.opts[0].value, "0");
        assert_eq!(ctx.outputs[0].opts[0].def.name, "accurate_seek");
        assert_eq!(ctx.outputs[0].opts[0].value, "0");
    }

    #[test]
    fn pass_through_options_attach_to_next_group() {
        let ctx = split("-probesize 32 -i in.ts -preset fast -crf 18 -movflags +faststart out.mp4").unwrap();
        assert_eq!(ctx.inputs[0].format_opts.get("probesize"), Some("32"));
        assert_eq!(ctx.outputs[0].codec_opts.get("preset"), Some("fast"));
        assert_eq!(ctx.outputs[0].codec_opts.get("crf"), Some("18"));
        assert_eq!(ctx.outputs[0].format_opts.get("movflags"), Some("+faststart"));
    }

    #[test]
    fn negative_values_are_pass_through_arguments() {
        let ctx = split("-i in.mp4 -qp -1 out.mp4").unwrap();
        assert_eq!(ctx.outputs[0].codec_opts.get("qp"), Some("-1"));
    }

    #[test]
    fn unknown_option_without_value_fails() {
        let err = split("-i in.mp4 -bogus").unwrap_err();
        assert!(matches!(err, OptionError::OptionNotFound(ref o) if o == "bogus"));
        let err = split("-i in.mp4 -bogus -y out.mp4").unwrap_err();
        assert_eq!(err.code(), crate::error_code::OPTION_NOT_FOUND);
    }

    #[test]
    fn missing_argument_fails() {
        let err = split("-i in.mp4 -c:v").unwrap_err();
        assert_eq!(err.to_string(), "Missing argument for option 'c:v'.");
        assert!(split("-i").is_err());
    }

    #[test]
    fn dashdash_marks_next_argument_as_output() {
        let ctx = split("-i in.mp4 -- -weird-name.mp4").unwrap();
        assert_eq!(ctx.outputs[0].arg, "-weird-name.mp4");
    }

    #[test]
    fn single_dash_is_an_output() {
        let ctx = split("-i in.mp4 -f mp4 -").unwrap();
        assert_eq!(ctx.outputs[0].arg, "-");
    }

    #[test]
    fn trailing_options_warn() {
        let sink = Collect::default();
        split_commandline(&args("-i in.mp4 out.mp4 -c:v libx264"), &sink).unwrap();
        assert!(sink
            .0
            .lock()
            .iter()
            .any(|(l, m)| *l == LogLevel::Warning && m.starts_with("Trailing option(s)")));
    }

    #[test]
    fn exit_options_take_optional_argument() {
        let ctx = split("-h long").unwrap();
        assert_eq!(ctx.global.opts[0].def.name, "h");
        assert_eq!(ctx.global.opts[0].value, "long");
        let ctx = split("-version").unwrap();
        assert_eq!(ctx.global.opts[0].value, "");
    }

    #[test]
    fn tokenizer_handles_quotes() {
        assert_eq!(
            tokenize_command(r#"-i "my file.mp4" -vf 'scale=1280:-2, fps=30' out.mp4"#),
            vec!["-i", "my file.mp4", "-vf", "scale=1280:-2, fps=30", "out.mp4"]
        );
        assert_eq!(
            tokenize_command(r#"-metadata "title=it's" x.mp4"#),
            vec!["-metadata", "title=it's", "x.mp4"]
        );
        assert_eq!(tokenize_command("  a   b  "), vec!["a", "b"]);
    }
}
