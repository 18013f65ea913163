//! Applying option groups and driving a whole command-line parse.

use serde::Serialize;

use super::context::OptionsContext;
use super::errors::{OptionError, OptionsResult};
use super::filtergraph::{check_filter_outputs, init_complex_filters, FilterGraph};
use super::globals::ParserGlobals;
use super::input::open_input;
use super::output::{open_output, OutputFile};
use super::split::{split_commandline, GroupKind, OptionGroup};
use super::state::{ParseEnv, ParseState};
use super::sync::{apply_sync_offsets, correct_input_start_times};
use super::table::{find_option, parse_value, OptFlags, OptionDef, OptionKind};
use crate::engine::MediaProbe;
use crate::logging::{LogLevel, LogSink};
use crate::models::InputFile;

/// Everything a successful parse produced.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedCommand {
    /// Arguments as given, without the program name.
    pub args: Vec<String>,
    pub globals: ParserGlobals,
    pub inputs: Vec<InputFile>,
    pub outputs: Vec<OutputFile>,
    pub filtergraphs: Vec<FilterGraph>,
}

/// Parse and store one option by name, as the handlers do when they
/// re-dispatch (`-vcodec x` becomes `codec:v x`).
pub fn parse_option(
    state: &mut ParseState<'_>,
    ctx: Option<&mut OptionsContext>,
    opt: &str,
    arg: &str,
) -> OptionsResult<()> {
    if let Some(def) = find_option(opt) {
        return write_option(state, ctx, def, opt, arg);
    }
    if let Some(def) = opt.strip_prefix("no").and_then(find_option) {
        if def.flags.contains(OptFlags::BOOL) {
            return write_option(state, ctx, def, opt, "0");
        }
    }
    state.error(format!("Unrecognized option '{}'", opt));
    Err(OptionError::OptionNotFound(opt.to_string()))
}

/// Store `arg` for `def` according to its kind.
///
/// `key` is the option as written; the text after its first `:` is the
/// stream specifier for specifier-qualified options.
pub fn write_option(
    state: &mut ParseState<'_>,
    ctx: Option<&mut OptionsContext>,
    def: &'static OptionDef,
    key: &str,
    arg: &str,
) -> OptionsResult<()> {
    fn per_file<'c>(
        ctx: Option<&'c mut OptionsContext>,
        def: &OptionDef,
    ) -> OptionsResult<&'c mut OptionsContext> {
        ctx.ok_or_else(|| {
            OptionError::invalid(format!(
                "Option {} is a per-file option and needs a file context",
                def.name
            ))
        })
    }

    let result = match def.kind {
        OptionKind::Spec(field) => {
            let specifier = key.split_once(':').map(|(_, s)| s).unwrap_or("");
            let value = parse_value(def.flags, key, arg)?;
            per_file(ctx, def)?.push_spec(field, specifier, value);
            Ok(())
        }
        OptionKind::File(setter) => {
            let value = parse_value(def.flags, key, arg)?;
            setter(per_file(ctx, def)?, value);
            Ok(())
        }
        OptionKind::Global(setter) => {
            let value = parse_value(def.flags, key, arg)?;
            setter(&mut state.globals, value);
            Ok(())
        }
        OptionKind::GlobalFunc(handler) => handler(state, key, arg),
        OptionKind::FileFunc(handler) => handler(state, per_file(ctx, def)?, key, arg),
    };

    match result {
        Err(err) if !err.is_exit() => {
            state.error(format!(
                "Failed to set value '{}' for option '{}': {}",
                arg, key, err
            ));
            Err(err)
        }
        Err(err) => Err(err),
        Ok(()) if def.flags.contains(OptFlags::EXIT) => Err(OptionError::Exit),
        Ok(()) => Ok(()),
    }
}

fn group_name(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::Global => "global",
        GroupKind::Input => "input url",
        GroupKind::Output => "output url",
    }
}

/// Apply every option of `group`, rejecting input-only options on outputs
/// and the reverse.
pub fn parse_optgroup(
    state: &mut ParseState<'_>,
    mut ctx: Option<&mut OptionsContext>,
    group: &OptionGroup,
) -> OptionsResult<()> {
    let required = match group.kind {
        GroupKind::Global => None,
        GroupKind::Input => Some(OptFlags::INPUT),
        GroupKind::Output => Some(OptFlags::OUTPUT),
    };

    state.debug(format!(
        "Parsing a group of options: {} {}.",
        group_name(group.kind),
        group.arg
    ));

    for opt in &group.opts {
        if let Some(flags) = required {
            if !opt.def.flags.intersects(flags) {
                let message = format!(
                    "Option {} ({}) cannot be applied to {} {} -- you are trying to apply an input option to an output file or vice versa. Move this option before the file it belongs to.",
                    opt.key,
                    opt.def.help,
                    group_name(group.kind),
                    group.arg
                );
                state.error(&message);
                return Err(OptionError::invalid(message));
            }
        }

        state.debug(format!(
            "Applying option {} ({}) with argument {}.",
            opt.key, opt.def.help, opt.value
        ));
        write_option(state, ctx.as_deref_mut(), opt.def, &opt.key, &opt.value)?;
    }

    state.debug("Successfully parsed a group of options.");
    Ok(())
}

/// Resolve `-t` against `-to` for one file.
pub(crate) fn apply_time_limits(state: &ParseState<'_>, o: &mut OptionsContext) -> OptionsResult<()> {
    if o.stop_time.is_some() && o.recording_time.is_some() {
        o.stop_time = None;
        state.warning("-t and -to cannot be used together; using -t.");
    }
    if let (Some(stop), None) = (o.stop_time, o.recording_time) {
        let start = o.start_time.unwrap_or(0);
        if stop <= start {
            state.error("-to value smaller than -ss; aborting.");
            return Err(OptionError::invalid("-to value smaller than -ss; aborting."));
        }
        o.recording_time = Some(stop - start);
    }
    Ok(())
}

fn open_files(
    state: &mut ParseState<'_>,
    groups: &[OptionGroup],
    probe: &dyn MediaProbe,
) -> OptionsResult<()> {
    for group in groups {
        let inout = if group.kind == GroupKind::Input { "input" } else { "output" };
        let mut o = OptionsContext::new(group.codec_opts.clone(), group.format_opts.clone());

        if let Err(err) = parse_optgroup(state, Some(&mut o), group) {
            state.error(format!(
                "Error parsing options for {} file {}.",
                inout, group.arg
            ));
            return Err(err);
        }

        state.debug(format!("Opening an {} file: {}.", inout, group.arg));
        let opened = match group.kind {
            GroupKind::Input => open_input(state, &mut o, &group.arg, probe),
            _ => open_output(state, &mut o, &group.arg),
        };
        if let Err(err) = opened {
            if !err.is_exit() {
                state.error(format!("Error opening {} file {}.", inout, group.arg));
            }
            return Err(err);
        }
        state.debug("Successfully opened the file.");
    }
    Ok(())
}

fn run_stages(
    state: &mut ParseState<'_>,
    args: &[String],
    probe: &dyn MediaProbe,
) -> Result<(), (&'static str, OptionError)> {
    let octx = split_commandline(args, state.sink())
        .map_err(|e| ("splitting the argument list", e))?;

    parse_optgroup(state, None, &octx.global).map_err(|e| ("parsing global options", e))?;

    open_files(state, &octx.inputs, probe).map_err(|e| ("opening input files", e))?;

    init_complex_filters(state).map_err(|e| ("initializing complex filters", e))?;

    open_files(state, &octx.outputs, probe).map_err(|e| ("opening output files", e))?;

    let sink = state.sink();
    correct_input_start_times(&mut state.inputs, &state.globals, sink);

    apply_sync_offsets(&mut state.inputs, &state.globals, sink)
        .map_err(|e| ("applying sync offsets", e))?;

    check_filter_outputs(state).map_err(|e| ("checking filter outputs", e))?;
    Ok(())
}

/// Parse a full engine command line.
///
/// Inputs are probed through `probe` so stream maps and specifiers resolve
/// against real streams. Help and listing options end the parse with
/// [`OptionError::Exit`].
pub fn parse_ffmpeg_options(
    args: &[String],
    probe: &dyn MediaProbe,
    env: &ParseEnv,
    sink: &dyn LogSink,
) -> OptionsResult<ParsedCommand> {
    let mut state = ParseState::new(env, sink);

    if let Err((stage, err)) = run_stages(&mut state, args, probe) {
        if !err.is_exit() {
            state.log(
                LogLevel::Fatal,
                format!("Error {}: {}", stage, crate::error_code::describe(err.code())),
            );
        }
        return Err(err);
    }

    Ok(ParsedCommand {
        args: args.to_vec(),
        globals: state.globals,
        inputs: state.inputs,
        outputs: state.outputs,
        filtergraphs: state.filtergraphs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::options::context::SpecField;
    use crate::options::table::OptValue;

    fn state_env() -> ParseEnv {
        ParseEnv::default()
    }

    #[test]
    fn parse_option_stores_by_kind() {
        let env = state_env();
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();

        parse_option(&mut state, Some(&mut o), "c:v", "libx264").unwrap();
        parse_option(&mut state, Some(&mut o), "t", "10").unwrap();
        parse_option(&mut state, None, "y", "1").unwrap();
        parse_option(&mut state, None, "nostdin", "").unwrap();

        assert_eq!(o.specs(SpecField::CodecName)[0].specifier, "v");
        assert_eq!(o.recording_time, Some(10_000_000));
        assert!(state.globals.file_overwrite);
        assert!(!state.globals.stdin_interaction);
    }

    #[test]
    fn unknown_option_is_not_found() {
        let env = state_env();
        let mut state = ParseState::new(&env, &TracingSink);
        let err = parse_option(&mut state, None, "bogus", "1").unwrap_err();
        assert_eq!(err.code(), crate::error_code::OPTION_NOT_FOUND);
    }

    #[test]
    fn per_file_option_needs_context() {
        let env = state_env();
        let mut state = ParseState::new(&env, &TracingSink);
        assert!(parse_option(&mut state, None, "t", "1").is_err());
    }

    #[test]
    fn exit_options_request_exit() {
        let env = state_env();
        let mut state = ParseState::new(&env, &TracingSink);
        let err = parse_option(&mut state, None, "version", "").unwrap_err();
        assert!(err.is_exit());
    }

    #[derive(Default)]
    struct Warnings(parking_lot::Mutex<Vec<String>>);

    impl LogSink for Warnings {
        fn log(&self, level: LogLevel, message: &str) {
            if level == LogLevel::Warning {
                self.0.lock().push(message.to_string());
            }
        }
    }

    #[test]
    fn deprecated_options_only_warn() {
        let env = state_env();
        let sink = Warnings::default();
        let mut state = ParseState::new(&env, &sink);
        let before = state.globals.clone();

        parse_option(&mut state, None, "qphist", "").unwrap();
        parse_option(&mut state, None, "adrift_threshold", "0.5").unwrap();

        assert_eq!(
            *sink.0.lock(),
            vec![
                "Option -qphist is deprecated and has no effect",
                "Option -adrift_threshold is deprecated and has no effect",
            ]
        );
        assert_eq!(
            serde_json::to_value(&state.globals).unwrap(),
            serde_json::to_value(&before).unwrap()
        );
    }

    #[test]
    fn map_channel_is_checked_against_inputs() {
        let env = state_env();
        let sink = Warnings::default();
        let mut state = ParseState::new(&env, &sink);
        state.inputs.push(
            crate::models::InputFile::new("in.wav", "wav").with_stream(
                crate::models::StreamInfo::new(0, crate::models::MediaType::Audio).with_audio(48000, 2),
            ),
        );
        let mut o = OptionsContext::default();

        parse_option(&mut state, Some(&mut o), "map_channel", "0.0.1").unwrap();
        let err = parse_option(&mut state, Some(&mut o), "map_channel", "0.0.2").unwrap_err();
        assert_eq!(err.code(), crate::error_code::EINVAL);
        assert_eq!(o.audio_channel_maps.len(), 1);
        assert!(sink.0.lock()[0].starts_with("The -map_channel option is deprecated"));
    }

    #[test]
    fn handler_errors_propagate() {
        let env = state_env();
        let mut state = ParseState::new(&env, &TracingSink);
        let err = parse_option(&mut state, None, "stats_period", "-1").unwrap_err();
        assert_eq!(err.code(), crate::error_code::EINVAL);
    }

    #[test]
    fn time_limits() {
        let env = state_env();
        let state = ParseState::new(&env, &TracingSink);

        let mut o = OptionsContext::default();
        o.recording_time = Some(5);
        o.stop_time = Some(9);
        apply_time_limits(&state, &mut o).unwrap();
        assert_eq!((o.recording_time, o.stop_time), (Some(5), None));

        let mut o = OptionsContext::default();
        o.start_time = Some(2_000_000);
        o.stop_time = Some(5_000_000);
        apply_time_limits(&state, &mut o).unwrap();
        assert_eq!(o.recording_time, Some(3_000_000));

        let mut o = OptionsContext::default();
        o.start_time = Some(5_000_000);
        o.stop_time = Some(5_000_000);
        assert!(apply_time_limits(&state, &mut o).is_err());
    }

    #[test]
    fn spec_values_are_typed() {
        let env = state_env();
        let mut state = ParseState::new(&env, &TracingSink);
        let mut o = OptionsContext::default();
        parse_option(&mut state, Some(&mut o), "ar:a:0", "44100").unwrap();
        let spec = &o.specs(SpecField::SampleRate)[0];
        assert_eq!(spec.specifier, "a:0");
        assert_eq!(spec.value, OptValue::Int(44100));
        assert!(parse_option(&mut state, Some(&mut o), "ar", "fast").is_err());
    }
}
