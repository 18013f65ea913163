//! avkit command-line front end
//!
//! Runs engine commands through avkit sessions so they get the same
//! validation, logging and statistics as library callers.
//!
//! Usage:
//!   avkit ffmpeg <args...>
//!   avkit ffprobe <args...>
//!   avkit info <file>
//!   avkit help [long|full]

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use avkit_core::config::{ConfigManager, Settings};
use avkit_core::engine::progress::is_progress_line;
use avkit_core::kit::{FfmpegKit, FfprobeKit, KitConfig};
use avkit_core::logging::{init_tracing, level_to_filter_str, LogLevel};
use avkit_core::session::{Log, SessionCore, SessionState, Statistics};

const USAGE: &str = "usage: avkit <command> [args...]

commands:
  ffmpeg <args...>    run a transcode session
  ffprobe <args...>   run a probe session and print its output
  info <file>         print media information as JSON
  help [long|full]    show engine options";

fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("avkit"))
}

fn load_settings() -> Result<Settings> {
    let Some(dir) = app_dir() else {
        return Ok(Settings::default());
    };
    let mut manager = ConfigManager::new(dir.join("settings.toml"));
    manager
        .load_or_create()
        .with_context(|| format!("loading {}", manager.path().display()))?;
    manager.create_log_folder()?;
    Ok(manager.settings().clone())
}

/// Console output on stderr plus a daily rolling file next to the config.
fn init_logging(level: LogLevel) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(level)));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let Some(dir) = app_dir() else {
        init_tracing(level);
        return None;
    };
    let appender = tracing_appender::rolling::daily(dir.join("logs"), "avkit.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_writer(writer).with_ansi(false);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();
    Some(guard)
}

fn print_log(log: &Log) {
    if is_progress_line(&log.message) {
        return;
    }
    let mut stderr = std::io::stderr().lock();
    let _ = write!(stderr, "{}", log.message);
    if !log.message.ends_with('\n') {
        let _ = writeln!(stderr);
    }
}

fn print_statistics(stats: &Statistics) {
    let mut stderr = std::io::stderr().lock();
    let _ = write!(
        stderr,
        "\rframe={:6} fps={:5.1} size={:8}kB time={:9.2}s bitrate={:8.1}kbits/s speed={:.2}x",
        stats.video_frame_number,
        stats.video_fps,
        stats.size / 1024,
        stats.time / 1000.0,
        stats.bitrate,
        stats.speed
    );
    let _ = stderr.flush();
}

/// Process exit status for a finished session.
fn exit_status(core: &SessionCore) -> i32 {
    match core.state() {
        SessionState::Completed => core.return_code().map_or(0, |c| c.value()),
        _ => {
            if let Some(trace) = core.fail_stack_trace() {
                tracing::error!("{}", trace);
            }
            1
        }
    }
}

fn run(args: &[String], settings: &Settings) -> Result<i32> {
    let Some((command, rest)) = args.split_first() else {
        bail!("{}", USAGE);
    };

    let config = KitConfig::global();
    config.apply(settings)?;
    config.set_log_callback(Some(Arc::new(print_log)));

    match command.as_str() {
        "ffmpeg" => {
            config.set_statistics_callback(Some(Arc::new(print_statistics)));
            let session = FfmpegKit::default().execute_with_arguments(rest.to_vec());
            if session.last_received_statistics().is_some() {
                eprintln!();
            }
            Ok(exit_status(session.core()))
        }
        "ffprobe" => {
            let session = FfprobeKit::default().execute_with_arguments(rest.to_vec());
            print!("{}", session.core().output());
            Ok(exit_status(session.core()))
        }
        "info" => {
            let [path] = rest else {
                bail!("usage: avkit info <file>");
            };
            let session = FfprobeKit::default().get_media_information(path);
            match session.media_information() {
                Some(info) => {
                    println!("{}", serde_json::to_string_pretty(&info.all_properties)?);
                    Ok(0)
                }
                None => Ok(exit_status(session.core()).max(1)),
            }
        }
        "help" | "-h" | "--help" => {
            let mut help = vec!["-h".to_string()];
            help.extend(rest.iter().cloned());
            let session = FfmpegKit::default().execute_with_arguments(help);
            println!();
            println!("{}", USAGE);
            Ok(exit_status(session.core()))
        }
        "version" | "--version" => {
            println!("avkit {}", avkit_core::version());
            Ok(0)
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = load_settings().unwrap_or_else(|e| {
        eprintln!("avkit: {:#}, using default settings", e);
        Settings::default()
    });
    let guard = init_logging(settings.logging.level);

    let status = match run(&args, &settings) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("avkit: {:#}", e);
            1
        }
    };

    drop(guard);
    process::exit(status);
}
