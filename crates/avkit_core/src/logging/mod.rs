//! Engine log levels, redirection and per-session log files.
//!
//! Engine messages travel through [`LogSink`]s into sessions; anything
//! printed goes out through `tracing` under the `avkit::engine` target.

mod session_logger;
mod types;

pub use session_logger::SessionLogger;
pub use types::{LogConfig, LogLevel, LogRedirectionStrategy, LogSink, TracingSink};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a console subscriber. `RUST_LOG` wins over `default_level`;
/// later calls are no-ops.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}

/// Warnings and errors only, captured by the test harness.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// `EnvFilter` directive for an engine level.
pub fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Quiet => "off",
        LogLevel::Stderr | LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => "error",
        LogLevel::Warning => "warn",
        LogLevel::Info => "info",
        LogLevel::Verbose | LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Print one engine message through `tracing` at the mapped level.
pub fn emit(level: LogLevel, message: &str) {
    let message = message.trim_end_matches(['\n', '\r']);
    match level {
        LogLevel::Quiet => {}
        LogLevel::Stderr | LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => {
            tracing::error!(target: "avkit::engine", "{}", message)
        }
        LogLevel::Warning => tracing::warn!(target: "avkit::engine", "{}", message),
        LogLevel::Info => tracing::info!(target: "avkit::engine", "{}", message),
        LogLevel::Verbose | LogLevel::Debug => {
            tracing::debug!(target: "avkit::engine", "{}", message)
        }
        LogLevel::Trace => tracing::trace!(target: "avkit::engine", "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(level_to_filter_str(LogLevel::Debug), "debug");
        assert_eq!(level_to_filter_str(LogLevel::Warning), "warn");
        assert_eq!(level_to_filter_str(LogLevel::Quiet), "off");
    }

    #[test]
    fn levels_round_trip_through_values() {
        assert_eq!(LogLevel::from_value(32), LogLevel::Info);
        assert_eq!(LogLevel::from_value(35), LogLevel::Info);
        assert_eq!(LogLevel::from_value(-100), LogLevel::Stderr);
        assert_eq!(LogLevel::from_name("warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_name("48"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_name("loud"), None);
    }

    #[test]
    fn ordering_follows_verbosity() {
        assert!(LogLevel::Debug > LogLevel::Info);
        assert!(LogLevel::Quiet < LogLevel::Panic);
    }

    #[test]
    fn redirection_rules() {
        use LogRedirectionStrategy::*;
        assert!(AlwaysPrintLogs.should_print(true, true));
        assert!(PrintLogsWhenNoCallbacksDefined.should_print(false, false));
        assert!(!PrintLogsWhenNoCallbacksDefined.should_print(true, false));
        assert!(PrintLogsWhenGlobalCallbackNotDefined.should_print(true, false));
        assert!(!PrintLogsWhenSessionCallbackNotDefined.should_print(true, false));
        assert!(!NeverPrintLogs.should_print(false, false));
    }
}
