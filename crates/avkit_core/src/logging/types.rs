//! Logging types and configuration.

use serde::{Deserialize, Serialize};

/// Engine log level.
///
/// Numeric values follow the engine's own scale so levels can be compared
/// and forwarded unchanged (`-loglevel 32` is `info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Messages written directly to stderr by the engine; never filtered.
    Stderr,
    /// Print nothing.
    Quiet,
    /// Something went really wrong and the engine will crash now.
    Panic,
    /// Unrecoverable error.
    Fatal,
    /// Recoverable error.
    Error,
    /// Something looks wrong.
    Warning,
    /// Standard information.
    #[default]
    Info,
    /// Detailed information.
    Verbose,
    /// Debugging output.
    Debug,
    /// Extremely verbose debugging.
    Trace,
}

impl LogLevel {
    /// All levels, least verbose first.
    pub const ALL: [LogLevel; 10] = [
        LogLevel::Stderr,
        LogLevel::Quiet,
        LogLevel::Panic,
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Info,
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Engine numeric value.
    pub fn value(self) -> i32 {
        match self {
            LogLevel::Stderr => -16,
            LogLevel::Quiet => -8,
            LogLevel::Panic => 0,
            LogLevel::Fatal => 8,
            LogLevel::Error => 16,
            LogLevel::Warning => 24,
            LogLevel::Info => 32,
            LogLevel::Verbose => 40,
            LogLevel::Debug => 48,
            LogLevel::Trace => 56,
        }
    }

    /// Level for an engine numeric value.
    ///
    /// Values between two levels resolve to the less verbose one.
    pub fn from_value(value: i32) -> LogLevel {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| level.value() <= value)
            .unwrap_or(LogLevel::Stderr)
    }

    /// Parse a level name (`info`, `warning`, ...) or a numeric value.
    pub fn from_name(name: &str) -> Option<LogLevel> {
        let name = name.trim().to_ascii_lowercase();
        if let Ok(value) = name.parse::<i32>() {
            return Some(Self::from_value(value));
        }
        Self::ALL.iter().copied().find(|level| level.name() == name)
    }

    /// Engine name of this level.
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Stderr => "stderr",
            LogLevel::Quiet => "quiet",
            LogLevel::Panic => "panic",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Convert to tracing level. `Quiet` has no tracing counterpart.
    pub fn to_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Quiet => None,
            LogLevel::Stderr | LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => {
                Some(tracing::Level::ERROR)
            }
            LogLevel::Warning => Some(tracing::Level::WARN),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Verbose | LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Trace => Some(tracing::Level::TRACE),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decides when engine logs are also printed through `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRedirectionStrategy {
    /// Print every delivered entry.
    AlwaysPrintLogs,
    /// Print only when neither a session nor a global log callback exists.
    #[default]
    PrintLogsWhenNoCallbacksDefined,
    /// Print only when no global log callback exists.
    PrintLogsWhenGlobalCallbackNotDefined,
    /// Print only when the session has no log callback.
    PrintLogsWhenSessionCallbackNotDefined,
    /// Never print.
    NeverPrintLogs,
}

impl LogRedirectionStrategy {
    /// Whether an entry should be printed, given which callbacks fired.
    pub fn should_print(self, session_callback: bool, global_callback: bool) -> bool {
        match self {
            Self::AlwaysPrintLogs => true,
            Self::PrintLogsWhenNoCallbacksDefined => !session_callback && !global_callback,
            Self::PrintLogsWhenGlobalCallbackNotDefined => !global_callback,
            Self::PrintLogsWhenSessionCallbackNotDefined => !session_callback,
            Self::NeverPrintLogs => false,
        }
    }
}

impl std::fmt::Display for LogRedirectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AlwaysPrintLogs => "always_print_logs",
            Self::PrintLogsWhenNoCallbacksDefined => "print_logs_when_no_callbacks_defined",
            Self::PrintLogsWhenGlobalCallbackNotDefined => {
                "print_logs_when_global_callback_not_defined"
            }
            Self::PrintLogsWhenSessionCallbackNotDefined => {
                "print_logs_when_session_callback_not_defined"
            }
            Self::NeverPrintLogs => "never_print_logs",
        };
        write!(f, "{}", name)
    }
}

/// Destination for engine-style diagnostics.
///
/// The option parser and the engine adapter write through this trait; the
/// session layer decides whether an entry is stored, forwarded or printed.
pub trait LogSink: Send + Sync {
    /// Deliver one message at the given level.
    fn log(&self, level: LogLevel, message: &str);
}

/// Sink that prints straight through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        super::emit(level, message);
    }
}

/// Configuration for per-session log files.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Number of recent lines kept for failure reports.
    pub error_tail: usize,
    /// Show timestamps in log file lines.
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            error_tail: 20,
            show_timestamps: true,
        }
    }
}
