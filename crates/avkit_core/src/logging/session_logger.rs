//! Per-session log file and tail buffer.
//!
//! Each session can get its own logger that:
//! - Writes delivered entries to a dedicated log file
//! - Keeps a tail of recent lines for failure reports

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel};

/// Per-session logger with optional file output.
pub struct SessionLogger {
    session_id: i64,
    log_path: Option<PathBuf>,
    file_writer: Mutex<Option<BufWriter<File>>>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
}

impl SessionLogger {
    /// Logger that only keeps the tail buffer.
    pub fn in_memory(session_id: i64, config: LogConfig) -> Self {
        Self {
            session_id,
            log_path: None,
            file_writer: Mutex::new(None),
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
        }
    }

    /// Logger writing to `<log_dir>/<name>-<id>.log`.
    pub fn with_file(
        session_id: i64,
        name: &str,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
    ) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!(
            "{}-{}.log",
            sanitize_filename(name),
            session_id
        ));
        let file = File::create(&log_path)?;

        Ok(Self {
            session_id,
            log_path: Some(log_path),
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
        })
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Path of the log file, if any.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Record one delivered entry.
    pub fn record(&self, level: LogLevel, message: &str) {
        let message = message.trim_end_matches(['\n', '\r']);
        if message.is_empty() {
            return;
        }

        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 {
                if buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                buffer.push_back(message.to_string());
            }
        }

        if let Some(ref mut writer) = *self.file_writer.lock() {
            let line = self.format_message(level, message);
            let _ = writeln!(writer, "{}", line);
        }
    }

    /// Recent lines, oldest first.
    pub fn tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Failure report: the error text followed by the recent log tail.
    pub fn failure_report(&self, error: &str) -> String {
        let tail = self.tail();
        if tail.is_empty() {
            return error.to_string();
        }
        format!("{}\n[log tail]\n{}", error, tail.join("\n"))
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the log file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, level: LogLevel, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S%.3f");
            format!("[{}] [{}] {}", timestamp, level, message)
        } else {
            format!("[{}] {}", level, message)
        }
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            _ => c,
        })
        .collect()
}
