//! Parsing of engine stderr lines: level prefixes and progress reports.

use crate::logging::LogLevel;
use crate::session::Statistics;

/// Split a `-loglevel level+...` line into its level and message.
///
/// The level tag may follow a context prefix (`[mp4 @ 0x55d] [warning] ...`);
/// the prefix is kept in the message. Untagged lines are `Info`.
pub fn parse_log_line(line: &str) -> (LogLevel, String) {
    let mut search = 0;
    while let Some(open) = line[search..].find('[').map(|i| i + search) {
        let Some(close) = line[open..].find(']').map(|i| i + open) else {
            break;
        };
        let tag = &line[open + 1..close];
        if let Some(level) = tag_level(tag) {
            let rest = line[close + 1..].strip_prefix(' ').unwrap_or(&line[close + 1..]);
            let message = format!("{}{}", &line[..open], rest);
            return (level, message);
        }
        search = close + 1;
    }
    (LogLevel::Info, line.to_string())
}

fn tag_level(tag: &str) -> Option<LogLevel> {
    if tag.chars().any(|c| !c.is_ascii_lowercase()) {
        return None;
    }
    LogLevel::ALL
        .iter()
        .copied()
        .filter(|level| *level != LogLevel::Stderr)
        .find(|level| level.name() == tag)
}

/// Whether a stderr line is a periodic progress report.
pub fn is_progress_line(line: &str) -> bool {
    line.contains("time=") && line.contains("bitrate=")
}

/// Parse a progress report line into [`Statistics`].
pub fn parse_progress(session_id: i64, line: &str) -> Option<Statistics> {
    if !is_progress_line(line) {
        return None;
    }
    let number = |key: &str| -> Option<f64> {
        let value = extract_value(line, key)?;
        let digits: String = value
            .chars()
            .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | '+'))
            .collect();
        digits.parse().ok()
    };

    Some(Statistics {
        session_id,
        video_frame_number: number("frame=").map_or(0, |v| v as i32),
        video_fps: number("fps=").map_or(0.0, |v| v as f32),
        video_quality: number("q=").map_or(0.0, |v| v as f32),
        size: extract_value(line, "size=").and_then(|v| parse_size(&v)).unwrap_or(0),
        time: extract_value(line, "time=").and_then(|v| parse_clock(&v)).unwrap_or(0.0),
        bitrate: number("bitrate=").unwrap_or(0.0),
        speed: number("speed=").unwrap_or(0.0),
    })
}

/// Value following `key`, skipping the padding the engine inserts.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = find_key(line, key)?;
    let after_key = &line[start + key.len()..];
    let value_start = after_key
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(after_key.len());
    let value_part = &after_key[value_start..];
    let end = value_part
        .find(|c: char| c.is_whitespace())
        .unwrap_or(value_part.len());
    Some(value_part[..end].to_string())
}

/// Position of `key` where it starts a field (`q=` must not match `freq=`).
fn find_key(line: &str, key: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = line[from..].find(key).map(|i| i + from) {
        let starts_field = line[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace());
        if starts_field {
            return Some(pos);
        }
        from = pos + key.len();
    }
    None
}

/// `1024kB` / `1024KiB` / `N/A` into bytes.
fn parse_size(value: &str) -> Option<i64> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: i64 = digits.parse().ok()?;
    let scale = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" | "kib" => 1024,
        "mb" | "mib" => 1024 * 1024,
        _ => return None,
    };
    Some(amount * scale)
}

/// `[-]HH:MM:SS.ss` into milliseconds.
fn parse_clock(value: &str) -> Option<f64> {
    let (sign, value) = match value.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, value),
    };
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(sign * ((hours * 60.0 + minutes) * 60.0 + seconds) * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO: &str =
        "frame=  123 fps= 60.0 q=28.0 size=    1024kB time=00:00:10.50 bitrate= 2000.0kbits/s speed=1.02x";

    #[test]
    fn parses_video_progress() {
        let stats = parse_progress(7, VIDEO).unwrap();
        assert_eq!(stats.session_id, 7);
        assert_eq!(stats.video_frame_number, 123);
        assert_eq!(stats.video_fps, 60.0);
        assert_eq!(stats.video_quality, 28.0);
        assert_eq!(stats.size, 1024 * 1024);
        assert_eq!(stats.time, 10_500.0);
        assert_eq!(stats.bitrate, 2000.0);
        assert_eq!(stats.speed, 1.02);
    }

    #[test]
    fn parses_audio_progress_and_na_values() {
        let stats =
            parse_progress(1, "size=N/A time=-00:00:00.02 bitrate=N/A speed=N/A").unwrap();
        assert_eq!(stats.video_frame_number, 0);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.time, -20.0);
        assert_eq!(stats.bitrate, 0.0);
        assert!(parse_progress(1, "Input #0, matroska,webm, from 'in.mkv':").is_none());
    }

    #[test]
    fn level_prefixes() {
        assert_eq!(
            parse_log_line("[info] Press [q] to stop"),
            (LogLevel::Info, "Press [q] to stop".to_string())
        );
        assert_eq!(
            parse_log_line("[mp4 @ 0x55d] [warning] bad atom"),
            (LogLevel::Warning, "[mp4 @ 0x55d] bad atom".to_string())
        );
        assert_eq!(
            parse_log_line("plain line"),
            (LogLevel::Info, "plain line".to_string())
        );
        assert_eq!(parse_log_line("[error] x").0, LogLevel::Error);
    }
}
