//! Parsing of numeric, time, size and rate option values.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use super::errors::{OptionError, OptionsResult};
use crate::models::Rational;

/// Numeric storage type of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    Int64,
    Float,
    Double,
}

/// Parse a number with SI suffixes (`k`, `M`, `G`, `Ki`, ..., `B`) and check
/// it lies within `[min, max]`.
pub fn parse_number(
    context: &str,
    arg: &str,
    kind: NumberKind,
    min: f64,
    max: f64,
) -> OptionsResult<f64> {
    let value = match parse_si_number(arg) {
        Some(v) => v,
        None => {
            return Err(OptionError::invalid(format!(
                "Expected number for {} but found: {}",
                context, arg
            )))
        }
    };

    if value < min || value > max {
        return Err(OptionError::invalid(format!(
            "The value for {} was {} which is not within {:.6} - {:.6}",
            context, arg, min, max
        )));
    }

    if matches!(kind, NumberKind::Int | NumberKind::Int64) && value.fract() != 0.0 {
        let expected = if kind == NumberKind::Int64 { "int64" } else { "int" };
        return Err(OptionError::invalid(format!(
            "Expected {} for {} but found {}",
            expected, context, arg
        )));
    }

    Ok(value)
}

/// Parse an integer option within the engine's `int` range.
pub fn parse_int(context: &str, arg: &str) -> OptionsResult<i32> {
    parse_number(context, arg, NumberKind::Int, i32::MIN as f64, i32::MAX as f64).map(|v| v as i32)
}

/// Parse a 64-bit integer option.
pub fn parse_int64(context: &str, arg: &str) -> OptionsResult<i64> {
    parse_number(context, arg, NumberKind::Int64, i64::MIN as f64, i64::MAX as f64)
        .map(|v| v as i64)
}

/// Parse a floating point option.
pub fn parse_double(context: &str, arg: &str) -> OptionsResult<f64> {
    parse_number(context, arg, NumberKind::Double, f64::MIN, f64::MAX)
}

fn parse_si_number(arg: &str) -> Option<f64> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }

    let bytes = arg.as_bytes();
    let split = arg
        .char_indices()
        .find(|&(i, c)| {
            let after_exponent = i > 0 && matches!(bytes[i - 1], b'e' | b'E');
            let exponent = (c == 'e' || c == 'E')
                && i > 0
                && arg[i + 1..].starts_with(|n: char| n.is_ascii_digit() || n == '-' || n == '+');
            !(c.is_ascii_digit()
                || c == '.'
                || ((c == '-' || c == '+') && (i == 0 || after_exponent))
                || exponent)
        })
        .map(|(i, _)| i)
        .unwrap_or(arg.len());

    let (number, suffix) = arg.split_at(split);
    let mut value: f64 = number.parse().ok()?;

    let mut rest = suffix;
    if let Some(c) = rest.chars().next() {
        let exponent = match c {
            'y' => Some(-24),
            'z' => Some(-21),
            'a' => Some(-18),
            'f' => Some(-15),
            'p' => Some(-12),
            'n' => Some(-9),
            'u' => Some(-6),
            'm' => Some(-3),
            'c' => Some(-2),
            'd' => Some(-1),
            'h' => Some(2),
            'k' | 'K' => Some(3),
            'M' => Some(6),
            'G' => Some(9),
            'T' => Some(12),
            'P' => Some(15),
            'E' => Some(18),
            'Z' => Some(21),
            'Y' => Some(24),
            _ => None,
        };
        if let Some(e) = exponent {
            rest = &rest[1..];
            if let Some(after) = rest.strip_prefix('i') {
                value *= 2f64.powf(e as f64 / 0.3);
                rest = after;
            } else {
                value *= 10f64.powi(e);
            }
        }
    }
    if let Some(after) = rest.strip_prefix('B') {
        value *= 8.0;
        rest = after;
    }

    if rest.is_empty() {
        Some(value)
    } else {
        None
    }
}

/// Parse a boolean option value.
pub fn parse_bool(arg: &str) -> Option<bool> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Some(true),
        "0" | "false" | "no" | "off" | "n" => Some(false),
        _ => None,
    }
}

/// Parse a time value to microseconds.
///
/// Durations accept `[-][HH:]MM:SS[.m...]` and `[-]S+[.m...][s|ms|us]`.
/// Dates accept `now` and `YYYY-MM-DD[T| ]HH:MM:SS[.m...][Z]`.
pub fn parse_time(context: &str, arg: &str, is_duration: bool) -> OptionsResult<i64> {
    let parsed = if is_duration {
        parse_duration_us(arg)
    } else {
        parse_date_us(arg)
    };
    parsed.ok_or_else(|| {
        OptionError::invalid(format!(
            "Invalid {} specification for {}: {}",
            if is_duration { "duration" } else { "date" },
            context,
            arg
        ))
    })
}

fn parse_duration_us(arg: &str) -> Option<i64> {
    let arg = arg.trim();
    let (negative, body) = match arg.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, arg),
    };
    if body.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match body.find('.') {
        Some(pos) => (&body[..pos], &body[pos + 1..]),
        None => (body, ""),
    };

    let mut micros: i64;

    if int_part.contains(':') {
        let fields: Vec<&str> = int_part.split(':').collect();
        let (hours, minutes, seconds) = match fields.as_slice() {
            [h, m, s] => (parse_digits(h)?, parse_two_digits(m)?, parse_two_digits(s)?),
            [m, s] => (0, parse_two_digits(m)?, parse_two_digits(s)?),
            _ => return None,
        };
        micros = hours
            .checked_mul(60)?
            .checked_add(minutes)?
            .checked_mul(60)?
            .checked_add(seconds)?
            .checked_mul(1_000_000)?
            .checked_add(parse_fraction(frac_part)?)?;
    } else {
        let digits_end = int_part
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(int_part.len());
        let seconds = if digits_end == 0 {
            if frac_part.is_empty() {
                return None;
            }
            0
        } else {
            parse_digits(&int_part[..digits_end])?
        };
        micros = seconds.checked_mul(1_000_000)?;
        let suffix = if digits_end < int_part.len() {
            if !frac_part.is_empty() {
                return None;
            }
            &int_part[digits_end..]
        } else {
            let frac_end = frac_part
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(frac_part.len());
            micros = micros.checked_add(parse_fraction(&frac_part[..frac_end])?)?;
            &frac_part[frac_end..]
        };
        match suffix {
            "" | "s" => {}
            "ms" => micros /= 1_000,
            "us" => micros /= 1_000_000,
            _ => return None,
        }
    }

    Some(if negative { -micros } else { micros })
}

fn parse_digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_two_digits(s: &str) -> Option<i64> {
    let v = parse_digits(s)?;
    if s.len() > 2 || v > 59 {
        return None;
    }
    Some(v)
}

/// Up to six fractional digits as microseconds; further digits are ignored.
fn parse_fraction(frac: &str) -> Option<i64> {
    if frac.is_empty() {
        return Some(0);
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut micros = 0i64;
    let mut scale = 100_000i64;
    for c in frac.chars().take(6) {
        micros += (c as i64 - '0' as i64) * scale;
        scale /= 10;
    }
    Some(micros)
}

fn parse_date_us(arg: &str) -> Option<i64> {
    let arg = arg.trim();
    if arg.eq_ignore_ascii_case("now") {
        return Some(Utc::now().timestamp_micros());
    }

    let (body, utc) = match arg.strip_suffix(['Z', 'z']) {
        Some(rest) => (rest, true),
        None => (arg, false),
    };

    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y%m%dT%H%M%S%.f",
        "%Y%m%d %H%M%S%.f",
    ];
    let naive = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(body, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(body, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    if utc {
        Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).timestamp_micros())
    } else {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_micros())
    }
}

/// Named frame sizes.
const FRAME_SIZE_ABBRS: &[(&str, u32, u32)] = &[
    ("ntsc", 720, 480),
    ("pal", 720, 576),
    ("qntsc", 352, 240),
    ("qpal", 352, 288),
    ("sntsc", 640, 480),
    ("spal", 768, 576),
    ("film", 352, 240),
    ("ntsc-film", 352, 240),
    ("sqcif", 128, 96),
    ("qcif", 176, 144),
    ("cif", 352, 288),
    ("4cif", 704, 576),
    ("16cif", 1408, 1152),
    ("qqvga", 160, 120),
    ("qvga", 320, 240),
    ("vga", 640, 480),
    ("svga", 800, 600),
    ("xga", 1024, 768),
    ("uxga", 1600, 1200),
    ("qxga", 2048, 1536),
    ("sxga", 1280, 1024),
    ("qsxga", 2560, 2048),
    ("hsxga", 5120, 4096),
    ("wvga", 852, 480),
    ("wxga", 1366, 768),
    ("wsxga", 1600, 1024),
    ("wuxga", 1920, 1200),
    ("woxga", 2560, 1600),
    ("wqsxga", 3200, 2048),
    ("wquxga", 3840, 2400),
    ("whsxga", 6400, 4096),
    ("whuxga", 7680, 4800),
    ("cga", 320, 200),
    ("ega", 640, 350),
    ("hd480", 852, 480),
    ("hd720", 1280, 720),
    ("hd1080", 1920, 1080),
    ("2k", 2048, 1080),
    ("2kdci", 2048, 1080),
    ("2kflat", 1998, 1080),
    ("2kscope", 2048, 858),
    ("4k", 4096, 2160),
    ("4kdci", 4096, 2160),
    ("4kflat", 3996, 2160),
    ("4kscope", 4096, 1716),
    ("nhd", 640, 360),
    ("hqvga", 240, 160),
    ("wqvga", 400, 240),
    ("fwqvga", 432, 240),
    ("hvga", 480, 320),
    ("qhd", 960, 540),
    ("uhd2160", 3840, 2160),
    ("uhd4320", 7680, 4320),
];

/// Named frame rates.
const FRAME_RATE_ABBRS: &[(&str, i64, i64)] = &[
    ("ntsc", 30000, 1001),
    ("pal", 25, 1),
    ("qntsc", 30000, 1001),
    ("qpal", 25, 1),
    ("sntsc", 30000, 1001),
    ("spal", 25, 1),
    ("film", 24, 1),
    ("ntsc-film", 24000, 1001),
];

/// Parse `WxH` or a named size (`hd720`, `vga`, ...).
pub fn parse_frame_size(arg: &str) -> OptionsResult<(u32, u32)> {
    let invalid = || OptionError::invalid(format!("Invalid frame size: {}.", arg));

    if let Some(&(_, w, h)) = FRAME_SIZE_ABBRS.iter().find(|(name, _, _)| *name == arg) {
        return Ok((w, h));
    }
    let (w, h) = arg.split_once('x').ok_or_else(invalid)?;
    let width: u32 = w.trim().parse().map_err(|_| invalid())?;
    let height: u32 = h.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

/// Parse `N/D`, a decimal, or a named rate (`ntsc`, `pal`, `film`).
pub fn parse_frame_rate(arg: &str) -> OptionsResult<Rational> {
    if let Some(&(_, num, den)) = FRAME_RATE_ABBRS.iter().find(|(name, _, _)| *name == arg) {
        return Ok(Rational::new(num, den));
    }
    match Rational::parse(arg) {
        Some(r) if r.num > 0 && r.den > 0 => Ok(r),
        _ => Err(OptionError::invalid(format!(
            "Invalid framerate value: {}",
            arg
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_with_suffixes() {
        assert_eq!(parse_number("b", "128k", NumberKind::Int64, 0.0, 1e12).unwrap(), 128_000.0);
        assert_eq!(parse_number("fs", "1Ki", NumberKind::Int64, 0.0, 1e12).unwrap(), 1024.0);
        assert_eq!(parse_number("x", "1.5M", NumberKind::Double, 0.0, 1e12).unwrap(), 1_500_000.0);
        assert_eq!(parse_number("x", "2e3", NumberKind::Double, 0.0, 1e12).unwrap(), 2000.0);
    }

    #[test]
    fn number_range_errors() {
        let err = parse_number("ac", "99", NumberKind::Int, 0.0, 8.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The value for ac was 99 which is not within 0.000000 - 8.000000"
        );
        let err = parse_number("ac", "two", NumberKind::Int, 0.0, 8.0).unwrap_err();
        assert!(err.to_string().starts_with("Expected number for ac"));
        let err = parse_int("threads", "1.5").unwrap_err();
        assert_eq!(err.to_string(), "Expected int for threads but found 1.5");
    }

    #[test]
    fn durations() {
        assert_eq!(parse_time("t", "10", true).unwrap(), 10_000_000);
        assert_eq!(parse_time("t", "1.5", true).unwrap(), 1_500_000);
        assert_eq!(parse_time("t", "-2.25", true).unwrap(), -2_250_000);
        assert_eq!(parse_time("t", "200ms", true).unwrap(), 200_000);
        assert_eq!(parse_time("t", "150us", true).unwrap(), 150);
        assert_eq!(parse_time("t", "01:02:03.5", true).unwrap(), 3_723_500_000);
        assert_eq!(parse_time("t", "02:03", true).unwrap(), 123_000_000);
        assert_eq!(parse_time("t", "100:00:00", true).unwrap(), 360_000_000_000);
        assert_eq!(parse_time("t", "0.1234567", true).unwrap(), 123_456);
    }

    #[test]
    fn bad_durations() {
        for arg in ["", "abc", "1:99", "1.5x", "1:2:3:4", "-"] {
            let err = parse_time("ss", arg, true).unwrap_err();
            assert!(err.to_string().starts_with("Invalid duration specification for ss"));
        }
    }

    #[test]
    fn oversized_durations_are_rejected() {
        for arg in [
            "99999999999999:00:00",
            "-99999999999999:00:00",
            "2562047789:00:00",
            "9223372036855",
            "9223372036854.999999",
        ] {
            let err = parse_time("ss", arg, true).unwrap_err();
            assert!(err.to_string().starts_with("Invalid duration specification for ss"));
        }
    }

    #[test]
    fn dates() {
        let t = parse_time("timestamp", "2020-01-02T03:04:05Z", false).unwrap();
        assert_eq!(t, 1_577_934_245_000_000);
        assert!(parse_time("timestamp", "now", false).unwrap() > 0);
        assert!(parse_time("timestamp", "yesterday", false).is_err());
    }

    #[test]
    fn frame_sizes() {
        assert_eq!(parse_frame_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_frame_size("hd1080").unwrap(), (1920, 1080));
        assert_eq!(parse_frame_size("pal").unwrap(), (720, 576));
        assert!(parse_frame_size("0x720").is_err());
        assert!(parse_frame_size("big").is_err());
    }

    #[test]
    fn frame_rates() {
        assert_eq!(parse_frame_rate("ntsc").unwrap(), Rational::new(30000, 1001));
        assert_eq!(parse_frame_rate("25").unwrap(), Rational::new(25, 1));
        assert_eq!(parse_frame_rate("24000/1001").unwrap(), Rational::new(24000, 1001));
        assert!(parse_frame_rate("0").is_err());
    }

    #[test]
    fn bools() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
