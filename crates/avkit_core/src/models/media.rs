//! Media-related data structures (rationals, streams, input files).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::MediaType;

/// Exact fraction used for time bases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

/// Microsecond time base used for every parser-side timestamp.
pub const TIME_BASE_Q: Rational = Rational {
    num: 1,
    den: 1_000_000,
};

impl Rational {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Parse `N/D`, `N:D`, an integer, or a decimal number.
    pub fn parse(text: &str) -> Option<Rational> {
        let text = text.trim();
        if let Some((n, d)) = text.split_once(['/', ':']) {
            let num = n.trim().parse::<i64>().ok()?;
            let den = d.trim().parse::<i64>().ok()?;
            return Some(Rational::new(num, den));
        }
        if let Ok(value) = text.parse::<i64>() {
            return Some(Rational::new(value, 1));
        }
        let value = text.parse::<f64>().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(Rational::from_f64(value))
    }

    /// Approximate a float with a fraction whose denominator is at most 100000.
    pub fn from_f64(value: f64) -> Rational {
        let mut den: i64 = 1;
        while den < 100_000 && (value * den as f64).fract().abs() > 1e-9 {
            den *= 10;
        }
        Rational::new((value * den as f64).round() as i64, den).reduced()
    }

    /// `true` when the fraction is usable (non-zero numerator and denominator).
    pub fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Fraction in lowest terms with a positive denominator.
    pub fn reduced(&self) -> Rational {
        let g = gcd(self.num.abs(), self.den.abs()).max(1);
        let sign = if self.den < 0 { -1 } else { 1 };
        Rational::new(sign * self.num / g, sign * self.den / g)
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Rescale `value` from time base `from` to time base `to`, rounding to the
/// nearest integer with halves away from zero.
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return 0;
    }
    let half = den.abs() / 2;
    let rounded = if (num < 0) != (den < 0) {
        (num - half * den.signum()) / den
    } else {
        (num + half * den.signum()) / den
    };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// One stream of a probed input, as seen by the option parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Index within the file.
    pub index: usize,
    /// Container-level stream id (`#ID` specifiers).
    pub id: Option<i64>,
    pub media_type: MediaType,
    pub codec_name: Option<String>,
    pub time_base: Rational,
    pub frame_rate: Option<Rational>,
    /// Start time in `time_base` units.
    pub start_time: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    /// Attached picture (cover art) rather than real video.
    pub attached_pic: bool,
    /// Marked as default by the container.
    pub default_disposition: bool,
    /// Programs containing this stream.
    pub program_ids: Vec<i64>,
    pub tags: BTreeMap<String, String>,
    /// Discarded through `-discard all`.
    pub discard: bool,
    /// Decoder forced through `-c` on the input.
    pub decoder: Option<String>,
    /// Timestamp scale from `-itsscale`.
    pub ts_scale: f64,
    /// Hardware decoding method from `-hwaccel`.
    pub hwaccel: Option<String>,
}

impl StreamInfo {
    pub fn new(index: usize, media_type: MediaType) -> Self {
        Self {
            index,
            id: None,
            media_type,
            codec_name: None,
            time_base: Rational::new(1, 1000),
            frame_rate: None,
            start_time: None,
            width: None,
            height: None,
            sample_rate: None,
            channels: None,
            attached_pic: false,
            default_disposition: false,
            program_ids: Vec::new(),
            tags: BTreeMap::new(),
            discard: false,
            decoder: None,
            ts_scale: 1.0,
            hwaccel: None,
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec_name = Some(codec.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_frame_rate(mut self, rate: Rational) -> Self {
        self.frame_rate = Some(rate);
        self
    }

    pub fn with_audio(mut self, sample_rate: u32, channels: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self.channels = Some(channels);
        self
    }

    pub fn with_start_time(mut self, start_time: i64, time_base: Rational) -> Self {
        self.start_time = Some(start_time);
        self.time_base = time_base;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Pixel area, 0 when unknown.
    pub fn area(&self) -> u64 {
        self.width.unwrap_or(0) as u64 * self.height.unwrap_or(0) as u64
    }
}

/// An opened input file.
///
/// Probe fields describe the container; the remaining fields are filled from
/// the per-file options when the input is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFile {
    pub index: usize,
    pub url: String,
    /// Demuxer name as reported by the probe (may be a comma list).
    pub format_name: String,
    /// Demuxer has discontinuous timestamps (MPEG-TS style).
    pub ts_discont: bool,
    /// Demuxer does not read from a file (`lavfi`, network sources).
    pub no_file: bool,
    /// Container start time, microseconds.
    pub start_time: Option<i64>,
    /// Wall-clock start time, microseconds since the epoch.
    pub start_time_realtime: Option<i64>,
    /// Container duration, microseconds.
    pub duration: Option<i64>,
    pub streams: Vec<StreamInfo>,

    /// Forced input format (`-f`).
    pub forced_format: Option<String>,
    /// Seek position requested with `-ss`/`-sseof`, microseconds.
    pub seek_start: Option<i64>,
    /// Start time after discontinuity correction, microseconds.
    pub start_time_effective: Option<i64>,
    /// Read limit (`-t`/`-to`), microseconds.
    pub recording_time: Option<i64>,
    /// Offset applied to every timestamp read from this file.
    pub ts_offset: i64,
    /// User offset from `-itsoffset`.
    pub input_ts_offset: i64,
    /// `-isync` reference file, -1 when unset.
    pub input_sync_ref: i32,
    pub accurate_seek: bool,
    pub stream_loop: i32,
    pub readrate: f64,
    pub thread_queue_size: i32,
    /// Attachment streams to write out (`-dump_attachment`), as
    /// `(stream index, file name)`.
    pub attachment_dumps: Vec<(usize, String)>,
}

impl InputFile {
    /// Describe a probed container.
    pub fn new(url: impl Into<String>, format_name: impl Into<String>) -> Self {
        let format_name = format_name.into();
        Self {
            index: 0,
            url: url.into(),
            ts_discont: format_has_discontinuous_timestamps(&format_name),
            no_file: format_reads_without_file(&format_name),
            format_name,
            start_time: None,
            start_time_realtime: None,
            duration: None,
            streams: Vec::new(),
            forced_format: None,
            seek_start: None,
            start_time_effective: None,
            recording_time: None,
            ts_offset: 0,
            input_ts_offset: 0,
            input_sync_ref: -1,
            accurate_seek: true,
            stream_loop: 0,
            readrate: 0.0,
            thread_queue_size: -1,
            attachment_dumps: Vec::new(),
        }
    }

    pub fn with_stream(mut self, mut stream: StreamInfo) -> Self {
        stream.index = self.streams.len();
        self.streams.push(stream);
        self
    }

    pub fn with_start_time(mut self, start_time_us: i64) -> Self {
        self.start_time = Some(start_time_us);
        self
    }

    pub fn with_duration(mut self, duration_us: i64) -> Self {
        self.duration = Some(duration_us);
        self
    }

    /// Number of streams of the given type.
    pub fn count_of(&self, media_type: MediaType) -> usize {
        self.streams
            .iter()
            .filter(|s| s.media_type == media_type)
            .count()
    }
}

fn format_names(format_name: &str) -> impl Iterator<Item = &str> {
    format_name.split(',').map(str::trim)
}

/// Demuxers flagged as having discontinuous timestamps.
pub fn format_has_discontinuous_timestamps(format_name: &str) -> bool {
    const DISCONT: &[&str] = &["mpegts", "mpegtsraw", "mpeg", "hls", "rtp", "rtsp", "dvbsub"];
    format_names(format_name).any(|name| DISCONT.contains(&name))
}

/// Demuxers that do not open their URL as a file.
pub fn format_reads_without_file(format_name: &str) -> bool {
    const NOFILE: &[&str] = &["lavfi", "rtsp", "rtp", "sdp", "avfoundation", "dshow", "v4l2", "x11grab"];
    format_names(format_name).any(|name| NOFILE.contains(&name))
}
