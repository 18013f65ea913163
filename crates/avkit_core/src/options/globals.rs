//! Per-parse global option state.
//!
//! Every value here is owned by a single parse (and therefore by a single
//! session). Two sessions parsing at the same time never see each other's
//! settings.

use std::cell::Cell;

use serde::Serialize;

/// Video sync method selected through `-vsync` / `-fps_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSyncMethod {
    #[default]
    Auto,
    Passthrough,
    Cfr,
    Vfr,
    Vscfr,
    Drop,
}

impl VideoSyncMethod {
    /// Parse a method name or its legacy numeric value.
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.to_ascii_lowercase().as_str() {
            "cfr" | "1" => Some(Self::Cfr),
            "vfr" | "2" => Some(Self::Vfr),
            "passthrough" | "0" => Some(Self::Passthrough),
            "drop" => Some(Self::Drop),
            "auto" | "-1" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Abort when no packets reach the output file.
pub const ABORT_ON_FLAG_EMPTY_OUTPUT: u32 = 1 << 0;
/// Abort when a single output stream receives no packets.
pub const ABORT_ON_FLAG_EMPTY_OUTPUT_STREAM: u32 = 1 << 1;

/// A hardware device declared with `-init_hw_device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HwDevice {
    pub name: String,
    pub kind: String,
    pub args: String,
}

/// Global option values for one parse.
#[derive(Debug, Clone, Serialize)]
pub struct ParserGlobals {
    pub dts_delta_threshold: f32,
    pub dts_error_threshold: f32,
    pub video_sync_method: VideoSyncMethod,
    pub frame_drop_threshold: f32,
    pub do_benchmark: bool,
    pub do_benchmark_all: bool,
    pub do_hex_dump: bool,
    pub do_pkt_dump: bool,
    pub copy_ts: bool,
    pub start_at_zero: bool,
    pub copy_tb: i32,
    pub debug_ts: bool,
    pub exit_on_error: bool,
    pub abort_on_flags: u32,
    pub print_stats: i32,
    /// Interactive keyboard control; always off when embedded.
    pub stdin_interaction: bool,
    pub max_error_rate: f32,
    pub filter_nbthreads: Option<String>,
    pub filter_complex_nbthreads: i32,
    pub vstats_version: i32,
    pub auto_conversion_filters: bool,
    /// Statistics period in microseconds.
    pub stats_period: i64,
    pub file_overwrite: bool,
    pub no_file_overwrite: bool,
    pub ignore_unknown_streams: bool,
    pub copy_unknown_streams: bool,
    pub recast_media: bool,
    pub vstats_filename: Option<String>,
    pub sdp_filename: Option<String>,
    pub progress_url: Option<String>,
    pub hw_devices: Vec<HwDevice>,
    pub filter_hw_device: Option<String>,
    pub hide_banner: bool,
    pub log_level: Option<String>,
    pub report: bool,
    /// CPU time limit in seconds (`-timelimit`).
    pub time_limit: Option<i32>,
}

impl Default for ParserGlobals {
    fn default() -> Self {
        Self {
            dts_delta_threshold: 10.0,
            dts_error_threshold: 3600.0 * 30.0,
            video_sync_method: VideoSyncMethod::Auto,
            frame_drop_threshold: 0.0,
            do_benchmark: false,
            do_benchmark_all: false,
            do_hex_dump: false,
            do_pkt_dump: false,
            copy_ts: false,
            start_at_zero: false,
            copy_tb: -1,
            debug_ts: false,
            exit_on_error: false,
            abort_on_flags: 0,
            print_stats: -1,
            stdin_interaction: false,
            max_error_rate: 2.0 / 3.0,
            filter_nbthreads: None,
            filter_complex_nbthreads: 0,
            vstats_version: 2,
            auto_conversion_filters: true,
            stats_period: 500_000,
            file_overwrite: false,
            no_file_overwrite: false,
            ignore_unknown_streams: false,
            copy_unknown_streams: false,
            recast_media: false,
            vstats_filename: None,
            sdp_filename: None,
            progress_url: None,
            hw_devices: Vec::new(),
            filter_hw_device: None,
            hide_banner: false,
            log_level: None,
            report: false,
            time_limit: None,
        }
    }
}

impl ParserGlobals {
    pub fn hw_device(&self, name: &str) -> Option<&HwDevice> {
        self.hw_devices.iter().find(|d| d.name == name)
    }
}

thread_local! {
    static CURRENT_SESSION: Cell<Option<i64>> = const { Cell::new(None) };
}

/// Id of the session executing on this thread, if any.
pub fn current_session_id() -> Option<i64> {
    CURRENT_SESSION.with(Cell::get)
}

/// Marks the calling thread as executing a session until dropped.
pub struct SessionScope {
    previous: Option<i64>,
}

impl SessionScope {
    pub fn enter(session_id: i64) -> Self {
        let previous = CURRENT_SESSION.with(|c| c.replace(Some(session_id)));
        Self { previous }
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        CURRENT_SESSION.with(|c| c.set(self.previous));
    }
}
