//! Session registry and entry points.
//!
//! [`KitConfig`] holds everything sessions share: log settings, global
//! callbacks, the session history and the engine. [`FfmpegKit`] and
//! [`FfprobeKit`] create sessions in a registry and run them on the calling
//! thread or on the async executor.
//!
//! # Example
//!
//! ```no_run
//! use avkit_core::kit::FfmpegKit;
//!
//! let session = FfmpegKit::default().execute("-i in.mp4 -c:v libx264 out.mkv");
//! if let Some(code) = session.core().return_code() {
//!     println!("{} finished with {}", session.core().command(), code.value());
//! }
//! ```

mod config;
mod delivery;
mod executor;
mod ffmpeg_kit;
mod ffprobe_kit;
pub mod fonts;
mod runner;

pub use config::KitConfig;
pub use executor::Executor;
pub use ffmpeg_kit::FfmpegKit;
pub use ffprobe_kit::FfprobeKit;
