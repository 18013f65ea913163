//! Drives one session through its lifecycle on the calling thread.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use super::config::KitConfig;
use super::delivery::{guarded, SessionSink};
use crate::engine::{EngineError, EngineKind, EngineProbe, ExecutionContext};
use crate::error_code;
use crate::options::{parse_ffmpeg_options, SessionScope};
use crate::probe::MediaInformation;
use crate::session::{
    FfmpegSession, FfprobeSession, MediaInformationSession, ReturnCode, SessionCore,
};

fn context<'a>(config: &KitConfig, core: &SessionCore, sink: &'a SessionSink<'a>) -> ExecutionContext<'a> {
    ExecutionContext::new(core.id(), sink)
        .with_cancel(core.cancel_flag())
        .with_env(config.environment())
        .with_log_level(config.log_level())
}

/// Mark the session running; a session cancelled while queued ends here.
fn start(core: &SessionCore) -> bool {
    core.start_running();
    if core.is_cancel_requested() {
        tracing::debug!("Session {} cancelled before start", core.id());
        core.complete(ReturnCode::CANCEL);
        return false;
    }
    true
}

fn engine_failed(core: &SessionCore, err: EngineError) {
    let report = core.logger().failure_report(&err.to_string());
    tracing::error!("Session {} failed: {}", core.id(), report);
    core.fail(report, err.code());
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run the session body; a panic fails the session instead of unwinding
/// into the caller or the worker thread.
fn contained(core: &SessionCore, body: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(body)) {
        let message = panic_message(payload.as_ref());
        tracing::error!("Session {} panicked: {}", core.id(), message);
        core.fail(format!("Session panicked: {}", message), error_code::EIO);
    }
}

fn finished(core: &SessionCore) {
    tracing::debug!(
        "Session {} {} with {:?} after {} ms",
        core.id(),
        core.state(),
        core.return_code().map(|c| c.value()),
        core.duration()
    );
}

pub(crate) fn run_ffmpeg(config: &KitConfig, session: &Arc<FfmpegSession>) {
    let core = session.core();
    let _scope = SessionScope::enter(core.id());
    let sink = SessionSink::for_ffmpeg(config, session);

    if start(core) {
        contained(core, || execute_ffmpeg(config, core, &sink));
    }
    finished(core);

    if let Some(callback) = session.complete_callback() {
        guarded("Complete", core.id(), || callback(session));
    }
    if let Some(callback) = config.ffmpeg_session_complete_callback() {
        guarded("Global complete", core.id(), || callback(session));
    }
    core.release_waiters();
}

fn execute_ffmpeg(config: &KitConfig, core: &SessionCore, sink: &SessionSink<'_>) {
    let engine = config.engine();

    if config.validate_commands() {
        let env = config.parse_env();
        match parse_ffmpeg_options(core.arguments(), &EngineProbe(engine.as_ref()), &env, sink) {
            Ok(parsed) => tracing::debug!(
                "Session {} parsed {} inputs and {} outputs",
                core.id(),
                parsed.inputs.len(),
                parsed.outputs.len()
            ),
            Err(err) if err.is_exit() => {
                core.complete(ReturnCode::SUCCESS);
                return;
            }
            Err(err) => {
                core.fail(err.to_string(), err.code());
                return;
            }
        }
    }

    let ctx = context(config, core, sink);
    match engine.run(EngineKind::Ffmpeg, core.arguments(), &ctx) {
        Ok(status) => core.complete(ReturnCode(status)),
        Err(err) => engine_failed(core, err),
    }
}

pub(crate) fn run_ffprobe(config: &KitConfig, session: &Arc<FfprobeSession>) {
    let core = session.core();
    let _scope = SessionScope::enter(core.id());
    let sink = SessionSink::new(config, core);

    if start(core) {
        contained(core, || {
            let ctx = context(config, core, &sink);
            match config.engine().run(EngineKind::Ffprobe, core.arguments(), &ctx) {
                Ok(status) => core.complete(ReturnCode(status)),
                Err(err) => engine_failed(core, err),
            }
        });
    }
    finished(core);

    if let Some(callback) = session.complete_callback() {
        guarded("Complete", core.id(), || callback(session));
    }
    if let Some(callback) = config.ffprobe_session_complete_callback() {
        guarded("Global complete", core.id(), || callback(session));
    }
    core.release_waiters();
}

pub(crate) fn run_media_information(
    config: &KitConfig,
    session: &Arc<MediaInformationSession>,
    timeout: Option<Duration>,
) {
    let core = session.core();
    let _scope = SessionScope::enter(core.id());
    let sink = SessionSink::new(config, core);

    if start(core) {
        contained(core, || {
            let ctx = context(config, core, &sink).with_timeout(timeout);
            match config.engine().run(EngineKind::Ffprobe, core.arguments(), &ctx) {
                Ok(0) => match MediaInformation::from_json(&core.output()) {
                    Ok(info) => {
                        session.set_media_information(info);
                        core.complete(ReturnCode::SUCCESS);
                    }
                    Err(err) => {
                        sink.deliver_log(
                            crate::logging::LogLevel::Error,
                            &format!("Invalid media information: {}", err),
                        );
                        core.fail(err.to_string(), error_code::INVALIDDATA);
                    }
                },
                Ok(status) => core.complete(ReturnCode(status)),
                Err(err) => engine_failed(core, err),
            }
        });
    }
    finished(core);

    if let Some(callback) = session.complete_callback() {
        guarded("Complete", core.id(), || callback(session));
    }
    if let Some(callback) = config.media_information_session_complete_callback() {
        guarded("Global complete", core.id(), || callback(session));
    }
    core.release_waiters();
}
