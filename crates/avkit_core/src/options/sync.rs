//! Input start-time correction and `-isync` offsets.

use super::errors::{OptionError, OptionsResult};
use super::globals::ParserGlobals;
use crate::logging::{LogLevel, LogSink};
use crate::models::{rescale, InputFile, TIME_BASE_Q};

/// Recompute the start of inputs whose demuxer has discontinuous
/// timestamps from the earliest enabled stream, and derive their
/// timestamp offset.
pub fn correct_input_start_times(inputs: &mut [InputFile], globals: &ParserGlobals, sink: &dyn LogSink) {
    for (i, file) in inputs.iter_mut().enumerate() {
        file.start_time_effective = file.start_time;

        let Some(start_time) = file.start_time else {
            continue;
        };
        if !file.ts_discont {
            continue;
        }

        let Some(new_start_time) = file
            .streams
            .iter()
            .filter(|s| !s.discard)
            .filter_map(|s| s.start_time.map(|t| rescale(t, s.time_base, TIME_BASE_Q)))
            .min()
        else {
            continue;
        };

        let diff = new_start_time - start_time;
        if diff == 0 {
            continue;
        }

        sink.log(
            LogLevel::Verbose,
            &format!("Correcting start time of Input #{} by {} us.", i, diff),
        );
        file.start_time_effective = Some(new_start_time);

        if globals.copy_ts && globals.start_at_zero {
            file.ts_offset = -new_start_time;
        } else if !globals.copy_ts {
            let abs_start_seek = start_time + file.seek_start.unwrap_or(0);
            file.ts_offset = if abs_start_seek > new_start_time {
                -abs_start_seek
            } else {
                -new_start_time
            };
        } else {
            file.ts_offset = 0;
        }

        file.ts_offset += file.input_ts_offset;
    }
}

/// Shift inputs that asked to be synchronised to another input with `-isync`.
pub fn apply_sync_offsets(
    inputs: &mut [InputFile],
    globals: &ParserGlobals,
    sink: &dyn LogSink,
) -> OptionsResult<()> {
    for i in 0..inputs.len() {
        let sync_ref = inputs[i].input_sync_ref;
        if sync_ref == -1 || sync_ref == i as i32 {
            continue;
        }
        if sync_ref < -1 || sync_ref as usize >= inputs.len() {
            let message = format!(
                "-isync for input {} references non-existent input {}.",
                i, sync_ref
            );
            sink.log(LogLevel::Fatal, &message);
            return Err(OptionError::invalid(message));
        }

        if globals.copy_ts && !globals.start_at_zero {
            let message = "Use of -isync requires that start_at_zero be set if copyts is set.";
            sink.log(LogLevel::Fatal, message);
            return Err(OptionError::invalid(message));
        }

        let reference = &inputs[sync_ref as usize];
        let this = &inputs[i];

        if reference.input_sync_ref != -1 && reference.input_sync_ref != sync_ref {
            sink.log(
                LogLevel::Error,
                &format!(
                    "-isync for input {} references a resynced input {}. Sync not set.",
                    i, sync_ref
                ),
            );
            continue;
        }

        let start_times = match (
            this.start_time_realtime,
            reference.start_time_realtime,
            this.start_time_effective,
            reference.start_time_effective,
        ) {
            (Some(own), Some(other), _, _) => Some((own, other)),
            (_, _, Some(own), Some(other)) => Some((own, other)),
            _ => None,
        };

        let Some((self_start, ref_start)) = start_times else {
            sink.log(
                LogLevel::Info,
                &format!(
                    "Unable to identify start times for Inputs #{} and {} both. No sync adjustment made.",
                    i, sync_ref
                ),
            );
            continue;
        };

        let self_seek = this.seek_start.unwrap_or(0);
        let ref_seek = reference.seek_start.unwrap_or(0);
        let seek_term = if globals.copy_ts { 0 } else { self_seek - ref_seek };
        let adjustment = (self_start - ref_start) + seek_term + reference.input_ts_offset;

        inputs[i].ts_offset += adjustment;

        sink.log(
            LogLevel::Info,
            &format!(
                "Adjusted ts offset for Input #{} by {} us to sync with Input #{}.",
                i, adjustment, sync_ref
            ),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;
    use crate::models::{MediaType, Rational, StreamInfo};

    fn ts_input(start: i64) -> InputFile {
        InputFile::new("in.ts", "mpegts")
            .with_start_time(start)
            .with_stream(StreamInfo::new(0, MediaType::Video).with_start_time(
                // 1.5 s at 90 kHz
                135_000,
                Rational::new(1, 90_000),
            ))
            .with_stream(StreamInfo::new(1, MediaType::Audio).with_start_time(
                // 1.4 s
                126_000,
                Rational::new(1, 90_000),
            ))
    }

    #[test]
    fn discontinuous_inputs_are_corrected() {
        let mut inputs = vec![ts_input(1_000_000)];
        let globals = ParserGlobals::default();
        correct_input_start_times(&mut inputs, &globals, &TracingSink);
        assert_eq!(inputs[0].start_time_effective, Some(1_400_000));
        assert_eq!(inputs[0].ts_offset, -1_400_000);
    }

    #[test]
    fn discarded_streams_are_ignored() {
        let mut inputs = vec![ts_input(1_000_000)];
        inputs[0].streams[1].discard = true;
        correct_input_start_times(&mut inputs, &ParserGlobals::default(), &TracingSink);
        assert_eq!(inputs[0].start_time_effective, Some(1_500_000));
    }

    #[test]
    fn seek_beyond_new_start_wins() {
        let mut inputs = vec![ts_input(1_000_000)];
        inputs[0].seek_start = Some(2_000_000);
        inputs[0].input_ts_offset = 100;
        correct_input_start_times(&mut inputs, &ParserGlobals::default(), &TracingSink);
        assert_eq!(inputs[0].ts_offset, -3_000_000 + 100);
    }

    #[test]
    fn copyts_rules() {
        let mut globals = ParserGlobals::default();
        globals.copy_ts = true;
        let mut inputs = vec![ts_input(1_000_000)];
        correct_input_start_times(&mut inputs, &globals, &TracingSink);
        assert_eq!(inputs[0].ts_offset, 0);

        globals.start_at_zero = true;
        let mut inputs = vec![ts_input(1_000_000)];
        correct_input_start_times(&mut inputs, &globals, &TracingSink);
        assert_eq!(inputs[0].ts_offset, -1_400_000);
    }

    #[test]
    fn continuous_formats_are_untouched() {
        let mut inputs = vec![InputFile::new("a.mp4", "mov,mp4,m4a,3gp,3g2,mj2").with_start_time(500)];
        correct_input_start_times(&mut inputs, &ParserGlobals::default(), &TracingSink);
        assert_eq!(inputs[0].start_time_effective, Some(500));
        assert_eq!(inputs[0].ts_offset, 0);
    }

    fn synced_pair() -> Vec<InputFile> {
        let mut a = InputFile::new("a.mp4", "mp4");
        a.start_time_effective = Some(1_000_000);
        let mut b = InputFile::new("b.mp4", "mp4");
        b.start_time_effective = Some(3_000_000);
        b.input_sync_ref = 0;
        vec![a, b]
    }

    #[test]
    fn sync_adjusts_offset() {
        let mut inputs = synced_pair();
        inputs[1].seek_start = Some(500_000);
        inputs[0].input_ts_offset = 7;
        apply_sync_offsets(&mut inputs, &ParserGlobals::default(), &TracingSink).unwrap();
        assert_eq!(inputs[1].ts_offset, 2_000_000 + 500_000 + 7);
    }

    #[test]
    fn sync_prefers_realtime_start() {
        let mut inputs = synced_pair();
        inputs[0].start_time_realtime = Some(10);
        inputs[1].start_time_realtime = Some(40);
        apply_sync_offsets(&mut inputs, &ParserGlobals::default(), &TracingSink).unwrap();
        assert_eq!(inputs[1].ts_offset, 30);
    }

    #[test]
    fn self_reference_is_skipped() {
        let mut inputs = synced_pair();
        inputs[1].input_sync_ref = 1;
        apply_sync_offsets(&mut inputs, &ParserGlobals::default(), &TracingSink).unwrap();
        assert_eq!(inputs[1].ts_offset, 0);
    }

    #[test]
    fn out_of_range_reference_fails() {
        let mut inputs = synced_pair();
        inputs[1].input_sync_ref = 5;
        let err = apply_sync_offsets(&mut inputs, &ParserGlobals::default(), &TracingSink).unwrap_err();
        assert_eq!(err.to_string(), "-isync for input 1 references non-existent input 5.");
    }

    #[test]
    fn copyts_without_start_at_zero_fails() {
        let mut inputs = synced_pair();
        let mut globals = ParserGlobals::default();
        globals.copy_ts = true;
        assert!(apply_sync_offsets(&mut inputs, &globals, &TracingSink).is_err());
    }

    #[test]
    fn resynced_reference_is_refused() {
        let mut inputs = synced_pair();
        let mut c = InputFile::new("c.mp4", "mp4");
        c.start_time_effective = Some(9_000_000);
        c.input_sync_ref = 1;
        inputs.push(c);
        apply_sync_offsets(&mut inputs, &ParserGlobals::default(), &TracingSink).unwrap();
        assert_eq!(inputs[2].ts_offset, 0);
        assert_ne!(inputs[1].ts_offset, 0);
    }

    #[test]
    fn missing_start_times_skip_adjustment() {
        let mut inputs = synced_pair();
        inputs[0].start_time_effective = None;
        apply_sync_offsets(&mut inputs, &ParserGlobals::default(), &TracingSink).unwrap();
        assert_eq!(inputs[1].ts_offset, 0);
    }
}
