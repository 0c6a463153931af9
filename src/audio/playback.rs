//! Gap-free sequential scheduling of decoded buffers on the playback clock.
//!
//! The scheduler keeps a single cursor: the earliest time the next buffer may
//! start. Buffers that arrive ahead of real time queue back-to-back with zero
//! gap; buffers that arrive late start immediately, accepting a silent gap
//! rather than skipping or overlapping. There is no de-jitter buffer beyond
//! the cursor and no resequencing: the channel is trusted to deliver chunks
//! in play order. Buffers whose rate differs from the output's are dropped,
//! since they cannot play at their nominal duration.

use crate::audio::codec::DecodedBuffer;
use std::time::Duration;
use tracing::warn;

/// Playback device boundary: a clock plus a way to start a buffer at a time
/// on that clock.
pub trait PlaybackOutput {
    /// Current time on the playback device's own clock.
    fn current_time(&self) -> Duration;

    /// Rate the output was opened at. Buffers handed to [`Self::schedule`]
    /// always carry this rate.
    fn sample_rate(&self) -> u32;

    /// Begin playing `buffer` at `start`, which is never in the past.
    fn schedule(&mut self, buffer: DecodedBuffer, start: Duration);
}

/// Owns the no-overlap/no-gap invariant for one session's output path.
pub struct PlaybackScheduler {
    output: Box<dyn PlaybackOutput>,
    /// Next available start time. Sole writer: [`PlaybackScheduler::schedule`].
    cursor: Duration,
    buffers_scheduled: u64,
}

impl PlaybackScheduler {
    /// Wraps a playback output with a fresh cursor.
    pub fn new(output: Box<dyn PlaybackOutput>) -> Self {
        Self {
            output,
            cursor: Duration::ZERO,
            buffers_scheduled: 0,
        }
    }

    /// Schedules `buffer` after everything scheduled before it and returns
    /// the chosen start time, or `None` when the buffer was dropped.
    ///
    /// A buffer whose rate differs from the output's would occupy a
    /// different span of real time than its nominal duration, so the cursor
    /// and the device timeline would disagree and later buffers would
    /// overlap it audibly. Such buffers are dropped without moving the
    /// cursor, the same recovery as an undecodable chunk.
    ///
    /// The cursor read and write happen in one call frame with no suspension
    /// point in between, so the scheduling decision is atomic with respect
    /// to the cursor.
    pub fn schedule(&mut self, buffer: DecodedBuffer) -> Option<Duration> {
        if buffer.sample_rate != self.output.sample_rate() {
            warn!(
                buffer_rate = buffer.sample_rate,
                output_rate = self.output.sample_rate(),
                "dropping buffer with mismatched sample rate"
            );
            return None;
        }
        let now = self.output.current_time();
        let start = self.cursor.max(now);
        let duration = buffer.duration();
        self.output.schedule(buffer, start);
        self.cursor = start + duration;
        self.buffers_scheduled += 1;
        Some(start)
    }

    /// Next available start time on the playback clock.
    pub fn cursor(&self) -> Duration {
        self.cursor
    }

    /// Total buffers handed to the output since the session started.
    pub fn buffers_scheduled(&self) -> u64 {
        self.buffers_scheduled
    }
}
