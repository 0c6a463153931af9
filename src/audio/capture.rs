//! Capture-side frame pipeline: meter, encode, fire-and-forget transmit.
//!
//! One [`CaptureSession`] processes frames in strict arrival order at the
//! device's own cadence. Each frame updates the smoothed volume reading,
//! is encoded, and is handed to the channel without waiting for any
//! acknowledgment. Chunks the channel will not accept are dropped rather
//! than queued, so stale audio never accumulates.

use crate::audio::codec::encode_frame;
use crate::audio::{meter, AudioFrame};
use crate::channel::DuplexChannel;
use tracing::trace;

/// Counters collected during capture for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames pulled from the device and processed.
    pub frames_processed: u64,
    /// Encoded chunks accepted by the channel.
    pub frames_sent: u64,
    /// Encoded chunks dropped because the channel would not accept them.
    pub frames_dropped: u64,
}

/// Per-session capture pipeline state. Mutated only from the frame dispatch
/// path, never concurrently.
pub struct CaptureSession {
    sample_rate: u32,
    smoothing: f32,
    /// Previous smoothed volume reading, owned here per the meter contract.
    level: f32,
    stats: CaptureStats,
}

impl CaptureSession {
    /// New pipeline for a capture stream at `sample_rate`, smoothing volume
    /// readings with `smoothing` weight on each new frame.
    pub fn new(sample_rate: u32, smoothing: f32) -> Self {
        Self {
            sample_rate,
            smoothing,
            level: 0.0,
            stats: CaptureStats::default(),
        }
    }

    /// Runs one frame through the pipeline and returns the smoothed volume.
    ///
    /// The frame is consumed: nothing retains capture audio past this call.
    pub fn process_frame(&mut self, frame: AudioFrame, channel: &dyn DuplexChannel) -> f32 {
        self.stats.frames_processed += 1;
        let raw = meter::level(&frame.samples);
        self.level = meter::smooth(self.level, raw, self.smoothing);

        let chunk = encode_frame(&frame.samples, self.sample_rate);
        if channel.send(chunk) {
            self.stats.frames_sent += 1;
        } else {
            self.stats.frames_dropped += 1;
            trace!(
                dropped = self.stats.frames_dropped,
                "channel not accepting chunks; dropping frame"
            );
        }
        self.level
    }

    /// Current smoothed volume reading.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Capture counters for logging at teardown.
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}
