//! Audio device boundaries and their CPAL implementations.
//!
//! The session core sees only the traits here: a capture device that yields
//! fixed-size frames at hardware cadence, and a playback device exposing a
//! clock plus timed scheduling. The CPAL backends adapt real hardware to
//! those seams; tests substitute fakes.

mod chunker;
mod cpal_input;
mod cpal_output;

pub(crate) use chunker::FrameChunker;
pub use cpal_input::CpalCaptureDevice;
pub use cpal_output::CpalPlaybackDevice;

use crate::audio::AudioFrame;
use crate::audio::playback::PlaybackOutput;
use crate::error::SessionError;
use crossbeam_channel::Sender;

/// Format requested from the capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count; the pipeline is mono end to end.
    pub channels: u16,
    /// Samples per delivered frame.
    pub frame_samples: usize,
}

/// Live capture stream handle. Dropping it releases the device; frames stop
/// arriving shortly after.
pub trait CaptureStream {}

/// Capture device boundary.
pub trait CaptureDevice {
    /// Acquires exclusive access to the device and starts delivering frames
    /// on `frames` at the device's own cadence.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceUnavailable`] when the device cannot be
    /// opened, e.g. missing hardware or a refused configuration.
    fn acquire(
        &self,
        config: &CaptureConfig,
        frames: Sender<AudioFrame>,
    ) -> Result<Box<dyn CaptureStream>, SessionError>;
}

/// Playback device boundary.
pub trait PlaybackDevice {
    /// Opens the output side at `sample_rate` and returns its clock/sink.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceUnavailable`] when no output device can
    /// be opened at the requested rate.
    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackOutput>, SessionError>;
}
