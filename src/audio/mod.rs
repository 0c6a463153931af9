//! Audio data types and the per-frame processing stages of the duplex path.

pub mod capture;
pub mod codec;
pub mod meter;
pub mod playback;

/// Capture is always mono; the transport protocol carries a single stream.
pub const CAPTURE_CHANNELS: u16 = 1;

/// One fixed-size block of normalized samples from the capture device.
///
/// Frames are owned by exactly one processing step at a time: the device
/// callback produces them, the capture pipeline consumes them, nothing
/// retains them afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Normalized samples in `-1.0..=1.0` at the capture rate.
    pub samples: Vec<f32>,
}

impl AudioFrame {
    /// Wraps a block of normalized samples.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Number of samples in the frame.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
