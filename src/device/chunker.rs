//! Re-blocks arbitrary device callback buffers into exact fixed-size frames.
//!
//! Hardware callbacks deliver whatever buffer size the backend negotiated;
//! the transport wants frames of an exact sample count. The chunker carries
//! the remainder between callbacks so no sample is dropped or duplicated.

use crate::audio::AudioFrame;

pub(crate) struct FrameChunker {
    frame_samples: usize,
    pending: Vec<f32>,
}

impl FrameChunker {
    pub(crate) fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples.max(1)),
        }
    }

    /// Absorbs one callback buffer and returns every complete frame now
    /// available, in capture order.
    pub(crate) fn push(&mut self, input: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(input);
        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            let full = std::mem::replace(&mut self.pending, rest);
            frames.push(AudioFrame::new(full));
        }
        frames
    }
}
