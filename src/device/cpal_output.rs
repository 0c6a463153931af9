//! CPAL-backed playback over a sample-indexed timeline.
//!
//! The output callback drains a timeline of pending samples; the scheduler
//! writes buffers at absolute sample positions. The device clock is simply
//! samples-consumed over sample-rate, which is monotonic by construction.

use crate::audio::codec::DecodedBuffer;
use crate::audio::playback::PlaybackOutput;
use crate::device::PlaybackDevice;
use crate::error::SessionError;
use crate::lock_or_recover;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Playback device selected by name, or the system default output.
pub struct CpalPlaybackDevice {
    device_name: Option<String>,
}

impl CpalPlaybackDevice {
    /// Targets `device_name`, or the default output device when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn find_device(&self) -> Result<cpal::Device, SessionError> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => host
                .output_devices()
                .map_err(|err| SessionError::DeviceUnavailable {
                    reason: err.to_string(),
                })?
                .find(|device| device.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| SessionError::DeviceUnavailable {
                    reason: format!("no output device named '{name}'"),
                }),
            None => host
                .default_output_device()
                .ok_or_else(|| SessionError::DeviceUnavailable {
                    reason: "no default output device".into(),
                }),
        }
    }
}

impl PlaybackDevice for CpalPlaybackDevice {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn PlaybackOutput>, SessionError> {
        let device = self.find_device()?;
        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let timeline = Arc::new(Mutex::new(Timeline::new()));
        let shared = Arc::clone(&timeline);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    lock_or_recover(&shared, "playback timeline").fill(out);
                },
                |err| warn!(error = %err, "playback stream error"),
                None,
            )
            .map_err(|err| SessionError::DeviceUnavailable {
                reason: err.to_string(),
            })?;
        stream
            .play()
            .map_err(|err| SessionError::DeviceUnavailable {
                reason: err.to_string(),
            })?;

        debug!(
            device = device.name().as_deref().unwrap_or("unknown"),
            rate = sample_rate,
            "playback stream started"
        );
        Ok(Box::new(CpalPlaybackOutput {
            timeline,
            sample_rate,
            _stream: stream,
        }))
    }
}

struct CpalPlaybackOutput {
    timeline: Arc<Mutex<Timeline>>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl PlaybackOutput for CpalPlaybackOutput {
    fn current_time(&self) -> Duration {
        let position = lock_or_recover(&self.timeline, "playback timeline").position();
        Duration::from_secs_f64(position as f64 / self.sample_rate as f64)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn schedule(&mut self, buffer: DecodedBuffer, start: Duration) {
        let start_sample = (start.as_secs_f64() * self.sample_rate as f64).round() as u64;
        lock_or_recover(&self.timeline, "playback timeline")
            .write_at(start_sample, &buffer.samples);
    }
}

/// Pending output samples addressed by absolute position since stream start.
///
/// `pending[0]` is the sample the device will consume next, at absolute
/// position `played`. Writes land additively so a scheduling bug cannot
/// truncate audio, and the sum is clamped to full scale.
pub(crate) struct Timeline {
    played: u64,
    pending: VecDeque<f32>,
}

impl Timeline {
    pub(crate) fn new() -> Self {
        Self {
            played: 0,
            pending: VecDeque::new(),
        }
    }

    /// Absolute position of the next sample the device will consume.
    pub(crate) fn position(&self) -> u64 {
        self.played
    }

    /// Device callback path: pops pending samples, zero-fills past the end.
    pub(crate) fn fill(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.pending.pop_front().unwrap_or(0.0);
        }
        self.played += out.len() as u64;
    }

    /// Writes `samples` starting at absolute position `start`, clamped so a
    /// write can never land before the device's current position.
    pub(crate) fn write_at(&mut self, start: u64, samples: &[f32]) {
        let start = start.max(self.played);
        let offset = (start - self.played) as usize;
        let needed = offset + samples.len();
        if self.pending.len() < needed {
            self.pending.resize(needed, 0.0);
        }
        for (index, &sample) in samples.iter().enumerate() {
            let slot = &mut self.pending[offset + index];
            *slot = (*slot + sample).clamp(-1.0, 1.0);
        }
    }
}
