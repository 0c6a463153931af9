//! CPAL-backed capture: the hardware callback is the frame pump.
//!
//! The input stream's data callback re-blocks device buffers into exact
//! frames and forwards them without blocking, a send on an unbounded
//! channel, never I/O. Releasing capture is dropping the stream handle.

use crate::audio::AudioFrame;
use crate::device::{CaptureConfig, CaptureDevice, CaptureStream, FrameChunker};
use crate::error::SessionError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{debug, warn};

/// Capture device selected by name, or the system default input.
pub struct CpalCaptureDevice {
    device_name: Option<String>,
}

impl CpalCaptureDevice {
    /// Targets `device_name`, or the default input device when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn find_device(&self) -> Result<cpal::Device, SessionError> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|err| SessionError::DeviceUnavailable {
                    reason: err.to_string(),
                })?
                .find(|device| device.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| SessionError::DeviceUnavailable {
                    reason: format!("no input device named '{name}'"),
                }),
            None => host
                .default_input_device()
                .ok_or_else(|| SessionError::DeviceUnavailable {
                    reason: "no default input device".into(),
                }),
        }
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn acquire(
        &self,
        config: &CaptureConfig,
        frames: Sender<AudioFrame>,
    ) -> Result<Box<dyn CaptureStream>, SessionError> {
        let device = self.find_device()?;
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let mut chunker = FrameChunker::new(config.frame_samples);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in chunker.push(data) {
                        // Receiver gone means the session is tearing down;
                        // the frame is stale either way.
                        let _ = frames.send(frame);
                    }
                },
                |err| warn!(error = %err, "capture stream error"),
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
            rate = config.sample_rate,
            frame_samples = config.frame_samples,
            "capture stream started"
        );
        Ok(Box::new(CpalCaptureStream { _stream: stream }))
    }
}

/// RAII handle; dropping stops the stream and releases the device.
struct CpalCaptureStream {
    _stream: cpal::Stream,
}

impl CaptureStream for CpalCaptureStream {}
