//! CLI flag schema so session wiring and audio formats are explicit.

use anyhow::{bail, Result};
use clap::Parser;

/// Runtime configuration shared by the library seams and the CLI binary.
#[derive(Debug, Parser, Clone)]
#[command(about = "voicelink", author, version)]
pub struct AppConfig {
    /// WebSocket endpoint of the conversational peer
    #[arg(
        long = "endpoint",
        env = "VOICELINK_ENDPOINT",
        default_value = "ws://127.0.0.1:8765/stream"
    )]
    pub endpoint: String,

    /// Capture device name (system default input when omitted)
    #[arg(long = "input-device")]
    pub input_device: Option<String>,

    /// Playback device name (system default output when omitted)
    #[arg(long = "output-device")]
    pub output_device: Option<String>,

    /// Microphone sample rate in Hz
    #[arg(long = "capture-rate", default_value_t = 16_000)]
    pub capture_rate: u32,

    /// Synthesized audio sample rate in Hz
    #[arg(long = "playback-rate", default_value_t = 24_000)]
    pub playback_rate: u32,

    /// Capture frame length in milliseconds
    #[arg(long = "frame-ms", default_value_t = 20)]
    pub frame_ms: u32,

    /// Weight given to each new volume reading when smoothing (0..=1)
    #[arg(long = "meter-smoothing", default_value_t = 0.2)]
    pub meter_smoothing: f32,

    /// Enable JSON trace logging to a temp file
    #[arg(long = "logs", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging even if other flags enable it
    #[arg(long = "no-logs", default_value_t = false)]
    pub no_logs: bool,
}

impl AppConfig {
    /// Number of samples in one capture frame.
    pub fn frame_samples(&self) -> usize {
        (self.capture_rate as usize * self.frame_ms as usize) / 1000
    }

    /// Rejects configurations the audio pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error when a rate is zero, the frame length resolves to
    /// zero samples, or the smoothing weight falls outside `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.capture_rate == 0 || self.playback_rate == 0 {
            bail!("sample rates must be non-zero");
        }
        if self.frame_samples() == 0 {
            bail!(
                "frame of {}ms at {}Hz resolves to zero samples",
                self.frame_ms,
                self.capture_rate
            );
        }
        if !(self.meter_smoothing > 0.0 && self.meter_smoothing <= 1.0) {
            bail!(
                "meter smoothing must be in (0, 1], got {}",
                self.meter_smoothing
            );
        }
        Ok(())
    }
}
