//! Frame loudness measurement feeding the UI-facing volume signal.
//!
//! The meter itself keeps no state: callers own the previous smoothed value
//! and combine it with each raw reading via [`smooth`]. That keeps the
//! single-writer rule trivial: only the capture pipeline ever updates it.

/// Lower bound reported for silent or empty frames, in dBFS.
pub const METER_FLOOR_DB: f32 = -60.0;

/// Upper bound of the UI volume scale.
pub const METER_CEILING: f32 = 100.0;

/// Gain mapping typical speech RMS (~0.02..0.4) onto the 0..100 scale.
const RMS_GAIN: f32 = 250.0;

/// Raw loudness of one frame on a 0..=100 scale.
///
/// Computed as RMS energy over all samples; degenerate empty frames read as
/// zero rather than erroring.
pub fn level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    (energy.sqrt() * RMS_GAIN).clamp(0.0, METER_CEILING)
}

/// One step of exponential smoothing: `weight` goes to the new reading.
pub fn smooth(previous: f32, raw: f32, weight: f32) -> f32 {
    weight * raw + (1.0 - weight) * previous
}

/// RMS level in dBFS, used for log lines and the CLI meter display.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return METER_FLOOR_DB;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = energy.sqrt().max(1e-6);
    (20.0 * rms.log10()).max(METER_FLOOR_DB)
}
