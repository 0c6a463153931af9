//! PCM16 transport codec: normalized frames to text-safe chunks and back.
//!
//! Both directions are pure transforms. Encoding clamps every sample before
//! quantizing so a single out-of-range value saturates without corrupting its
//! neighbors, and carries no timestamps or randomness, so identical input
//! always yields identical bytes. Decoding touches no shared state and is
//! safe to call from any context that receives chunks.

use crate::error::DecodeError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;

/// Bytes per encoded sample (16-bit signed little-endian).
pub const SAMPLE_WIDTH_BYTES: usize = 2;

/// Mime identifier for a raw PCM stream at the given rate.
pub fn pcm_mime(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// One transport-sized unit of encoded audio. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Base64 payload of little-endian 16-bit samples.
    pub data: String,
    /// Sample rate the payload was produced at (or should play at).
    pub sample_rate: u32,
    /// Format identifier, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

/// A fully materialized, playback-ready buffer decoded from one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    /// Normalized samples in `-1.0..=1.0`.
    pub samples: Vec<f32>,
    /// Playback rate in Hz.
    pub sample_rate: u32,
}

impl DecodedBuffer {
    /// Play time of the buffer: sample count over sample rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Encodes one frame of normalized samples into a transport chunk.
///
/// Each sample is clamped to `[-1, 1]` and scaled to 16-bit signed range;
/// without the clamp an out-of-range sample would wrap during the integer
/// cast and corrupt the stream.
pub fn encode_frame(samples: &[f32], sample_rate: u32) -> EncodedChunk {
    let mut bytes = Vec::with_capacity(samples.len() * SAMPLE_WIDTH_BYTES);
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }
    EncodedChunk {
        data: BASE64.encode(&bytes),
        sample_rate,
        mime_type: pcm_mime(sample_rate),
    }
}

/// Decodes one transport chunk into a playback-ready buffer.
///
/// # Errors
///
/// Returns [`DecodeError::Empty`] for chunks with no payload,
/// [`DecodeError::Base64`] for payloads that are not valid base64, and
/// [`DecodeError::Misaligned`] when the byte length does not divide into
/// whole 16-bit samples.
pub fn decode_chunk(chunk: &EncodedChunk) -> Result<DecodedBuffer, DecodeError> {
    if chunk.data.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = BASE64.decode(&chunk.data)?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % SAMPLE_WIDTH_BYTES != 0 {
        return Err(DecodeError::Misaligned {
            len: bytes.len(),
            width: SAMPLE_WIDTH_BYTES,
        });
    }
    let samples = bytes
        .chunks_exact(SAMPLE_WIDTH_BYTES)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
        .collect();
    Ok(DecodedBuffer {
        samples,
        sample_rate: chunk.sample_rate,
    })
}
