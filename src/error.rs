//! Typed error enums for session lifecycle and inbound chunk decoding.
//!
//! [`SessionError`] covers the session-fatal failures: the capture device
//! cannot be opened, the transport channel fails, or an operation is invoked
//! from a state that does not permit it. [`DecodeError`] is deliberately
//! separate because a malformed inbound chunk is recoverable: the offending
//! chunk is dropped and the session keeps streaming.

use thiserror::Error;

/// Session-fatal failures surfaced by [`crate::StreamingSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The capture device could not be opened or started.
    #[error("capture device unavailable: {reason}")]
    DeviceUnavailable {
        /// Backend-reported cause (missing device, refused configuration).
        reason: String,
    },
    /// The duplex transport channel failed to open or failed mid-session.
    #[error("transport channel failed: {reason}")]
    Channel {
        /// Transport-reported cause.
        reason: String,
    },
    /// An operation was invoked from a state that does not permit it.
    #[error("cannot {operation} while session is {state}")]
    InvalidTransition {
        /// Operation name, e.g. `"connect"`.
        operation: &'static str,
        /// Label of the state the session was in.
        state: &'static str,
    },
}

/// Per-chunk decode failures. Never session-fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The chunk carried no payload at all.
    #[error("chunk payload is empty")]
    Empty,
    /// The payload was not valid base64.
    #[error("chunk payload is not valid base64")]
    Base64(#[from] base64::DecodeError),
    /// The decoded byte length does not divide into whole samples.
    #[error("payload length {len} is not a multiple of sample width {width}")]
    Misaligned {
        /// Decoded payload length in bytes.
        len: usize,
        /// Expected bytes per sample.
        width: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_messages_name_the_failure() {
        let err = SessionError::DeviceUnavailable {
            reason: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "capture device unavailable: permission denied"
        );

        let err = SessionError::InvalidTransition {
            operation: "connect",
            state: "streaming",
        };
        assert_eq!(err.to_string(), "cannot connect while session is streaming");
    }

    #[test]
    fn decode_error_misaligned_reports_lengths() {
        let err = DecodeError::Misaligned { len: 3, width: 2 };
        assert_eq!(
            err.to_string(),
            "payload length 3 is not a multiple of sample width 2"
        );
    }
}
