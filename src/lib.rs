//! Real-time duplex voice streaming: capture, encode, transmit, schedule, play.
//!
//! The crate is organized around one session state machine
//! ([`StreamingSession`]) fed by two logically concurrent callback sources:
//! the capture device's frame cadence and inbound chunk arrival on the duplex
//! channel. Both deliver into channels drained by a single dispatch loop
//! ([`driver::SessionDriver`]) so every piece of session state has exactly one
//! writer.

pub mod audio;
pub mod channel;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
mod lock;
pub mod session;
pub mod telemetry;
pub mod ws;

pub(crate) use lock::lock_or_recover;

pub use audio::codec::{DecodedBuffer, EncodedChunk};
pub use error::{DecodeError, SessionError};
pub use session::{SessionObservers, SessionState, StreamingSession};
