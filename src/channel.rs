//! Transport seam: the duplex channel traits and session-facing events.
//!
//! The session core never talks to a socket directly. A [`Transport`] opens a
//! [`DuplexChannel`] and delivers everything that happens on it as
//! [`ChannelEvent`]s through a generation-stamped [`EventSender`], so
//! transports can live on their own threads while the session keeps a single
//! dispatch path and can tell a live channel's events from a dead one's.

use crate::audio::codec::EncodedChunk;
use crate::error::SessionError;
use crossbeam_channel::Sender;

/// Parameters negotiated when opening a channel. Wire framing beyond these
/// fields is owned by the transport, not the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Rate of the audio the session will send.
    pub input_sample_rate: u32,
    /// Rate the session expects inbound audio at when chunks do not declare
    /// their own.
    pub output_sample_rate: u32,
    /// Format identifier for outbound audio.
    pub mime_type: String,
}

/// Everything a channel can tell the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is open and accepting chunks in both directions.
    Ready,
    /// One inbound chunk of synthesized audio, in play order.
    Chunk(EncodedChunk),
    /// The channel closed in an orderly fashion.
    Closed,
    /// The channel failed. Session-fatal.
    Error(String),
}

/// A channel event stamped with the connect attempt that produced it.
///
/// Channels report asynchronously from their own threads, so a closed
/// channel can still emit `Closed` or `Error` after the session has moved
/// on to a new connect attempt. The generation stamp lets the session
/// discard those stragglers instead of tearing down the wrong session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Connect-attempt counter the event belongs to.
    pub generation: u64,
    /// The channel event itself.
    pub event: ChannelEvent,
}

/// Event sender handed to a transport; stamps every event with the
/// generation of the connect attempt that opened the channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    generation: u64,
    inner: Sender<SessionEvent>,
}

impl EventSender {
    pub fn new(generation: u64, inner: Sender<SessionEvent>) -> Self {
        Self { generation, inner }
    }

    /// Delivers one event. Returns `false` when the receiving side is gone.
    pub fn send(&self, event: ChannelEvent) -> bool {
        self.inner
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Generation this sender stamps onto events.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Send side of an open duplex channel.
pub trait DuplexChannel {
    /// Fire-and-forget transmit. Returns `false` when the channel is not
    /// accepting chunks; the caller drops the chunk rather than queueing it.
    fn send(&self, chunk: EncodedChunk) -> bool;

    /// Requests orderly shutdown. Completion is reported as
    /// [`ChannelEvent::Closed`].
    fn close(&self);
}

/// Factory boundary for opening channels against a remote endpoint.
pub trait Transport {
    /// Opens a channel, delivering its life-cycle on `events`.
    ///
    /// A successful return means the open is underway, not that the channel
    /// is usable: readiness arrives as [`ChannelEvent::Ready`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Channel`] when the transport cannot even
    /// begin opening (bad endpoint, resource exhaustion).
    fn open(
        &self,
        params: &SessionParams,
        events: EventSender,
    ) -> Result<Box<dyn DuplexChannel>, SessionError>;
}
