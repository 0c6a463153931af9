//! WebSocket transport: a duplex channel over a JSON text protocol.
//!
//! The socket runs on its own thread with a current-thread tokio runtime so
//! the rest of the crate stays synchronous. Outbound chunks arrive over a
//! tokio mpsc queue; inbound traffic and lifecycle changes are reported as
//! [`ChannelEvent`]s on the session's event channel.
//!
//! Wire protocol, all text frames:
//! - client -> server `setup` announces the formats for the conversation
//! - both directions `audio` carries one base64 PCM chunk
//! - server -> client `error` reports a fatal stream failure

use crate::audio::codec::{pcm_mime, EncodedChunk};
use crate::channel::{ChannelEvent, DuplexChannel, EventSender, SessionParams, Transport};
use crate::error::SessionError;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::connect_async;
use tungstenite::Message;
use tracing::{debug, info, warn};

/// Messages exchanged with the remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// First message on every connection, client to server.
    Setup {
        input_sample_rate: u32,
        output_sample_rate: u32,
        mime_type: String,
    },
    /// One encoded audio chunk, either direction.
    Audio {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sample_rate: Option<u32>,
    },
    /// Fatal server-side failure.
    Error { message: String },
}

enum Outbound {
    Audio(EncodedChunk),
    Close,
}

/// Transport that opens one WebSocket connection per session.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Transport for WsTransport {
    fn open(
        &self,
        params: &SessionParams,
        events: EventSender,
    ) -> Result<Box<dyn DuplexChannel>, SessionError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let url = self.url.clone();
        let params = params.clone();

        std::thread::Builder::new()
            .name("voicelink-ws".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        events.send(ChannelEvent::Error(err.to_string()));
                        return;
                    }
                };
                runtime.block_on(run_socket(url, params, outbound_rx, events));
            })
            .map_err(|err| SessionError::Channel {
                reason: err.to_string(),
            })?;

        Ok(Box::new(WsChannel {
            outbound: outbound_tx,
        }))
    }
}

struct WsChannel {
    outbound: UnboundedSender<Outbound>,
}

impl DuplexChannel for WsChannel {
    fn send(&self, chunk: EncodedChunk) -> bool {
        self.outbound.send(Outbound::Audio(chunk)).is_ok()
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

async fn run_socket(
    url: String,
    params: SessionParams,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: EventSender,
) {
    let (socket, _) = match connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(err) => {
            warn!(error = %err, url, "websocket connect failed");
            events.send(ChannelEvent::Error(err.to_string()));
            return;
        }
    };
    info!(url, "websocket connected");
    let (mut sink, mut source) = socket.split();

    let setup = WireMessage::Setup {
        input_sample_rate: params.input_sample_rate,
        output_sample_rate: params.output_sample_rate,
        mime_type: params.mime_type.clone(),
    };
    let setup_json = match serde_json::to_string(&setup) {
        Ok(json) => json,
        Err(err) => {
            events.send(ChannelEvent::Error(err.to_string()));
            return;
        }
    };
    if let Err(err) = sink.send(Message::Text(setup_json)).await {
        events.send(ChannelEvent::Error(err.to_string()));
        return;
    }
    events.send(ChannelEvent::Ready);

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Audio(chunk)) => {
                    let message = WireMessage::Audio {
                        data: chunk.data,
                        sample_rate: Some(chunk.sample_rate),
                    };
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(err) => {
                            events.send(ChannelEvent::Error(err.to_string()));
                            break;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(json)).await {
                        warn!(error = %err, "websocket send failed");
                        events.send(ChannelEvent::Error(err.to_string()));
                        break;
                    }
                }
                // Channel dropped or explicitly closed: local-first shutdown.
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    events.send(ChannelEvent::Closed);
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&text, &params, &events),
                Some(Ok(Message::Binary(_))) => {
                    debug!("ignoring binary websocket frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("websocket closed by remote");
                    events.send(ChannelEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {} // ping/pong handled by the library
                Some(Err(err)) => {
                    warn!(error = %err, "websocket receive failed");
                    events.send(ChannelEvent::Error(err.to_string()));
                    break;
                }
            },
        }
    }
    debug!("websocket loop finished");
}

fn handle_text(text: &str, params: &SessionParams, events: &EventSender) {
    match serde_json::from_str::<WireMessage>(text) {
        Ok(WireMessage::Audio { data, sample_rate }) => {
            let sample_rate = sample_rate.unwrap_or(params.output_sample_rate);
            events.send(ChannelEvent::Chunk(EncodedChunk {
                data,
                sample_rate,
                mime_type: pcm_mime(sample_rate),
            }));
        }
        Ok(WireMessage::Error { message }) => {
            events.send(ChannelEvent::Error(message));
        }
        Ok(WireMessage::Setup { .. }) => {
            debug!("ignoring setup echo from server");
        }
        Err(err) => {
            debug!(error = %err, "ignoring unparseable websocket text");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SessionEvent;
    use crossbeam_channel::{unbounded, Receiver};

    fn test_events() -> (EventSender, Receiver<SessionEvent>) {
        let (tx, rx) = unbounded();
        (EventSender::new(7, tx), rx)
    }

    fn test_params() -> SessionParams {
        SessionParams {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            mime_type: pcm_mime(16_000),
        }
    }

    #[test]
    fn setup_message_serializes_with_snake_case_tag() {
        let json = serde_json::to_string(&WireMessage::Setup {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            mime_type: pcm_mime(16_000),
        })
        .expect("serialize");
        assert!(json.contains("\"type\":\"setup\""));
        assert!(json.contains("\"input_sample_rate\":16000"));
        assert!(json.contains("audio/pcm;rate=16000"));
    }

    #[test]
    fn audio_message_omits_missing_sample_rate() {
        let json = serde_json::to_string(&WireMessage::Audio {
            data: "AAAA".into(),
            sample_rate: None,
        })
        .expect("serialize");
        assert!(!json.contains("sample_rate"));

        let parsed: WireMessage = serde_json::from_str("{\"type\":\"audio\",\"data\":\"AAAA\"}")
            .expect("deserialize");
        assert_eq!(
            parsed,
            WireMessage::Audio {
                data: "AAAA".into(),
                sample_rate: None,
            }
        );
    }

    #[test]
    fn wire_messages_round_trip() {
        let messages = [
            WireMessage::Setup {
                input_sample_rate: 16_000,
                output_sample_rate: 24_000,
                mime_type: pcm_mime(16_000),
            },
            WireMessage::Audio {
                data: "UklGRg==".into(),
                sample_rate: Some(24_000),
            },
            WireMessage::Error {
                message: "quota exceeded".into(),
            },
        ];
        for message in messages {
            let json = serde_json::to_string(&message).expect("serialize");
            let back: WireMessage = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, message);
        }
    }

    #[test]
    fn inbound_audio_becomes_a_chunk_event_with_default_rate() {
        let (events, received) = test_events();
        handle_text(
            "{\"type\":\"audio\",\"data\":\"AAAA\"}",
            &test_params(),
            &events,
        );
        let delivered = received.try_recv().expect("event");
        assert_eq!(delivered.generation, 7);
        match delivered.event {
            ChannelEvent::Chunk(chunk) => {
                assert_eq!(chunk.data, "AAAA");
                assert_eq!(chunk.sample_rate, 24_000);
                assert_eq!(chunk.mime_type, pcm_mime(24_000));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn inbound_audio_keeps_an_explicit_rate() {
        let (events, received) = test_events();
        handle_text(
            "{\"type\":\"audio\",\"data\":\"AAAA\",\"sample_rate\":48000}",
            &test_params(),
            &events,
        );
        match received.try_recv().expect("event").event {
            ChannelEvent::Chunk(chunk) => assert_eq!(chunk.sample_rate, 48_000),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn inbound_error_becomes_an_error_event() {
        let (events, received) = test_events();
        handle_text(
            "{\"type\":\"error\",\"message\":\"quota exceeded\"}",
            &test_params(),
            &events,
        );
        match received.try_recv().expect("event").event {
            ChannelEvent::Error(message) => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unparseable_text_is_dropped_silently() {
        let (events, received) = test_events();
        handle_text("not json", &test_params(), &events);
        assert!(received.try_recv().is_err());
    }
}
