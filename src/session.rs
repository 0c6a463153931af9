//! Session lifecycle orchestration for one duplex streaming conversation.
//!
//! [`StreamingSession`] owns the state machine and every resource tied to the
//! current state: the capture stream, the open channel, the capture pipeline,
//! and the playback scheduler. Resources live inside [`ActiveResources`] so
//! each exit transition releases them structurally instead of nulling fields
//! one by one. All mutation happens on the dispatch path that calls into the
//! session, keeping one writer per field.

use crate::audio::capture::CaptureSession;
use crate::audio::codec::{decode_chunk, pcm_mime};
use crate::audio::playback::PlaybackScheduler;
use crate::audio::{AudioFrame, CAPTURE_CHANNELS};
use crate::channel::{
    ChannelEvent, DuplexChannel, EventSender, SessionEvent, SessionParams, Transport,
};
use crate::config::AppConfig;
use crate::device::{CaptureConfig, CaptureDevice, CaptureStream, PlaybackDevice};
use crate::error::SessionError;
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

/// Lifecycle states of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No resources held.
    Idle,
    /// Device and channel being acquired; no audio flows yet.
    Connecting,
    /// Capture and playback both active.
    Streaming,
    /// Releasing device and channel resources.
    Closing,
    /// Terminal; resources released. `connect()` starts a new session.
    Closed,
    /// Terminal for this attempt; resources released. `connect()` retries.
    Error,
}

impl SessionState {
    /// Compact label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller-registered notification hooks.
///
/// Both fire synchronously inside the originating dispatch; handlers must
/// not block.
#[derive(Default)]
pub struct SessionObservers {
    volume: Option<Box<dyn FnMut(f32) + Send>>,
    connectivity: Option<Box<dyn FnMut(bool) + Send>>,
}

impl SessionObservers {
    /// No-op observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once per captured frame while streaming, with the smoothed
    /// volume reading.
    pub fn on_volume(mut self, handler: impl FnMut(f32) + Send + 'static) -> Self {
        self.volume = Some(Box::new(handler));
        self
    }

    /// Fired on every transition into (`true`) or out of (`false`) the
    /// streaming state.
    pub fn on_connectivity(mut self, handler: impl FnMut(bool) + Send + 'static) -> Self {
        self.connectivity = Some(Box::new(handler));
        self
    }

    fn notify_volume(&mut self, level: f32) {
        if let Some(handler) = self.volume.as_mut() {
            handler(level);
        }
    }

    fn notify_connectivity(&mut self, connected: bool) {
        if let Some(handler) = self.connectivity.as_mut() {
            handler(connected);
        }
    }
}

/// Static wiring of one session: formats plus the negotiated parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capture device format.
    pub capture: CaptureConfig,
    /// Channel open parameters.
    pub params: SessionParams,
    /// Weight of each new volume reading during smoothing.
    pub meter_smoothing: f32,
}

impl SessionConfig {
    /// Derives session wiring from the application config.
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            capture: CaptureConfig {
                sample_rate: config.capture_rate,
                channels: CAPTURE_CHANNELS,
                frame_samples: config.frame_samples(),
            },
            params: SessionParams {
                input_sample_rate: config.capture_rate,
                output_sample_rate: config.playback_rate,
                mime_type: pcm_mime(config.capture_rate),
            },
            meter_smoothing: config.meter_smoothing,
        }
    }
}

/// Everything owned only while a session attempt is live. Dropped as a unit
/// on every exit transition.
struct ActiveResources {
    capture_stream: Box<dyn CaptureStream>,
    channel: Box<dyn DuplexChannel>,
    capture: CaptureSession,
    scheduler: PlaybackScheduler,
}

/// The top-level state machine mediating capture, transport, and playback.
pub struct StreamingSession {
    config: SessionConfig,
    capture_device: Box<dyn CaptureDevice>,
    playback_device: Box<dyn PlaybackDevice>,
    transport: Box<dyn Transport>,
    frame_tx: Sender<AudioFrame>,
    event_tx: Sender<SessionEvent>,
    observers: SessionObservers,
    state: SessionState,
    /// Connect-attempt counter; bumped on every `connect()`. Events stamped
    /// with an older generation belong to a torn-down channel.
    generation: u64,
    resources: Option<ActiveResources>,
}

impl StreamingSession {
    /// Builds an idle session around its external collaborators.
    ///
    /// `frame_tx` and `event_tx` are the delivery sides of the two callback
    /// sources; the caller drains the matching receivers and dispatches into
    /// [`Self::handle_frame`] / [`Self::handle_channel_event`] from a single
    /// thread (see [`crate::driver::SessionDriver`]).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SessionConfig,
        capture_device: Box<dyn CaptureDevice>,
        playback_device: Box<dyn PlaybackDevice>,
        transport: Box<dyn Transport>,
        frame_tx: Sender<AudioFrame>,
        event_tx: Sender<SessionEvent>,
        observers: SessionObservers,
    ) -> Self {
        Self {
            config,
            capture_device,
            playback_device,
            transport,
            frame_tx,
            event_tx,
            observers,
            state: SessionState::Idle,
            generation: 0,
            resources: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Generation of the current connect attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Acquires the capture device, opens the playback output and the duplex
    /// channel, and waits for channel readiness.
    ///
    /// Returns with the session in `Connecting`; the transition to
    /// `Streaming` happens when the channel reports [`ChannelEvent::Ready`].
    /// No audio is captured or transmitted before that.
    ///
    /// # Errors
    ///
    /// [`SessionError::DeviceUnavailable`] when a device cannot be opened and
    /// [`SessionError::Channel`] when the transport cannot start opening; in
    /// both cases everything acquired so far is released and the session is
    /// left in `Error`. [`SessionError::InvalidTransition`] when the session
    /// is already active.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Closed | SessionState::Error => {}
            state => {
                return Err(SessionError::InvalidTransition {
                    operation: "connect",
                    state: state.label(),
                })
            }
        }
        self.state = SessionState::Connecting;
        self.generation += 1;
        info!(
            generation = self.generation,
            capture_rate = self.config.capture.sample_rate,
            playback_rate = self.config.params.output_sample_rate,
            "session connecting"
        );

        let capture_stream = match self
            .capture_device
            .acquire(&self.config.capture, self.frame_tx.clone())
        {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "capture device acquisition failed");
                self.state = SessionState::Error;
                return Err(err);
            }
        };

        let output = match self
            .playback_device
            .open(self.config.params.output_sample_rate)
        {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "playback device open failed");
                drop(capture_stream);
                self.state = SessionState::Error;
                return Err(err);
            }
        };

        let events = EventSender::new(self.generation, self.event_tx.clone());
        let channel = match self.transport.open(&self.config.params, events) {
            Ok(channel) => channel,
            Err(err) => {
                warn!(error = %err, "channel open failed");
                drop(output);
                drop(capture_stream);
                self.state = SessionState::Error;
                return Err(err);
            }
        };

        self.resources = Some(ActiveResources {
            capture_stream,
            channel,
            capture: CaptureSession::new(
                self.config.capture.sample_rate,
                self.config.meter_smoothing,
            ),
            scheduler: PlaybackScheduler::new(output),
        });
        Ok(())
    }

    /// Tears the session down deterministically. Idempotent: a no-op from
    /// `Idle`, `Closing`, `Closed`, and `Error`.
    pub fn disconnect(&mut self) {
        match self.state {
            SessionState::Connecting | SessionState::Streaming => {}
            state => {
                debug!(state = state.label(), "disconnect is a no-op");
                return;
            }
        }
        let was_streaming = self.state == SessionState::Streaming;
        self.state = SessionState::Closing;
        self.teardown();
        self.state = SessionState::Closed;
        info!("session closed");
        if was_streaming {
            self.observers.notify_connectivity(false);
        }
    }

    /// Capture-callback entry point: one frame at device cadence.
    pub fn handle_frame(&mut self, frame: AudioFrame) {
        if self.state != SessionState::Streaming {
            return;
        }
        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        let level = resources
            .capture
            .process_frame(frame, resources.channel.as_ref());
        self.observers.notify_volume(level);
    }

    /// Channel-callback entry point: readiness, inbound chunks, closure.
    ///
    /// Events stamped with a generation other than the current connect
    /// attempt's come from a channel that has already been torn down and are
    /// discarded, so a straggling `Closed` or `Error` cannot take down a
    /// newer session.
    pub fn handle_channel_event(&mut self, event: SessionEvent) {
        if event.generation != self.generation {
            debug!(
                event_generation = event.generation,
                current_generation = self.generation,
                "discarding event from a previous channel"
            );
            return;
        }
        match event.event {
            ChannelEvent::Ready => {
                if self.state == SessionState::Connecting {
                    self.state = SessionState::Streaming;
                    info!("channel ready; streaming");
                    self.observers.notify_connectivity(true);
                } else {
                    debug!(state = self.state.label(), "ignoring ready event");
                }
            }
            ChannelEvent::Chunk(chunk) => {
                if self.state != SessionState::Streaming {
                    return;
                }
                let Some(resources) = self.resources.as_mut() else {
                    return;
                };
                match decode_chunk(&chunk) {
                    Ok(buffer) => {
                        if let Some(start) = resources.scheduler.schedule(buffer) {
                            debug!(start_ms = start.as_millis() as u64, "chunk scheduled");
                        }
                    }
                    // Recoverable: drop the one chunk, keep streaming.
                    Err(err) => warn!(error = %err, "dropping undecodable chunk"),
                }
            }
            ChannelEvent::Closed => match self.state {
                SessionState::Closing => {
                    debug!("channel close acknowledged");
                }
                SessionState::Streaming | SessionState::Connecting => {
                    let was_streaming = self.state == SessionState::Streaming;
                    info!("channel closed by remote");
                    self.state = SessionState::Closing;
                    self.teardown();
                    self.state = SessionState::Closed;
                    if was_streaming {
                        self.observers.notify_connectivity(false);
                    }
                }
                _ => {}
            },
            ChannelEvent::Error(reason) => match self.state {
                SessionState::Streaming | SessionState::Connecting => {
                    let was_streaming = self.state == SessionState::Streaming;
                    warn!(reason, "channel error; tearing down");
                    self.teardown();
                    self.state = SessionState::Error;
                    if was_streaming {
                        self.observers.notify_connectivity(false);
                    }
                }
                _ => debug!(reason, "ignoring channel error after teardown"),
            },
        }
    }

    fn teardown(&mut self) {
        if let Some(resources) = self.resources.take() {
            let stats = resources.capture.stats();
            debug!(
                frames_processed = stats.frames_processed,
                frames_sent = stats.frames_sent,
                frames_dropped = stats.frames_dropped,
                buffers_scheduled = resources.scheduler.buffers_scheduled(),
                "releasing session resources"
            );
            resources.channel.close();
            // Capture stream, channel, and playback output all release on drop.
        }
    }
}
