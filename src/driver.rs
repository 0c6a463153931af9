//! Single-threaded dispatch loop for a streaming session.
//!
//! Capture callbacks and channel callbacks arrive on separate threads; the
//! driver funnels both through one `select!` loop so every session mutation
//! happens on this thread, in arrival order per source. The loop exits once
//! the session reaches a terminal state.

use crate::audio::AudioFrame;
use crate::channel::SessionEvent;
use crate::session::{SessionState, StreamingSession};
use crossbeam_channel::{select, Receiver};
use tracing::debug;

/// Control messages from the caller to the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    /// Tear the session down and stop the loop.
    Disconnect,
}

/// Owns the session for the duration of the dispatch loop.
pub struct SessionDriver {
    session: StreamingSession,
    frames: Receiver<AudioFrame>,
    events: Receiver<SessionEvent>,
    commands: Receiver<DriverCommand>,
}

impl SessionDriver {
    pub fn new(
        session: StreamingSession,
        frames: Receiver<AudioFrame>,
        events: Receiver<SessionEvent>,
        commands: Receiver<DriverCommand>,
    ) -> Self {
        Self {
            session,
            frames,
            events,
            commands,
        }
    }

    /// Runs until the session closes or fails, then hands the session back.
    pub fn run(mut self) -> StreamingSession {
        loop {
            select! {
                recv(self.frames) -> frame => {
                    // A closed frame channel just means capture stopped.
                    if let Ok(frame) = frame {
                        self.session.handle_frame(frame);
                    }
                }
                recv(self.events) -> event => {
                    if let Ok(event) = event {
                        self.session.handle_channel_event(event);
                    }
                }
                recv(self.commands) -> command => {
                    match command {
                        Ok(DriverCommand::Disconnect) | Err(_) => {
                            self.session.disconnect();
                            break;
                        }
                    }
                }
            }
            if matches!(
                self.session.state(),
                SessionState::Closed | SessionState::Error
            ) {
                debug!(state = %self.session.state(), "dispatch loop finished");
                break;
            }
        }
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::pcm_mime;
    use crate::audio::playback::PlaybackOutput;
    use crate::channel::{ChannelEvent, DuplexChannel, EventSender, SessionParams, Transport};
    use crate::device::{CaptureConfig, CaptureDevice, CaptureStream, PlaybackDevice};
    use crate::error::SessionError;
    use crate::session::{SessionConfig, SessionObservers};
    use crate::DecodedBuffer;
    use crate::EncodedChunk;
    use crossbeam_channel::{unbounded, Sender};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    struct NullStream;
    impl CaptureStream for NullStream {}

    struct NullCapture;
    impl CaptureDevice for NullCapture {
        fn acquire(
            &self,
            _config: &CaptureConfig,
            _frames: Sender<AudioFrame>,
        ) -> Result<Box<dyn CaptureStream>, SessionError> {
            Ok(Box::new(NullStream))
        }
    }

    struct NullOutput;
    impl PlaybackOutput for NullOutput {
        fn current_time(&self) -> Duration {
            Duration::ZERO
        }
        fn sample_rate(&self) -> u32 {
            24_000
        }
        fn schedule(&mut self, _buffer: DecodedBuffer, _start: Duration) {}
    }

    struct NullPlayback;
    impl PlaybackDevice for NullPlayback {
        fn open(&self, _sample_rate: u32) -> Result<Box<dyn PlaybackOutput>, SessionError> {
            Ok(Box::new(NullOutput))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<EncodedChunk>>>,
        closed: Arc<AtomicBool>,
    }

    struct RecordingChannel {
        sent: Arc<Mutex<Vec<EncodedChunk>>>,
        closed: Arc<AtomicBool>,
    }

    impl DuplexChannel for RecordingChannel {
        fn send(&self, chunk: EncodedChunk) -> bool {
            self.sent.lock().expect("sent").push(chunk);
            true
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl Transport for RecordingTransport {
        fn open(
            &self,
            _params: &SessionParams,
            _events: EventSender,
        ) -> Result<Box<dyn DuplexChannel>, SessionError> {
            Ok(Box::new(RecordingChannel {
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            capture: CaptureConfig {
                sample_rate: 16_000,
                channels: 1,
                frame_samples: 320,
            },
            params: SessionParams {
                input_sample_rate: 16_000,
                output_sample_rate: 24_000,
                mime_type: pcm_mime(16_000),
            },
            meter_smoothing: 0.2,
        }
    }

    fn wait_until(deadline_msg: &str, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out: {deadline_msg}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn driver_streams_frames_then_stops_on_disconnect_command() {
        let transport = RecordingTransport::default();
        let (frame_tx, frame_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();

        let connected = Arc::new(AtomicBool::new(false));
        let connected_flag = Arc::clone(&connected);
        let observers = SessionObservers::new()
            .on_connectivity(move |up| connected_flag.store(up, Ordering::SeqCst));

        // The loop owns the session, so drive it from a worker thread and
        // sequence each stimulus from here instead of racing three queues.
        let worker_transport = transport.clone();
        let worker_frame_tx = frame_tx.clone();
        let handle = std::thread::spawn(move || {
            let mut session = StreamingSession::new(
                config(),
                Box::new(NullCapture),
                Box::new(NullPlayback),
                Box::new(worker_transport),
                worker_frame_tx,
                unbounded().0,
                observers,
            );
            session.connect().expect("connect");
            SessionDriver::new(session, frame_rx, event_rx, command_rx)
                .run()
                .state()
        });

        // First connect is always generation 1.
        event_tx
            .send(SessionEvent {
                generation: 1,
                event: ChannelEvent::Ready,
            })
            .expect("ready");
        wait_until("session never reached streaming", || {
            connected.load(Ordering::SeqCst)
        });

        frame_tx
            .send(AudioFrame::new(vec![0.1; 320]))
            .expect("frame");
        wait_until("frame was never transmitted", || {
            !transport.sent.lock().expect("sent").is_empty()
        });

        command_tx.send(DriverCommand::Disconnect).expect("command");
        let final_state = handle.join().expect("driver thread");
        assert_eq!(final_state, SessionState::Closed);
        assert_eq!(transport.sent.lock().expect("sent").len(), 1);
        assert!(transport.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn driver_exits_when_channel_reports_an_error() {
        let transport = RecordingTransport::default();
        let (_frame_tx, frame_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (_command_tx, command_rx) = unbounded::<DriverCommand>();

        let mut session = StreamingSession::new(
            config(),
            Box::new(NullCapture),
            Box::new(NullPlayback),
            Box::new(transport),
            unbounded().0,
            event_tx.clone(),
            SessionObservers::new(),
        );
        session.connect().expect("connect");
        let generation = session.generation();

        event_tx
            .send(SessionEvent {
                generation,
                event: ChannelEvent::Ready,
            })
            .expect("ready");
        event_tx
            .send(SessionEvent {
                generation,
                event: ChannelEvent::Error("socket reset".into()),
            })
            .expect("error");

        let session = SessionDriver::new(session, frame_rx, event_rx, command_rx).run();
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn driver_treats_dropped_command_sender_as_disconnect() {
        let transport = RecordingTransport::default();
        let (_frame_tx, frame_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = unbounded::<DriverCommand>();

        let mut session = StreamingSession::new(
            config(),
            Box::new(NullCapture),
            Box::new(NullPlayback),
            Box::new(transport),
            unbounded().0,
            event_tx.clone(),
            SessionObservers::new(),
        );
        session.connect().expect("connect");
        let generation = session.generation();
        event_tx
            .send(SessionEvent {
                generation,
                event: ChannelEvent::Ready,
            })
            .expect("ready");
        drop(command_tx);

        let session = SessionDriver::new(session, frame_rx, event_rx, command_rx).run();
        assert_eq!(session.state(), SessionState::Closed);
    }
}
