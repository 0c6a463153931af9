//! Duplex voice streaming CLI: microphone in, synthesized audio out.
//!
//! Connects to the configured WebSocket endpoint, streams captured frames,
//! and plays inbound audio gap-free. Press Enter to hang up.

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::unbounded;
use std::io::{BufRead, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use voicelink::config::AppConfig;
use voicelink::device::{CpalCaptureDevice, CpalPlaybackDevice};
use voicelink::driver::{DriverCommand, SessionDriver};
use voicelink::session::SessionConfig;
use voicelink::telemetry;
use voicelink::ws::WsTransport;
use voicelink::{SessionObservers, SessionState, StreamingSession};

const VOLUME_DISPLAY_INTERVAL: Duration = Duration::from_millis(200);
const VOLUME_BAR_SLOTS: u64 = 20;

fn main() -> Result<()> {
    let config = AppConfig::parse();
    config.validate()?;
    telemetry::init_tracing(&config);
    info!(endpoint = %config.endpoint, "voicelink starting");

    let (frame_tx, frame_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let (command_tx, command_rx) = unbounded();

    let observers = SessionObservers::new()
        .on_connectivity(|connected| {
            if connected {
                println!("connected; streaming (press Enter to hang up)");
            } else {
                println!("disconnected");
            }
        })
        .on_volume(volume_display());

    let mut session = StreamingSession::new(
        SessionConfig::from_app(&config),
        Box::new(CpalCaptureDevice::new(config.input_device.clone())),
        Box::new(CpalPlaybackDevice::new(config.output_device.clone())),
        Box::new(WsTransport::new(config.endpoint.clone())),
        frame_tx,
        event_tx,
        observers,
    );
    session.connect()?;

    // Enter on stdin hangs up; dropping the sender on EOF does the same.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        let _ = stdin.lock().read_line(&mut line);
        let _ = command_tx.send(DriverCommand::Disconnect);
    });

    let session = SessionDriver::new(session, frame_rx, event_rx, command_rx).run();
    if session.state() == SessionState::Error {
        anyhow::bail!("session ended with an error; re-run with --logs for details");
    }
    Ok(())
}

/// Periodic single-line volume bar on stdout, throttled so the terminal is
/// not rewritten at frame cadence.
fn volume_display() -> impl FnMut(f32) + Send + 'static {
    let last_render = Arc::new(AtomicU64::new(0));
    let started = Instant::now();
    move |level| {
        let elapsed = started.elapsed();
        let slot = (elapsed.as_millis() / VOLUME_DISPLAY_INTERVAL.as_millis()) as u64;
        if last_render.swap(slot, Ordering::Relaxed) == slot {
            return;
        }
        let filled = ((level / 100.0) * VOLUME_BAR_SLOTS as f32).round() as u64;
        let bar: String = (0..VOLUME_BAR_SLOTS)
            .map(|index| if index < filled { '#' } else { '-' })
            .collect();
        print!("\rmic [{bar}] {level:5.1}");
        let _ = std::io::stdout().flush();
    }
}
