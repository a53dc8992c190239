//! Interactive pass-through console and session run loops
//!
//! The console relays operator keystrokes to the serial link while the
//! received stream is simultaneously echoed, logged, and demultiplexed by
//! the session engine. Neither input source may block the other: keyboard
//! events are read on a dedicated thread and drained without blocking, and
//! serial reads are bounded by the transport's short hardware timeout.
//!
//! The terminal is placed in raw mode for the duration and restored
//! unconditionally — the guard's `Drop` runs on normal exit, on error
//! return, and on unwind.

use crate::core::progress::ProgressBar;
use crate::core::session::{CaptureEvent, SessionEngine};
use crate::core::transport::{TransportError, TransportTrait};
use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How received lines are presented to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Raw byte echo plus keyboard forwarding (interactive console).
    Interactive,
    /// Engine-filtered line output with progress bars (monitor).
    Monitor,
}

/// Operator input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Bytes to forward to the serial link verbatim.
    Key(Vec<u8>),
    /// Ctrl-C; begin graceful shutdown.
    Interrupt,
}

/// RAII guard for terminal raw mode.
pub struct RawModeGuard;

impl RawModeGuard {
    /// Enable raw mode; restored when the guard drops.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Translate a key event into the bytes sent to the instrument.
pub fn key_event_to_bytes(key: &KeyEvent) -> Option<InputEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(InputEvent::Interrupt),
            // Other control chords map to their ASCII control codes.
            KeyCode::Char(c) if c.is_ascii_alphabetic() => {
                let byte = (c.to_ascii_uppercase() as u8) - b'A' + 1;
                Some(InputEvent::Key(vec![byte]))
            }
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            Some(InputEvent::Key(c.encode_utf8(&mut buf).as_bytes().to_vec()))
        }
        KeyCode::Enter => Some(InputEvent::Key(b"\r\n".to_vec())),
        KeyCode::Tab => Some(InputEvent::Key(b"\t".to_vec())),
        KeyCode::Backspace => Some(InputEvent::Key(vec![0x08])),
        KeyCode::Esc => Some(InputEvent::Key(vec![0x1b])),
        _ => None,
    }
}

/// Spawn the keyboard reader thread.
///
/// Polls with a short timeout so the thread notices shutdown promptly and
/// never wedges on a blocking read.
pub fn spawn_keyboard_reader(shutdown: Arc<AtomicBool>) -> Receiver<InputEvent> {
    let (tx, rx): (Sender<InputEvent>, Receiver<InputEvent>) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            match crossterm::event::poll(Duration::from_millis(50)) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = crossterm::event::read() {
                        // Windows delivers release events too; forward presses only.
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if let Some(event) = key_event_to_bytes(&key) {
                            let interrupt = event == InputEvent::Interrupt;
                            if tx.send(event).is_err() || interrupt {
                                break;
                            }
                        }
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    });
    rx
}

/// Run the session loop until the operator interrupts or the link drops.
///
/// In [`ConsoleMode::Interactive`] the terminal is switched to raw mode,
/// keystrokes are forwarded to the link, and received bytes are echoed
/// verbatim. In [`ConsoleMode::Monitor`] the engine's filtered line events
/// are printed and section progress is rendered as a bar.
pub async fn run_session(
    mut transport: Box<dyn TransportTrait>,
    mut engine: SessionEngine,
    mode: ConsoleMode,
    verbose: bool,
    shutdown: Arc<AtomicBool>,
) -> Result<(), TransportError> {
    let mut progress = ProgressBar::new();

    let (_guard, keys) = if mode == ConsoleMode::Interactive {
        let guard = RawModeGuard::new().map_err(TransportError::IoError)?;
        let keys = spawn_keyboard_reader(Arc::clone(&shutdown));
        (Some(guard), Some(keys))
    } else {
        (None, None)
    };

    let result = loop {
        if shutdown.load(Ordering::Relaxed) {
            break Ok(());
        }

        if let Some(keys) = keys.as_ref() {
            let mut stop = false;
            while let Ok(event) = keys.try_recv() {
                match event {
                    InputEvent::Interrupt => {
                        shutdown.store(true, Ordering::Relaxed);
                        stop = true;
                        break;
                    }
                    InputEvent::Key(bytes) => {
                        transport.send(&bytes).await?;
                    }
                }
            }
            if stop {
                break Ok(());
            }
        }

        let chunk = match transport.receive().await {
            Ok(chunk) => chunk,
            Err(TransportError::Disconnected) => break Ok(()),
            Err(e) => break Err(e),
        };
        if chunk.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }

        if mode == ConsoleMode::Interactive {
            let mut out = io::stdout();
            let _ = out.write_all(&chunk);
            let _ = out.flush();
        }

        for event in engine.feed(&chunk) {
            render_event(&event, mode, verbose, &mut progress);
        }
    };

    progress.abandon();
    for event in engine.finish() {
        render_event(&event, mode, verbose, &mut progress);
    }
    let _ = transport.disconnect().await;
    result
}

fn render_event(event: &CaptureEvent, mode: ConsoleMode, verbose: bool, bar: &mut ProgressBar) {
    match event {
        CaptureEvent::Line(line) => {
            // Interactive mode already echoed the raw bytes.
            if mode == ConsoleMode::Monitor {
                println!("{line}");
            }
        }
        CaptureEvent::Progress {
            kind,
            current,
            expected,
        } => {
            if mode == ConsoleMode::Monitor && !verbose {
                bar.update(*current, *expected, kind.label());
            }
        }
        CaptureEvent::SectionClosed {
            kind,
            expected,
            actual,
        } => {
            if mode == ConsoleMode::Monitor && !verbose {
                bar.finish(kind.label(), *expected, *actual);
            }
        }
        CaptureEvent::Saved { path, lines } => {
            if mode == ConsoleMode::Monitor {
                println!("Saved {} ({lines} lines)", path.display());
            } else {
                tracing::info!("saved {} ({lines} lines)", path.display());
            }
        }
        CaptureEvent::MeasurementStarted { basename } => {
            if mode == ConsoleMode::Monitor {
                println!("Measurement detected: {basename}");
            }
        }
        CaptureEvent::MeasurementDiscarded { basename } => {
            if mode == ConsoleMode::Monitor {
                println!("Discarded incomplete measurement {basename}");
            }
        }
        CaptureEvent::MeasurementComplete => {}
        CaptureEvent::SinkError(msg) => {
            bar.abandon();
            eprintln!("write error: {msg}");
        }
    }
}
