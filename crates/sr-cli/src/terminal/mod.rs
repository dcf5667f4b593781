//! The local terminal as a relay UI

mod keys;

pub use keys::{key_to_bytes, map_key, KeyAction};

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossterm::event::{self, Event};
use crossterm::terminal::{self, ClearType};
use sr_core::TerminalSize;
use sr_relay::{DisplayUpdate, UiSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::output::{format_login_prompt, format_network, print_info};

/// Writes relay output to stdout
///
/// While a shell owns the screen, display updates are held back and shown
/// once the session ends, so they never interleave with shell output.
#[derive(Default)]
pub struct TerminalUi {
    session_active: AtomicBool,
    held: Mutex<Vec<DisplayUpdate>>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::ClearLoginPrompt => tracing::debug!("Login prompt cleared"),
            DisplayUpdate::Status(status) => print_info(&status),
            DisplayUpdate::Network(view) => self.write(&format_network(&view)),
            DisplayUpdate::LoginPrompt { url, code } => {
                self.write(&format_login_prompt(&url, code.as_deref()))
            }
        }
    }

    fn take_held(&self) -> Vec<DisplayUpdate> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *held)
    }
}

impl UiSink for TerminalUi {
    fn write(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::error!("Failed to write to terminal: {}", e);
        }
    }

    fn clear(&self) {
        let _ = crossterm::execute!(
            io::stdout(),
            terminal::Clear(ClearType::All),
            crossterm::cursor::MoveTo(0, 0)
        );
    }

    fn size(&self) -> TerminalSize {
        match terminal::size() {
            Ok((cols, rows)) => TerminalSize::new(rows, cols),
            Err(e) => {
                tracing::debug!("Terminal size unavailable ({}), using default", e);
                TerminalSize::default()
            }
        }
    }

    fn set_session_active(&self, active: bool) {
        self.session_active.store(active, Ordering::SeqCst);
        if !active {
            for update in self.take_held() {
                self.render(update);
            }
        }
    }

    fn apply(&self, update: DisplayUpdate) {
        if self.session_active.load(Ordering::SeqCst) {
            let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
            // Only the latest table and status matter
            held.retain(|h| std::mem::discriminant(h) != std::mem::discriminant(&update));
            held.push(update);
            return;
        }
        self.render(update);
    }
}

/// Puts the terminal in raw mode for as long as it lives
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Read terminal events on a blocking thread until the receiver goes away
pub fn spawn_event_reader() -> (mpsc::Receiver<Event>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Event>(256);
    let handle = tokio::task::spawn_blocking(move || loop {
        if tx.is_closed() {
            break;
        }
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(evt) = event::read() {
                if tx.blocking_send(evt).is_err() {
                    break;
                }
            }
        }
    });
    (rx, handle)
}
