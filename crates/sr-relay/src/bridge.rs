//! Backend notifications to UI updates
//!
//! The backend pushes [`NotifyEvent`]s into an unbounded channel for the
//! lifetime of the process. One bridge task drains it in order and turns each
//! event into display updates. Nothing here waits on the user.

use std::sync::Arc;

use sr_core::NotifyEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ui::{DisplayUpdate, NetworkView, UiSink};

/// Status line shown once login has completed
pub const LOGGED_IN_STATUS: &str = "Logged in. Pick a peer to open a shell.";

/// Producer handle given to the backend
pub type NotifySender = mpsc::UnboundedSender<NotifyEvent>;

/// Consumer handle drained by [`NotificationBridge::run`]
pub type NotifyReceiver = mpsc::UnboundedReceiver<NotifyEvent>;

/// Create the notification stream
pub fn notify_channel() -> (NotifySender, NotifyReceiver) {
    mpsc::unbounded_channel()
}

/// Produces a scannable image of a login URL
///
/// Implementations return the encoded image bytes, in whatever format the UI
/// displays, or `None` when the URL cannot be encoded. The bytes are passed
/// through to the login prompt untouched.
pub trait UrlCodeRenderer: Send + Sync {
    fn render(&self, url: &str) -> Option<Vec<u8>>;
}

pub struct NotificationBridge {
    ui: Arc<dyn UiSink>,
    code_renderer: Option<Arc<dyn UrlCodeRenderer>>,
    remote_port: u16,
}

impl NotificationBridge {
    pub fn new(ui: Arc<dyn UiSink>, remote_port: u16) -> Self {
        Self {
            ui,
            code_renderer: None,
            remote_port,
        }
    }

    pub fn with_code_renderer(mut self, renderer: Arc<dyn UrlCodeRenderer>) -> Self {
        self.code_renderer = Some(renderer);
        self
    }

    /// The display updates an event turns into, in the order they are applied
    pub fn project(&self, event: &NotifyEvent) -> Vec<DisplayUpdate> {
        match event {
            NotifyEvent::LoginFinished => vec![
                DisplayUpdate::ClearLoginPrompt,
                DisplayUpdate::Status(LOGGED_IN_STATUS.to_string()),
            ],
            NotifyEvent::NetworkSnapshot(snapshot) => vec![DisplayUpdate::Network(
                NetworkView::from_snapshot(snapshot, self.remote_port),
            )],
            NotifyEvent::BrowseToUrl { url } => {
                let code = self
                    .code_renderer
                    .as_ref()
                    .and_then(|renderer| renderer.render(url));
                vec![DisplayUpdate::LoginPrompt {
                    url: url.clone(),
                    code,
                }]
            }
        }
    }

    pub fn handle(&self, event: &NotifyEvent) {
        for update in self.project(event) {
            self.ui.apply(update);
        }
    }

    /// Drain events until the sender side is gone or `cancel` fires
    pub async fn run(self, mut events: NotifyReceiver, cancel: CancellationToken) {
        tracing::debug!("Notification bridge started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        tracing::debug!("Notification: {:?}", event);
                        self.handle(&event);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Notification bridge stopped");
    }

    pub fn spawn(self, events: NotifyReceiver, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(events, cancel))
    }
}
