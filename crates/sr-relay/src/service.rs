//! Typed command loop between the UI and the relay core
//!
//! The UI never calls into the session machinery directly. It sends
//! [`Command`]s over a channel and [`RelayService`] dispatches them.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use sr_core::RelayError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::input::SubmitOutcome;
use crate::manager::SessionManager;

/// Keystroke chunks waiting for the input forwarder
const INPUT_BACKLOG: usize = 256;

/// Requests from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a shell on `host`
    OpenSession { host: String },
    /// Keystrokes for the active shell
    SendInput(Bytes),
    /// Close the active shell, if any
    CloseSession,
    /// Log the backend out of the network
    Logout,
}

/// Control surface of the network backend
#[async_trait]
pub trait BackendControl: Send + Sync {
    /// Whether the backend has been started
    fn is_running(&self) -> bool;

    async fn logout(&self) -> anyhow::Result<()>;
}

/// Create the command channel the UI sends into
pub fn command_channel(capacity: usize) -> (mpsc::Sender<Command>, mpsc::Receiver<Command>) {
    mpsc::channel(capacity.max(1))
}

pub struct RelayService {
    manager: Arc<SessionManager>,
    backend: Option<Arc<dyn BackendControl>>,
}

impl RelayService {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn BackendControl>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Dispatch commands until the channel closes or `cancel` fires, then
    /// close whatever session is still running
    pub async fn run(self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        tracing::info!("Relay service started");
        let (input, input_rx) = mpsc::channel(INPUT_BACKLOG);
        let forwarder = tokio::spawn(forward_input(Arc::clone(&self.manager), input_rx));

        loop {
            let command = tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => command,
            };
            match command {
                Some(command) => self.dispatch(command, &input),
                None => break,
            }
        }

        self.manager.close_session().await;
        drop(input);
        if let Err(e) = forwarder.await {
            tracing::error!("Input forwarder failed: {}", e);
        }
        tracing::info!("Relay service stopped");
    }

    /// Handle one command without waiting on session I/O
    fn dispatch(&self, command: Command, input: &mpsc::Sender<Bytes>) {
        match command {
            Command::OpenSession { host } => {
                let manager = Arc::clone(&self.manager);
                tokio::spawn(async move {
                    match manager.open_session(&host).await {
                        Ok(summary) => {
                            tracing::debug!("Session summary: {:?}", summary)
                        }
                        Err(RelayError::Session(e)) => tracing::debug!("{}", e),
                        // Already reported to the UI by the manager
                        Err(_) => {}
                    }
                });
            }
            Command::SendInput(bytes) => match input.try_send(bytes) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!("Input backlog full, dropping {} bytes", dropped.len())
                }
                Err(TrySendError::Closed(_)) => tracing::trace!("Input forwarder gone"),
            },
            Command::CloseSession => {
                let manager = Arc::clone(&self.manager);
                tokio::spawn(async move { manager.close_session().await });
            }
            Command::Logout => self.logout(),
        }
    }

    fn logout(&self) {
        let Some(backend) = self.backend.as_ref().map(Arc::clone) else {
            tracing::warn!("Logout requested but no backend control is attached");
            return;
        };
        if !backend.is_running() {
            tracing::info!("Logout requested but the backend is not running");
            return;
        }

        let manager = Arc::clone(&self.manager);
        tokio::spawn(async move {
            match backend.logout().await {
                Ok(()) => {
                    tracing::info!("Logged out");
                    manager.close_session().await;
                    manager.ui().clear();
                }
                Err(e) => {
                    tracing::error!("Logout failed: {:#}", e);
                    manager.ui().write(&format!("Error: logout failed: {}\r\n", e));
                }
            }
        });
    }
}

/// Feed keystrokes to the active session in arrival order
///
/// Runs apart from the command loop so a shell that stops reading stdin
/// cannot hold up `CloseSession`. Chunks still waiting when a session ends
/// are dropped rather than handed to the next one.
async fn forward_input(manager: Arc<SessionManager>, mut input: mpsc::Receiver<Bytes>) {
    while let Some(bytes) = input.recv().await {
        match manager.send_input(bytes).await {
            Ok(SubmitOutcome::Closed) => {
                let mut stale = 0;
                while input.try_recv().is_ok() {
                    stale += 1;
                }
                tracing::debug!("Session ended, dropped {} pending input chunks", stale);
            }
            Ok(_) => {}
            Err(e) => tracing::trace!("Input dropped: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::{Connection, Dialer, ProxyDial};
    use crate::manager::SessionSettings;
    use crate::shell::{ConnectRequest, ShellConnector, ShellStreams, SshConnector};
    use crate::state::StateTracker;
    use crate::test_support::{RecordingUi, UiEvent};
    use crate::{Credentials, HostKeyPolicy};
    use sr_core::config::Backpressure;
    use sr_core::{SessionState, ShellError};
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWrite};

    struct PendingDial;

    #[async_trait]
    impl ProxyDial for PendingDial {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<Connection> {
            std::future::pending().await
        }
    }

    struct LoopbackDial;

    #[async_trait]
    impl ProxyDial for LoopbackDial {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<Connection> {
            let (ours, _theirs) = duplex(64);
            Ok(Box::new(ours))
        }
    }

    /// Remote stdin that never accepts a byte
    struct StalledStdin;

    impl AsyncWrite for StalledStdin {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Shell that never reads its input; output ends once shutdown fires
    struct StalledShell;

    #[async_trait]
    impl ShellConnector for StalledShell {
        async fn connect(
            &self,
            _conn: Connection,
            _request: &ConnectRequest,
            state: &StateTracker,
            shutdown: CancellationToken,
        ) -> Result<ShellStreams, ShellError> {
            for next in [
                SessionState::Handshaking,
                SessionState::ChannelOpen,
                SessionState::PtyRequested,
                SessionState::ShellRunning,
            ] {
                state.advance(next);
            }

            let (remote_stdout, stdout) = duplex(64);
            let (remote_stderr, stderr) = duplex(64);
            tokio::spawn(async move {
                shutdown.cancelled().await;
                drop((remote_stdout, remote_stderr));
            });
            Ok(ShellStreams::new(StalledStdin, stdout, stderr))
        }
    }

    struct FakeBackend {
        running: AtomicBool,
        logouts: AtomicUsize,
    }

    #[async_trait]
    impl BackendControl for FakeBackend {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        async fn logout(&self) -> anyhow::Result<()> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service(ui: Arc<RecordingUi>) -> RelayService {
        let manager = SessionManager::new(
            Dialer::new(Arc::new(PendingDial), Duration::from_secs(60)),
            Arc::new(SshConnector::new(
                Credentials::password("user", "pw"),
                HostKeyPolicy::Reject,
            )),
            ui,
            SessionSettings::default(),
        );
        RelayService::new(Arc::new(manager))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_logout_ignored_when_backend_not_running() {
        let ui = RecordingUi::new();
        let backend = Arc::new(FakeBackend {
            running: AtomicBool::new(false),
            logouts: AtomicUsize::new(0),
        });
        let service = service(ui.clone()).with_backend(backend.clone());

        let (input, _input_rx) = mpsc::channel(1);
        service.dispatch(Command::Logout, &input);
        settle().await;

        assert_eq!(backend.logouts.load(Ordering::SeqCst), 0);
        assert!(ui.events().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_ui() {
        let ui = RecordingUi::new();
        let backend = Arc::new(FakeBackend {
            running: AtomicBool::new(true),
            logouts: AtomicUsize::new(0),
        });
        let service = service(ui.clone()).with_backend(backend.clone());

        let (input, _input_rx) = mpsc::channel(1);
        service.dispatch(Command::Logout, &input);
        settle().await;

        assert_eq!(backend.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(ui.events(), vec![UiEvent::Clear]);
    }

    #[tokio::test]
    async fn test_commands_drive_session_lifecycle() {
        let ui = RecordingUi::new();
        let service = service(ui.clone());
        let manager = Arc::clone(service.manager());
        let (tx, rx) = command_channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(service.run(rx, cancel.clone()));

        tx.send(Command::SendInput(Bytes::from_static(b"ignored")))
            .await
            .unwrap();
        tx.send(Command::OpenSession {
            host: "10.0.0.5".to_string(),
        })
        .await
        .unwrap();

        let mut state = manager.subscribe_state();
        while *state.borrow_and_update() != SessionState::Dialing {
            state.changed().await.unwrap();
        }
        assert!(manager.is_active());

        tx.send(Command::CloseSession).await.unwrap();
        while manager.is_active() {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        task.await.unwrap();
        assert!(ui.written().contains("Error: Session cancelled\r\n"));
    }

    #[tokio::test]
    async fn test_close_not_held_up_by_unread_input() {
        let ui = RecordingUi::new();
        let settings = SessionSettings {
            input_queue_capacity: 1,
            input_backpressure: Backpressure::Block,
            ..SessionSettings::default()
        };
        let manager = Arc::new(SessionManager::new(
            Dialer::new(Arc::new(LoopbackDial), Duration::from_secs(5)),
            Arc::new(StalledShell),
            ui,
            settings,
        ));
        let (tx, rx) = command_channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(RelayService::new(Arc::clone(&manager)).run(rx, cancel.clone()));

        tx.send(Command::OpenSession {
            host: "10.0.0.5".to_string(),
        })
        .await
        .unwrap();
        let mut state = manager.subscribe_state();
        while *state.borrow_and_update() != SessionState::ShellRunning {
            state.changed().await.unwrap();
        }

        for _ in 0..5 {
            tx.send(Command::SendInput(Bytes::from_static(b"x")))
                .await
                .unwrap();
        }
        tx.send(Command::CloseSession).await.unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(3), async {
            while manager.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(closed.is_ok(), "session still active after CloseSession");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .unwrap()
            .unwrap();
    }
}
