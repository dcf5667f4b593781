//! Single-session lifecycle
//!
//! [`SessionManager`] is the only place a session is created or torn down.
//! A lifecycle lock is held for the whole dial -> connect -> relay -> teardown
//! sequence; a second `open_session` while it is held is rejected, never
//! queued. The active-session slot next to it is only locked briefly, so input
//! and close requests never wait on session I/O.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use sr_core::config::{join_host_port, Backpressure, RelayConfig};
use sr_core::{RelayError, SessionError, SessionState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dialer::{Connection, Dialer};
use crate::input::{InputQueue, InputReceiver, SubmitOutcome};
use crate::relay::{ActivityClock, IoRelay, RelayReport};
use crate::shell::{ConnectRequest, ShellConnector, ShellStreams};
use crate::state::StateTracker;
use crate::ui::UiSink;

/// Shown after a dial failure
const DIAL_HINT: &str = "Try again or disconnect/reconnect to the network\r\n";

/// How long to wait for the shell's exit status once output has ended
const DRIVER_GRACE: Duration = Duration::from_secs(2);

/// Per-session knobs taken from [`RelayConfig`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub remote_port: u16,
    pub input_queue_capacity: usize,
    pub input_backpressure: Backpressure,
    pub idle_timeout: Option<Duration>,
}

impl SessionSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            remote_port: config.remote_port,
            input_queue_capacity: config.input_queue_capacity,
            input_backpressure: config.input_backpressure,
            idle_timeout: config.idle_timeout,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Outcome of a session that got as far as a running shell
#[derive(Debug)]
pub struct SessionSummary {
    pub host: String,
    /// Exit status reported by the remote shell, if it sent one
    pub exit_status: Option<u32>,
    /// The session was closed by the idle-timeout policy
    pub idle_closed: bool,
    pub relay: RelayReport,
}

/// What the rest of the process may touch while a session runs
struct ActiveSession {
    host: String,
    input: InputQueue,
    shutdown: CancellationToken,
}

/// Owns the single-session invariant
pub struct SessionManager {
    dialer: Dialer,
    connector: Arc<dyn ShellConnector>,
    ui: Arc<dyn UiSink>,
    settings: SessionSettings,
    lifecycle: tokio::sync::Mutex<()>,
    active: Mutex<Option<ActiveSession>>,
    state: StateTracker,
}

impl SessionManager {
    pub fn new(
        dialer: Dialer,
        connector: Arc<dyn ShellConnector>,
        ui: Arc<dyn UiSink>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            dialer,
            connector,
            ui,
            settings,
            lifecycle: tokio::sync::Mutex::new(()),
            active: Mutex::new(None),
            state: StateTracker::new(),
        }
    }

    /// Run one complete session against `host`
    ///
    /// Returns once the session is over. Errors are also written to the UI.
    /// The active flag is clear again on every return path.
    pub async fn open_session(&self, host: &str) -> Result<SessionSummary, RelayError> {
        let Ok(_lifecycle) = self.lifecycle.try_lock() else {
            let host = self.active_host();
            match &host {
                Some(active) => {
                    tracing::warn!("Rejecting session request: session to {} is active", active)
                }
                None => tracing::warn!("Rejecting session request: previous session is closing"),
            }
            return Err(SessionError::AlreadyActive { host }.into());
        };

        self.state.reset();
        let (input, input_rx) = InputQueue::bounded(
            self.settings.input_queue_capacity,
            self.settings.input_backpressure,
        );
        let shutdown = CancellationToken::new();
        let mut active = ActiveGuard::install(
            self,
            ActiveSession {
                host: host.to_string(),
                input,
                shutdown: shutdown.clone(),
            },
        );

        let result = self
            .run_session(host, input_rx, &shutdown, &mut active)
            .await;
        self.state.close();

        match &result {
            Ok(summary) => tracing::info!(
                "Session to {} ended (exit status {:?})",
                summary.host,
                summary.exit_status
            ),
            Err(RelayError::Dial(e)) => {
                tracing::warn!("Dial to {} failed: {}", host, e);
                self.ui
                    .write(&format!("Error establishing session: {}\r\n", e));
                self.ui.write(DIAL_HINT);
            }
            Err(e) => {
                tracing::warn!("Session to {} failed: {}", host, e);
                self.ui.write(&format!("Error: {}\r\n", e));
            }
        }

        drop(active);
        result
    }

    async fn run_session(
        &self,
        host: &str,
        input_rx: InputReceiver,
        shutdown: &CancellationToken,
        active: &mut ActiveGuard<'_>,
    ) -> Result<SessionSummary, RelayError> {
        let port = self.settings.remote_port;
        self.ui
            .write(&format!("Connecting to {}\r\n", join_host_port(host, port)));

        self.state.advance(SessionState::Dialing);
        let conn = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(SessionError::Cancelled.into()),
            conn = self.dialer.dial(host, port) => conn?,
        };
        self.ui.write("TCP session established\r\n");

        let mut streams = self.connect_shell(host, conn, shutdown).await?;
        tracing::info!("Session established with {}", host);

        let driver = streams.driver.take();
        self.ui.clear();
        self.ui.set_session_active(true);
        active.live = true;

        let clock = Arc::new(ActivityClock::new());
        let watchdog = self.settings.idle_timeout.map(|limit| {
            spawn_idle_watchdog(
                limit,
                Arc::clone(&clock),
                shutdown.clone(),
                Arc::clone(&self.ui),
            )
        });

        let relay = IoRelay::new(Arc::clone(&self.ui))
            .with_activity(clock)
            .run(streams, input_rx)
            .await;

        let idle_closed = match watchdog {
            Some(handle) => {
                handle.abort();
                handle.await.unwrap_or(false)
            }
            None => false,
        };
        let exit_status = finish_driver(driver, shutdown).await;

        Ok(SessionSummary {
            host: host.to_string(),
            exit_status,
            idle_closed,
            relay,
        })
    }

    /// Hand the connection to the shell connector, reporting progress as the
    /// handshake moves along
    async fn connect_shell(
        &self,
        host: &str,
        conn: Connection,
        shutdown: &CancellationToken,
    ) -> Result<ShellStreams, RelayError> {
        let request = ConnectRequest {
            host: host.to_string(),
            size: self.ui.size(),
        };
        let mut progress = self.state.subscribe();
        let mut announced = false;

        let connect = self
            .connector
            .connect(conn, &request, &self.state, shutdown.clone());
        tokio::pin!(connect);

        let streams = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.state.close();
                    return Err(SessionError::Cancelled.into());
                }
                result = &mut connect => break result?,
                Ok(()) = progress.changed() => {
                    let state = *progress.borrow_and_update();
                    self.announce_connected(state, &mut announced);
                }
            }
        };
        self.announce_connected(self.state.current(), &mut announced);

        Ok(streams)
    }

    fn announce_connected(&self, state: SessionState, announced: &mut bool) {
        if *announced || state < SessionState::ChannelOpen || state == SessionState::Closed {
            return;
        }
        self.ui.write("SSH connected\r\n");
        self.ui.write("Session established\r\n");
        *announced = true;
    }

    /// Terminate the active session and wait until it is fully torn down.
    /// Does nothing when no session is active.
    pub async fn close_session(&self) {
        let shutdown = self.slot().as_ref().map(|s| s.shutdown.clone());
        let Some(shutdown) = shutdown else {
            tracing::debug!("Close requested with no active session");
            return;
        };

        tracing::info!("Closing active session");
        shutdown.cancel();
        let _done = self.lifecycle.lock().await;
    }

    /// Queue keystrokes for the active session
    ///
    /// With no active session the bytes are discarded and `NotActive` is
    /// returned; nothing is held over for a later session. A submit waiting
    /// for queue space gives up with `Closed` once the session shuts down.
    pub async fn send_input(&self, bytes: impl Into<Bytes>) -> Result<SubmitOutcome, SessionError> {
        let bytes = bytes.into();
        let active = self
            .slot()
            .as_ref()
            .map(|s| (s.input.clone(), s.shutdown.clone()));
        match active {
            Some((queue, shutdown)) => Ok(tokio::select! {
                biased;
                _ = shutdown.cancelled() => SubmitOutcome::Closed,
                outcome = queue.submit(bytes) => outcome,
            }),
            None => {
                tracing::trace!("Discarding input: no active session");
                Err(SessionError::NotActive)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    pub fn active_host(&self) -> Option<String> {
        self.slot().as_ref().map(|s| s.host.clone())
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn ui(&self) -> &Arc<dyn UiSink> {
        &self.ui
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the active slot when the session attempt ends, however it ends
struct ActiveGuard<'a> {
    manager: &'a SessionManager,
    /// The UI was told a shell owns keyboard input
    live: bool,
}

impl<'a> ActiveGuard<'a> {
    fn install(manager: &'a SessionManager, session: ActiveSession) -> Self {
        *manager.slot() = Some(session);
        Self {
            manager,
            live: false,
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.manager.slot().take() {
            session.shutdown.cancel();
        }
        if self.live {
            self.manager.ui.set_session_active(false);
        }
    }
}

/// Close the session once it has seen no traffic for `limit`.
/// Resolves to whether it fired.
fn spawn_idle_watchdog(
    limit: Duration,
    clock: Arc<ActivityClock>,
    shutdown: CancellationToken,
    ui: Arc<dyn UiSink>,
) -> JoinHandle<bool> {
    tokio::spawn(async move {
        loop {
            let idle = clock.idle_for();
            if idle >= limit {
                tracing::info!("Session idle for {:?}, closing", idle);
                ui.write(&format!("\r\nSession idle for {}s, closing\r\n", limit.as_secs()));
                shutdown.cancel();
                return true;
            }

            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = tokio::time::sleep(limit - idle) => {}
            }
        }
    })
}

/// Collect the exit status from the connection driver, then make sure it is gone
async fn finish_driver(
    driver: Option<JoinHandle<Option<u32>>>,
    shutdown: &CancellationToken,
) -> Option<u32> {
    let mut driver = driver?;

    let joined = match tokio::time::timeout(DRIVER_GRACE, &mut driver).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::debug!("Shell connection still open after output ended, closing it");
            shutdown.cancel();
            driver.await
        }
    };

    joined.unwrap_or_else(|e| {
        tracing::error!("Shell connection task failed: {}", e);
        None
    })
}
