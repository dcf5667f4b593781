//! SSH shell connector built on russh
//!
//! The russh channel delivers stdout and stderr as one message stream, so a
//! driver task owns the channel and splits it into three in-memory pipes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use sr_core::config::RelayConfig;
use sr_core::{SessionState, ShellError};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{AuthMethod, ConnectRequest, Credentials, HostKeyPolicy, ShellConnector, ShellStreams};
use crate::dialer::Connection;
use crate::state::StateTracker;

/// Size of each in-memory pipe between the driver and the relay pumps
const PIPE_CAPACITY: usize = 16 * 1024;

/// Extended-data type code for stderr (RFC 4254 §5.2)
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Opens an interactive shell over SSH
pub struct SshConnector {
    config: Arc<Config>,
    credentials: Credentials,
    host_key_policy: HostKeyPolicy,
    term: String,
}

impl SshConnector {
    pub fn new(credentials: Credentials, host_key_policy: HostKeyPolicy) -> Self {
        let config = Config {
            inactivity_timeout: None,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            credentials,
            host_key_policy,
            term: "xterm".to_string(),
        }
    }

    pub fn from_config(config: &RelayConfig, credentials: Credentials) -> Self {
        Self::new(credentials, HostKeyPolicy::from_config(config)).with_term(config.term.clone())
    }

    /// Terminal type sent with the PTY request
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    async fn authenticate(&self, handle: &mut Handle<ClientHandler>) -> Result<(), ShellError> {
        let user = self.credentials.username.as_str();
        tracing::debug!("Authenticating as user '{}'", user);

        let accepted = match &self.credentials.method {
            AuthMethod::Password(password) => handle
                .authenticate_password(user, password.as_str())
                .await
                .map_err(|e| ShellError::Handshake(format!("authentication: {}", e)))?,
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = russh_keys::load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                    ShellError::Key {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                handle
                    .authenticate_publickey(user, Arc::new(key))
                    .await
                    .map_err(|e| ShellError::Handshake(format!("authentication: {}", e)))?
            }
        };

        if !accepted {
            return Err(ShellError::Auth {
                user: user.to_string(),
            });
        }
        Ok(())
    }

    /// Authenticate, open the session channel, request a PTY and start the shell
    async fn open_shell(
        &self,
        handle: &mut Handle<ClientHandler>,
        request: &ConnectRequest,
        state: &StateTracker,
    ) -> Result<Channel<Msg>, ShellError> {
        self.authenticate(handle).await?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ShellError::Channel(e.to_string()))?;
        state.advance(SessionState::ChannelOpen);

        channel
            .request_pty(
                true,
                &self.term,
                u32::from(request.size.cols),
                u32::from(request.size.rows),
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| ShellError::PtyRequest(e.to_string()))?;
        await_reply(&mut channel, "pty request")
            .await
            .map_err(ShellError::PtyRequest)?;
        state.advance(SessionState::PtyRequested);

        channel
            .request_shell(true)
            .await
            .map_err(|e| ShellError::ShellStart(e.to_string()))?;
        await_reply(&mut channel, "shell request")
            .await
            .map_err(ShellError::ShellStart)?;

        Ok(channel)
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(
        &self,
        conn: Connection,
        request: &ConnectRequest,
        state: &StateTracker,
        shutdown: CancellationToken,
    ) -> Result<ShellStreams, ShellError> {
        state.advance(SessionState::Handshaking);

        let rejected_key = Arc::new(Mutex::new(None));
        let handler = ClientHandler {
            policy: self.host_key_policy.clone(),
            rejected_key: Arc::clone(&rejected_key),
        };

        let mut handle = match client::connect_stream(Arc::clone(&self.config), conn, handler).await
        {
            Ok(handle) => handle,
            Err(e) => {
                state.close();
                let rejected = rejected_key.lock().ok().and_then(|mut slot| slot.take());
                return Err(match rejected {
                    Some(fingerprint) => ShellError::HostKeyRejected { fingerprint },
                    None => ShellError::Handshake(e.to_string()),
                });
            }
        };
        tracing::info!("SSH connected to {}", request.host);

        let channel = match self.open_shell(&mut handle, request, state).await {
            Ok(channel) => channel,
            Err(e) => {
                state.close();
                disconnect(&handle, "setup failed").await;
                return Err(e);
            }
        };
        state.advance(SessionState::ShellRunning);
        tracing::info!("Shell started on {} ({})", request.host, request.size);

        let (stdin, stdin_pipe) = tokio::io::duplex(PIPE_CAPACITY);
        let (stdout_pipe, stdout) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_pipe, stderr) = tokio::io::duplex(PIPE_CAPACITY);

        let driver = spawn_driver(
            handle,
            channel,
            ChannelPipes {
                stdin: stdin_pipe,
                stdout: Some(stdout_pipe),
                stderr: Some(stderr_pipe),
            },
            shutdown,
        );

        Ok(ShellStreams::new(stdin, stdout, stderr).with_driver(driver))
    }
}

/// Wait for the server's answer to a `want_reply` channel request
async fn await_reply(channel: &mut Channel<Msg>, what: &'static str) -> Result<(), String> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => return Err(format!("{} refused by server", what)),
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                return Err(ShellError::Closed(what).to_string())
            }
            Some(other) => tracing::trace!("Ignoring {:?} while awaiting {}", other, what),
        }
    }
}

async fn disconnect(handle: &Handle<ClientHandler>, reason: &str) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, reason, "en")
        .await
    {
        tracing::debug!("Disconnect failed: {}", e);
    }
}

/// Driver-side ends of the three stream pipes
struct ChannelPipes {
    stdin: DuplexStream,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
}

/// Forward data to a pipe, forgetting the pipe once its reader is gone
async fn forward(pipe: &mut Option<DuplexStream>, data: &[u8]) {
    if let Some(writer) = pipe {
        if writer.write_all(data).await.is_err() {
            *pipe = None;
        }
    }
}

/// Own the channel until it closes or `shutdown` fires
///
/// Dropping the stdout and stderr pipe ends is what signals end-of-stream to
/// the relay's output pumps.
fn spawn_driver(
    handle: Handle<ClientHandler>,
    mut channel: Channel<Msg>,
    mut pipes: ChannelPipes,
    shutdown: CancellationToken,
) -> JoinHandle<Option<u32>> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        let mut stdin_open = true;
        let mut exit_status = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Shutdown requested, closing channel");
                    if let Err(e) = channel.eof().await {
                        tracing::debug!("Channel EOF failed: {}", e);
                    }
                    if let Err(e) = channel.close().await {
                        tracing::debug!("Channel close failed: {}", e);
                    }
                    break;
                }

                read = pipes.stdin.read(&mut buf), if stdin_open => match read {
                    Ok(0) | Err(_) => {
                        stdin_open = false;
                        if let Err(e) = channel.eof().await {
                            tracing::debug!("Channel EOF failed: {}", e);
                        }
                    }
                    Ok(n) => {
                        if let Err(e) = channel.data(&buf[..n]).await {
                            tracing::warn!("Failed to send input to remote shell: {}", e);
                            stdin_open = false;
                        }
                    }
                },

                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => forward(&mut pipes.stdout, &data).await,
                    Some(ChannelMsg::ExtendedData { data, ext }) if ext == SSH_EXTENDED_DATA_STDERR => {
                        forward(&mut pipes.stderr, &data).await
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: code }) => {
                        tracing::info!("Remote shell exited with status {}", code);
                        exit_status = Some(code);
                    }
                    Some(ChannelMsg::Eof) => {
                        tracing::debug!("Remote sent EOF");
                        pipes.stdout = None;
                        pipes.stderr = None;
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(other) => tracing::trace!("Ignoring channel message {:?}", other),
                },
            }
        }

        drop(pipes);
        disconnect(&handle, "session closed").await;
        exit_status
    })
}

/// russh client callbacks
struct ClientHandler {
    policy: HostKeyPolicy,
    /// Fingerprint of a key the policy refused, for error reporting
    rejected_key: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!("Server host key: {}", fingerprint);

        if self.policy.accepts(&fingerprint) {
            if self.policy == HostKeyPolicy::AcceptAny {
                tracing::warn!("Accepting unverified host key {}", fingerprint);
            }
            return Ok(true);
        }

        tracing::warn!("Rejecting host key {}", fingerprint);
        if let Ok(mut slot) = self.rejected_key.lock() {
            *slot = Some(fingerprint);
        }
        Ok(false)
    }
}
