//! Turning a dialed connection into an interactive remote shell

mod ssh;

pub use ssh::SshConnector;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use sr_core::config::RelayConfig;
use sr_core::{ShellError, TerminalSize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dialer::Connection;
use crate::state::StateTracker;

/// What to ask the remote end for
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Host name the connection was dialed to
    pub host: String,
    /// PTY geometry, taken from the UI when the session starts
    pub size: TerminalSize,
}

/// The three standard streams of a running remote shell
pub struct ShellStreams {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    /// Task driving the underlying connection. Resolves to the shell's exit
    /// status once the connection is gone.
    pub driver: Option<JoinHandle<Option<u32>>>,
}

impl ShellStreams {
    pub fn new(
        stdin: impl AsyncWrite + Send + Unpin + 'static,
        stdout: impl AsyncRead + Send + Unpin + 'static,
        stderr: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            driver: None,
        }
    }

    pub fn with_driver(mut self, driver: JoinHandle<Option<u32>>) -> Self {
        self.driver = Some(driver);
        self
    }
}

/// Performs the shell handshake and session setup over a dialed connection
///
/// Implementations advance `state` through `Handshaking`, `ChannelOpen`,
/// `PtyRequested` and `ShellRunning`. On failure everything opened so far is
/// closed before the error is returned. Once the shell is running, cancelling
/// `shutdown` must close the connection so that both output streams end.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn connect(
        &self,
        conn: Connection,
        request: &ConnectRequest,
        state: &StateTracker,
        shutdown: CancellationToken,
    ) -> Result<ShellStreams, ShellError>;
}

/// How to authenticate the shell login
#[derive(Clone)]
pub enum AuthMethod {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

/// Login name plus authentication method
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub method: AuthMethod,
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            method: AuthMethod::Password(password.into()),
        }
    }

    pub fn private_key(username: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            method: AuthMethod::PrivateKey {
                path: path.into(),
                passphrase: None,
            },
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match &self.method {
            AuthMethod::Password(_) => "password".to_string(),
            AuthMethod::PrivateKey { path, .. } => format!("key {}", path.display()),
        };
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("method", &method)
            .finish()
    }
}

/// Which server host keys to trust
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Only the key with this fingerprint
    Pinned(String),
    /// Any key. Must be chosen explicitly.
    AcceptAny,
    /// No key; every connection fails at the handshake
    Reject,
}

impl HostKeyPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        match (&config.host_key_fingerprint, config.accept_unknown_host_keys) {
            (Some(fingerprint), _) => HostKeyPolicy::Pinned(normalize_fingerprint(fingerprint)),
            (None, true) => HostKeyPolicy::AcceptAny,
            (None, false) => HostKeyPolicy::Reject,
        }
    }

    pub fn accepts(&self, fingerprint: &str) -> bool {
        match self {
            HostKeyPolicy::Pinned(expected) => *expected == normalize_fingerprint(fingerprint),
            HostKeyPolicy::AcceptAny => true,
            HostKeyPolicy::Reject => false,
        }
    }
}

/// Fingerprints are compared without the `SHA256:` prefix OpenSSH prints
fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .trim()
        .trim_start_matches("SHA256:")
        .to_string()
}
