//! Core error types for shell-relay

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::StreamKind;

/// Top-level error type for a relay session attempt
#[derive(Error, Debug)]
pub enum RelayError {
    /// Dial error
    #[error("{0}")]
    Dial(#[from] DialError),

    /// Shell handshake or setup error
    #[error("{0}")]
    Shell(#[from] ShellError),

    /// Session lifecycle error
    #[error("{0}")]
    Session(#[from] SessionError),

}

/// Errors opening the transport connection through the proxy
#[derive(Error, Debug)]
pub enum DialError {
    /// The deadline elapsed before the connection was established
    #[error("Dial to {address} timed out after {after:?}")]
    Timeout { address: String, after: Duration },

    /// The proxy or the remote end refused the connection
    #[error("Connection to {address} refused: {reason}")]
    Refused { address: String, reason: String },

    /// Any other failure while dialing
    #[error("Failed to connect to {address}: {reason}")]
    Failed { address: String, reason: String },
}

/// Errors raised while turning a dialed connection into a running shell
#[derive(Error, Debug)]
pub enum ShellError {
    /// Transport-level handshake failed
    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    /// The server presented a host key the policy does not accept
    #[error("Host key {fingerprint} rejected; pin it with host_key_fingerprint to trust it")]
    HostKeyRejected { fingerprint: String },

    /// The private key for publickey authentication could not be loaded
    #[error("Failed to load private key {path}: {reason}")]
    Key { path: String, reason: String },

    /// The server rejected our credentials
    #[error("Authentication rejected for user '{user}'")]
    Auth { user: String },

    /// Opening the session channel failed
    #[error("Failed to open session channel: {0}")]
    Channel(String),

    /// The pseudo-terminal request was refused or failed
    #[error("PTY request failed: {0}")]
    PtyRequest(String),

    /// The interactive shell could not be started
    #[error("Shell request failed: {0}")]
    ShellStart(String),

    /// The connection closed before setup completed
    #[error("Connection closed during {0}")]
    Closed(&'static str),
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// A session is already running; new requests are rejected, not queued.
    /// `host` is unknown while the previous session is still being torn down.
    #[error(
        "A session{} is already active",
        host.as_ref().map(|h| format!(" to {}", h)).unwrap_or_default()
    )]
    AlreadyActive { host: Option<String> },

    /// No session is active
    #[error("No active session")]
    NotActive,

    /// The session was closed while it was still being set up
    #[error("Session cancelled")]
    Cancelled,
}

/// A mid-session read or write failure on one of the shell streams
#[derive(Error, Debug)]
#[error("{kind} stream error: {source}")]
pub struct StreamError {
    pub kind: StreamKind,
    #[source]
    pub source: std::io::Error,
}

impl StreamError {
    pub fn new(kind: StreamKind, source: std::io::Error) -> Self {
        Self { kind, source }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_is_transparent_for_dial() {
        let err: RelayError = DialError::Timeout {
            address: "10.0.0.5:2200".to_string(),
            after: Duration::from_secs(5),
        }
        .into();
        assert_eq!(err.to_string(), "Dial to 10.0.0.5:2200 timed out after 5s");
    }

    #[test]
    fn test_already_active_with_and_without_host() {
        let known = SessionError::AlreadyActive {
            host: Some("10.0.0.5".to_string()),
        };
        assert_eq!(known.to_string(), "A session to 10.0.0.5 is already active");

        let closing = SessionError::AlreadyActive { host: None };
        assert_eq!(closing.to_string(), "A session is already active");
    }

    #[test]
    fn test_stream_error_names_stream() {
        let err = StreamError::new(
            StreamKind::Stderr,
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        assert_eq!(err.to_string(), "stderr stream error: pipe closed");
    }
}
