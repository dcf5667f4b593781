//! Relay configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};

/// Configuration for the shell relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Local proxy used to reach peers
    pub proxy: ProxyConfig,

    /// Port dialed on the selected peer
    pub remote_port: u16,

    /// Upper bound on a single dial attempt
    #[serde(with = "duration_secs")]
    pub dial_timeout: Duration,

    /// Username for the shell login
    pub username: String,

    /// Private key for publickey authentication
    pub private_key_path: Option<PathBuf>,

    /// Expected server host key fingerprint
    pub host_key_fingerprint: Option<String>,

    /// Accept any server host key. Only meaningful when no fingerprint is pinned.
    pub accept_unknown_host_keys: bool,

    /// Terminal type sent with the PTY request
    pub term: String,

    /// Maximum number of keystroke chunks waiting for the remote shell
    pub input_queue_capacity: usize,

    /// What `send_input` does when the queue is full
    pub input_backpressure: Backpressure,

    /// Close a session after this long without input or output
    #[serde(with = "option_duration_secs")]
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            remote_port: 2200,
            dial_timeout: Duration::from_secs(5),
            username: whoami::username(),
            private_key_path: None,
            host_key_fingerprint: None,
            accept_unknown_host_keys: false,
            term: "xterm".to_string(),
            input_queue_capacity: 10,
            input_backpressure: Backpressure::Block,
            idle_timeout: None,
        }
    }
}

impl RelayConfig {
    /// `host:port` for a peer on the configured remote port
    pub fn target_address(&self, host: &str) -> String {
        join_host_port(host, self.remote_port)
    }
}

/// SOCKS5 proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy endpoint. `None` dials peers directly.
    pub address: Option<String>,

    /// Optional proxy username
    pub username: Option<String>,

    /// Optional proxy password
    pub password: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            address: Some("127.0.0.1:1080".to_string()),
            username: None,
            password: None,
        }
    }
}

/// Behavior of the input queue when it is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backpressure {
    /// Wait until the input pump frees a slot
    #[default]
    Block,
    /// Discard the chunk being submitted
    DropNewest,
}

/// Join a host and port, bracketing IPv6 literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
