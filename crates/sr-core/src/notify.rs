//! Backend state-change notifications
//!
//! These are the events the network backend emits while it logs in and
//! learns about the network. The relay only consumes them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A state change reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// Login completed; any pending auth prompt is obsolete
    LoginFinished,
    /// A fresh view of this node and its peers
    NetworkSnapshot(NetworkSnapshot),
    /// The user must visit a URL to authenticate
    BrowseToUrl { url: String },
}

/// This node's view of the network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSnapshot {
    pub name: String,
    pub addresses: Vec<IpAddr>,
    pub peers: Vec<Peer>,
    pub machine_status: MachineStatus,
    pub machine_key: String,
    pub node_key: String,
}

impl NetworkSnapshot {
    /// The node's primary address, if it has any
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// A reachable peer on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
}

impl Peer {
    pub fn new(name: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            name: name.into(),
            addresses,
        }
    }

    /// The first address is the peer's primary reachable address
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// Authorization state of this machine with the control plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    #[default]
    Unknown,
    Unauthorized,
    Authorized,
    Invalid,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineStatus::Unknown => write!(f, "unknown"),
            MachineStatus::Unauthorized => write!(f, "unauthorized"),
            MachineStatus::Authorized => write!(f, "authorized"),
            MachineStatus::Invalid => write!(f, "invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_finished() {
        let event: NotifyEvent = serde_json::from_str(r#"{"type":"login_finished"}"#).unwrap();
        assert_eq!(event, NotifyEvent::LoginFinished);
    }

    #[test]
    fn test_parse_browse_to_url() {
        let event: NotifyEvent =
            serde_json::from_str(r#"{"type":"browse_to_url","url":"https://login.example/a1"}"#)
                .unwrap();
        assert_eq!(
            event,
            NotifyEvent::BrowseToUrl {
                url: "https://login.example/a1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_network_snapshot_with_defaults() {
        let json = r#"{
            "type": "network_snapshot",
            "name": "wasm",
            "addresses": ["100.64.0.7", "fd7a:115c:a1e0::7"],
            "peers": [{"name": "p1", "addresses": ["10.0.0.2"]}, {"name": "lonely"}],
            "machine_status": "authorized"
        }"#;
        let event: NotifyEvent = serde_json::from_str(json).unwrap();
        let NotifyEvent::NetworkSnapshot(snapshot) = event else {
            panic!("expected a network snapshot");
        };

        assert_eq!(snapshot.name, "wasm");
        assert_eq!(
            snapshot.primary_address(),
            Some("100.64.0.7".parse().unwrap())
        );
        assert_eq!(snapshot.machine_status, MachineStatus::Authorized);
        assert!(snapshot.node_key.is_empty());
        assert_eq!(snapshot.peers[0].primary_address(), Some("10.0.0.2".parse().unwrap()));
        assert_eq!(snapshot.peers[1].primary_address(), None);
    }
}
