//! The UI seam
//!
//! The relay never renders anything itself. It writes terminal text and
//! posts structured display updates to a [`UiSink`]; the UI binding decides
//! how they look and marshals them onto its own thread if it has to.

use std::net::IpAddr;

use sr_core::config::join_host_port;
use sr_core::{MachineStatus, NetworkSnapshot, TerminalSize};

/// Everything the relay can ask of the user interface
///
/// All methods are called from relay tasks and must not block on user
/// interaction.
pub trait UiSink: Send + Sync {
    /// Append text to the terminal
    fn write(&self, text: &str);

    /// Clear the terminal
    fn clear(&self);

    /// Current terminal geometry
    fn size(&self) -> TerminalSize;

    /// Whether a live shell currently owns keyboard input
    fn set_session_active(&self, _active: bool) {}

    /// Apply a non-terminal display update
    fn apply(&self, update: DisplayUpdate);
}

/// A display change derived from a backend notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    /// Remove any pending login prompt
    ClearLoginPrompt,
    /// Replace the status line
    Status(String),
    /// Replace the node and peer table
    Network(NetworkView),
    /// Show an authentication link, optionally with a scannable image of it
    LoginPrompt { url: String, code: Option<Vec<u8>> },
}

/// UI projection of a [`NetworkSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkView {
    pub name: String,
    /// Addresses with the primary one first
    pub addresses: Vec<IpAddr>,
    pub machine_status: MachineStatus,
    pub machine_key: String,
    pub node_key: String,
    pub peers: Vec<PeerRow>,
}

/// One row of the peer table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRow {
    pub name: String,
    pub address: Option<IpAddr>,
    /// `ip:port` to open a session against, when the peer has an address
    pub connect_target: Option<String>,
}

impl NetworkView {
    pub fn from_snapshot(snapshot: &NetworkSnapshot, remote_port: u16) -> Self {
        let peers = snapshot
            .peers
            .iter()
            .map(|peer| {
                let address = peer.primary_address();
                PeerRow {
                    name: peer.name.clone(),
                    address,
                    connect_target: address
                        .map(|ip| join_host_port(&ip.to_string(), remote_port)),
                }
            })
            .collect();

        Self {
            name: snapshot.name.clone(),
            addresses: snapshot.addresses.clone(),
            machine_status: snapshot.machine_status,
            machine_key: snapshot.machine_key.clone(),
            node_key: snapshot.node_key.clone(),
            peers,
        }
    }

    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_core::Peer;

    #[test]
    fn test_view_from_snapshot() {
        let snapshot = NetworkSnapshot {
            name: "wasm".to_string(),
            addresses: vec!["100.64.0.7".parse().unwrap()],
            peers: vec![
                Peer::new("p1", vec!["10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()]),
                Peer::new("v6", vec!["fd7a::2".parse().unwrap()]),
                Peer::new("offline", vec![]),
            ],
            machine_status: MachineStatus::Authorized,
            machine_key: "mkey:abc".to_string(),
            node_key: "nodekey:def".to_string(),
        };

        let view = NetworkView::from_snapshot(&snapshot, 2200);

        assert_eq!(view.primary_address(), Some("100.64.0.7".parse().unwrap()));
        assert_eq!(view.peers.len(), 3);
        assert_eq!(view.peers[0].connect_target.as_deref(), Some("10.0.0.2:2200"));
        assert_eq!(view.peers[1].connect_target.as_deref(), Some("[fd7a::2]:2200"));
        assert_eq!(view.peers[2].address, None);
        assert_eq!(view.peers[2].connect_target, None);
    }
}
