//! sr-relay: Single-session interactive shell relay
//!
//! Dials one peer through a local proxy, negotiates an SSH shell over the
//! connection, and pumps terminal bytes between that shell and a single UI
//! consumer. Backend notifications are projected onto the same UI.
//!
//! The UI talks to the relay only through typed [`Command`]s and receives
//! everything back through its [`UiSink`].

pub mod bridge;
pub mod dialer;
pub mod input;
pub mod manager;
pub mod relay;
pub mod service;
pub mod shell;
pub mod state;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::{notify_channel, NotificationBridge, NotifyReceiver, NotifySender, UrlCodeRenderer};
pub use dialer::{Connection, Dialer, DirectDial, ProxyDial, Socks5Proxy};
pub use input::{InputQueue, InputReceiver, SubmitOutcome};
pub use manager::{SessionManager, SessionSettings, SessionSummary};
pub use relay::{IoRelay, PumpReport, RelayReport};
pub use service::{command_channel, BackendControl, Command, RelayService};
pub use shell::{
    AuthMethod, ConnectRequest, Credentials, HostKeyPolicy, ShellConnector, ShellStreams,
    SshConnector,
};
pub use state::StateTracker;
pub use ui::{DisplayUpdate, NetworkView, PeerRow, UiSink};
