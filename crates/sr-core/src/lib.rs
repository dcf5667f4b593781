//! sr-core: Core abstractions and configuration for shell-relay
//!
//! This crate provides the domain types, error taxonomy and configuration
//! shared by the relay core and the command-line front end.

pub mod config;
pub mod error;
pub mod notify;
pub mod types;

pub use error::{ConfigError, DialError, RelayError, SessionError, ShellError, StreamError};
pub use notify::{MachineStatus, NetworkSnapshot, NotifyEvent, Peer};
pub use types::{SessionState, StreamKind, TerminalSize};
