//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal geometry in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl TerminalSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

impl fmt::Display for TerminalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// One of the three standard streams of a remote shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdin => write!(f, "stdin"),
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Lifecycle of a single shell session attempt
///
/// States only move forward. Any state may jump straight to `Closed`, and a
/// fresh attempt always starts again from `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Disconnected,
    Dialing,
    Handshaking,
    ChannelOpen,
    PtyRequested,
    ShellRunning,
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(self, next: SessionState) -> bool {
        match (self, next) {
            (SessionState::Closed, _) => false,
            (_, SessionState::Closed) => true,
            (current, next) => next as u8 == current as u8 + 1,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Dialing => "dialing",
            SessionState::Handshaking => "handshaking",
            SessionState::ChannelOpen => "channel-open",
            SessionState::PtyRequested => "pty-requested",
            SessionState::ShellRunning => "shell-running",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
