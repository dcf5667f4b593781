//! sr-cli: Command-line front end for shell-relay
//!
//! Opens an interactive remote shell through a local proxy from the
//! current terminal, and renders backend notifications.

pub mod commands;
pub mod events;
pub mod output;
pub mod terminal;
