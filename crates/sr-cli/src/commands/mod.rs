//! CLI command implementations

mod config;
mod connect;
mod watch;

pub use config::{config_init, config_path, config_show, load_relay_config};
pub use connect::{connect_command, resolve_credentials, PASSWORD_ENV};
pub use watch::watch_command;
