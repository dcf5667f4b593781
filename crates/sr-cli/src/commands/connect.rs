//! Connect command implementation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use crossterm::event::Event;
use sr_core::config::RelayConfig;
use sr_core::SessionState;
use sr_relay::{
    command_channel, notify_channel, Command, Credentials, Dialer, NotificationBridge,
    RelayService, SessionManager, SessionSettings, SshConnector,
};
use tokio_util::sync::CancellationToken;

use crate::events::{forward_events, open_source};
use crate::output::{print_info, print_success};
use crate::terminal::{map_key, spawn_event_reader, KeyAction, RawModeGuard, TerminalUi};

/// Environment variable holding the shell login password
pub const PASSWORD_ENV: &str = "SHELL_RELAY_PASSWORD";

/// Pick the login method: a configured private key wins over a password
pub fn resolve_credentials(config: &RelayConfig, password: Option<String>) -> Result<Credentials> {
    if let Some(path) = &config.private_key_path {
        return Ok(Credentials::private_key(config.username.clone(), path.clone()));
    }
    match password {
        Some(password) => Ok(Credentials::password(config.username.clone(), password)),
        None => bail!(
            "No credentials: set private_key_path in the config or export {}",
            PASSWORD_ENV
        ),
    }
}

/// Open one interactive session to `host` and stay attached until it ends
pub async fn connect_command(
    config: RelayConfig,
    host: &str,
    events: Option<PathBuf>,
) -> Result<()> {
    let credentials = resolve_credentials(&config, std::env::var(PASSWORD_ENV).ok())?;

    let ui = Arc::new(TerminalUi::new());
    let manager = Arc::new(SessionManager::new(
        Dialer::from_config(&config),
        Arc::new(SshConnector::from_config(&config, credentials)),
        ui.clone(),
        SessionSettings::from_config(&config),
    ));
    let cancel = CancellationToken::new();

    if let Some(path) = events {
        let source = open_source(&path).await?;
        let (notify_tx, notify_rx) = notify_channel();
        NotificationBridge::new(ui.clone(), config.remote_port).spawn(notify_rx, cancel.clone());
        tokio::spawn(async move {
            if let Err(e) = forward_events(source, &notify_tx).await {
                tracing::warn!("Event source failed: {:#}", e);
            }
        });
    }

    let (commands, command_rx) = command_channel(64);
    let service = tokio::spawn(RelayService::new(Arc::clone(&manager)).run(command_rx, cancel.clone()));

    print_info("Press Ctrl+] to close the session");
    let raw = RawModeGuard::enter().context("Failed to enter raw mode")?;
    let (mut terminal_events, reader) = spawn_event_reader();
    let mut state = manager.subscribe_state();

    commands
        .send(Command::OpenSession {
            host: host.to_string(),
        })
        .await
        .context("Relay service stopped")?;

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() || *state.borrow_and_update() == SessionState::Closed {
                    break;
                }
            }
            Some(event) = terminal_events.recv() => {
                let Event::Key(key) = event else { continue };
                let command = match map_key(key) {
                    KeyAction::Send(bytes) => Command::SendInput(Bytes::from(bytes)),
                    KeyAction::Close => Command::CloseSession,
                    KeyAction::Ignore => continue,
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    drop(terminal_events);
    let _ = reader.await;
    service.await.context("Relay service task failed")?;
    drop(raw);

    print_success("Session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_relay::AuthMethod;

    #[test]
    fn test_private_key_wins_over_password() {
        let config = RelayConfig {
            username: "alice".to_string(),
            private_key_path: Some(PathBuf::from("/keys/id_ed25519")),
            ..RelayConfig::default()
        };
        let creds = resolve_credentials(&config, Some("pw".to_string())).unwrap();
        assert_eq!(creds.username, "alice");
        assert!(matches!(creds.method, AuthMethod::PrivateKey { .. }));
    }

    #[test]
    fn test_password_from_environment() {
        let config = RelayConfig {
            username: "bob".to_string(),
            ..RelayConfig::default()
        };
        let creds = resolve_credentials(&config, Some("pw".to_string())).unwrap();
        assert!(matches!(creds.method, AuthMethod::Password(ref p) if p == "pw"));
    }

    #[test]
    fn test_missing_credentials_is_an_error() {
        let err = resolve_credentials(&RelayConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains(PASSWORD_ENV));
    }
}
