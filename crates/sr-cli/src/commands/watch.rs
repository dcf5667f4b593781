//! Watch command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use sr_relay::{notify_channel, NotificationBridge};
use tokio_util::sync::CancellationToken;

use crate::events::{forward_events, open_source};
use crate::terminal::TerminalUi;

/// Render backend notifications from `source` until it ends
pub async fn watch_command(source: &Path, remote_port: u16) -> Result<()> {
    let input = open_source(source).await?;
    let ui = Arc::new(TerminalUi::new());
    let (tx, rx) = notify_channel();
    let bridge = NotificationBridge::new(ui, remote_port).spawn(rx, CancellationToken::new());

    let forwarded = forward_events(input, &tx).await?;
    drop(tx);
    bridge.await?;

    tracing::info!("Processed {} notifications", forwarded);
    Ok(())
}
