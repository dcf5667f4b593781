//! Backend notifications from a JSON-lines stream
//!
//! Each line is one [`NotifyEvent`], e.g.
//!
//! ```text
//! {"type":"browse_to_url","url":"https://login.example/a1"}
//! {"type":"network_snapshot","name":"laptop","addresses":["100.64.0.7"],"peers":[]}
//! {"type":"login_finished"}
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use futures::StreamExt;
use sr_core::NotifyEvent;
use sr_relay::NotifySender;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};

/// Longest line accepted from an event source
const MAX_LINE: usize = 1024 * 1024;

pub fn parse_event(line: &str) -> Option<NotifyEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Skipping malformed event: {}", e);
            None
        }
    }
}

/// Forward every event in `source` until it ends or nobody is listening.
/// Returns the number of events forwarded.
pub async fn forward_events<R>(source: R, tx: &NotifySender) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(source, LinesCodec::new_with_max_length(MAX_LINE));
    let mut forwarded = 0;

    while let Some(line) = lines.next().await {
        let line = line.context("Failed to read event stream")?;
        let Some(event) = parse_event(&line) else {
            continue;
        };
        if tx.send(event).is_err() {
            tracing::debug!("Notification bridge gone, stopping event source");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

/// Open an event source: a file path, or `-` for stdin
pub async fn open_source(path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open event source {:?}", path))?;
    Ok(Box::new(file))
}
