//! Bidirectional byte relay between the UI and a running shell
//!
//! Three pumps run concurrently:
//!
//! - stdout -> UI, with line-break normalization
//! - stderr -> UI, same treatment
//! - input queue -> stdin
//!
//! The relay finishes once both output pumps have finished. The input pump
//! is told through a completion token and exits even if no more input ever
//! arrives. Pending input is discarded at that point.

mod activity;
mod decode;

pub use activity::ActivityClock;
pub use decode::{normalize_line_breaks, LineBreaks, TerminalDecoder, Utf8Decoder};

use std::io;
use std::sync::Arc;

use sr_core::{StreamError, StreamKind};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::input::InputReceiver;
use crate::shell::ShellStreams;
use crate::ui::UiSink;

/// Read size for the output pumps
const READ_CHUNK: usize = 4096;

/// How one pump ended
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Bytes moved before the pump stopped
    pub bytes: u64,
    /// Set when the pump stopped on an I/O error rather than end-of-stream
    pub error: Option<StreamError>,
}

impl PumpReport {
    fn failed(kind: StreamKind, bytes: u64, source: io::Error) -> Self {
        Self {
            bytes,
            error: Some(StreamError::new(kind, source)),
        }
    }

    fn from_join(kind: StreamKind, joined: Result<PumpReport, JoinError>) -> Self {
        joined.unwrap_or_else(|e| {
            tracing::error!("{} pump task failed: {}", kind, e);
            Self::failed(kind, 0, io::Error::new(io::ErrorKind::Other, e.to_string()))
        })
    }
}

/// Result of a whole relay run
#[derive(Debug, Default)]
pub struct RelayReport {
    pub stdout: PumpReport,
    pub stderr: PumpReport,
    pub stdin: PumpReport,
}

impl RelayReport {
    pub fn errors(&self) -> impl Iterator<Item = &StreamError> {
        [&self.stdout, &self.stderr, &self.stdin]
            .into_iter()
            .filter_map(|pump| pump.error.as_ref())
    }
}

/// Runs the three stream pumps for one session
pub struct IoRelay {
    ui: Arc<dyn UiSink>,
    activity: Option<Arc<ActivityClock>>,
}

impl IoRelay {
    pub fn new(ui: Arc<dyn UiSink>) -> Self {
        Self { ui, activity: None }
    }

    /// Record traffic on `clock` for idle tracking
    pub fn with_activity(mut self, clock: Arc<ActivityClock>) -> Self {
        self.activity = Some(clock);
        self
    }

    /// Pump until both output streams end, then stop the input pump
    ///
    /// Every stream is closed by the time this returns. The shell's driver
    /// task, if any, is left to the caller.
    pub async fn run(&self, streams: ShellStreams, input: InputReceiver) -> RelayReport {
        let ShellStreams {
            stdin,
            stdout,
            stderr,
            ..
        } = streams;
        let done = CancellationToken::new();

        let input_task = tokio::spawn(pump_input(
            stdin,
            input,
            done.clone(),
            Arc::clone(&self.ui),
            self.activity.clone(),
        ));
        let stdout_task = tokio::spawn(pump_output(
            StreamKind::Stdout,
            stdout,
            Arc::clone(&self.ui),
            self.activity.clone(),
        ));
        let stderr_task = tokio::spawn(pump_output(
            StreamKind::Stderr,
            stderr,
            Arc::clone(&self.ui),
            self.activity.clone(),
        ));

        let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);
        tracing::debug!("Output streams finished, stopping input pump");
        done.cancel();
        let stdin = input_task.await;

        let report = RelayReport {
            stdout: PumpReport::from_join(StreamKind::Stdout, stdout),
            stderr: PumpReport::from_join(StreamKind::Stderr, stderr),
            stdin: PumpReport::from_join(StreamKind::Stdin, stdin),
        };
        tracing::debug!(
            "Relay finished: {} bytes out, {} bytes err, {} bytes in",
            report.stdout.bytes,
            report.stderr.bytes,
            report.stdin.bytes
        );
        report
    }
}

async fn pump_output(
    kind: StreamKind,
    mut source: Box<dyn AsyncRead + Send + Unpin>,
    ui: Arc<dyn UiSink>,
    activity: Option<Arc<ActivityClock>>,
) -> PumpReport {
    let mut decoder = TerminalDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut bytes = 0u64;

    let result = loop {
        match source.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => {
                bytes += n as u64;
                if let Some(clock) = &activity {
                    clock.touch();
                }
                let text = decoder.push(&buf[..n]);
                if !text.is_empty() {
                    ui.write(&text);
                }
            }
            Err(e) => break Err(e),
        }
    };

    let tail = decoder.finish();
    if !tail.is_empty() {
        ui.write(&tail);
    }

    match result {
        Ok(()) => {
            tracing::debug!("{} reached end of stream after {} bytes", kind, bytes);
            PumpReport { bytes, error: None }
        }
        Err(e) => {
            tracing::warn!("{} read failed: {}", kind, e);
            ui.write(&format!("Error: {}\r\n", e));
            PumpReport::failed(kind, bytes, e)
        }
    }
}

async fn pump_input(
    mut sink: Box<dyn AsyncWrite + Send + Unpin>,
    mut input: InputReceiver,
    done: CancellationToken,
    ui: Arc<dyn UiSink>,
    activity: Option<Arc<ActivityClock>>,
) -> PumpReport {
    let mut bytes = 0u64;
    let mut error = None;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = done.cancelled() => break,
            chunk = input.recv() => chunk,
        };

        let Some(chunk) = chunk else {
            // Every producer is gone; nothing more can arrive
            done.cancelled().await;
            break;
        };

        let write = async {
            sink.write_all(&chunk).await?;
            sink.flush().await
        };
        let written = tokio::select! {
            biased;
            _ = done.cancelled() => break,
            written = write => written,
        };

        match written {
            Ok(()) => {
                bytes += chunk.len() as u64;
                if let Some(clock) = &activity {
                    clock.touch();
                }
            }
            Err(e) => {
                tracing::warn!("stdin write failed: {}", e);
                ui.write(&format!("Error: {}\r\n", e));
                error = Some(StreamError::new(StreamKind::Stdin, e));
                break;
            }
        }
    }

    if let Err(e) = sink.shutdown().await {
        tracing::debug!("stdin shutdown: {}", e);
    }

    PumpReport { bytes, error }
}
