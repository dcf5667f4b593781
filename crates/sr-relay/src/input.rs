//! Bounded keystroke queue between the UI and the input pump
//!
//! Many producers (every clone of [`InputQueue`]) and exactly one consumer
//! (the [`InputReceiver`] owned by the input pump). Chunks are delivered
//! untouched and in submission order.

use bytes::Bytes;
use sr_core::config::Backpressure;
use tokio::sync::mpsc::{self, error::TrySendError};

/// What happened to a submitted chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The chunk is queued for the remote shell
    Queued,
    /// The queue was full and the policy is to drop
    Dropped,
    /// The consumer is gone; the chunk was discarded
    Closed,
}

/// Producer side of the input queue
#[derive(Debug, Clone)]
pub struct InputQueue {
    tx: mpsc::Sender<Bytes>,
    policy: Backpressure,
}

/// Consumer side of the input queue
#[derive(Debug)]
pub struct InputReceiver {
    rx: mpsc::Receiver<Bytes>,
}

impl InputQueue {
    /// Create a queue holding at most `capacity` chunks
    pub fn bounded(capacity: usize, policy: Backpressure) -> (InputQueue, InputReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (InputQueue { tx, policy }, InputReceiver { rx })
    }

    /// Enqueue a chunk according to the backpressure policy
    pub async fn submit(&self, chunk: impl Into<Bytes>) -> SubmitOutcome {
        let chunk = chunk.into();
        match self.policy {
            Backpressure::Block => match self.tx.send(chunk).await {
                Ok(()) => SubmitOutcome::Queued,
                Err(_) => SubmitOutcome::Closed,
            },
            Backpressure::DropNewest => match self.tx.try_send(chunk) {
                Ok(()) => SubmitOutcome::Queued,
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!("Input queue full, dropping {} bytes", dropped.len());
                    SubmitOutcome::Dropped
                }
                Err(TrySendError::Closed(_)) => SubmitOutcome::Closed,
            },
        }
    }
}

impl InputReceiver {
    /// Wait for the next chunk. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take the next chunk if one is already waiting
    pub fn next_or_none(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut rx) = InputQueue::bounded(4, Backpressure::Block);
        for chunk in ["l", "s", "\r"] {
            assert_eq!(queue.submit(chunk).await, SubmitOutcome::Queued);
        }

        assert_eq!(rx.next_or_none().as_deref(), Some(&b"l"[..]));
        assert_eq!(rx.recv().await.as_deref(), Some(&b"s"[..]));
        assert_eq!(rx.recv().await.as_deref(), Some(&b"\r"[..]));
        assert_eq!(rx.next_or_none(), None);
    }

    #[tokio::test]
    async fn test_drop_newest_when_full() {
        let (queue, mut rx) = InputQueue::bounded(2, Backpressure::DropNewest);
        assert_eq!(queue.submit("a").await, SubmitOutcome::Queued);
        assert_eq!(queue.submit("b").await, SubmitOutcome::Queued);
        assert_eq!(queue.submit("c").await, SubmitOutcome::Dropped);

        assert_eq!(rx.recv().await.as_deref(), Some(&b"a"[..]));
        assert_eq!(rx.recv().await.as_deref(), Some(&b"b"[..]));
        assert_eq!(rx.next_or_none(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_waits_for_a_free_slot() {
        let (queue, mut rx) = InputQueue::bounded(1, Backpressure::Block);
        assert_eq!(queue.submit("a").await, SubmitOutcome::Queued);

        let producer = queue.clone();
        let pending = tokio::spawn(async move { producer.submit("b").await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        assert_eq!(rx.recv().await.as_deref(), Some(&b"a"[..]));
        assert_eq!(pending.await.unwrap(), SubmitOutcome::Queued);
        assert_eq!(rx.recv().await.as_deref(), Some(&b"b"[..]));
    }

    #[tokio::test]
    async fn test_submit_after_consumer_dropped() {
        let (queue, rx) = InputQueue::bounded(1, Backpressure::Block);
        drop(rx);
        assert_eq!(queue.submit("late").await, SubmitOutcome::Closed);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let (queue, mut rx) = InputQueue::bounded(0, Backpressure::DropNewest);
        assert_eq!(queue.submit("x").await, SubmitOutcome::Queued);
        assert_eq!(rx.recv().await.as_deref(), Some(&b"x"[..]));
    }
}
