//! Bounded outbound queue: multi-writer, single-reader, drop-newest-on-full.

use tokio::sync::mpsc;

/// The producer half of an [`OutboundQueue`], held by the supervisor and
/// cloned for every `send` call site.
#[derive(Debug, Clone)]
pub struct OutboundSender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> OutboundSender<T> {
    /// Enqueues `value`. Returns `false` if the queue is full (the
    /// back-pressure signal) or the requester has shut down.
    pub fn try_send(&self, value: T) -> bool {
        self.inner.try_send(value).is_ok()
    }
}

/// The consumer half, held exclusively by the requester worker.
#[derive(Debug)]
pub struct OutboundReceiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> OutboundReceiver<T> {
    /// Waits up to `timeout` for the next queued value.
    ///
    /// Returns `None` on timeout (the caller re-checks its stop flag and
    /// loops) as well as when the channel is closed.
    pub async fn recv_timeout(&mut self, timeout: std::time::Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.inner.recv()).await.ok().flatten()
    }
}

/// Builds a bounded outbound queue of `capacity` slots.
///
/// `capacity` must be at least 1; a full queue causes [`OutboundSender::try_send`]
/// to return `false` rather than block, a drop-newest-on-full policy.
#[must_use]
pub fn outbound_queue<T>(capacity: usize) -> (OutboundSender<T>, OutboundReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutboundSender { inner: tx }, OutboundReceiver { inner: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_values_in_fifo_order() {
        let (tx, mut rx) = outbound_queue::<u32>(4);
        assert!(tx.try_send(1));
        assert!(tx.try_send(2));
        assert!(tx.try_send(3));
        assert_eq!(rx.recv_timeout(std::time::Duration::from_millis(50)).await, Some(1));
        assert_eq!(rx.recv_timeout(std::time::Duration::from_millis(50)).await, Some(2));
        assert_eq!(rx.recv_timeout(std::time::Duration::from_millis(50)).await, Some(3));
    }

    #[tokio::test]
    async fn rejects_enqueue_once_full() {
        let (tx, _rx) = outbound_queue::<u32>(2);
        assert!(tx.try_send(1));
        assert!(tx.try_send(2));
        assert!(!tx.try_send(3));
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_when_empty() {
        let (_tx, mut rx) = outbound_queue::<u32>(2);
        assert_eq!(rx.recv_timeout(std::time::Duration::from_millis(10)).await, None);
    }
}
