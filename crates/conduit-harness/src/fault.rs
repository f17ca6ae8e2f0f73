//! A [`LoopbackTransport`] wrapper that can drop outbound frames or block
//! `send()` for a window, for the retransmission-recovery (S3) and
//! back-pressure (S4) scenario tests.
//!
//! There is no single teacher fixture for fault injection; this follows the
//! same shape as `AlwaysOnTransport` in `conduit-core::supervisor`'s test
//! module (a thin `ReqResTransport` wrapper built purely for tests) plus the
//! predicate-driven drop rule the retransmission subsystem itself needs
//! exercised: §7's gap/retransmission scenarios require a transport that
//! can lose specific frames on demand and recover deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::transport::{ReadOutcome, ReqResTransport, TransportOutcome};
use tokio::sync::Mutex;

use crate::loopback::LoopbackTransport;

/// Decides whether the `n`th outbound `send()` call (0-indexed) should be
/// dropped.
pub type DropPredicate = Arc<dyn Fn(usize, &[u8]) -> bool + Send + Sync>;

/// Wraps a [`LoopbackTransport`] end, optionally dropping sends that match
/// a predicate and/or stalling every send by a fixed delay.
pub struct FaultInjectingTransport {
    inner: LoopbackTransport,
    drop_predicate: Mutex<Option<DropPredicate>>,
    unblock_at: Mutex<Option<tokio::time::Instant>>,
    send_count: AtomicUsize,
}

impl FaultInjectingTransport {
    /// Wraps a connected [`LoopbackTransport`] end with no fault configured.
    #[must_use]
    pub fn new(inner: LoopbackTransport) -> Self {
        Self { inner, drop_predicate: Mutex::new(None), unblock_at: Mutex::new(None), send_count: AtomicUsize::new(0) }
    }

    /// Builds a fault-injecting pair: `a` is wrapped, `b` is a plain
    /// [`LoopbackTransport`] end a test can drive directly.
    #[must_use]
    pub fn pair() -> (Self, LoopbackTransport) {
        let (a, b) = LoopbackTransport::pair();
        (Self::new(a), b)
    }

    /// Installs a predicate deciding, per outbound `send()` call, whether
    /// the frame should be silently dropped (reported to the caller as
    /// [`TransportOutcome::Ok`], matching a real link's fire-and-forget
    /// send semantics when a packet is lost in flight).
    pub async fn drop_when(&self, predicate: DropPredicate) {
        *self.drop_predicate.lock().await = Some(predicate);
    }

    /// Stalls every `send()` call until `duration` has elapsed from this
    /// call, modelling a single congested window rather than a per-message
    /// latency: calls made while the window is open all wait for the same
    /// deadline, and calls made after it has passed proceed immediately.
    pub async fn block_sends_for(&self, duration: Duration) {
        *self.unblock_at.lock().await = Some(tokio::time::Instant::now() + duration);
    }

    /// How many `send()` calls have been made so far, dropped or not.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.send_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReqResTransport for FaultInjectingTransport {
    async fn connect(&self) -> bool {
        self.inner.connect().await
    }

    async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    async fn send(&self, bytes: &[u8]) -> TransportOutcome {
        let index = self.send_count.fetch_add(1, Ordering::Relaxed);

        if let Some(deadline) = *self.unblock_at.lock().await {
            tokio::time::sleep_until(deadline).await;
        }

        if let Some(predicate) = self.drop_predicate.lock().await.as_ref() {
            if predicate(index, bytes) {
                return TransportOutcome::Ok;
            }
        }
        self.inner.send(bytes).await
    }

    async fn read(&self) -> ReadOutcome {
        self.inner.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_frames_never_reach_the_peer() {
        let (faulty, peer) = FaultInjectingTransport::pair();
        faulty.drop_when(Arc::new(|index, _bytes| index == 1)).await;

        assert!(matches!(faulty.send(b"first").await, TransportOutcome::Ok));
        assert!(matches!(faulty.send(b"second").await, TransportOutcome::Ok));
        assert!(matches!(faulty.send(b"third").await, TransportOutcome::Ok));

        match peer.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"first"),
            other => panic!("expected data, got {other:?}"),
        }
        match peer.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"third"),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_sends_still_arrive_once_the_window_passes() {
        let (faulty, peer) = FaultInjectingTransport::pair();
        faulty.block_sends_for(Duration::from_millis(20)).await;

        let start = tokio::time::Instant::now();
        assert!(matches!(faulty.send(b"slow").await, TransportOutcome::Ok));
        assert!(start.elapsed() >= Duration::from_millis(20));

        match peer.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"slow"),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_second_send_after_the_window_passes_is_not_delayed() {
        let (faulty, peer) = FaultInjectingTransport::pair();
        faulty.block_sends_for(Duration::from_millis(20)).await;
        let _ = faulty.send(b"first").await;

        let start = tokio::time::Instant::now();
        assert!(matches!(faulty.send(b"second").await, TransportOutcome::Ok));
        assert!(start.elapsed() < Duration::from_millis(20));

        let _ = peer.read().await;
        let _ = peer.read().await;
    }

    #[tokio::test]
    async fn send_count_tracks_every_call_dropped_or_not() {
        let (faulty, _peer) = FaultInjectingTransport::pair();
        faulty.drop_when(Arc::new(|_, _| true)).await;
        let _ = faulty.send(b"a").await;
        let _ = faulty.send(b"b").await;
        assert_eq!(faulty.send_count(), 2);
    }
}
