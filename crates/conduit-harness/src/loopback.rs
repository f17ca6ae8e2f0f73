//! An in-process request/response transport pair connected by channels.
//!
//! Generalizes the `AlwaysOnTransport` fixture in
//! `conduit-core::supervisor`'s own test module into a real two-ended link:
//! bytes sent on one end arrive on the other's `read()`, with no socket
//! involved. Used by the scenario tests that exercise a [`Supervisor`] (S1
//! echo round-trip, S2 stream reassembly) without needing a real network.
//!
//! [`Supervisor`]: conduit_core::supervisor::Supervisor

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use conduit_core::error::ConnectionError;
use conduit_core::transport::{ReadOutcome, ReqResTransport, TransportOutcome};
use tokio::sync::mpsc;

/// Capacity of each direction's internal channel.
const CHANNEL_CAPACITY: usize = 256;

/// One end of an in-process request/response link.
///
/// `connect()` always succeeds and `disconnect()` only flips a local flag;
/// the pair models the application-level link, not a socket's lifecycle.
pub struct LoopbackTransport {
    outbound: mpsc::Sender<Bytes>,
    inbound_tx: mpsc::Sender<Bytes>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<Bytes>>,
    connected: AtomicBool,
}

impl LoopbackTransport {
    /// Builds a connected pair: bytes sent on `a` arrive on `b`'s `read()`
    /// and vice versa.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_to_a_tx, b_to_a_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let a = Self {
            outbound: a_to_b_tx,
            inbound_tx: b_to_a_tx.clone(),
            inbound_rx: tokio::sync::Mutex::new(b_to_a_rx),
            connected: AtomicBool::new(true),
        };
        let b = Self {
            outbound: b_to_a_tx,
            inbound_tx: a_to_b_tx.clone(),
            inbound_rx: tokio::sync::Mutex::new(a_to_b_rx),
            connected: AtomicBool::new(true),
        };
        (a, b)
    }

    /// Feeds `chunk` directly into this end's own read queue, as if the peer
    /// had sent it, without routing through the paired end's `send`. Used by
    /// tests that want to hand a listener pre-chunked bytes (e.g. a
    /// split-frame scenario) while keeping the pair otherwise intact.
    pub async fn inject(&self, chunk: Bytes) {
        let _ = self.inbound_tx.send(chunk).await;
    }
}

#[async_trait]
impl ReqResTransport for LoopbackTransport {
    async fn connect(&self) -> bool {
        self.connected.store(true, Ordering::Relaxed);
        true
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    async fn send(&self, bytes: &[u8]) -> TransportOutcome {
        if !self.connected.load(Ordering::Relaxed) {
            return TransportOutcome::Disconnected(ConnectionError::Connection("loopback end disconnected".into()));
        }
        match self.outbound.send(Bytes::copy_from_slice(bytes)).await {
            Ok(()) => TransportOutcome::Ok,
            Err(_) => TransportOutcome::Disconnected(ConnectionError::Connection("peer end dropped".into())),
        }
    }

    async fn read(&self) -> ReadOutcome {
        if !self.connected.load(Ordering::Relaxed) {
            return ReadOutcome::Disconnected(ConnectionError::Connection("loopback end disconnected".into()));
        }
        match self.inbound_rx.lock().await.recv().await {
            Some(chunk) => ReadOutcome::Data(chunk),
            None => ReadOutcome::Disconnected(ConnectionError::Connection("peer end dropped".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_sent_on_one_end_arrive_on_the_other() {
        let (a, b) = LoopbackTransport::pair();
        assert!(matches!(a.send(b"hello").await, TransportOutcome::Ok));
        match b.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"hello"),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnected_end_reports_disconnected_on_send_and_read() {
        let (a, _b) = LoopbackTransport::pair();
        a.disconnect().await;
        assert!(matches!(a.send(b"x").await, TransportOutcome::Disconnected(_)));
        assert!(matches!(a.read().await, ReadOutcome::Disconnected(_)));
    }

    #[tokio::test]
    async fn dropping_the_peer_surfaces_as_disconnected() {
        let (a, b) = LoopbackTransport::pair();
        drop(b);
        assert!(matches!(a.send(b"x").await, TransportOutcome::Disconnected(_)));
    }

    #[tokio::test]
    async fn injected_chunks_are_read_back_in_order() {
        let (a, _b) = LoopbackTransport::pair();
        a.inject(Bytes::from_static(b"$ab$")).await;
        a.inject(Bytes::from_static(b"cd$ef$")).await;
        match a.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"$ab$"),
            other => panic!("expected data, got {other:?}"),
        }
        match a.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"cd$ef$"),
            other => panic!("expected data, got {other:?}"),
        }
    }
}
