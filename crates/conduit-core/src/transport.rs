//! Transport contracts: the boundary between the core and a concrete link
//! implementation (TCP socket, serial line, MQTT broker client).
//!
//! Concrete implementations live in `conduit-transport`; this crate only
//! depends on the trait shape so the listener/requester/supervisor can stay
//! transport-agnostic. Per §5's shared-resources note, `send` and `read`
//! (or `publish`/`subscribe`) run on disjoint tasks against the same
//! transport instance — implementations must tolerate concurrent use
//! without an external lock, hence every method takes `&self`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ConnectionError;

/// The outcome of a single transport operation (`send`, `publish`,
/// `subscribe`), replacing the original's "return bool, or raise one of
/// five exception types" shape with one sum type per §9's redesign note.
#[derive(Debug)]
pub enum TransportOutcome {
    /// The operation completed successfully.
    Ok,
    /// The operation was rejected without indicating link loss (the
    /// original's bare `false` return).
    Rejected,
    /// The link was lost or could not be used; the caller should treat
    /// this as a disconnect.
    Disconnected(ConnectionError),
    /// A non-fatal per-operation error (timeout, decode, validation,
    /// authentication, or another protocol-level failure).
    Errored(ConnectionError),
}

/// The outcome of a single `read()` call on a request/response transport.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes were read from the link.
    Data(Bytes),
    /// No data is available yet; the listener should briefly yield and
    /// re-poll.
    Empty,
    /// The link was lost during the read.
    Disconnected(ConnectionError),
}

/// A request/response link: connect once, then `send`/`read` concurrently
/// from the requester and listener tasks respectively.
#[async_trait]
pub trait ReqResTransport: Send + Sync + 'static {
    /// Establishes the link. Idempotent and blocking (the caller is
    /// expected to call this in a retry loop, not to race it).
    async fn connect(&self) -> bool;

    /// Tears down the link. Best-effort; implementations should not panic
    /// on a link that is already closed.
    async fn disconnect(&self);

    /// Sends a single already-framed packet.
    async fn send(&self, bytes: &[u8]) -> TransportOutcome;

    /// Reads the next available chunk of bytes, which may contain zero,
    /// one, or several frames.
    async fn read(&self) -> ReadOutcome;
}

/// A callback invoked by a [`PubSubTransport`] for every message on a
/// subscribed topic. Synchronous by contract (object-safe); implementations
/// that need to do async work in response should spawn a task from inside
/// the callback.
pub type PubSubHandler = Arc<dyn Fn(String, Bytes) + Send + Sync + 'static>;

/// A publish/subscribe link.
#[async_trait]
pub trait PubSubTransport: Send + Sync + 'static {
    /// Establishes the link to the broker.
    async fn connect(&self) -> bool;

    /// Tears down the link.
    async fn disconnect(&self);

    /// Publishes `message` to `topic`.
    async fn publish(&self, topic: &str, message: &[u8], qos: u8, retain: bool) -> TransportOutcome;

    /// Subscribes to `topic` (the listener always subscribes to the
    /// wildcard `"#"` once, at construction). `handler` is invoked for
    /// every message the broker delivers on a matching topic.
    async fn subscribe(&self, topic: &str, handler: PubSubHandler) -> TransportOutcome;
}
