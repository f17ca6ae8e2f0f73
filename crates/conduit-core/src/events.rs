//! The application-facing callback contract.
//!
//! One [`EventSink`] is shared (via `Arc`) between the listener and
//! requester tasks of a single [`crate::supervisor::Supervisor`]; it must
//! be reentrant, since both tasks invoke it from their own thread of
//! control. The supervisor wraps whatever sink the application supplies in
//! an internal forwarding sink that additionally raises the retry flag on
//! `on_disconnected` — applications only ever see the five callbacks
//! below, never the retry-flag mechanics.

use bytes::Bytes;

use crate::error::ConnectionError;
use crate::value::{ReceiveValue, SendValue};

/// Application callback hooks for one link's worker pair.
///
/// Every method has a no-op default so an application can implement only
/// the callbacks it cares about.
pub trait EventSink<S, R>: Send + Sync + 'static
where
    S: SendValue,
    R: ReceiveValue,
{
    /// A value was handed to the transport successfully.
    fn on_sent(&self, _value: S) {}

    /// A value could not be sent (transport rejection, timeout, decode,
    /// validation, or authentication failure — anything that doesn't imply
    /// link loss).
    fn on_failed_send(&self, _value: S) {}

    /// A frame was received, decoded, and deserialized successfully.
    fn on_received(&self, _value: R) {}

    /// A frame failed framing or value decoding and was dropped.
    fn on_failed_recv(&self, _frame: Bytes) {}

    /// The link was lost. The supervisor has already raised its retry
    /// flag by the time this fires; callbacks must not call the
    /// supervisor's `stop()` synchronously from here (they may call
    /// `send()`).
    fn on_disconnected(&self, _error: ConnectionError) {}
}

/// A shared, type-erased [`EventSink`] handle, cloned into both workers.
pub type SharedEventSink<S, R> = std::sync::Arc<dyn EventSink<S, R>>;
