//! The (codec, send-value, receive-value) triple that parameterises a
//! supervisor.
//!
//! Replaces the class-level mutable registries of the Python original
//! (`ReqResManager`/`PubSubManager` in `protocol_manager.py`) with an
//! explicit value the application constructs once and hands to the
//! supervisor — no process-wide hidden state.

use std::marker::PhantomData;
use std::sync::Arc;

use conduit_proto::PacketCodec;

use crate::value::{ReceiveValue, SendValue};

/// Binds a codec instance to the send/receive value types a
/// [`crate::supervisor::Supervisor`] exchanges over it.
///
/// The codec is stored as a trait object since the supervisor only ever
/// needs to call through [`PacketCodec`]'s methods (the retransmission
/// coordinator downcasts via [`PacketCodec::as_binary`] when it needs
/// sync-number machinery); `S`/`R` stay as type parameters so `encode`/
/// `decode` are monomorphized and the compiler enforces that a supervisor's
/// `send()` only accepts the configured send-value type.
pub struct DataPackage<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    codec: Arc<dyn PacketCodec>,
    _send: PhantomData<fn() -> S>,
    _recv: PhantomData<fn() -> R>,
}

impl<S, R> DataPackage<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    /// Builds a data package from a codec instance.
    pub fn new(codec: Arc<dyn PacketCodec>) -> Self {
        Self { codec, _send: PhantomData, _recv: PhantomData }
    }

    /// The codec this data package binds to `S`/`R`.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn PacketCodec> {
        &self.codec
    }
}

impl<S, R> Clone for DataPackage<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    fn clone(&self) -> Self {
        Self { codec: Arc::clone(&self.codec), _send: PhantomData, _recv: PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use conduit_proto::SentinelCodec;

    use super::*;

    #[test]
    fn exposes_the_codec_it_was_built_from() {
        let package: DataPackage<Bytes, Bytes> = DataPackage::new(Arc::new(SentinelCodec::default()));
        assert!(package.codec().is_framed(b"$x$"));
    }
}
