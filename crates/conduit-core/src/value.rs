//! Application-owned send/receive value contracts.

use bytes::Bytes;

/// An opaque, application-defined outbound value.
///
/// Immutable once constructed: owned by its producer until handed to the
/// supervisor's outbound queue, and by the requester thereafter.
pub trait SendValue: Send + 'static {
    /// The error produced when this value cannot be serialized.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Serializes this value to its wire payload.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the value cannot be represented as bytes.
    fn encode(&self) -> Result<Bytes, Self::Error>;
}

/// A [`SendValue`] that is already raw bytes.
///
/// Useful for data packages that want framing without an additional
/// application-level schema, mirroring [`ReceiveValue`]'s impl below.
impl SendValue for Bytes {
    type Error = std::convert::Infallible;

    fn encode(&self) -> Result<Bytes, Self::Error> {
        Ok(self.clone())
    }
}

/// A [`SendValue`] sent over a publish/subscribe transport, which needs a
/// topic in addition to a payload.
pub trait PubSubSendValue: SendValue {
    /// The topic this value publishes to. An empty topic is treated as
    /// absent by the requester (`on_failed_send`, no transport call).
    fn topic(&self) -> &str;
}

/// An opaque, application-defined inbound value.
///
/// Constructed by the listener at dispatch time from a decoded frame's
/// payload; the application owns its lifetime from there.
pub trait ReceiveValue: Send + 'static {
    /// The error produced when a payload cannot be deserialized into this
    /// value.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deserializes this value from a decoded frame payload.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if `payload` is not a valid encoding of this
    /// value.
    fn decode(payload: &[u8]) -> Result<Self, Self::Error>
    where
        Self: Sized;
}

/// A [`ReceiveValue`] that passes its payload through unchanged.
///
/// Useful for data packages that want framing/decoding without an
/// additional application-level schema.
impl ReceiveValue for Bytes {
    type Error = std::convert::Infallible;

    fn decode(payload: &[u8]) -> Result<Self, Self::Error> {
        Ok(Bytes::copy_from_slice(payload))
    }
}
