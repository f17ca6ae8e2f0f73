//! The packet codec contract shared by every concrete framing scheme.

use bytes::Bytes;

use crate::error::Result;

/// Frame type reserved for a client's request to re-send specific sync
/// numbers.
pub const RETX_REQUEST: u8 = 0xF0;

/// Frame type reserved for a server's retransmission of previously-buffered
/// frames.
pub const RETX_RESPONSE: u8 = 0xF1;

/// Default frame type used for ordinary application payloads when no
/// retransmission coordinator assigns one.
pub const APPLICATION: u8 = 0x00;

/// Returns `true` if `frame_type` is one of the two values reserved for
/// retransmission control.
#[must_use]
pub const fn is_reserved_frame_type(frame_type: u8) -> bool {
    frame_type == RETX_REQUEST || frame_type == RETX_RESPONSE
}

/// A fully decoded frame: its payload plus whatever metadata the concrete
/// codec carries on the wire.
///
/// The sentinel codec carries no metadata on the wire, so it always reports
/// `frame_type == APPLICATION` and `sync == None`. The binary codec reports
/// the frame's actual `CMD`/`SYNC` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// The frame's application/control type.
    pub frame_type: u8,
    /// The frame's sync number, if the codec carries one.
    pub sync: Option<u8>,
    /// The decoded application payload.
    pub payload: Bytes,
}

/// A stateless framing scheme: turns an application payload into a
/// self-delimited frame, and a byte stream back into frames.
///
/// Implementations must not hold connection state; a `PacketCodec` is
/// constructed once from configuration and shared (immutably) across every
/// worker that uses it.
pub trait PacketCodec: Send + Sync + 'static {
    /// Encodes `payload` as a self-delimited frame.
    ///
    /// `frame_type` and `sync` are wire metadata a concrete codec may or may
    /// not use; callers that don't care about either pass
    /// [`APPLICATION`]/`None`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FramingError::ReservedFrameType`] if `frame_type` is
    /// reserved, or [`crate::FramingError::MissingSync`] if the codec's
    /// configuration requires a sync number and `sync` is `None`.
    fn encode(&self, frame_type: u8, sync: Option<u8>, payload: &[u8]) -> Result<Bytes>;

    /// Decodes exactly one frame from `frame`.
    ///
    /// `frame` must be exactly one frame as produced by [`Self::split`] or
    /// [`Self::encode`]; trailing or leading bytes are a caller error, not
    /// something this method resynchronizes around.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::FramingError`] variant describing why `frame`
    /// could not be decoded.
    fn decode(&self, frame: &[u8]) -> Result<DecodedFrame>;

    /// Returns `true` if `bytes` is a complete, well-formed frame under this
    /// codec (head/tail/length checks only; does not imply `decode` will
    /// succeed, e.g. an oversized declared length is still "framed").
    fn is_framed(&self, bytes: &[u8]) -> bool;

    /// Splits a byte stream that may contain zero or more concatenated
    /// frames into its constituent frames, discarding empty segments.
    ///
    /// Each returned `Bytes` is itself valid input to [`Self::decode`].
    fn split(&self, stream: &[u8]) -> Vec<Bytes>;

    /// Downcasts to [`crate::BinaryCodec`] when this codec is one.
    ///
    /// The retransmission coordinator needs `BinaryCodec`'s sync-number and
    /// reserved-frame-type machinery and has no meaningful behavior over a
    /// codec without sync numbers (the sentinel codec); rather than make
    /// every codec carry that machinery, callers that need it go through
    /// this hook.
    fn as_binary(&self) -> Option<&crate::BinaryCodec> {
        None
    }
}
