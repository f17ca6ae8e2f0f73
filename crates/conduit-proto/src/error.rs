//! Framing errors.
//!
//! One flat enum covers both concrete codecs. Decode/validation failures are
//! always non-fatal to the caller (the listener drops the offending frame
//! and continues, per the framing contract) so every variant carries enough
//! context to log without needing the original bytes.

use thiserror::Error;

/// Errors produced by [`crate::PacketCodec::encode`] and
/// [`crate::PacketCodec::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The frame does not begin with the codec's configured head sequence.
    #[error("frame does not start with the expected head sequence")]
    HeadMismatch,

    /// The frame does not end with the codec's configured tail sequence.
    #[error("frame does not end with the expected tail sequence")]
    TailMismatch,

    /// The sentinel codec's payload contains the forbidden `TAIL||HEAD`
    /// boundary-aliasing pattern.
    #[error("payload contains the forbidden tail||head boundary pattern")]
    ForbiddenPattern,

    /// The binary codec's declared `LEN` field disagrees with the observed
    /// frame length.
    #[error("declared length {declared} does not match observed length {actual}")]
    LengthMismatch {
        /// Length the frame claimed.
        declared: usize,
        /// Length actually observed.
        actual: usize,
    },

    /// Fewer bytes were available than the frame's header claims it needs.
    #[error("frame truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum byte count required to decode this frame.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// An application tried to encode a frame using a frame type reserved
    /// for retransmission control.
    #[error("frame type {0:#04x} is reserved for retransmission control")]
    ReservedFrameType(u8),

    /// The binary codec requires a sync number (per its configuration) but
    /// none was supplied.
    #[error("codec configuration requires a sync number but none was given")]
    MissingSync,
}

/// Result alias for framing operations.
pub type Result<T> = std::result::Result<T, FramingError>;
