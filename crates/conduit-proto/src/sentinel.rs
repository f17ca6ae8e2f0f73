//! Sentinel (delimiter) packet codec.
//!
//! Frames are `HEAD || payload || TAIL` with no length field and no
//! escaping: a frame boundary is recognised purely by its leading/trailing
//! byte. This mirrors `PacketStructure` in the Python original exactly,
//! including its fragility — a payload containing the head or tail byte
//! will desynchronise [`SentinelCodec::split`], which splits on every
//! occurrence of the head byte rather than tracking nesting.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{DecodedFrame, PacketCodec, APPLICATION};
use crate::error::{FramingError, Result};

/// Delimiter-framed codec: `HEAD || payload || TAIL`.
///
/// Carries no frame type or sync number on the wire; [`PacketCodec::encode`]
/// ignores both, and [`PacketCodec::decode`] always reports
/// [`APPLICATION`]/`None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentinelCodec {
    head: u8,
    tail: u8,
}

impl SentinelCodec {
    /// Builds a codec with explicit head/tail sentinel bytes.
    #[must_use]
    pub const fn new(head: u8, tail: u8) -> Self {
        Self { head, tail }
    }
}

impl Default for SentinelCodec {
    /// The default configuration matches the original: `$` for both head
    /// and tail.
    fn default() -> Self {
        Self::new(b'$', b'$')
    }
}

/// Returns `true` if `bytes` contains `second` immediately following
/// `first` anywhere in the slice.
fn contains_pair(bytes: &[u8], first: u8, second: u8) -> bool {
    bytes.windows(2).any(|pair| pair[0] == first && pair[1] == second)
}

impl PacketCodec for SentinelCodec {
    fn encode(&self, _frame_type: u8, _sync: Option<u8>, payload: &[u8]) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(payload.len() + 2);
        buf.put_u8(self.head);
        buf.put_slice(payload);
        buf.put_u8(self.tail);
        Ok(buf.freeze())
    }

    fn decode(&self, frame: &[u8]) -> Result<DecodedFrame> {
        if frame.len() < 2 {
            return Err(FramingError::Truncated { expected: 2, actual: frame.len() });
        }
        if contains_pair(frame, self.tail, self.head) {
            return Err(FramingError::ForbiddenPattern);
        }
        if frame.first() != Some(&self.head) {
            return Err(FramingError::HeadMismatch);
        }
        if frame.last() != Some(&self.tail) {
            return Err(FramingError::TailMismatch);
        }
        let payload = Bytes::copy_from_slice(&frame[1..frame.len() - 1]);
        Ok(DecodedFrame { frame_type: APPLICATION, sync: None, payload })
    }

    fn is_framed(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 2
            && !contains_pair(bytes, self.tail, self.head)
            && bytes.first() == Some(&self.head)
            && bytes.last() == Some(&self.tail)
    }

    /// Scans `stream` for complete `HEAD || payload || TAIL` runs.
    ///
    /// Unlike a naive "split on every head byte and rewrap" implementation,
    /// this tracks actual head/tail pairing: a head byte with no following
    /// tail byte yet (a truncated trailing fragment) contributes zero
    /// frames rather than being fabricated into a spurious one. Bytes
    /// before the first head byte, and an unterminated trailing fragment,
    /// are silently dropped — the caller sees no frame for them.
    fn split(&self, stream: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < stream.len() {
            let Some(head_rel) = stream[pos..].iter().position(|&b| b == self.head) else {
                break;
            };
            let content_start = pos + head_rel + 1;
            let Some(tail_rel) = stream.get(content_start..).and_then(|rest| rest.iter().position(|&b| b == self.tail)) else {
                break;
            };
            let tail_idx = content_start + tail_rel;
            let payload = &stream[content_start..tail_idx];
            if !payload.is_empty() {
                let mut buf = BytesMut::with_capacity(payload.len() + 2);
                buf.put_u8(self.head);
                buf.put_slice(payload);
                buf.put_u8(self.tail);
                frames.push(buf.freeze());
            }
            pos = tail_idx + 1;
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips_a_simple_payload() {
        let codec = SentinelCodec::default();
        let frame = codec.encode(APPLICATION, None, b"hello").unwrap();
        assert_eq!(frame.as_ref(), b"$hello$");
        let decoded = codec.decode(&frame).unwrap();
        assert_eq!(decoded.payload.as_ref(), b"hello");
        assert_eq!(decoded.frame_type, APPLICATION);
        assert_eq!(decoded.sync, None);
    }

    #[test]
    fn splits_a_concatenated_stream() {
        let codec = SentinelCodec::default();
        let frames = codec.split(b"$abc$def$");
        assert_eq!(frames, vec![Bytes::from_static(b"$abc$"), Bytes::from_static(b"$def$")]);
    }

    #[test]
    fn splits_three_frames_with_shared_delimiters() {
        let codec = SentinelCodec::default();
        let frames = codec.split(b"$ab$$cd$$ef$");
        assert_eq!(
            frames,
            vec![Bytes::from_static(b"$ab$"), Bytes::from_static(b"$cd$"), Bytes::from_static(b"$ef$")]
        );
    }

    #[test]
    fn drops_an_unterminated_trailing_fragment_instead_of_fabricating_a_frame() {
        let codec = SentinelCodec::default();
        assert!(codec.split(b"$$garbage").is_empty());
    }

    #[test]
    fn rejects_missing_head() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.decode(b"abc$"), Err(FramingError::HeadMismatch));
    }

    #[test]
    fn rejects_missing_tail() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.decode(b"$abc"), Err(FramingError::TailMismatch));
    }

    #[test]
    fn rejects_forbidden_aliasing_pattern() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.decode(b"$a$$c$"), Err(FramingError::ForbiddenPattern));
    }

    #[test]
    fn rejects_truncated_frame() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.decode(b"$"), Err(FramingError::Truncated { expected: 2, actual: 1 }));
    }

    proptest! {
        #[test]
        fn encode_decode_round_trips_for_any_payload_without_sentinel_bytes(
            payload in prop::collection::vec(1u8..=0x23u8, 0..64)
        ) {
            let codec = SentinelCodec::default();
            let frame = codec.encode(APPLICATION, None, &payload).unwrap();
            let decoded = codec.decode(&frame).unwrap();
            prop_assert_eq!(decoded.payload.as_ref(), payload.as_slice());
        }
    }
}
