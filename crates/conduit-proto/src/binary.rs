//! Length-prefixed binary packet codec.
//!
//! Wire layout, each part optional per [`BinaryCodecConfig`] except
//! `frame_type` and `payload`:
//!
//! ```text
//! [head] [length: u16 BE] [frame_type: u8] [sync: u8] payload [tail]
//! ```
//!
//! `length`, when present, counts from directly after `head` to the end of
//! the frame (length field itself included), but only tallies
//! `frame_type`/`sync`/`tail` into that count when the matching
//! `include_*_in_length` flag is set — independently of whether
//! `use_sync_field`/`tail` put that byte on the wire at all. This mirrors
//! `BinaryPacketStructure`/`PacketConfig` in the Python original exactly,
//! including the fact that an inconsistent configuration (e.g.
//! `use_sync_field = true` with `include_sync_in_length = false`) produces
//! frames that fail their own length check on decode. That is preserved
//! behavior, not a bug to paper over here.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{is_reserved_frame_type, DecodedFrame, PacketCodec};
use crate::error::{FramingError, Result};

/// Configuration for [`BinaryCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCodecConfig {
    /// Fixed header bytes prepended to every frame, if any.
    pub head: Option<Bytes>,
    /// Fixed trailer bytes appended to every frame, if any.
    pub tail: Option<Bytes>,
    /// Whether a 2-byte big-endian length field follows `head`.
    pub use_length_field: bool,
    /// Whether a 1-byte sync number follows `frame_type`.
    pub use_sync_field: bool,
    /// Whether the length field's value counts the `frame_type` byte.
    pub include_frame_type_in_length: bool,
    /// Whether the length field's value counts the `sync` byte.
    pub include_sync_in_length: bool,
    /// Whether the length field's value counts `tail`.
    pub include_tail_in_length: bool,
}

impl Default for BinaryCodecConfig {
    fn default() -> Self {
        Self {
            head: None,
            tail: None,
            use_length_field: false,
            use_sync_field: false,
            include_frame_type_in_length: false,
            include_sync_in_length: false,
            include_tail_in_length: false,
        }
    }
}

/// Length-prefixed binary codec built from a [`BinaryCodecConfig`].
#[derive(Debug, Clone)]
pub struct BinaryCodec {
    config: BinaryCodecConfig,
}

impl BinaryCodec {
    /// Builds a codec from the given configuration.
    #[must_use]
    pub const fn new(config: BinaryCodecConfig) -> Self {
        Self { config }
    }

    /// Returns the codec's configuration.
    #[must_use]
    pub const fn config(&self) -> &BinaryCodecConfig {
        &self.config
    }

    fn header_len(&self) -> usize {
        self.config.head.as_ref().map_or(0, Bytes::len)
    }

    fn declared_length(&self, payload_len: usize) -> u16 {
        let mut total = payload_len;
        if self.config.include_frame_type_in_length {
            total += 1;
        }
        if self.config.use_sync_field && self.config.include_sync_in_length {
            total += 1;
        }
        if self.config.include_tail_in_length {
            if let Some(tail) = &self.config.tail {
                total += tail.len();
            }
        }
        total += 2;
        total as u16
    }

    /// Encodes a frame without rejecting reserved frame types.
    ///
    /// Used internally by the retransmission coordinator, which must emit
    /// [`crate::codec::RETX_REQUEST`] frames; application code should call
    /// [`PacketCodec::encode`] instead, which rejects reserved types.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::MissingSync`] if the codec is configured to
    /// carry a sync number and `sync` is `None`.
    pub fn encode_control(&self, frame_type: u8, sync: Option<u8>, payload: &[u8]) -> Result<Bytes> {
        if self.config.use_sync_field && sync.is_none() {
            return Err(FramingError::MissingSync);
        }
        let mut buf = BytesMut::with_capacity(payload.len() + 16);
        if let Some(head) = &self.config.head {
            buf.put_slice(head);
        }
        if self.config.use_length_field {
            buf.put_u16(self.declared_length(payload.len()));
        }
        buf.put_u8(frame_type);
        if self.config.use_sync_field {
            // Checked above: sync.is_some() whenever use_sync_field is set.
            buf.put_u8(sync.unwrap_or_default());
        }
        buf.put_slice(payload);
        if let Some(tail) = &self.config.tail {
            buf.put_slice(tail);
        }
        Ok(buf.freeze())
    }

    /// Decodes a frame without special-casing reserved frame types.
    ///
    /// # Errors
    ///
    /// Returns a [`FramingError`] variant describing why `frame` could not
    /// be decoded.
    pub fn decode_control(&self, frame: &[u8]) -> Result<DecodedFrame> {
        let header_len = self.header_len();
        if let Some(head) = &self.config.head {
            if !frame.starts_with(head) {
                return Err(FramingError::HeadMismatch);
            }
        }
        if let Some(tail) = &self.config.tail {
            if !frame.ends_with(tail) {
                return Err(FramingError::TailMismatch);
            }
        }
        if self.config.use_length_field {
            let declared_start = header_len;
            let declared_end = declared_start + 2;
            if frame.len() < declared_end {
                return Err(FramingError::Truncated { expected: declared_end, actual: frame.len() });
            }
            let declared = u16::from_be_bytes([frame[declared_start], frame[declared_start + 1]]) as usize;
            let actual = frame.len() - header_len;
            if declared != actual {
                return Err(FramingError::LengthMismatch { declared, actual });
            }
        }

        let mut offset = header_len;
        if self.config.use_length_field {
            offset += 2;
        }
        let frame_type_end = offset + 1;
        if frame.len() < frame_type_end {
            return Err(FramingError::Truncated { expected: frame_type_end, actual: frame.len() });
        }
        let frame_type = frame[offset];
        offset = frame_type_end;

        let sync = if self.config.use_sync_field {
            let sync_end = offset + 1;
            if frame.len() < sync_end {
                return Err(FramingError::Truncated { expected: sync_end, actual: frame.len() });
            }
            let value = frame[offset];
            offset = sync_end;
            Some(value)
        } else {
            None
        };

        let tail_len = self.config.tail.as_ref().map_or(0, Bytes::len);
        if frame.len() < offset + tail_len {
            return Err(FramingError::Truncated { expected: offset + tail_len, actual: frame.len() });
        }
        let payload_end = frame.len() - tail_len;
        if payload_end < offset {
            return Err(FramingError::Truncated { expected: offset, actual: frame.len() });
        }
        let payload = Bytes::copy_from_slice(&frame[offset..payload_end]);
        Ok(DecodedFrame { frame_type, sync, payload })
    }
}

impl PacketCodec for BinaryCodec {
    fn encode(&self, frame_type: u8, sync: Option<u8>, payload: &[u8]) -> Result<Bytes> {
        if is_reserved_frame_type(frame_type) {
            return Err(FramingError::ReservedFrameType(frame_type));
        }
        self.encode_control(frame_type, sync, payload)
    }

    fn decode(&self, frame: &[u8]) -> Result<DecodedFrame> {
        self.decode_control(frame)
    }

    fn is_framed(&self, bytes: &[u8]) -> bool {
        self.decode_control(bytes).is_ok()
    }

    fn split(&self, stream: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        let mut rest = stream;
        while !rest.is_empty() {
            let Some(frame_len) = self.next_frame_len(rest) else {
                break;
            };
            if frame_len == 0 || frame_len > rest.len() {
                break;
            }
            frames.push(Bytes::copy_from_slice(&rest[..frame_len]));
            rest = &rest[frame_len..];
        }
        frames
    }

    fn as_binary(&self) -> Option<&BinaryCodec> {
        Some(self)
    }
}

impl BinaryCodec {
    /// Determines how many leading bytes of `rest` make up one frame, using
    /// the length field when configured and the fixed header/tail sizes
    /// otherwise. Returns `None` if not enough bytes are available yet.
    fn next_frame_len(&self, rest: &[u8]) -> Option<usize> {
        let header_len = self.header_len();
        if self.config.use_length_field {
            let declared_start = header_len;
            let declared_end = declared_start + 2;
            if rest.len() < declared_end {
                return None;
            }
            let declared = u16::from_be_bytes([rest[declared_start], rest[declared_start + 1]]) as usize;
            Some(header_len + declared)
        } else {
            // No length field: a frame ends at `tail`, or runs to the end of
            // `rest` if there is no tail configured (single-frame streams
            // only).
            match &self.config.tail {
                Some(tail) if !tail.is_empty() => rest
                    .windows(tail.len())
                    .position(|window| window == tail.as_ref())
                    .map(|pos| pos + tail.len()),
                _ => Some(rest.len()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{APPLICATION, RETX_REQUEST};
    use proptest::prelude::*;

    fn sequenced_config() -> BinaryCodecConfig {
        BinaryCodecConfig {
            head: Some(Bytes::from_static(b"\xAA\x55")),
            tail: None,
            use_length_field: true,
            use_sync_field: true,
            include_frame_type_in_length: true,
            include_sync_in_length: true,
            include_tail_in_length: true,
        }
    }

    #[test]
    fn round_trips_a_sequenced_frame() {
        let codec = BinaryCodec::new(sequenced_config());
        let frame = codec.encode(APPLICATION, Some(7), b"payload").unwrap();
        let decoded = codec.decode(&frame).unwrap();
        assert_eq!(decoded.frame_type, APPLICATION);
        assert_eq!(decoded.sync, Some(7));
        assert_eq!(decoded.payload.as_ref(), b"payload");
    }

    #[test]
    fn rejects_reserved_frame_type_via_the_generic_trait() {
        let codec = BinaryCodec::new(sequenced_config());
        assert_eq!(
            codec.encode(RETX_REQUEST, Some(1), b""),
            Err(FramingError::ReservedFrameType(RETX_REQUEST))
        );
    }

    #[test]
    fn control_path_may_encode_reserved_frame_types() {
        let codec = BinaryCodec::new(sequenced_config());
        let frame = codec.encode_control(RETX_REQUEST, Some(1), &[3, 4, 5]).unwrap();
        let decoded = codec.decode_control(&frame).unwrap();
        assert_eq!(decoded.frame_type, RETX_REQUEST);
        assert_eq!(decoded.payload.as_ref(), [3, 4, 5]);
    }

    #[test]
    fn rejects_mismatched_declared_length() {
        let codec = BinaryCodec::new(sequenced_config());
        let mut frame = codec.encode(APPLICATION, Some(1), b"abc").unwrap().to_vec();
        // Corrupt the declared length (bytes immediately after the 2-byte head).
        frame[2] = 0xFF;
        assert!(matches!(codec.decode(&frame), Err(FramingError::LengthMismatch { .. })));
    }

    #[test]
    fn splits_a_length_prefixed_stream_into_frames() {
        let codec = BinaryCodec::new(sequenced_config());
        let one = codec.encode(APPLICATION, Some(1), b"a").unwrap();
        let two = codec.encode(APPLICATION, Some(2), b"bb").unwrap();
        let mut stream = BytesMut::new();
        stream.put_slice(&one);
        stream.put_slice(&two);
        let frames = codec.split(&stream);
        assert_eq!(frames, vec![one, two]);
    }

    #[test]
    fn requires_sync_when_configured() {
        let codec = BinaryCodec::new(sequenced_config());
        assert_eq!(codec.encode(APPLICATION, None, b"x"), Err(FramingError::MissingSync));
    }

    proptest! {
        #[test]
        fn encode_decode_round_trips_for_any_payload_and_sync(
            payload in prop::collection::vec(any::<u8>(), 0..128),
            sync in any::<u8>(),
        ) {
            let codec = BinaryCodec::new(sequenced_config());
            let frame = codec.encode(APPLICATION, Some(sync), &payload).unwrap();
            let decoded = codec.decode(&frame).unwrap();
            prop_assert_eq!(decoded.payload.as_ref(), payload.as_slice());
            prop_assert_eq!(decoded.sync, Some(sync));
        }
    }
}
