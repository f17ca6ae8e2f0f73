//! Packet codecs
//!
//! Pluggable, transport-agnostic packet framing for the conduit messaging
//! runtime. A codec turns an application payload into a self-delimited frame
//! and back; it never performs I/O and never holds connection state.
//!
//! # Components
//!
//! - [`PacketCodec`]: the shared framing contract
//! - [`SentinelCodec`]: delimiter framing (`HEAD || payload || TAIL`)
//! - [`BinaryCodec`]: length-prefixed framing with an optional sync number
//! - [`RETX_REQUEST`] / [`RETX_RESPONSE`]: frame types reserved for the
//!   retransmission coordinator in `conduit-core`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod binary;
mod codec;
mod error;
mod sentinel;

pub use binary::{BinaryCodec, BinaryCodecConfig};
pub use codec::{is_reserved_frame_type, DecodedFrame, PacketCodec, APPLICATION, RETX_REQUEST, RETX_RESPONSE};
pub use error::{FramingError, Result};
pub use sentinel::SentinelCodec;
