//! Send-side packet buffer: bounded FIFO map from sync number to encoded
//! frame bytes, used by the server-role retransmission coordinator.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

/// Default capacity, matching the Python original's `PacketBuffer`.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Fixed-capacity ordered map from sync number to the encoded frame bytes
/// that were handed to the transport.
///
/// Insertion order is preserved for eviction: when capacity is exceeded,
/// the oldest *unique* insertion is evicted, regardless of how recently it
/// was looked up. Duplicate insertions for an already-buffered sync number
/// are no-ops, preserving the first write.
#[derive(Debug)]
pub struct PacketBuffer {
    capacity: usize,
    frames: HashMap<u8, Bytes>,
    order: VecDeque<u8>,
}

impl PacketBuffer {
    /// Builds an empty buffer with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), frames: HashMap::new(), order: VecDeque::new() }
    }

    /// Buffers `frame` under `sync_no`. A no-op if `sync_no` is already
    /// present. Evicts the oldest entry first if the buffer is at
    /// capacity.
    pub fn add(&mut self, sync_no: u8, frame: Bytes) {
        if self.frames.contains_key(&sync_no) {
            return;
        }
        if self.frames.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.frames.remove(&oldest);
            }
        }
        self.order.push_back(sync_no);
        self.frames.insert(sync_no, frame);
    }

    /// Looks up the buffered frame for `sync_no`, if still present.
    #[must_use]
    pub fn get(&self, sync_no: u8) -> Option<&Bytes> {
        self.frames.get(&sync_no)
    }

    /// Number of frames currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frames are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_what_was_buffered() {
        let mut buf = PacketBuffer::new(4);
        buf.add(1, Bytes::from_static(b"a"));
        assert_eq!(buf.get(1), Some(&Bytes::from_static(b"a")));
        assert_eq!(buf.get(2), None);
    }

    #[test]
    fn duplicate_insertion_preserves_the_first_write() {
        let mut buf = PacketBuffer::new(4);
        buf.add(1, Bytes::from_static(b"first"));
        buf.add(1, Bytes::from_static(b"second"));
        assert_eq!(buf.get(1), Some(&Bytes::from_static(b"first")));
    }

    #[test]
    fn evicts_the_oldest_unique_insertion_past_capacity() {
        let mut buf = PacketBuffer::new(3);
        buf.add(1, Bytes::from_static(b"a"));
        buf.add(2, Bytes::from_static(b"b"));
        buf.add(3, Bytes::from_static(b"c"));
        assert_eq!(buf.len(), 3);
        buf.add(4, Bytes::from_static(b"d"));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.get(1), None);
        assert_eq!(buf.get(2), Some(&Bytes::from_static(b"b")));
        assert_eq!(buf.get(4), Some(&Bytes::from_static(b"d")));
    }
}
