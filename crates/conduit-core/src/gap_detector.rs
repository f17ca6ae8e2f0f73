//! Receive-side gap detector: derives missing sync numbers from observed
//! arrivals.

/// Tracks the last-seen sync number on a sequenced link and reports gaps.
#[derive(Debug, Clone, Copy)]
pub struct GapDetector {
    last_seen: Option<u8>,
    max_sync: u8,
}

impl GapDetector {
    /// Builds a fresh detector for a link whose sync numbers wrap at
    /// `max_sync` (inclusive).
    #[must_use]
    pub const fn new(max_sync: u8) -> Self {
        Self { last_seen: None, max_sync }
    }

    /// Resets to the initial, fresh-detector state. Called by the
    /// supervisor on reconnect: the listener's read-position is implicitly
    /// reset along with the transport, so the next sync number observed
    /// must not be compared against one from the previous connection.
    pub fn reset(&mut self) {
        self.last_seen = None;
    }

    /// Feeds an observed sync number and returns the sync numbers judged
    /// missing since the last call, in wrap-around order.
    ///
    /// The first call always returns `[]` (nothing to compare against). A
    /// repeated sync number (duplicate or pass-through retransmit) also
    /// returns `[]`. A gap whose derived length exceeds `max_sync` is
    /// treated as state corruption: `last_seen` is resynchronised to
    /// `sync_no` and `[]` is returned rather than an implausibly long
    /// missing list. This mirrors the Python original's guard exactly; for
    /// any `sync_no` actually within `0..=max_sync` the guard cannot
    /// trigger (a wrap-around gap tops out at `max_sync - 1` missing
    /// entries), so it exists purely as defense against an out-of-range
    /// input rather than as reachable steady-state behavior.
    pub fn detect(&mut self, sync_no: u8) -> Vec<u8> {
        let Some(last_seen) = self.last_seen else {
            self.last_seen = Some(sync_no);
            return Vec::new();
        };

        if last_seen == sync_no {
            return Vec::new();
        }

        let modulus = u16::from(self.max_sync) + 1;
        let mut missing = Vec::new();
        let mut current = (u16::from(last_seen) + 1) % modulus;
        while current != u16::from(sync_no) {
            missing.push(current as u8);
            current = (current + 1) % modulus;
            if missing.len() > usize::from(self.max_sync) {
                self.last_seen = Some(sync_no);
                return Vec::new();
            }
        }

        self.last_seen = Some(sync_no);
        missing
    }
}
