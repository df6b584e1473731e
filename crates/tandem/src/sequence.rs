//! Message numbering and replay protection.
//!
//! Each direction of a session has its own counter. The sender numbers
//! messages 1, 2, 3, ...; the receiver keeps a watermark (the highest
//! number it has accepted) and rejects anything at or below it.
//!
//! # Design
//!
//! - Gaps are allowed: a lost message does not stall the stream
//! - Replays are rejected: the same number is never accepted twice
//! - Reordering below the watermark is rejected, even by one position
//!
//! # Thread Safety
//!
//! Neither type is thread-safe. Send and receive sides are independent, so
//! they can live behind separate locks if needed.

/// Outgoing message counter.
#[derive(Debug, Clone)]
pub struct SendCounter {
    /// Number of the last message sent (0 before the first)
    last: u32,
    /// Highest number this counter may hand out
    limit: u32,
}

impl Default for SendCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SendCounter {
    /// Create a counter that may run all the way to `u32::MAX`.
    pub fn new() -> Self {
        Self::with_limit(u32::MAX)
    }

    /// Create a counter that stops after `limit` messages.
    pub fn with_limit(limit: u32) -> Self {
        Self { last: 0, limit }
    }

    /// Advance and return the next message number.
    ///
    /// Returns `None` once `limit` messages have been numbered; the counter
    /// never wraps.
    pub fn advance(&mut self) -> Option<u32> {
        if self.last >= self.limit {
            return None;
        }
        self.last += 1;
        Some(self.last)
    }

    /// Number of the last message handed out.
    pub fn last(&self) -> u32 {
        self.last
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    /// Restart numbering at 1.
    pub fn reset(&mut self) {
        self.last = 0;
    }
}

/// Strict replay watermark for incoming messages.
#[derive(Debug, Clone, Default)]
pub struct ReplayWatermark {
    /// Highest message number accepted (0 before the first)
    highest: u32,
}

impl ReplayWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a message number would be accepted.
    ///
    /// Does NOT update internal state. Use `check_and_update` for that.
    pub fn check(&self, number: u32) -> bool {
        number > self.highest
    }

    /// Check and update: returns true if accepted, false if replayed or stale.
    ///
    /// If accepted, `number` becomes the new watermark.
    pub fn check_and_update(&mut self, number: u32) -> bool {
        if !self.check(number) {
            return false;
        }
        self.highest = number;
        true
    }

    /// Get the highest message number accepted.
    pub fn highest(&self) -> u32 {
        self.highest
    }

    /// Reset the watermark to its initial state.
    pub fn reset(&mut self) {
        self.highest = 0;
    }
}
