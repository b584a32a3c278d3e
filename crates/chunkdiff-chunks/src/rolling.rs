//! Polynomial rolling hash and content-defined boundary detection
//!
//! The hash over a window `b[0..w]` is `sum(b[k] * 31^(w-1-k)) mod 2^32`.
//! Sliding by one byte removes the outgoing byte's contribution and shifts the
//! incoming byte in, so each step is O(1) regardless of window size.
//!
//! A boundary candidate is a position whose preceding window hashes to
//! `avg - 1` modulo `avg`. Candidates are snapped forward to just past the
//! next line feed (within one window) so text files tend to cut on line ends.

/// Multiplier of the polynomial hash.
pub const PRIME: u32 = 31;

/// Rolling polynomial hash over a fixed-size window (wrapping `u32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingHash {
    value: u32,
    /// `PRIME^(window-1) mod 2^32`, the weight of the outgoing byte
    out_weight: u32,
}

impl RollingHash {
    /// Seed the hash with a full window of bytes.
    pub fn new(window: &[u8]) -> Self {
        let value = window
            .iter()
            .fold(0u32, |h, &b| h.wrapping_mul(PRIME).wrapping_add(b as u32));
        let exp = window.len().saturating_sub(1) as u32;
        Self {
            value,
            out_weight: PRIME.wrapping_pow(exp),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Slide the window one byte: drop `outgoing`, append `incoming`.
    #[inline]
    pub fn roll(&mut self, outgoing: u8, incoming: u8) {
        self.value = self
            .value
            .wrapping_sub((outgoing as u32).wrapping_mul(self.out_weight))
            .wrapping_mul(PRIME)
            .wrapping_add(incoming as u32);
    }
}

/// Find the next content-defined boundary in `data[start..end]`.
///
/// Returns a position `p` with `start < p <= end`. Segments no longer than
/// `window_size` are returned whole, as is any segment when `window_size` or
/// `avg_chunk_size` is zero; if no candidate appears the cut is forced at `end`. Min/max chunk sizes are the caller's concern (via `start`/`end`).
pub fn find_boundary(
    data: &[u8],
    start: usize,
    end: usize,
    window_size: usize,
    avg_chunk_size: usize,
) -> usize {
    debug_assert!(end <= data.len());

    if end.saturating_sub(start) <= window_size || window_size == 0 || avg_chunk_size == 0 {
        return end;
    }

    let target = avg_chunk_size - 1;
    let mut hash = RollingHash::new(&data[start..start + window_size]);

    for i in start + window_size..end {
        if hash.value() as usize % avg_chunk_size == target {
            return snap_to_line_end(data, i, end, window_size);
        }
        hash.roll(data[i - window_size], data[i]);
    }

    end
}

/// Move a raw candidate to just past the first `\n` in the next window.
fn snap_to_line_end(data: &[u8], candidate: usize, end: usize, window_size: usize) -> usize {
    let scan_end = end.min(candidate + window_size);
    data[candidate..scan_end]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| candidate + p + 1)
        .unwrap_or(candidate)
}
