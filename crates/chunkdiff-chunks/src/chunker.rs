//! Content-defined chunking
//!
//! Splits a buffer into contiguous, non-overlapping spans whose boundaries
//! depend on local content, so inserting bytes near the start of a file only
//! moves nearby boundaries and later chunks keep their hashes.
//!
//! Chunk size bounds derive from the average:
//!   - min: avg / 2 (only effective when larger than the hash window)
//!   - max: avg * 2 (forced cut)
//!
//! Small line-oriented text files use line mode instead: one chunk per line.

use chunkdiff_core::{ChunkdiffError, ChunkdiffResult};

use crate::rolling::find_boundary;

/// A chunk span: `(offset, size)` in bytes.
pub type Span = (usize, usize);

/// Chunking parameters for one file version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub avg_chunk_size: u32,
    pub window_size: u32,
    /// Cut after every line terminator instead of using the rolling hash
    pub line_mode: bool,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ChunkParams {
    pub const DEFAULT: ChunkParams = ChunkParams {
        avg_chunk_size: 64,
        window_size: 48,
        line_mode: false,
    };

    pub fn new(avg_chunk_size: u32, window_size: u32) -> Self {
        Self {
            avg_chunk_size,
            window_size,
            line_mode: false,
        }
    }

    pub fn with_line_mode(self, line_mode: bool) -> Self {
        Self { line_mode, ..self }
    }

    pub fn min_chunk_size(&self) -> usize {
        self.avg_chunk_size as usize / 2
    }

    pub fn max_chunk_size(&self) -> usize {
        self.avg_chunk_size as usize * 2
    }

    pub fn validate(&self) -> ChunkdiffResult<()> {
        if self.avg_chunk_size < 2 {
            return Err(ChunkdiffError::Config(format!(
                "avg_chunk_size must be at least 2, got {}",
                self.avg_chunk_size
            )));
        }
        if self.window_size == 0 {
            return Err(ChunkdiffError::Config("window_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Split `data` according to `params`, dispatching on line mode.
pub fn chunk_with(data: &[u8], params: &ChunkParams) -> Vec<Span> {
    if params.line_mode {
        chunk_lines(data)
    } else {
        chunk(
            data,
            params.avg_chunk_size as usize,
            params.window_size as usize,
        )
    }
}

/// Split `data` into content-defined spans using the rolling hash scanner.
///
/// Empty data yields no spans; data no longer than one window yields a single
/// span, as do parameters that fail [`ChunkParams::validate`] with a zero
/// average or window.
pub fn chunk(data: &[u8], avg_chunk_size: usize, window_size: usize) -> Vec<Span> {
    let len = data.len();
    if len == 0 {
        return vec![];
    }
    // Degenerate parameters cannot drive the scanner; keep the file whole
    if len <= window_size || window_size == 0 || avg_chunk_size == 0 {
        return vec![(0, len)];
    }

    let min = avg_chunk_size / 2;
    let max = avg_chunk_size * 2;
    // Candidates are only considered a full window past the scan start, so
    // shifting the start enforces the minimum size when it exceeds the window.
    let lead = min.saturating_sub(window_size);

    let mut spans = Vec::with_capacity(len / avg_chunk_size + 1);
    let mut cursor = 0;

    while cursor < len {
        let end = (cursor + max).min(len);
        let scan_start = cursor + lead;
        let boundary = if scan_start >= end {
            end
        } else {
            find_boundary(data, scan_start, end, window_size, avg_chunk_size)
        };
        spans.push((cursor, boundary - cursor));
        cursor = boundary;
    }

    spans
}

/// Split `data` after every `\n`. A trailing unterminated line is its own span.
pub fn chunk_lines(data: &[u8]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;

    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            spans.push((start, i + 1 - start));
            start = i + 1;
        }
    }
    if start < data.len() {
        spans.push((start, data.len() - start));
    }

    spans
}
