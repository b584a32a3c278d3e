//! Chunk maps: the ordered, hashed partition of one file version
//!
//! A map owns the file buffer; every chunk's `data` is a zero-copy slice of
//! it. Chunks tile `[0, file_size)` with no gaps or overlaps, and `index` is
//! the chunk's position in offset order.

use bytes::Bytes;
use chunkdiff_core::encoding::{decode_payload, encode_payload};
use chunkdiff_core::{ChunkdiffError, ChunkdiffResult};
use std::path::Path;
use tracing::debug;

use crate::chunker::{chunk_with, ChunkParams};
use crate::sha256::{hash_bytes, hash_from_hex, hash_to_hex, Hash};
use crate::wire::{WireChunk, WireChunkMap};

/// A single content-defined chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in offset order
    pub index: u32,
    /// Byte offset within the source file
    pub offset: u64,
    /// Chunk length in bytes
    pub size: u32,
    /// SHA-256 of this chunk's data
    pub hash: Hash,
    pub data: Bytes,
}

impl Chunk {
    /// Offset one past the last byte of this chunk
    pub fn end(&self) -> u64 {
        self.offset + self.size as u64
    }

    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    pub fn to_wire(&self) -> WireChunk {
        WireChunk {
            index: self.index,
            offset: self.offset,
            size: self.size,
            hash: self.hash_hex(),
            data: encode_payload(&self.data),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkMap {
    /// Where the bytes came from (file path or caller-chosen label)
    pub source: String,
    data: Bytes,
    chunks: Vec<Chunk>,
}

impl ChunkMap {
    /// Chunk and hash `data`. Empty input yields an empty map.
    pub fn build(
        source: impl Into<String>,
        data: impl Into<Bytes>,
        params: &ChunkParams,
    ) -> ChunkdiffResult<Self> {
        params.validate()?;
        let source = source.into();
        let data: Bytes = data.into();

        let chunks = chunk_with(&data, params)
            .into_iter()
            .enumerate()
            .map(|(i, (offset, size))| {
                let slice = data.slice(offset..offset + size);
                Ok(Chunk {
                    index: to_u32(i, "chunk index")?,
                    offset: offset as u64,
                    size: to_u32(size, "chunk size")?,
                    hash: hash_bytes(&slice),
                    data: slice,
                })
            })
            .collect::<ChunkdiffResult<Vec<_>>>()?;

        let map = Self {
            source,
            data,
            chunks,
        };
        map.validate()?;

        debug!(
            source = %map.source,
            chunks = map.len(),
            bytes = map.file_size(),
            avg = params.avg_chunk_size,
            window = params.window_size,
            line_mode = params.line_mode,
            "built chunk map"
        );
        Ok(map)
    }

    /// Read and chunk a file from disk.
    pub fn from_file(path: &Path, params: &ChunkParams) -> ChunkdiffResult<Self> {
        let data = std::fs::read(path).map_err(|e| ChunkdiffError::from_io(path, e))?;
        Self::build(path.display().to_string(), data, params)
    }

    /// Like [`ChunkMap::from_file`], but a zero-length file is an error.
    pub fn from_file_non_empty(path: &Path, params: &ChunkParams) -> ChunkdiffResult<Self> {
        let map = Self::from_file(path, params)?;
        if map.is_empty() {
            return Err(ChunkdiffError::EmptyInput(path.display().to_string()));
        }
        Ok(map)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: u32) -> Option<&Chunk> {
        self.chunks.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn file_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The complete file contents this map was built from.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// File bytes in `[offset, offset + len)`, or `None` if out of range.
    pub fn read_range(&self, offset: u64, len: u64) -> Option<Bytes> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        (end <= self.data.len()).then(|| self.data.slice(start..end))
    }

    pub fn hashes(&self) -> Vec<String> {
        self.chunks.iter().map(Chunk::hash_hex).collect()
    }

    /// Check the partition invariant: contiguous, non-empty, index-ordered
    /// chunks covering exactly the file.
    pub fn validate(&self) -> ChunkdiffResult<()> {
        let mut expected = 0u64;
        for (i, c) in self.chunks.iter().enumerate() {
            if c.index as usize != i {
                return Err(ChunkdiffError::invariant(format!(
                    "{}: chunk at position {i} has index {}",
                    self.source, c.index
                )));
            }
            if c.offset != expected {
                return Err(ChunkdiffError::invariant(format!(
                    "{}: chunk {i} starts at {} but previous chunk ended at {expected}",
                    self.source, c.offset
                )));
            }
            if c.size == 0 || c.data.len() != c.size as usize {
                return Err(ChunkdiffError::invariant(format!(
                    "{}: chunk {i} has size {} and {} data bytes",
                    self.source,
                    c.size,
                    c.data.len()
                )));
            }
            expected = c.end();
        }
        if expected != self.file_size() {
            return Err(ChunkdiffError::invariant(format!(
                "{}: chunks cover {expected} of {} bytes",
                self.source,
                self.file_size()
            )));
        }
        Ok(())
    }

    pub fn to_wire(&self) -> WireChunkMap {
        WireChunkMap {
            filepath: self.source.clone(),
            chunks: self.chunks.iter().map(Chunk::to_wire).collect(),
            hashes: self.hashes(),
        }
    }

    /// Decode a wire chunk map, verifying payloads, digests, and the partition.
    pub fn from_wire(wire: &WireChunkMap) -> ChunkdiffResult<Self> {
        let mut data = Vec::new();
        let mut layout = Vec::with_capacity(wire.chunks.len());

        for (i, wc) in wire.chunks.iter().enumerate() {
            let payload = decode_payload(&wc.data)
                .map_err(|e| ChunkdiffError::malformed(i, format!("chunk data: {e}")))?;
            let hash = hash_from_hex(&wc.hash)
                .map_err(|e| ChunkdiffError::malformed(i, e.to_string()))?;
            if payload.len() != wc.size as usize {
                return Err(ChunkdiffError::invariant(format!(
                    "chunk {i} declares {} bytes but carries {}",
                    wc.size,
                    payload.len()
                )));
            }
            if hash_bytes(&payload) != hash {
                return Err(ChunkdiffError::invariant(format!(
                    "chunk {i} hash does not match its data"
                )));
            }
            layout.push((wc.index, wc.offset, data.len(), payload.len(), hash));
            data.extend_from_slice(&payload);
        }

        let data = Bytes::from(data);
        let chunks = layout
            .into_iter()
            .map(|(index, offset, start, len, hash)| Chunk {
                index,
                offset,
                size: len as u32,
                hash,
                data: data.slice(start..start + len),
            })
            .collect();

        let map = Self {
            source: wire.filepath.clone(),
            data,
            chunks,
        };
        map.validate()?;

        if !wire.hashes.is_empty() && wire.hashes != map.hashes() {
            return Err(ChunkdiffError::invariant(format!(
                "{}: hash list does not match chunk hashes",
                map.source
            )));
        }
        Ok(map)
    }
}

fn to_u32(value: usize, what: &str) -> ChunkdiffResult<u32> {
    u32::try_from(value)
        .map_err(|_| ChunkdiffError::invariant(format!("{what} {value} exceeds u32")))
}
