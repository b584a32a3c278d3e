//! chunkdiff-chunks: content-defined chunking, SHA-256 hashing, and chunk maps
//!
//! # Overview
//! - `rolling`: polynomial rolling hash and boundary detection
//! - `chunker`: partitions a buffer into contiguous spans (rolling or line mode)
//! - `sha256`: deterministic content digests (chunk identity)
//! - `map`: ordered, hashed partition of one file version
//! - `wire`: JSON form of a chunk map

pub mod chunker;
pub mod map;
pub mod rolling;
pub mod sha256;
pub mod wire;

// Convenience re-exports for the most common operations
pub use chunker::{chunk, chunk_lines, chunk_with, ChunkParams};
pub use map::{Chunk, ChunkMap};
pub use rolling::{find_boundary, RollingHash};
pub use sha256::{hash_bytes, hash_file, hash_from_hex, hash_to_hex, Hash};
pub use wire::{WireChunk, WireChunkMap};
