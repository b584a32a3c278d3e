//! chunkdiff-core: configuration, error taxonomy, and wire encodings shared by
//! the chunking, diffing, and sync crates.

pub mod config;
pub mod encoding;
pub mod error;

pub use config::ChunkdiffConfig;
pub use error::{ChunkdiffError, ChunkdiffResult, ErrorKind};
