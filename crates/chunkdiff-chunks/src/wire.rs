//! JSON wire form of chunks and chunk maps
//!
//! ```text
//! { "filepath": "...",
//!   "chunks": [ { "index", "offset", "size", "hash": 64-hex, "data": base64 } ],
//!   "hashes": [ 64-hex, ... ] }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChunk {
    pub index: u32,
    pub offset: u64,
    pub size: u32,
    /// Lowercase hex SHA-256 of `data`
    pub hash: String,
    /// Standard base64 of the chunk bytes
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChunkMap {
    pub filepath: String,
    pub chunks: Vec<WireChunk>,
    pub hashes: Vec<String>,
}

impl WireChunkMap {
    pub fn to_json(&self) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| anyhow::anyhow!("serializing chunk map: {e}"))
    }

    pub fn from_json(data: &[u8]) -> anyhow::Result<Self> {
        serde_json::from_slice(data).map_err(|e| anyhow::anyhow!("parsing chunk map: {e}"))
    }
}
