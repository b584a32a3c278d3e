//! SHA-256 content hashing for chunks and files
//!
//! The digest is the chunk identity: two chunks with equal digests are treated
//! as content-identical.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::path::Path;

/// A SHA-256 digest (32 bytes), displayed as 64 lowercase hex chars
pub type Hash = [u8; 32];

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash a whole file from disk.
pub fn hash_file(path: &Path) -> Result<Hash> {
    let data = std::fs::read(path)
        .with_context(|| format!("reading file for hashing: {}", path.display()))?;
    Ok(hash_bytes(&data))
}

/// Format a hash as lowercase hex string (64 chars)
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut out = String::with_capacity(64);
    for byte in hash {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse a 64-char hex string into a Hash
pub fn hash_from_hex(hex: &str) -> Result<Hash> {
    if hex.len() != 64 || !hex.is_ascii() {
        anyhow::bail!("invalid SHA-256 hex '{}': expected 64 hex chars", hex);
    }
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| anyhow::anyhow!("invalid SHA-256 hex '{}': {}", hex, e))?;
    }
    Ok(hash)
}
