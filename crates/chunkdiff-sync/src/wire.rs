//! JSON wire forms of diff results, synchronization plans, and the combined
//! comparison document.
//!
//! Field names are fixed; chunk payloads are standard base64 and digests are
//! lowercase hex.

use chunkdiff_chunks::WireChunk;
use serde::{Deserialize, Serialize};

pub const OP_UNCHANGED: &str = "UNCHANGED";
pub const OP_ADD: &str = "ADD";
pub const OP_MODIFY: &str = "MODIFY";
pub const OP_REMOVE: &str = "REMOVE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDiffStats {
    pub total_chunks: usize,
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub changed_percent: f64,
    /// Bytes of modified chunks (new side)
    pub bytes_changed: u64,
    pub bytes_added: u64,
    pub bytes_removed: u64,
    pub old_size: u64,
    pub new_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireModifiedPair {
    pub old_chunk: WireChunk,
    pub new_chunk: WireChunk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDiffResult {
    pub unchanged_chunks: Vec<WireChunk>,
    pub added_chunks: Vec<WireChunk>,
    pub removed_chunks: Vec<WireChunk>,
    pub modified_chunks: Vec<WireModifiedPair>,
    pub stats: WireDiffStats,
}

/// One synchronization operation. `kind` is serialized as `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOperation {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: u64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePlan {
    pub operations: Vec<WireOperation>,
    /// Bytes that must be transferred (added + modified)
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub efficiency: f64,
    /// Seconds at the configured throughput
    #[serde(default)]
    pub estimated_time: f64,
    /// Non-unchanged operations ordered by offset
    #[serde(default)]
    pub changes: Vec<WireOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDiffReport {
    pub summary: WireDiffStats,
    pub details: WireDiffResult,
    pub old_chunks: Vec<WireChunk>,
    pub new_chunks: Vec<WireChunk>,
}

/// Full output of a comparison request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireComparison {
    pub diff_report: WireDiffReport,
    pub sync_plan: WirePlan,
}

/// Any document a plan's operations can be read from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlanDocument {
    Comparison { sync_plan: WirePlan },
    Plan(WirePlan),
    Operations(Vec<WireOperation>),
}

impl PlanDocument {
    pub fn from_json(data: &[u8]) -> anyhow::Result<Self> {
        serde_json::from_slice(data).map_err(|e| anyhow::anyhow!("parsing plan document: {e}"))
    }

    pub fn into_operations(self) -> Vec<WireOperation> {
        match self {
            Self::Comparison { sync_plan } | Self::Plan(sync_plan) => sync_plan.operations,
            Self::Operations(ops) => ops,
        }
    }
}

/// Round to two decimals for presentation fields.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
