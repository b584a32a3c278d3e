//! Synchronization plans
//!
//! A plan walks the new map in offset order and emits one payload operation
//! per new chunk (`Unchanged`, `Modify`, or `Add`), each embedding the new
//! file's bytes. Concatenating those payloads in order yields the new file, so
//! reconstruction never has to look anything up. `Remove` operations for
//! unmatched old chunks follow at the end; they are informational only.

use bytes::Bytes;
use chunkdiff_chunks::ChunkMap;
use chunkdiff_core::config::PlanConfig;
use chunkdiff_core::encoding::encode_payload;
use chunkdiff_core::{ChunkdiffError, ChunkdiffResult};
use tracing::debug;

use crate::differ::{Classification, DiffResult};
use crate::wire::{round2, WireOperation, WirePlan, OP_ADD, OP_MODIFY, OP_REMOVE, OP_UNCHANGED};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    /// New-file bytes identical to old content
    Unchanged { offset: u64, size: u64, data: Bytes },
    /// New-file bytes with no counterpart in the old file
    Add { offset: u64, size: u64, data: Bytes },
    /// New-file bytes that replace a similar old chunk
    Modify { offset: u64, size: u64, data: Bytes },
    /// Old-file range that has no counterpart (old-file coordinates)
    Remove { offset: u64, size: u64 },
}

impl SyncOperation {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Unchanged { .. } => OP_UNCHANGED,
            Self::Add { .. } => OP_ADD,
            Self::Modify { .. } => OP_MODIFY,
            Self::Remove { .. } => OP_REMOVE,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            Self::Unchanged { offset, .. }
            | Self::Add { offset, .. }
            | Self::Modify { offset, .. }
            | Self::Remove { offset, .. } => *offset,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Unchanged { size, .. }
            | Self::Add { size, .. }
            | Self::Modify { size, .. }
            | Self::Remove { size, .. } => *size,
        }
    }

    /// Embedded new-file bytes; `None` for `Remove`.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Unchanged { data, .. } | Self::Add { data, .. } | Self::Modify { data, .. } => {
                Some(data)
            }
            Self::Remove { .. } => None,
        }
    }

    pub fn to_wire(&self) -> WireOperation {
        WireOperation {
            kind: self.tag().to_string(),
            offset: self.offset(),
            size: self.size(),
            data: self.payload().map(|d| encode_payload(d)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Assumed throughput for `estimated_transfer_seconds`
    pub throughput_bytes_per_sec: u64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            throughput_bytes_per_sec: 10 * 1024 * 1024,
        }
    }
}

impl From<&PlanConfig> for PlanOptions {
    fn from(cfg: &PlanConfig) -> Self {
        Self {
            throughput_bytes_per_sec: cfg.throughput_bytes_per_sec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanStats {
    pub bytes_added: u64,
    pub bytes_modified: u64,
    pub bytes_removed: u64,
    /// Share of the new file that need not be transferred, 0..=100
    pub efficiency_percent: f64,
    pub estimated_transfer_seconds: f64,
}

impl PlanStats {
    pub fn bytes_to_transfer(&self) -> u64 {
        self.bytes_added + self.bytes_modified
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Payload operations in new-file order, then `Remove`s in old-file order
    pub operations: Vec<SyncOperation>,
    pub stats: PlanStats,
    /// Size of the file this plan reconstructs
    pub new_size: u64,
}

impl SyncPlan {
    /// Every operation other than `Unchanged`, ordered by offset.
    ///
    /// `Remove` offsets are old-file coordinates, so this ordering is for
    /// display only and must not be used for reconstruction.
    pub fn changes(&self) -> Vec<&SyncOperation> {
        let mut changes: Vec<&SyncOperation> = self
            .operations
            .iter()
            .filter(|op| !matches!(op, SyncOperation::Unchanged { .. }))
            .collect();
        changes.sort_by_key(|op| op.offset());
        changes
    }

    pub fn to_wire(&self) -> WirePlan {
        WirePlan {
            operations: self.operations.iter().map(SyncOperation::to_wire).collect(),
            total_bytes: self.stats.bytes_to_transfer(),
            efficiency: round2(self.stats.efficiency_percent),
            estimated_time: round2(self.stats.estimated_transfer_seconds),
            changes: self.changes().into_iter().map(SyncOperation::to_wire).collect(),
        }
    }
}

/// Build the plan that turns `old` into `new` given their diff.
pub fn build_plan(
    old: &ChunkMap,
    new: &ChunkMap,
    diff: &DiffResult,
    options: &PlanOptions,
) -> ChunkdiffResult<SyncPlan> {
    let classes = diff.classify_new(new.len()).ok_or_else(|| {
        ChunkdiffError::invariant(format!(
            "diff does not classify each of the {} chunks of {} exactly once",
            new.len(),
            new.source
        ))
    })?;

    let mut operations = Vec::with_capacity(new.len() + diff.removed.len());
    let mut stats = PlanStats::default();
    let mut cursor = 0u64;

    for chunk in new.chunks() {
        if chunk.offset < cursor {
            return Err(ChunkdiffError::invariant(format!(
                "{}: chunk {} at {} overlaps previous chunk ending at {cursor}",
                new.source, chunk.index, chunk.offset
            )));
        }
        if chunk.offset > cursor {
            // Cover an uncovered range with the old file's bytes
            let size = chunk.offset - cursor;
            let data = old.read_range(cursor, size).ok_or_else(|| {
                ChunkdiffError::invariant(format!(
                    "{}: gap [{cursor}, {}) is beyond the end of {}",
                    new.source, chunk.offset, old.source
                ))
            })?;
            operations.push(SyncOperation::Unchanged {
                offset: cursor,
                size,
                data,
            });
        }

        let (offset, size, data) = (chunk.offset, chunk.size as u64, chunk.data.clone());
        operations.push(match classes[chunk.index as usize] {
            Classification::Unchanged { .. } => SyncOperation::Unchanged { offset, size, data },
            Classification::Modified { .. } => {
                stats.bytes_modified += size;
                SyncOperation::Modify { offset, size, data }
            }
            Classification::Added => {
                stats.bytes_added += size;
                SyncOperation::Add { offset, size, data }
            }
        });
        cursor = chunk.end();
    }

    // The plan ends exactly at the new file's end; the old tail is never copied
    if cursor != new.file_size() {
        return Err(ChunkdiffError::invariant(format!(
            "{}: plan covers {cursor} of {} bytes",
            new.source,
            new.file_size()
        )));
    }

    for &old_index in &diff.removed {
        let chunk = old.chunk(old_index).ok_or_else(|| {
            ChunkdiffError::invariant(format!(
                "removed chunk {old_index} does not exist in {}",
                old.source
            ))
        })?;
        stats.bytes_removed += chunk.size as u64;
        operations.push(SyncOperation::Remove {
            offset: chunk.offset,
            size: chunk.size as u64,
        });
    }

    let new_size = new.file_size();
    let transfer = stats.bytes_to_transfer();
    stats.efficiency_percent = if new_size == 0 {
        0.0
    } else {
        100.0 * (1.0 - transfer as f64 / new_size as f64)
    };
    stats.estimated_transfer_seconds =
        transfer as f64 / options.throughput_bytes_per_sec.max(1) as f64;

    debug!(
        new = %new.source,
        operations = operations.len(),
        bytes_added = stats.bytes_added,
        bytes_modified = stats.bytes_modified,
        bytes_removed = stats.bytes_removed,
        efficiency = stats.efficiency_percent,
        "built sync plan"
    );

    Ok(SyncPlan {
        operations,
        stats,
        new_size,
    })
}
