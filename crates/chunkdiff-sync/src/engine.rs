//! Request-level entry points: compare two inputs, apply a plan
//!
//! Every call is self-contained. Configuration is passed in explicitly and
//! nothing is cached between requests.

use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use chunkdiff_chunks::{ChunkMap, ChunkParams};
use chunkdiff_core::{ChunkdiffConfig, ChunkdiffError, ChunkdiffResult};
use tracing::info;

use crate::differ::{diff, DiffOptions, DiffResult};
use crate::plan::{build_plan, PlanOptions, SyncPlan};
use crate::reconstruct::apply;
use crate::wire::{PlanDocument, WireComparison, WireDiffReport, WireOperation};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompareOptions {
    pub params: ChunkParams,
    pub diff: DiffOptions,
    pub plan: PlanOptions,
}

impl CompareOptions {
    /// Options for comparing inputs whose larger side is `max_size` bytes.
    pub fn from_config(config: &ChunkdiffConfig, max_size: u64, line_mode: bool) -> Self {
        let params = ChunkParams::new(
            config.chunking.avg_chunk_size_for(max_size),
            config.chunking.window_size,
        )
        .with_line_mode(line_mode);
        Self {
            params,
            diff: DiffOptions::from(&config.diff),
            plan: PlanOptions::from(&config.plan),
        }
    }
}

/// Both chunk maps plus what was derived from them.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub old: ChunkMap,
    pub new: ChunkMap,
    pub diff: DiffResult,
    pub plan: SyncPlan,
}

impl Comparison {
    pub fn to_wire(&self) -> WireComparison {
        WireComparison {
            diff_report: WireDiffReport {
                summary: self.diff.stats.to_wire(),
                details: self.diff.to_wire(&self.old, &self.new),
                old_chunks: self.old.chunks().iter().map(|c| c.to_wire()).collect(),
                new_chunks: self.new.chunks().iter().map(|c| c.to_wire()).collect(),
            },
            sync_plan: self.plan.to_wire(),
        }
    }
}

/// Diff two in-memory inputs with default diff and plan options.
pub fn compare(
    old: &[u8],
    new: &[u8],
    avg_chunk_size: u32,
    window_size: u32,
) -> ChunkdiffResult<(DiffResult, SyncPlan)> {
    let options = CompareOptions {
        params: ChunkParams::new(avg_chunk_size, window_size),
        ..Default::default()
    };
    let comparison = compare_with(
        "old",
        Bytes::copy_from_slice(old),
        "new",
        Bytes::copy_from_slice(new),
        &options,
    )?;
    Ok((comparison.diff, comparison.plan))
}

/// Build both chunk maps in parallel, then diff and plan.
pub fn compare_with(
    old_source: &str,
    old: Bytes,
    new_source: &str,
    new: Bytes,
    options: &CompareOptions,
) -> ChunkdiffResult<Comparison> {
    options.params.validate()?;
    let (old_map, new_map) = rayon::join(
        || ChunkMap::build(old_source, old, &options.params),
        || ChunkMap::build(new_source, new, &options.params),
    );
    compare_maps(old_map?, new_map?, options)
}

/// Diff and plan two already-built maps.
pub fn compare_maps(
    old: ChunkMap,
    new: ChunkMap,
    options: &CompareOptions,
) -> ChunkdiffResult<Comparison> {
    let diff = diff(&old, &new, &options.diff);
    let plan = build_plan(&old, &new, &diff, &options.plan)?;
    Ok(Comparison {
        old,
        new,
        diff,
        plan,
    })
}

/// Compare two files on disk using `config` for chunking and thresholds.
///
/// The average chunk size (unless configured) and line mode are chosen once
/// from the larger of the two sizes and the new file's extension. Both files
/// are then read and chunked in parallel.
pub fn compare_files(
    old_path: &Path,
    new_path: &Path,
    config: &ChunkdiffConfig,
) -> ChunkdiffResult<Comparison> {
    let max_size = file_size(old_path)?.max(file_size(new_path)?);
    let line_mode = config.chunking.use_line_mode(new_path, max_size);
    let options = CompareOptions::from_config(config, max_size, line_mode);
    options.params.validate()?;

    let allow_empty = config.compare.allow_empty;
    let (old_map, new_map) = rayon::join(
        || load_map(old_path, &options.params, allow_empty),
        || load_map(new_path, &options.params, allow_empty),
    );
    let comparison = compare_maps(old_map?, new_map?, &options)?;

    info!(
        old = %old_path.display(),
        new = %new_path.display(),
        avg = options.params.avg_chunk_size,
        line_mode,
        old_chunks = comparison.old.len(),
        new_chunks = comparison.new.len(),
        changed_percent = comparison.diff.stats.changed_percent,
        efficiency = comparison.plan.stats.efficiency_percent,
        "compared files"
    );
    Ok(comparison)
}

/// Reconstruct the new file from `old` and a plan's operations.
pub fn synchronize(old: &[u8], operations: &[WireOperation]) -> ChunkdiffResult<Vec<u8>> {
    apply(old, operations)
}

/// Apply the plan stored at `plan_path` to `old_path`, writing `out_path`.
///
/// `plan_path` may hold a full comparison, a plan, or a bare operation list.
/// The output is written to a temporary file in the target directory and
/// renamed into place, so `out_path` is untouched on failure.
pub fn synchronize_file(old_path: &Path, plan_path: &Path, out_path: &Path) -> ChunkdiffResult<u64> {
    let old = std::fs::read(old_path).map_err(|e| ChunkdiffError::from_io(old_path, e))?;
    let raw = std::fs::read(plan_path).map_err(|e| ChunkdiffError::from_io(plan_path, e))?;
    let operations = PlanDocument::from_json(&raw)?.into_operations();

    let rebuilt = synchronize(&old, &operations)?;

    let dir = match out_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ChunkdiffError::from_io(dir, e))?;
    tmp.write_all(&rebuilt)?;
    tmp.as_file().sync_all()?;
    tmp.persist(out_path)
        .map_err(|e| ChunkdiffError::from_io(out_path, e.error))?;

    info!(
        old = %old_path.display(),
        plan = %plan_path.display(),
        out = %out_path.display(),
        operations = operations.len(),
        bytes = rebuilt.len(),
        "synchronized file"
    );
    Ok(rebuilt.len() as u64)
}

/// Chunk a single file with sizing chosen from its own length.
pub fn chunk_file(path: &Path, config: &ChunkdiffConfig) -> ChunkdiffResult<ChunkMap> {
    let size = file_size(path)?;
    let line_mode = config.chunking.use_line_mode(path, size);
    let params = CompareOptions::from_config(config, size, line_mode).params;
    load_map(path, &params, config.compare.allow_empty)
}

fn file_size(path: &Path) -> ChunkdiffResult<u64> {
    let meta = std::fs::metadata(path).map_err(|e| ChunkdiffError::from_io(path, e))?;
    Ok(meta.len())
}

fn load_map(path: &Path, params: &ChunkParams, allow_empty: bool) -> ChunkdiffResult<ChunkMap> {
    if allow_empty {
        ChunkMap::from_file(path, params)
    } else {
        ChunkMap::from_file_non_empty(path, params)
    }
}
