//! chunkdiff-sync: chunk differ, synchronization plan builder, and reconstructor

pub mod differ;
pub mod engine;
pub mod plan;
pub mod reconstruct;
pub mod wire;

pub use differ::{diff, similarity, ChunkPair, Classification, DiffOptions, DiffResult, DiffStats};
pub use engine::{
    chunk_file, compare, compare_files, compare_maps, compare_with, synchronize, synchronize_file,
    CompareOptions, Comparison,
};
pub use plan::{build_plan, PlanOptions, PlanStats, SyncOperation, SyncPlan};
pub use reconstruct::{apply, apply_operations, decode_operations};
pub use wire::{PlanDocument, WireComparison, WireDiffResult, WireOperation, WirePlan};
