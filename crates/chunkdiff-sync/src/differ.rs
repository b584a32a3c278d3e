//! Chunk differ: classifies every chunk of two maps
//!
//! Three passes:
//!   1. exact: a new chunk whose SHA-256 appears in the old map is unchanged
//!   2. near match: remaining new chunks are paired greedily with the most
//!      similar remaining old chunk, if similarity exceeds the threshold.
//!      Old chunks are scored nearest the new chunk's relative position
//!      first, so a candidate cap drops the most distant ones
//!   3. leftovers: new chunks are added, old chunks are removed
//!
//! Pass 2 is first-best, not a global assignment: an early new chunk may take
//! an old chunk that a later one would have matched better.

use chunkdiff_chunks::{Chunk, ChunkMap, Hash};
use chunkdiff_core::config::DiffConfig;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::wire::{round2, WireDiffResult, WireDiffStats, WireModifiedPair};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Similarity must be strictly greater than this to pair as modified
    pub similarity_threshold: f64,
    /// Maximum unmatched old chunks scored per new chunk, nearest first
    pub max_candidates: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            max_candidates: 4096,
        }
    }
}

impl From<&DiffConfig> for DiffOptions {
    fn from(cfg: &DiffConfig) -> Self {
        Self {
            similarity_threshold: cfg.similarity_threshold,
            max_candidates: cfg.max_candidates,
        }
    }
}

/// A new chunk paired with an old chunk (by index)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPair {
    pub old: u32,
    pub new: u32,
}

/// How a single new chunk relates to the old map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unchanged { old: u32 },
    Modified { old: u32 },
    Added,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffStats {
    /// Number of chunks in the new map
    pub total_chunks: usize,
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    /// Share of changed chunks, 0..=100
    pub changed_percent: f64,
    pub bytes_added: u64,
    pub bytes_removed: u64,
    /// New-side bytes of modified chunks
    pub bytes_modified: u64,
    pub old_size: u64,
    pub new_size: u64,
}

/// Disjoint classification of both maps' chunk indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    pub unchanged: Vec<ChunkPair>,
    pub modified: Vec<ChunkPair>,
    /// New chunk indices with no counterpart
    pub added: Vec<u32>,
    /// Old chunk indices with no counterpart
    pub removed: Vec<u32>,
    pub stats: DiffStats,
}

impl DiffResult {
    /// Classification of each new chunk, indexed by new chunk index.
    ///
    /// Returns `None` if this result does not cover exactly `new_len` chunks.
    pub fn classify_new(&self, new_len: usize) -> Option<Vec<Classification>> {
        let mut out: Vec<Option<Classification>> = vec![None; new_len];
        let entries = self
            .unchanged
            .iter()
            .map(|p| (p.new, Classification::Unchanged { old: p.old }))
            .chain(
                self.modified
                    .iter()
                    .map(|p| (p.new, Classification::Modified { old: p.old })),
            )
            .chain(self.added.iter().map(|&i| (i, Classification::Added)));

        for (index, class) in entries {
            let slot = out.get_mut(index as usize)?;
            if slot.replace(class).is_some() {
                return None;
            }
        }
        out.into_iter().collect()
    }

    /// True when nothing was added, removed, or modified.
    pub fn is_identical(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Wire form, resolving indices against the maps this result came from.
    pub fn to_wire(&self, old: &ChunkMap, new: &ChunkMap) -> WireDiffResult {
        let new_chunk = |i: u32| new.chunk(i).map(Chunk::to_wire);
        let old_chunk = |i: u32| old.chunk(i).map(Chunk::to_wire);

        WireDiffResult {
            unchanged_chunks: self.unchanged.iter().filter_map(|p| new_chunk(p.new)).collect(),
            added_chunks: self.added.iter().filter_map(|&i| new_chunk(i)).collect(),
            removed_chunks: self.removed.iter().filter_map(|&i| old_chunk(i)).collect(),
            modified_chunks: self
                .modified
                .iter()
                .filter_map(|p| {
                    Some(WireModifiedPair {
                        old_chunk: old_chunk(p.old)?,
                        new_chunk: new_chunk(p.new)?,
                    })
                })
                .collect(),
            stats: self.stats.to_wire(),
        }
    }
}

impl DiffStats {
    pub fn to_wire(&self) -> WireDiffStats {
        WireDiffStats {
            total_chunks: self.total_chunks,
            unchanged: self.unchanged,
            added: self.added,
            removed: self.removed,
            modified: self.modified,
            changed_percent: round2(self.changed_percent),
            bytes_changed: self.bytes_modified,
            bytes_added: self.bytes_added,
            bytes_removed: self.bytes_removed,
            old_size: self.old_size,
            new_size: self.new_size,
        }
    }
}

/// Fraction of positions in the common prefix where both inputs agree,
/// over the longer length.
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let same = a.iter().zip(b).filter(|(x, y)| x == y).count();
    same as f64 / longest as f64
}

pub fn diff(old: &ChunkMap, new: &ChunkMap, options: &DiffOptions) -> DiffResult {
    let mut result = DiffResult::default();
    let mut unmatched_old: BTreeSet<u32> = old.chunks().iter().map(|c| c.index).collect();
    let mut pending_new = Vec::new();

    // Pass 1: exact matches by digest. Duplicate old content prefers an old
    // chunk that is still unmatched.
    let mut by_hash: HashMap<&Hash, Vec<u32>> = HashMap::with_capacity(old.len());
    for c in old.chunks() {
        by_hash.entry(&c.hash).or_default().push(c.index);
    }
    for c in new.chunks() {
        match by_hash.get(&c.hash) {
            Some(candidates) => {
                let old_index = candidates
                    .iter()
                    .copied()
                    .find(|i| unmatched_old.contains(i))
                    .unwrap_or(candidates[0]);
                unmatched_old.remove(&old_index);
                result.unchanged.push(ChunkPair {
                    old: old_index,
                    new: c.index,
                });
            }
            None => pending_new.push(c.index),
        }
    }

    // Pass 2: greedy near matches, scanning old chunks nearest the new
    // chunk's relative position first
    let threshold = options.similarity_threshold;
    for new_index in pending_new {
        let Some(nc) = new.chunk(new_index) else {
            continue;
        };
        let anchor = relative_position(new_index, new.len(), old.len());
        let mut best: Option<(u32, f64)> = None;
        let mut scored = 0usize;

        for old_index in nearest_first(&unmatched_old, anchor) {
            if scored >= options.max_candidates {
                break;
            }
            let Some(oc) = old.chunk(old_index) else {
                continue;
            };
            // The score can never exceed min(len)/max(len)
            let (lo, hi) = if oc.size < nc.size {
                (oc.size, nc.size)
            } else {
                (nc.size, oc.size)
            };
            if lo as f64 / hi as f64 <= threshold {
                continue;
            }
            scored += 1;

            let score = similarity(&oc.data, &nc.data);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((old_index, score));
            }
        }

        match best {
            Some((old_index, score)) if score > threshold => {
                unmatched_old.remove(&old_index);
                result.modified.push(ChunkPair {
                    old: old_index,
                    new: new_index,
                });
            }
            _ => result.added.push(new_index),
        }
    }

    // Pass 3: whatever is left on the old side was removed
    result.removed = unmatched_old.into_iter().collect();
    result.modified.sort_by_key(|p| p.new);
    result.stats = compute_stats(old, new, &result);

    debug!(
        old = %old.source,
        new = %new.source,
        unchanged = result.stats.unchanged,
        modified = result.stats.modified,
        added = result.stats.added,
        removed = result.stats.removed,
        changed_percent = result.stats.changed_percent,
        "diffed chunk maps"
    );
    result
}

/// Old index at the same relative position as `new_index`.
fn relative_position(new_index: u32, new_len: usize, old_len: usize) -> u32 {
    let scaled = new_index as u64 * old_len as u64 / new_len.max(1) as u64;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Members of `set` ordered by distance from `anchor`; ties go upward.
fn nearest_first(set: &BTreeSet<u32>, anchor: u32) -> impl Iterator<Item = u32> + '_ {
    let mut below = set.range(..anchor).rev().copied().peekable();
    let mut above = set.range(anchor..).copied().peekable();
    std::iter::from_fn(move || match (below.peek(), above.peek()) {
        (Some(&b), Some(&a)) if anchor - b < a - anchor => below.next(),
        (_, Some(_)) => above.next(),
        (Some(_), None) => below.next(),
        (None, None) => None,
    })
}

fn compute_stats(old: &ChunkMap, new: &ChunkMap, result: &DiffResult) -> DiffStats {
    let new_size_of = |i: u32| new.chunk(i).map_or(0, |c| c.size as u64);
    let old_size_of = |i: u32| old.chunk(i).map_or(0, |c| c.size as u64);

    let changes = result.added.len() + result.removed.len() + result.modified.len();
    let denominator = old.len().max(new.len());
    let changed_percent = if denominator == 0 {
        0.0
    } else {
        (100.0 * changes as f64 / denominator as f64).clamp(0.0, 100.0)
    };

    DiffStats {
        total_chunks: new.len(),
        unchanged: result.unchanged.len(),
        added: result.added.len(),
        removed: result.removed.len(),
        modified: result.modified.len(),
        changed_percent,
        bytes_added: result.added.iter().map(|&i| new_size_of(i)).sum(),
        bytes_removed: result.removed.iter().map(|&i| old_size_of(i)).sum(),
        bytes_modified: result.modified.iter().map(|p| new_size_of(p.new)).sum(),
        old_size: old.file_size(),
        new_size: new.file_size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkdiff_chunks::ChunkParams;
    use proptest::prelude::*;

    fn map(name: &str, data: &[u8]) -> ChunkMap {
        ChunkMap::build(name, data.to_vec(), &ChunkParams::DEFAULT).unwrap()
    }

    fn lines(data: &[u8]) -> ChunkMap {
        ChunkMap::build("lines", data.to_vec(), &ChunkParams::DEFAULT.with_line_mode(true)).unwrap()
    }

    #[test]
    fn similarity_counts_common_prefix_positions() {
        assert_eq!(similarity(b"abcd", b"abcd"), 1.0);
        assert_eq!(similarity(b"abcd", b"abxd"), 0.75);
        assert_eq!(similarity(b"ab", b"abcd"), 0.5);
        assert_eq!(similarity(b"", b""), 1.0);
        assert_eq!(similarity(b"AAAABBBB", b"AAAAXBBBB"), 7.0 / 9.0);
    }

    #[test]
    fn identical_maps_have_no_changes() {
        let data: Vec<u8> = (0u32..5000).map(|i| (i * 13 % 251) as u8).collect();
        let m = map("m", &data);
        let d = diff(&m, &m, &DiffOptions::default());
        assert!(d.is_identical());
        assert_eq!(d.stats.unchanged, m.len());
        assert_eq!(d.stats.changed_percent, 0.0);
    }

    #[test]
    fn empty_to_hello_is_one_added_chunk() {
        let d = diff(&map("old", b""), &map("new", b"hello"), &DiffOptions::default());
        assert_eq!(d.stats.unchanged, 0);
        assert_eq!(d.added, vec![0]);
        assert_eq!(d.stats.bytes_added, 5);
        assert_eq!(d.stats.changed_percent, 100.0);
    }

    #[test]
    fn hello_to_empty_is_one_removed_chunk() {
        let d = diff(&map("old", b"hello"), &map("new", b""), &DiffOptions::default());
        assert_eq!(d.removed, vec![0]);
        assert_eq!(d.stats.bytes_removed, 5);
        assert_eq!(d.stats.total_chunks, 0);
        assert_eq!(d.stats.changed_percent, 100.0);
    }

    #[test]
    fn both_empty_is_zero_percent() {
        let d = diff(&map("a", b""), &map("b", b""), &DiffOptions::default());
        assert!(d.is_identical());
        assert_eq!(d.stats.changed_percent, 0.0);
    }

    #[test]
    fn one_byte_insert_in_short_file_is_modified() {
        let d = diff(&map("old", b"AAAABBBB"), &map("new", b"AAAAXBBBB"), &DiffOptions::default());
        assert_eq!(d.modified, vec![ChunkPair { old: 0, new: 0 }]);
        assert!(d.added.is_empty() && d.removed.is_empty());
        assert_eq!(d.stats.bytes_modified, 9);
    }

    #[test]
    fn dissimilar_chunk_is_added_and_removed() {
        let d = diff(&map("old", b"abcdefgh"), &map("new", b"zyxwvuts"), &DiffOptions::default());
        assert_eq!(d.added, vec![0]);
        assert_eq!(d.removed, vec![0]);
        assert!(d.modified.is_empty());
    }

    #[test]
    fn threshold_is_exclusive() {
        // 7 of 10 positions agree: exactly 0.7, not above it
        let d = diff(
            &map("old", b"0123456789"),
            &map("new", b"0123456xyz"),
            &DiffOptions::default(),
        );
        assert!(d.modified.is_empty());
        assert_eq!(d.added, vec![0]);
    }

    #[test]
    fn zero_candidates_disables_near_matching() {
        let options = DiffOptions {
            max_candidates: 0,
            ..Default::default()
        };
        let d = diff(&map("old", b"AAAABBBB"), &map("new", b"AAAAXBBBB"), &options);
        assert!(d.modified.is_empty());
        assert_eq!((d.added.len(), d.removed.len()), (1, 1));
    }

    #[test]
    fn line_edit_pairs_with_old_line() {
        let old = lines(b"alpha line\nbravo line\ncharlie\n");
        let new = lines(b"alpha line\nbravo lime\ncharlie\n");
        let d = diff(&old, &new, &DiffOptions::default());
        assert_eq!(d.unchanged.len(), 2);
        assert_eq!(d.modified, vec![ChunkPair { old: 1, new: 1 }]);
    }

    #[test]
    fn duplicate_old_content_prefers_unmatched_chunk() {
        let old = lines(b"same\nsame\n");
        let new = lines(b"same\nsame\n");
        let d = diff(&old, &new, &DiffOptions::default());
        assert_eq!(
            d.unchanged,
            vec![ChunkPair { old: 0, new: 0 }, ChunkPair { old: 1, new: 1 }]
        );
        assert!(d.removed.is_empty());
    }

    #[test]
    fn candidates_are_ordered_by_distance() {
        let set: BTreeSet<u32> = [0, 3, 4, 6, 10].into_iter().collect();
        let order: Vec<u32> = nearest_first(&set, 5).collect();
        assert_eq!(order, vec![6, 4, 3, 10, 0]);
        assert_eq!(nearest_first(&set, 0).collect::<Vec<_>>(), vec![0, 3, 4, 6, 10]);
        assert_eq!(nearest_first(&set, 99).collect::<Vec<_>>(), vec![10, 6, 4, 3, 0]);
        assert_eq!(nearest_first(&BTreeSet::new(), 5).count(), 0);
    }

    #[test]
    fn near_matches_past_the_candidate_cap_are_found() {
        // 200 unrelated lines, then 20 lines edited by one byte each. With a
        // cap of 64 an index-order scan would only ever score the filler.
        let mut old = Vec::new();
        let mut new = Vec::new();
        for i in 0..200u64 {
            old.extend(format!("{:031}\n", i * 7919).into_bytes());
            new.extend(format!("{:a>27}{i:04}\n", "").into_bytes());
        }
        for k in 0..20 {
            old.extend(format!("tail record {k:02} with payload ZZ\n").into_bytes());
            new.extend(format!("Tail record {k:02} with payload ZZ\n").into_bytes());
        }
        let (old, new) = (lines(&old), lines(&new));
        assert_eq!((old.len(), new.len()), (220, 220));

        let options = DiffOptions {
            max_candidates: 64,
            ..Default::default()
        };
        let d = diff(&old, &new, &options);
        let expected: Vec<ChunkPair> = (200..220).map(|i| ChunkPair { old: i, new: i }).collect();
        assert_eq!(d.modified, expected);
        assert_eq!((d.added.len(), d.removed.len()), (200, 200));
    }

    #[test]
    fn classify_new_rejects_foreign_result() {
        let d = diff(&map("old", b"abc"), &map("new", b"abc"), &DiffOptions::default());
        assert!(d.classify_new(1).is_some());
        assert!(d.classify_new(2).is_none());
        assert!(d.classify_new(0).is_none());
    }

    #[test]
    fn wire_form_resolves_chunks() {
        let old = map("old", b"AAAABBBB");
        let new = map("new", b"AAAAXBBBB");
        let wire = diff(&old, &new, &DiffOptions::default()).to_wire(&old, &new);
        assert_eq!(wire.modified_chunks.len(), 1);
        assert_eq!(wire.modified_chunks[0].old_chunk.size, 8);
        assert_eq!(wire.modified_chunks[0].new_chunk.size, 9);
        assert_eq!(wire.stats.bytes_changed, 9);
        assert_eq!(wire.stats.changed_percent, 100.0);
        assert!(wire.unchanged_chunks.is_empty());
    }

    proptest! {
        /// Every index lands in exactly one category on each side
        #[test]
        fn classification_is_a_partition(
            old in proptest::collection::vec(any::<u8>(), 0..=3000),
            new in proptest::collection::vec(any::<u8>(), 0..=3000),
        ) {
            let om = map("old", &old);
            let nm = map("new", &new);
            let d = diff(&om, &nm, &DiffOptions::default());

            prop_assert!(d.classify_new(nm.len()).is_some());

            let mut old_seen = vec![0u32; om.len()];
            for p in &d.modified {
                old_seen[p.old as usize] += 1;
            }
            for &i in &d.removed {
                old_seen[i as usize] += 1;
            }
            let exact_old: BTreeSet<u32> = d.unchanged.iter().map(|p| p.old).collect();
            for (i, count) in old_seen.iter().enumerate() {
                let via_unchanged = exact_old.contains(&(i as u32)) as u32;
                prop_assert_eq!(count + via_unchanged, 1, "old chunk {} classified {} times", i, count + via_unchanged);
            }
            prop_assert!(d.stats.changed_percent >= 0.0 && d.stats.changed_percent <= 100.0);
        }

        #[test]
        fn self_diff_is_identical(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            let m = map("m", &data);
            let d = diff(&m, &m, &DiffOptions::default());
            prop_assert!(d.is_identical());
            prop_assert_eq!(d.stats.changed_percent, 0.0);
        }
    }
}
