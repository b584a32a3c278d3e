use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration (loaded from chunkdiff.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkdiffConfig {
    pub chunking: ChunkingConfig,
    pub diff: DiffConfig,
    pub plan: PlanConfig,
    pub compare: CompareConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target average chunk size in bytes (unset = pick from file size)
    pub avg_chunk_size: Option<u32>,
    /// Rolling hash window in bytes (default: 48)
    pub window_size: u32,
    /// Files strictly smaller than this use line-based chunking (default: 1024)
    pub line_mode_max_size: u64,
    /// Extensions (without dot, case-insensitive) eligible for line mode
    pub line_mode_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Minimum similarity (exclusive) for a near match to count as modified
    pub similarity_threshold: f64,
    /// Upper bound on unmatched old chunks scored per new chunk
    pub max_candidates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Assumed link throughput for transfer time estimates (default: 10 MiB/s)
    pub throughput_bytes_per_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Accept zero-length inputs (default: true)
    pub allow_empty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl ChunkingConfig {
    /// Average chunk size to use for a comparison whose larger input is
    /// `file_size` bytes.
    pub fn avg_chunk_size_for(&self, file_size: u64) -> u32 {
        self.avg_chunk_size
            .unwrap_or_else(|| auto_avg_chunk_size(file_size))
    }

    /// Whether `path` of `file_size` bytes should be split on line terminators.
    pub fn use_line_mode(&self, path: &Path, file_size: u64) -> bool {
        if file_size >= self.line_mode_max_size {
            return false;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self
                .line_mode_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Average chunk size tiers keyed on input size.
pub fn auto_avg_chunk_size(file_size: u64) -> u32 {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if file_size < KIB {
        64
    } else if file_size < MIB {
        1024
    } else if file_size < 10 * MIB {
        4096
    } else {
        8192
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            avg_chunk_size: None,
            window_size: 48,
            line_mode_max_size: 1024,
            line_mode_extensions: [
                "txt", "md", "csv", "tsv", "json", "yaml", "yml", "toml", "xml", "html", "ini",
                "cfg", "conf", "log",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            max_candidates: 4096,
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            throughput_bytes_per_sec: 10 * 1024 * 1024,
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self { allow_empty: true }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
