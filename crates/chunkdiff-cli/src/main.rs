//! chunkdiff: content-defined chunking, diff, and sync plans
//!
//! Commands:
//!   chunks <file>                  - chunk one file and print its chunk map
//!   compare <old> <new>            - diff two files and emit a sync plan
//!   sync <old> <plan> <out>        - rebuild the new file from old + plan
//!   config show                    - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use chunkdiff_core::{ChunkdiffConfig, ChunkdiffError, ErrorKind};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "chunkdiff",
    version,
    about = "Content-defined chunk diff and file synchronization",
    long_about = "chunkdiff: split files into content-defined chunks, diff two versions, \
                  and rebuild the new version from the old one plus a JSON sync plan"
)]
struct Cli {
    /// Path to chunkdiff.toml configuration file
    #[arg(long, short = 'c', env = "CHUNKDIFF_CONFIG", default_value = "chunkdiff.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "CHUNKDIFF_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "CHUNKDIFF_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk a file and print its chunk map
    Chunks {
        file: PathBuf,
        #[command(flatten)]
        chunking: ChunkingArgs,
        /// Print the full chunk map as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Compare two versions of a file and produce a sync plan
    ///
    /// The JSON document holds `diff_report` and `sync_plan`. It is written
    /// to --output when given, otherwise to stdout.
    Compare {
        old: PathBuf,
        new: PathBuf,
        #[command(flatten)]
        chunking: ChunkingArgs,
        /// Write the comparison JSON here
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Rebuild the new file from the old file and a sync plan
    ///
    /// The plan may be a full comparison document, a plan object, or a bare
    /// list of operations.
    Sync {
        old: PathBuf,
        plan: PathBuf,
        /// Destination for the rebuilt file
        out: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct ChunkingArgs {
    /// Average chunk size in bytes (default: chosen from file size)
    #[arg(long)]
    avg: Option<u32>,
    /// Rolling hash window in bytes
    #[arg(long)]
    window: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config).await {
        Ok(config) => config,
        Err(e) => return report_error(&e),
    };
    init_logging(&cli, &config);

    let result = match cli.command {
        Commands::Chunks {
            file,
            chunking,
            json,
        } => cmd_chunks(chunking.apply(config), file, json).await,
        Commands::Compare {
            old,
            new,
            chunking,
            output,
        } => cmd_compare(chunking.apply(config), old, new, output).await,
        Commands::Sync { old, plan, out } => cmd_sync(old, plan, out).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<ChunkdiffConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| ChunkdiffError::Config(format!("{}: {e}", path.display())).into())
    } else {
        Ok(ChunkdiffConfig::default())
    }
}

impl ChunkingArgs {
    fn apply(self, mut config: ChunkdiffConfig) -> ChunkdiffConfig {
        if let Some(avg) = self.avg {
            config.chunking.avg_chunk_size = Some(avg);
        }
        if let Some(window) = self.window {
            config.chunking.window_size = window;
        }
        config
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Logs go to stderr; stdout carries command output.
fn init_logging(cli: &Cli, config: &ChunkdiffConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (format, unknown) = match cli.log_format {
        Some(f) => (f, None),
        None => match config.log.format.to_ascii_lowercase().as_str() {
            "json" => (LogFormat::Json, None),
            "text" => (LogFormat::Text, None),
            other => (LogFormat::Text, Some(other.to_string())),
        },
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Some(other) = unknown {
        warn!(format = %other, "unknown log format in config, using text");
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Stable kind for any error reaching the top level.
fn error_kind(err: &anyhow::Error) -> ErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ChunkdiffError>())
        .map_or(ErrorKind::Other, ChunkdiffError::kind)
}

fn error_report(err: &anyhow::Error) -> serde_json::Value {
    serde_json::json!({
        "error": error_kind(err),
        "message": format!("{err:#}"),
    })
}

fn report_error(err: &anyhow::Error) -> ExitCode {
    eprintln!("{}", error_report(err));
    ExitCode::FAILURE
}

// ── `chunkdiff chunks` ────────────────────────────────────────────────────────

async fn cmd_chunks(config: ChunkdiffConfig, file: PathBuf, json: bool) -> Result<()> {
    let map = tokio::task::spawn_blocking(move || chunkdiff_sync::chunk_file(&file, &config))
        .await
        .context("chunking task panicked")??;

    if json {
        let rendered = map.to_wire().to_json()?;
        println!("{}", String::from_utf8_lossy(&rendered));
        return Ok(());
    }

    println!("File:    {}", map.source);
    println!("Size:    {}", fmt_bytes(map.file_size()));
    println!("Chunks:  {}", map.len());
    if !map.is_empty() {
        let sizes = map.chunks().iter().map(|c| c.size as u64);
        let min = sizes.clone().min().unwrap_or(0);
        let max = sizes.max().unwrap_or(0);
        println!(
            "Average: {}  (min {}, max {})",
            fmt_bytes(map.file_size() / map.len() as u64),
            fmt_bytes(min),
            fmt_bytes(max)
        );
    }
    Ok(())
}

// ── `chunkdiff compare` ───────────────────────────────────────────────────────

async fn cmd_compare(
    config: ChunkdiffConfig,
    old: PathBuf,
    new: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let comparison =
        tokio::task::spawn_blocking(move || chunkdiff_sync::compare_files(&old, &new, &config))
            .await
            .context("compare task panicked")??;

    let rendered = serde_json::to_vec_pretty(&comparison.to_wire())
        .context("serializing comparison")?;

    let Some(output) = output else {
        println!("{}", String::from_utf8_lossy(&rendered));
        return Ok(());
    };

    tokio::fs::write(&output, &rendered)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    let stats = &comparison.diff.stats;
    let plan = &comparison.plan.stats;
    println!(
        "{} -> {}",
        comparison.old.source, comparison.new.source
    );
    println!(
        "  chunks:     {} unchanged, {} modified, {} added, {} removed ({:.2}% changed)",
        stats.unchanged, stats.modified, stats.added, stats.removed, stats.changed_percent
    );
    println!(
        "  transfer:   {} of {} ({:.2}% efficient, ~{:.2}s)",
        fmt_bytes(plan.bytes_to_transfer()),
        fmt_bytes(comparison.plan.new_size),
        plan.efficiency_percent,
        plan.estimated_transfer_seconds
    );
    println!("  plan:       {}", output.display());
    info!(output = %output.display(), bytes = rendered.len(), "wrote comparison");
    Ok(())
}

// ── `chunkdiff sync` ──────────────────────────────────────────────────────────

async fn cmd_sync(old: PathBuf, plan: PathBuf, out: PathBuf) -> Result<()> {
    let display = out.display().to_string();
    let (written, digest) = tokio::task::spawn_blocking(move || -> Result<_> {
        let written = chunkdiff_sync::synchronize_file(&old, &plan, &out)?;
        Ok((written, chunkdiff_chunks::hash_file(&out)?))
    })
    .await
    .context("sync task panicked")??;
    println!("wrote {} to {display}", fmt_bytes(written));
    println!("sha256:  {}", chunkdiff_chunks::hash_to_hex(&digest));
    info!(bytes = written, "sync complete");
    Ok(())
}

// ── `chunkdiff config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &ChunkdiffConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
