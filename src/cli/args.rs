//! CLI argument definitions using clap derive

use crate::archive::ArchiveFormat;
use crate::metadata::MetadataArgs;
use crate::storage::BackendKind;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Cachet - streaming build cache for CI pipelines
///
/// Archives configured directories, uploads them to remote storage, and
/// restores them on later runs to skip redundant work.
#[derive(Parser, Debug)]
#[command(name = "cachet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CACHET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .cachet.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

impl Cli {
    /// Whether the invoked subcommand asked for strict exit codes
    pub fn fail_on_error(&self) -> bool {
        match &self.command {
            Commands::Rebuild(args) => args.transfer.fail_on_error,
            Commands::Restore(args) => args.transfer.fail_on_error,
            Commands::Flush(args) => args.fail_on_error,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive the configured mounts and upload them to remote storage
    Rebuild(RebuildArgs),

    /// Download cached archives and expand them over the configured mounts
    Restore(RestoreArgs),

    /// Delete remote cache entries older than the TTL
    Flush(FlushArgs),
}

/// Arguments for the rebuild command
#[derive(Parser, Debug)]
pub struct RebuildArgs {
    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments for the restore command
#[derive(Parser, Debug)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments shared by rebuild and restore
#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Directory to cache (repeatable, comma-separated via env)
    #[arg(
        short,
        long = "mount",
        value_delimiter = ',',
        env = "CACHET_MOUNT",
        required = true
    )]
    pub mount: Vec<PathBuf>,

    /// Cache key template; an empty or invalid template falls back to a
    /// content hash of the mounts and branch
    #[arg(long, env = "CACHET_CACHE_KEY", default_value = "")]
    pub cache_key: String,

    /// Remote namespace, defaults to the repository name
    #[arg(long, env = "CACHET_NAMESPACE")]
    pub namespace: Option<String>,

    /// Archive format
    #[arg(long, value_enum, env = "CACHET_ARCHIVE_FORMAT")]
    pub archive_format: Option<ArchiveFormat>,

    /// Gzip compression level (0-9)
    #[arg(long, env = "CACHET_COMPRESSION_LEVEL")]
    pub compression_level: Option<u32>,

    /// Leave symbolic links out of the archive
    #[arg(long, env = "CACHET_SKIP_SYMLINKS")]
    pub skip_symlinks: bool,

    /// Storage backend
    #[arg(short, long, value_enum, env = "CACHET_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Filesystem backend root directory
    #[arg(long, env = "CACHET_FILESYSTEM_ROOT")]
    pub filesystem_root: Option<PathBuf>,

    /// Storage operation timeout in seconds
    #[arg(long, env = "CACHET_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Exit nonzero on recognized cache failures
    #[arg(long, env = "CACHET_FAIL_ON_ERROR")]
    pub fail_on_error: bool,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

/// Arguments for the flush command
#[derive(Parser, Debug)]
pub struct FlushArgs {
    /// Remote prefix to sweep, defaults to the namespace
    #[arg(long)]
    pub prefix: Option<String>,

    /// Entry age before eviction (e.g. 90s, 30m, 12h, 30d)
    #[arg(long, value_parser = parse_duration, default_value = "30d", env = "CACHET_TTL")]
    pub ttl: Duration,

    /// Remote namespace, defaults to the repository name
    #[arg(long, env = "CACHET_NAMESPACE")]
    pub namespace: Option<String>,

    /// Storage backend
    #[arg(short, long, value_enum, env = "CACHET_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Filesystem backend root directory
    #[arg(long, env = "CACHET_FILESYSTEM_ROOT")]
    pub filesystem_root: Option<PathBuf>,

    /// Storage operation timeout in seconds
    #[arg(long, env = "CACHET_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Exit nonzero on recognized cache failures
    #[arg(long, env = "CACHET_FAIL_ON_ERROR")]
    pub fail_on_error: bool,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

/// Parse a duration given as seconds or with an s/m/h/d suffix
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(digits);

    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;

    let secs = match unit.trim() {
        "" | "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        "d" => value * 86_400,
        other => return Err(format!("unknown duration unit '{other}' in '{s}'")),
    };

    Ok(Duration::from_secs(secs))
}
