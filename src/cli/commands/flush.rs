//! Flush command - evict expired remote cache entries

use crate::cache::Flusher;
use crate::cli::args::FlushArgs;
use crate::cli::commands::{build_storage, resolve_namespace};
use crate::config::Config;
use crate::error::CachetResult;
use crate::metadata::Metadata;

/// Execute the flush command
pub async fn execute(args: FlushArgs, config: &Config) -> CachetResult<()> {
    let metadata = Metadata::from(args.metadata.clone());

    let storage = build_storage(
        args.backend,
        args.filesystem_root.as_ref(),
        args.timeout,
        config,
    )?;

    let prefix = args
        .prefix
        .clone()
        .unwrap_or_else(|| resolve_namespace(args.namespace.as_deref(), config, &metadata));

    Flusher::new(storage, args.ttl).flush(&prefix).await
}
