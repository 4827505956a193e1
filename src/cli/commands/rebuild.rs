//! Rebuild command - archive the mounts and upload them

use crate::cache::Rebuilder;
use crate::cli::args::RebuildArgs;
use crate::cli::commands::build_pipeline;
use crate::config::Config;
use crate::error::CachetResult;

/// Execute the rebuild command
pub async fn execute(args: RebuildArgs, config: &Config) -> CachetResult<()> {
    let pipeline = build_pipeline(&args.transfer, config)?;

    Rebuilder::new(
        pipeline.storage,
        pipeline.archiver,
        pipeline.keys,
        pipeline.namespace,
        pipeline.branch,
    )
    .rebuild(&args.transfer.mount)
    .await
}
