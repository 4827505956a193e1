//! Restore command - download cached archives and expand them

use crate::cache::Restorer;
use crate::cli::args::RestoreArgs;
use crate::cli::commands::build_pipeline;
use crate::config::Config;
use crate::error::CachetResult;

/// Execute the restore command
pub async fn execute(args: RestoreArgs, config: &Config) -> CachetResult<()> {
    let pipeline = build_pipeline(&args.transfer, config)?;

    Restorer::new(
        pipeline.storage,
        pipeline.archiver,
        pipeline.keys,
        pipeline.namespace,
        pipeline.branch,
    )
    .restore(&args.transfer.mount)
    .await
}
