//! CLI command implementations

pub mod flush;
pub mod rebuild;
pub mod restore;

pub use flush::execute as flush;
pub use rebuild::execute as rebuild;
pub use restore::execute as restore;

use crate::archive::Archiver;
use crate::cli::args::TransferArgs;
use crate::config::Config;
use crate::error::CachetResult;
use crate::keygen::{HashGenerator, KeyChain, TemplateGenerator};
use crate::metadata::Metadata;
use crate::storage::{backend, BackendKind, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a transfer command needs, resolved from flags and config
/// (flags win over both config layers).
pub(crate) struct Pipeline {
    pub storage: Arc<Storage>,
    pub archiver: Archiver,
    pub keys: Arc<KeyChain>,
    pub namespace: String,
    pub branch: String,
}

pub(crate) fn build_pipeline(args: &TransferArgs, config: &Config) -> CachetResult<Pipeline> {
    let metadata = Metadata::from(args.metadata.clone());

    let storage = build_storage(
        args.backend,
        args.filesystem_root.as_ref(),
        args.timeout,
        config,
    )?;

    let format = args
        .archive_format
        .unwrap_or(config.defaults.archive_format);
    let level = args
        .compression_level
        .unwrap_or(config.defaults.compression_level);
    let skip_symlinks = args.skip_symlinks || config.defaults.skip_symlinks;
    let archiver = Archiver::new(format, level, skip_symlinks);

    let keys = Arc::new(KeyChain::new(
        Box::new(TemplateGenerator::new(
            args.cache_key.clone(),
            metadata.clone(),
        )),
        Some(Box::new(HashGenerator)),
    ));

    let namespace = resolve_namespace(args.namespace.as_deref(), config, &metadata);
    let branch = metadata.commit.branch.clone();

    Ok(Pipeline {
        storage,
        archiver,
        keys,
        namespace,
        branch,
    })
}

pub(crate) fn build_storage(
    kind: Option<BackendKind>,
    filesystem_root: Option<&PathBuf>,
    timeout_secs: Option<u64>,
    config: &Config,
) -> CachetResult<Arc<Storage>> {
    let kind = kind.unwrap_or(config.defaults.backend);

    let mut config = config.clone();
    if let Some(root) = filesystem_root {
        config.filesystem.root = root.clone();
    }

    let backend = backend::from_config(kind, &config)?;
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.defaults.timeout_secs));

    Ok(Arc::new(Storage::new(backend, timeout)))
}

pub(crate) fn resolve_namespace(
    flag: Option<&str>,
    config: &Config,
    metadata: &Metadata,
) -> String {
    flag.map(str::to_string)
        .or_else(|| config.defaults.namespace.clone())
        .unwrap_or_else(|| metadata.repo.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_resolution_order() {
        let mut config = Config::default();
        let mut metadata = Metadata::default();
        metadata.repo.name = "from-meta".to_string();

        assert_eq!(
            resolve_namespace(Some("from-flag"), &config, &metadata),
            "from-flag"
        );

        config.defaults.namespace = Some("from-config".to_string());
        assert_eq!(
            resolve_namespace(None, &config, &metadata),
            "from-config"
        );

        config.defaults.namespace = None;
        assert_eq!(resolve_namespace(None, &config, &metadata), "from-meta");
    }

    #[test]
    fn storage_rejects_unsupported_backend() {
        let config = Config::default();
        let err = build_storage(Some(BackendKind::S3), None, None, &config).unwrap_err();
        assert!(err.to_string().contains("s3"));
    }
}
