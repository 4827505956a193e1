//! Pluggable storage backends behind a uniform get/put contract.
//!
//! Backends are selected by a string identifier and constructed from the
//! per-provider configuration sections. Implementations must be safe for
//! concurrent use: the orchestrator reuses one backend across all mount
//! transfers.

pub mod filesystem;

pub use filesystem::FilesystemBackend;

use crate::config::Config;
use crate::error::CachetResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncRead;

/// A single remote cache object, as reported by `list`.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// The closed set of storage providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Filesystem,
    S3,
    Azure,
    Gcs,
    Sftp,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::S3 => "s3",
            Self::Azure => "azure",
            Self::Gcs => "gcs",
            Self::Sftp => "sftp",
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Filesystem
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage operations every provider implements.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open a streaming reader for the object at `key`.
    async fn get(&self, key: &str) -> CachetResult<Box<dyn AsyncRead + Send + Unpin>>;

    /// Stream `src` into the object at `key`.
    async fn put(&self, key: &str, src: &mut (dyn AsyncRead + Send + Unpin)) -> CachetResult<()>;

    /// List objects under `prefix`.
    async fn list(&self, prefix: &str) -> CachetResult<Vec<FileEntry>>;

    /// Delete the object at `key`.
    async fn delete(&self, key: &str) -> CachetResult<()>;
}

/// Construct the backend selected by `kind` from its configuration section.
///
/// The cloud and sftp wire protocols live behind this seam; this build
/// ships the filesystem provider.
pub fn from_config(kind: BackendKind, config: &Config) -> CachetResult<Box<dyn Backend>> {
    use crate::error::CachetError;

    match kind {
        BackendKind::Filesystem => Ok(Box::new(FilesystemBackend::new(
            config.filesystem.root.clone(),
        ))),
        BackendKind::S3 => Err(CachetError::BackendUnsupported("s3")),
        BackendKind::Azure => Err(CachetError::BackendUnsupported("azure")),
        BackendKind::Gcs => Err(CachetError::BackendUnsupported("gcs")),
        BackendKind::Sftp => Err(CachetError::BackendUnsupported("sftp")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CachetError;

    #[test]
    fn kind_as_str() {
        assert_eq!(BackendKind::Filesystem.as_str(), "filesystem");
        assert_eq!(BackendKind::S3.as_str(), "s3");
        assert_eq!(BackendKind::Gcs.to_string(), "gcs");
    }

    #[test]
    fn filesystem_constructs() {
        let config = Config::default();
        assert!(from_config(BackendKind::Filesystem, &config).is_ok());
    }

    #[test]
    fn cloud_backends_report_unsupported() {
        let config = Config::default();
        for kind in [BackendKind::S3, BackendKind::Azure, BackendKind::Gcs, BackendKind::Sftp] {
            let err = from_config(kind, &config).err().unwrap();
            assert!(matches!(err, CachetError::BackendUnsupported(_)));
        }
    }
}
