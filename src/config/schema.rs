//! Configuration schema for cachet
//!
//! Configuration is stored at `~/.config/cachet/config.toml`, optionally
//! overridden by a project-local `.cachet.toml`. CLI flags win over both.

use crate::archive::{ArchiveFormat, DEFAULT_COMPRESSION_LEVEL};
use crate::storage::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transfer defaults
    pub defaults: DefaultsConfig,

    /// Filesystem backend settings
    pub filesystem: FilesystemConfig,

    /// AWS S3 backend settings
    pub s3: S3Config,

    /// Azure Blob backend settings
    pub azure: AzureConfig,

    /// Google Cloud Storage backend settings
    pub gcs: GcsConfig,

    /// SFTP backend settings
    pub sftp: SftpConfig,
}

/// Defaults applied when the matching CLI flag is absent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Storage backend to use
    pub backend: BackendKind,

    /// Archive format: "tar" or "gzip"
    pub archive_format: ArchiveFormat,

    /// Gzip compression level (0-9)
    pub compression_level: u32,

    /// Leave symbolic links out of archives
    pub skip_symlinks: bool,

    /// Storage operation deadline in seconds
    pub timeout_secs: u64,

    /// Exit nonzero on recognized cache failures
    pub fail_on_error: bool,

    /// Remote namespace, defaults to the repository name
    pub namespace: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Filesystem,
            archive_format: ArchiveFormat::Tar,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            skip_symlinks: false,
            timeout_secs: 30,
            fail_on_error: false,
            namespace: None,
        }
    }
}

/// Filesystem backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    /// Directory that holds the cached objects
    pub root: PathBuf,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/tmp/cachet"),
        }
    }
}

/// AWS S3 backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket name
    pub bucket: Option<String>,

    /// AWS region
    pub region: Option<String>,

    /// Custom endpoint (for S3-compatible stores)
    pub endpoint: Option<String>,

    /// Access key id
    pub access_key: Option<String>,

    /// Secret access key
    pub secret_key: Option<String>,

    /// Use path-style addressing
    pub path_style: bool,
}

/// Azure Blob backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Storage account name
    pub account_name: Option<String>,

    /// Storage account key
    pub account_key: Option<String>,

    /// Blob container
    pub container: Option<String>,
}

/// Google Cloud Storage backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    /// Bucket name
    pub bucket: Option<String>,

    /// Custom endpoint
    pub endpoint: Option<String>,

    /// API key
    pub api_key: Option<String>,
}

/// SFTP backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SftpConfig {
    /// Remote host
    pub host: Option<String>,

    /// Remote port
    pub port: u16,

    /// Username
    pub username: Option<String>,

    /// Password
    pub password: Option<String>,

    /// Remote cache root directory
    pub root: Option<String>,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 22,
            username: None,
            password: None,
            root: None,
        }
    }
}
