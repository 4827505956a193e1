//! Error types for cachet
//!
//! All modules use `CachetResult<T>` as their return type.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cachet operations
pub type CachetResult<T> = Result<T, CachetError>;

/// All errors that can occur in cachet
#[derive(Error, Debug)]
pub enum CachetError {
    // Archive creation errors
    #[error("source not reachable: {path}")]
    SourceUnreachable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build archive header for {path}")]
    HeaderBuild {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {path} into archive")]
    ContentCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Archive extraction errors
    #[error("archive not readable")]
    ArchiveNotReadable {
        #[source]
        source: std::io::Error,
    },

    #[error("compressed archive header invalid, expected a gzip stream")]
    CompressionHeaderInvalid,

    // Storage errors
    #[error("get {path} from storage backend failed")]
    BackendGet {
        path: String,
        #[source]
        source: Box<CachetError>,
    },

    #[error("put {path} to storage backend failed")]
    BackendPut {
        path: String,
        #[source]
        source: Box<CachetError>,
    },

    #[error("list {prefix} on storage backend failed")]
    BackendList {
        prefix: String,
        #[source]
        source: Box<CachetError>,
    },

    #[error("delete {path} on storage backend failed")]
    BackendDelete {
        path: String,
        #[source]
        source: Box<CachetError>,
    },

    #[error("storage {operation} for {path} exceeded the {timeout_secs}s deadline")]
    DeadlineExceeded {
        operation: &'static str,
        path: String,
        timeout_secs: u64,
    },

    #[error("storage backend '{0}' support is not compiled into this build")]
    BackendUnsupported(&'static str),

    // Cache key errors
    #[error("invalid cache key template: {reason}")]
    KeyTemplateInvalid { reason: String },

    // Orchestration errors
    #[error("mount {path} does not exist or is not readable")]
    MountUnreachable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload from {mount} to {remote} failed")]
    MountUpload {
        mount: PathBuf,
        remote: String,
        #[source]
        source: Box<CachetError>,
    },

    #[error("download from {remote} to {mount} failed")]
    MountDownload {
        mount: PathBuf,
        remote: String,
        #[source]
        source: Box<CachetError>,
    },

    #[error(transparent)]
    MountAggregate(#[from] MultiError),

    // Configuration errors
    #[error("invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("failed to create config directory {path}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl CachetError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this is a recognized cache failure.
    ///
    /// Recognized failures (a missing cache generation, an unreachable
    /// mount, a storage hiccup during a transfer) must not break the build
    /// unless the user opted into strict exit codes. Configuration and
    /// setup mistakes are never recognized.
    pub fn is_recognized(&self) -> bool {
        matches!(
            self,
            Self::MountAggregate(_)
                | Self::BackendGet { .. }
                | Self::BackendPut { .. }
                | Self::BackendList { .. }
                | Self::BackendDelete { .. }
                | Self::DeadlineExceeded { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BackendUnsupported(_) => Some("Use --backend filesystem"),
            Self::ConfigInvalid { .. } => Some("Check the TOML syntax of the config file"),
            Self::KeyTemplateInvalid { .. } => {
                Some("Check the --cache-key template, e.g. \"{{ repo.name }}-{{ commit.branch }}\"")
            }
            _ => None,
        }
    }
}

/// Aggregate of independent per-mount transfer failures.
///
/// Every worker reports into this before the orchestrator's join barrier,
/// so a single mount's failure never hides another's.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<CachetError>,
}

impl MultiError {
    pub fn push(&mut self, err: CachetError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[CachetError] {
        &self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mount transfer(s) failed", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(path: &str) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string())
    }

    #[test]
    fn error_display() {
        let err = CachetError::SourceUnreachable {
            path: PathBuf::from("/work/node_modules"),
            source: not_found("/work/node_modules"),
        };
        assert!(err.to_string().contains("source not reachable"));
        assert!(err.to_string().contains("/work/node_modules"));
    }

    #[test]
    fn error_hint() {
        let err = CachetError::BackendUnsupported("s3");
        assert_eq!(err.hint(), Some("Use --backend filesystem"));
    }

    #[test]
    fn error_recognized() {
        let aggregate = CachetError::MountAggregate(MultiError::default());
        assert!(aggregate.is_recognized());

        let config = CachetError::ConfigInvalid {
            path: PathBuf::from("config.toml"),
            reason: "bad".to_string(),
        };
        assert!(!config.is_recognized());
    }

    #[test]
    fn multi_error_display_lists_all() {
        let mut multi = MultiError::default();
        multi.push(CachetError::MountUnreachable {
            path: PathBuf::from("./missing"),
            source: not_found("./missing"),
        });
        multi.push(CachetError::Internal("boom".to_string()));

        let rendered = multi.to_string();
        assert!(rendered.starts_with("2 mount transfer(s) failed"));
        assert!(rendered.contains("./missing"));
        assert!(rendered.contains("boom"));
    }
}
