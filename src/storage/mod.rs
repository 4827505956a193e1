//! Storage facade enforcing a per-call deadline over a pluggable backend.
//!
//! Get and Put stream through the caller's reader/writer; the whole
//! transfer runs under one timeout, and an elapsed deadline drops the
//! backend future so the paired archive codec unblocks instead of hanging.

pub mod backend;

pub use backend::{Backend, BackendKind, FileEntry, FilesystemBackend};

use crate::error::{CachetError, CachetResult};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

/// Default storage operation deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Storage {
    backend: Box<dyn Backend>,
    timeout: Duration,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Storage {
    pub fn new(backend: Box<dyn Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Stream the object at `key` into `dst`, returning the bytes copied.
    pub async fn get<W>(&self, key: &str, dst: &mut W) -> CachetResult<u64>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let transfer = async {
            let mut reader = self.backend.get(key).await?;
            tokio::io::copy(&mut reader, dst)
                .await
                .map_err(|e| CachetError::io(format!("stream object {key}"), e))
        };

        match timeout(self.timeout, transfer).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(err)) => Err(CachetError::BackendGet {
                path: key.to_string(),
                source: Box::new(err),
            }),
            Err(_) => Err(self.deadline("get", key)),
        }
    }

    /// Stream `src` into the object at `key`.
    pub async fn put<R>(&self, key: &str, src: &mut R) -> CachetResult<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        match timeout(self.timeout, self.backend.put(key, src)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(CachetError::BackendPut {
                path: key.to_string(),
                source: Box::new(err),
            }),
            Err(_) => Err(self.deadline("put", key)),
        }
    }

    /// List objects under `prefix`.
    pub async fn list(&self, prefix: &str) -> CachetResult<Vec<FileEntry>> {
        match timeout(self.timeout, self.backend.list(prefix)).await {
            Ok(Ok(entries)) => Ok(entries),
            Ok(Err(err)) => Err(CachetError::BackendList {
                prefix: prefix.to_string(),
                source: Box::new(err),
            }),
            Err(_) => Err(self.deadline("list", prefix)),
        }
    }

    /// Delete the object at `key`.
    pub async fn delete(&self, key: &str) -> CachetResult<()> {
        match timeout(self.timeout, self.backend.delete(key)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(CachetError::BackendDelete {
                path: key.to_string(),
                source: Box::new(err),
            }),
            Err(_) => Err(self.deadline("delete", key)),
        }
    }

    fn deadline(&self, operation: &'static str, path: &str) -> CachetError {
        CachetError::DeadlineExceeded {
            operation,
            path: path.to_string(),
            timeout_secs: self.timeout.as_secs(),
        }
    }
}
