//! Local filesystem backend.
//!
//! Stores objects as plain files under a configured root. Mainly useful
//! for self-hosted runners with a shared volume, and for tests.

use crate::error::{CachetError, CachetResult};
use crate::storage::backend::{Backend, FileEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use walkdir::WalkDir;

pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl Backend for FilesystemBackend {
    async fn get(&self, key: &str) -> CachetResult<Box<dyn AsyncRead + Send + Unpin>> {
        let path = self.object_path(key);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| CachetError::io(format!("open cached object {}", path.display()), e))?;
        Ok(Box::new(file))
    }

    async fn put(&self, key: &str, src: &mut (dyn AsyncRead + Send + Unpin)) -> CachetResult<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CachetError::io(format!("create {}", parent.display()), e))?;
        }

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| CachetError::io(format!("create cached object {}", path.display()), e))?;

        tokio::io::copy(src, &mut file)
            .await
            .map_err(|e| CachetError::io(format!("write cached object {}", path.display()), e))?;

        file.flush()
            .await
            .map_err(|e| CachetError::io(format!("flush cached object {}", path.display()), e))?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> CachetResult<Vec<FileEntry>> {
        let root = self.root.clone();
        let base = self.object_path(prefix);

        // walkdir is blocking; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();

            if !base.exists() {
                return Ok(entries);
            }

            for entry in WalkDir::new(&base).follow_links(false) {
                let entry = entry.map_err(|e| {
                    CachetError::io(
                        format!("walk cached objects under {}", base.display()),
                        e.into_io_error()
                            .unwrap_or_else(|| io::Error::other("filesystem walk failed")),
                    )
                })?;

                if !entry.file_type().is_file() {
                    continue;
                }

                let meta = entry.metadata().map_err(|e| {
                    CachetError::io(
                        format!("stat cached object {}", entry.path().display()),
                        e.into_io_error()
                            .unwrap_or_else(|| io::Error::other("stat failed")),
                    )
                })?;

                let path = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .into_owned();

                let last_modified = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                entries.push(FileEntry {
                    path,
                    size: meta.len(),
                    last_modified,
                });
            }

            Ok(entries)
        })
        .await
        .map_err(|e| CachetError::Internal(format!("list task failed: {e}")))?
    }

    async fn delete(&self, key: &str) -> CachetResult<()> {
        let path = self.object_path(key);
        fs::remove_file(&path)
            .await
            .map_err(|e| CachetError::io(format!("remove cached object {}", path.display()), e))
    }
}
