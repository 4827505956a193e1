//! Rebuild: archive each mount and upload it to remote storage.

use crate::archive::Archiver;
use crate::cache::{bridge, finish, key_parts, remote_path, Collector};
use crate::error::{CachetError, CachetResult};
use crate::keygen::KeyChain;
use crate::storage::Storage;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub struct Rebuilder {
    storage: Arc<Storage>,
    archiver: Archiver,
    keys: Arc<KeyChain>,
    namespace: String,
    branch: String,
}

impl Rebuilder {
    pub fn new(
        storage: Arc<Storage>,
        archiver: Archiver,
        keys: Arc<KeyChain>,
        namespace: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            archiver,
            keys,
            namespace: namespace.into(),
            branch: branch.into(),
        }
    }

    /// Archive every mount and upload it under `namespace/key/mount`.
    ///
    /// One key is derived for the whole call. Unreachable mounts are
    /// reported without being attempted; every reachable mount is
    /// transferred concurrently and all failures are aggregated.
    pub async fn rebuild(&self, mounts: &[PathBuf]) -> CachetResult<()> {
        info!("rebuilding cache");
        let started = Instant::now();

        let key = self.keys.generate(&key_parts(mounts, &self.branch))?;

        let collector = Arc::new(Collector::default());
        let mut workers = JoinSet::new();

        for mount in mounts {
            // pre-flight: never spawn a transfer for a missing mount
            if let Err(err) = fs::metadata(mount) {
                collector.add(CachetError::MountUnreachable {
                    path: mount.clone(),
                    source: err,
                });
                continue;
            }

            let remote = remote_path(&self.namespace, &key, mount);
            info!(mount = %mount.display(), remote = %remote, "rebuilding cache for directory");

            let archiver = self.archiver.clone();
            let storage = Arc::clone(&self.storage);
            let collector = Arc::clone(&collector);
            let mount = mount.clone();

            workers.spawn(async move {
                let src = mount.clone();
                let dst = remote.clone();

                let outcome = bridge::upload(
                    move |pipe| archiver.create(&[src], pipe),
                    move |mut pipe| async move { storage.put(&dst, &mut pipe).await },
                )
                .await;

                match outcome {
                    Ok(bytes) => {
                        debug!(mount = %mount.display(), remote = %remote, bytes, "archive uploaded");
                    }
                    Err(err) => collector.add(CachetError::MountUpload {
                        mount,
                        remote,
                        source: Box::new(err),
                    }),
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                collector.add(CachetError::Internal(format!("mount worker failed: {err}")));
            }
        }

        finish(collector)?;
        info!(took = ?started.elapsed(), "cache built");
        Ok(())
    }
}
