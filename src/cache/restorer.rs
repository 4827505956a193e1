//! Restore: download each mount's archive and expand it in place.

use crate::archive::Archiver;
use crate::cache::{bridge, finish, key_parts, remote_path, Collector};
use crate::error::{CachetError, CachetResult};
use crate::keygen::KeyChain;
use crate::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub struct Restorer {
    storage: Arc<Storage>,
    archiver: Archiver,
    keys: Arc<KeyChain>,
    namespace: String,
    branch: String,
}

impl Restorer {
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

    /// Download and expand every mount's archive concurrently.
    ///
    /// A missing remote object fails only its own mount; destinations are
    /// created as needed.
    pub async fn restore(&self, mounts: &[PathBuf]) -> CachetResult<()> {
        info!("restoring cache");
        let started = Instant::now();

        let key = self.keys.generate(&key_parts(mounts, &self.branch))?;

        let collector = Arc::new(Collector::default());
        let mut workers = JoinSet::new();

        for mount in mounts {
            let remote = remote_path(&self.namespace, &key, mount);
            info!(mount = %mount.display(), remote = %remote, "restoring directory");

            let archiver = self.archiver.clone();
            let storage = Arc::clone(&self.storage);
            let collector = Arc::clone(&collector);
            let mount = mount.clone();

            workers.spawn(async move {
                let src = remote.clone();
                let dst = mount.clone();

                let outcome = bridge::download(
                    move |mut pipe| async move { storage.get(&src, &mut pipe).await },
                    move |pipe| archiver.extract(&dst, pipe),
                )
                .await;

                match outcome {
                    Ok(bytes) => {
                        debug!(mount = %mount.display(), remote = %remote, bytes, "archive extracted");
                    }
                    Err(err) => collector.add(CachetError::MountDownload {
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
        info!(took = ?started.elapsed(), "cache restored");
        Ok(())
    }
}
