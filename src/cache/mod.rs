//! Cache orchestration: rebuild, restore, and flush over a set of mounts.
//!
//! Each orchestrator derives one key per call, drives one streaming
//! transfer per mount concurrently, and aggregates per-mount failures so
//! that no mount's outcome hides another's.

pub mod bridge;
mod flusher;
mod rebuilder;
mod restorer;

pub use flusher::Flusher;
pub use rebuilder::Rebuilder;
pub use restorer::Restorer;

use crate::error::{CachetError, CachetResult, MultiError};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Remote object path for one mount: `namespace/key/mount`, normalized to
/// forward slashes with leading `/` and `./` stripped.
pub fn remote_path(namespace: &str, key: &str, mount: &Path) -> String {
    let mount = mount.to_string_lossy().replace('\\', "/");
    let mount = mount
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/');

    [namespace, key, mount]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// Key material for one orchestrator call: every mount path plus the
/// branch, so rebuild and restore with the same configuration derive the
/// same key.
pub(crate) fn key_parts(mounts: &[std::path::PathBuf], branch: &str) -> Vec<String> {
    let mut parts: Vec<String> = mounts
        .iter()
        .map(|mount| mount.to_string_lossy().into_owned())
        .collect();
    parts.push(branch.to_string());
    parts
}

/// Thread-safe failure collector shared by the per-mount workers.
///
/// Workers add their failure before finishing; the orchestrator drains the
/// collector only after the join barrier.
#[derive(Debug, Default)]
pub struct Collector {
    failures: Mutex<MultiError>,
}

impl Collector {
    pub fn add(&self, err: CachetError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    fn into_result(self) -> Result<(), MultiError> {
        let failures = self
            .failures
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

/// Drain the collector once every worker has been joined.
pub(crate) fn finish(collector: Arc<Collector>) -> CachetResult<()> {
    match Arc::into_inner(collector) {
        Some(collector) => collector.into_result().map_err(CachetError::MountAggregate),
        None => Err(CachetError::Internal(
            "failure collector still shared after join".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn remote_path_joins_and_normalizes() {
        assert_eq!(
            remote_path("acme/rocket", "abc123", Path::new("./node_modules")),
            "acme/rocket/abc123/node_modules"
        );
        assert_eq!(
            remote_path("repo", "key", Path::new("/var/cache/deps/")),
            "repo/key/var/cache/deps"
        );
        assert_eq!(remote_path("", "key", Path::new("deps")), "key/deps");
    }

    #[test]
    fn key_parts_include_branch_last() {
        let mounts = vec![PathBuf::from("a"), PathBuf::from("b")];
        assert_eq!(key_parts(&mounts, "dev"), vec!["a", "b", "dev"]);
    }

    #[test]
    fn collector_aggregates_every_failure() {
        let collector = Arc::new(Collector::default());

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    collector.add(CachetError::Internal(format!("worker {i}")));
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let err = finish(collector).unwrap_err();
        let CachetError::MountAggregate(multi) = err else {
            panic!("expected aggregate");
        };
        assert_eq!(multi.len(), 4);
    }

    #[test]
    fn empty_collector_is_success() {
        let collector = Arc::new(Collector::default());
        assert!(finish(collector).is_ok());
    }
}
