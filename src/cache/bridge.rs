//! Producer/consumer pipe between the archive codec and the storage facade.
//!
//! One bounded in-memory duplex pipe connects the blocking codec side
//! (running on the blocking pool) to the async storage side. Backpressure
//! from the slower side throttles the faster one; at most one pipe buffer
//! of archive bytes is ever held in memory. Both sides are joined before
//! returning, and dropping either end on failure unblocks the other: a
//! dead reader turns writes into broken pipes, a dead writer turns reads
//! into EOF.

use crate::error::{CachetError, CachetResult};
use std::future::Future;
use tokio::io::DuplexStream;
use tokio::task;
use tokio_util::io::SyncIoBridge;

/// Upper bound on archive bytes buffered in memory per transfer.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Drive `codec` (producing archive bytes into its pipe end) into
/// `storage` (consuming them, e.g. a put). Returns the codec's content
/// byte count.
pub async fn upload<P, C, Fut>(codec: P, storage: C) -> CachetResult<u64>
where
    P: FnOnce(SyncIoBridge<DuplexStream>) -> CachetResult<u64> + Send + 'static,
    C: FnOnce(DuplexStream) -> Fut,
    Fut: Future<Output = CachetResult<()>>,
{
    let (codec_end, storage_end) = tokio::io::duplex(PIPE_CAPACITY);
    let pipe = SyncIoBridge::new(codec_end);

    let producer = task::spawn_blocking(move || codec(pipe));
    let consumed = storage(storage_end).await;
    let produced = join_codec(producer).await;

    settle(produced, consumed).map(|(bytes, ())| bytes)
}

/// Mirror image: `storage` produces (e.g. a get), `codec` consumes (an
/// extract). Returns the codec's content byte count.
pub async fn download<S, Fut, C>(storage: S, codec: C) -> CachetResult<u64>
where
    S: FnOnce(DuplexStream) -> Fut,
    Fut: Future<Output = CachetResult<u64>>,
    C: FnOnce(SyncIoBridge<DuplexStream>) -> CachetResult<u64> + Send + 'static,
{
    let (codec_end, storage_end) = tokio::io::duplex(PIPE_CAPACITY);
    let pipe = SyncIoBridge::new(codec_end);

    let consumer = task::spawn_blocking(move || codec(pipe));
    let produced = storage(storage_end).await;
    let consumed = join_codec(consumer).await;

    settle(produced, consumed).map(|(_, bytes)| bytes)
}

async fn join_codec(handle: task::JoinHandle<CachetResult<u64>>) -> CachetResult<u64> {
    handle
        .await
        .unwrap_or_else(|e| Err(CachetError::Internal(format!("archive task failed: {e}"))))
}

/// Resolve the pair of outcomes: the consumer's error wins when both
/// sides failed, and a lone producer failure is never masked by the
/// consumer's clean EOF.
fn settle<P, C>(produced: CachetResult<P>, consumed: CachetResult<C>) -> CachetResult<(P, C)> {
    match (produced, consumed) {
        (Ok(p), Ok(c)) => Ok((p, c)),
        (_, Err(err)) => Err(err),
        (Err(err), _) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn copy_error(e: std::io::Error) -> CachetError {
        CachetError::io("pipe", e)
    }

    #[tokio::test]
    async fn bytes_flow_producer_to_consumer() {
        let payload = vec![7u8; 1 << 20]; // 16x the pipe capacity
        let expected = payload.clone();

        let count = upload(
            move |mut pipe| {
                pipe.write_all(&payload).map_err(copy_error)?;
                Ok(payload.len() as u64)
            },
            |mut pipe| async move {
                let mut received = Vec::new();
                pipe.read_to_end(&mut received)
                    .await
                    .map_err(copy_error)?;
                assert_eq!(received, expected);
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(count, 1 << 20);
    }

    #[tokio::test]
    async fn early_consumer_failure_unblocks_producer() {
        // the consumer drops its end immediately; the producer's writes
        // must start failing instead of blocking forever
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            upload(
                |mut pipe| {
                    let chunk = [0u8; 8192];
                    loop {
                        if pipe.write_all(&chunk).is_err() {
                            return Ok(0);
                        }
                    }
                },
                |pipe| async move {
                    drop(pipe);
                    Err(CachetError::Internal("upload refused".to_string()))
                },
            ),
        )
        .await
        .expect("bridge must not deadlock");

        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("upload refused"));
    }

    #[tokio::test]
    async fn producer_failure_not_masked_by_clean_eof() {
        // a failed producer that wrote nothing leaves the consumer with a
        // clean EOF; the bridge must still report the producer's error
        let err = download(
            |pipe| async move {
                drop(pipe);
                Err(CachetError::Internal("object not found".to_string()))
            },
            |mut pipe| {
                let mut sink = Vec::new();
                pipe.read_to_end(&mut sink).map_err(copy_error)?;
                Ok(0)
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("object not found"));
    }

    #[tokio::test]
    async fn consumer_error_preferred_when_both_fail() {
        let err = upload(
            |pipe| {
                drop(pipe);
                Err(CachetError::Internal("producer broke".to_string()))
            },
            |pipe| async move {
                drop(pipe);
                Err(CachetError::Internal("consumer broke".to_string()))
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("consumer broke"));
    }
}
