//! Batch uploader.
//!
//! Work is cut into fixed-size batches. Every task of a batch is polled
//! concurrently and the batch settles only when all of them have finished,
//! successfully or not; the next batch starts after that. A failing task never
//! cancels its siblings.

use futures::future::join_all;
use std::future::Future;
use tracing::{debug, error, info, warn};

use crate::contract::{ObjectStore, PutObject};
use crate::error::DeployError;
use crate::local::FileContent;
use crate::policy::CachePolicy;

/// Uploads one file's content to `key` with `policy` attached.
pub async fn upload_file<S>(
    store: &S,
    key: &str,
    content: &FileContent,
    policy: &CachePolicy,
) -> Result<(), DeployError>
where
    S: ObjectStore + ?Sized,
{
    let req = PutObject {
        key,
        body: &content.bytes,
        headers: policy,
        fingerprint: &content.fingerprint,
    };
    match store.put(req).await {
        Ok(()) => {
            debug!(key, size = content.bytes.len(), "Upload succeeded");
            Ok(())
        }
        Err(source) => {
            error!(key, error = %source, "Upload failed");
            Err(DeployError::RemoteUpload {
                key: key.to_string(),
                source,
            })
        }
    }
}

/// Runs `task` over `items` in sequential batches of `chunk_size`.
///
/// Results come back in input order. Once a batch produces a result for which
/// `is_fatal` holds, the remaining batches are not started.
pub async fn run_batches<'a, T, R, F, Fut>(
    items: &'a [T],
    chunk_size: usize,
    mut task: F,
    is_fatal: impl Fn(&R) -> bool,
) -> Vec<R>
where
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = R>,
{
    let chunk_size = chunk_size.max(1);
    let batch_count = items.len().div_ceil(chunk_size);
    let mut results = Vec::with_capacity(items.len());

    for (index, batch) in items.chunks(chunk_size).enumerate() {
        info!(batch = index + 1, of = batch_count, size = batch.len(), "Starting batch");
        let outcomes = join_all(batch.iter().map(&mut task)).await;
        let fatal = outcomes.iter().any(&is_fatal);
        results.extend(outcomes);
        if fatal {
            warn!(
                batch = index + 1,
                remaining = batch_count - index - 1,
                "Fatal error in batch, not starting remaining batches"
            );
            break;
        }
    }

    results
}
