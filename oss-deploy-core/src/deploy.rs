//! High-level pipeline: publishes a local directory to a bucket.
//!
//! For every file under the public directory the orchestrator
//!   - reads and fingerprints it (once),
//!   - probes the fingerprint stored at its remote key,
//!   - skips it when both match, otherwise resolves its cache policy and uploads it.
//!
//! Files are handled in sequential batches of `chunk_size`, concurrently within
//! a batch (see [`crate::upload::run_batches`]).
//!
//! # Error Handling
//! - A local file that cannot be read means the build output is broken: the
//!   current batch is allowed to settle, then the run stops with
//!   [`DeployError::LocalIo`].
//! - Failed uploads (and failed probes under `probeFailure: fail`) are recorded
//!   in the [`DeployReport`] and the remaining batches still run. Callers should
//!   check [`DeployReport::is_success`].
//!
//! # Navigation
//! - Main entrypoint: [`deploy`]
//! - Supporting types: [`DeployReport`], [`FailedFile`].

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::RunConfig;
use crate::contract::ObjectStore;
use crate::error::DeployError;
use crate::local::{enumerate_files, remote_key, LocalFile};
use crate::plan::{plan_file, Decision};
use crate::policy::resolve_policy;
use crate::upload::{run_batches, upload_file};

/// Summary of a run.
#[derive(Debug, Default, Serialize)]
pub struct DeployReport {
    /// Number of local files considered.
    pub considered: usize,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Serialize)]
pub struct FailedFile {
    pub relative_path: String,
    pub key: String,
    pub reason: String,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct FileOutcome {
    relative_path: String,
    key: String,
    result: Result<Decision, DeployError>,
}

async fn process_file<S>(config: &RunConfig, store: &S, file: &LocalFile) -> FileOutcome
where
    S: ObjectStore + ?Sized,
{
    let key = remote_key(&config.path_prefix, &file.relative_path);
    let result = sync_file(config, store, file, &key).await;
    FileOutcome {
        relative_path: file.relative_path.clone(),
        key,
        result,
    }
}

async fn sync_file<S>(
    config: &RunConfig,
    store: &S,
    file: &LocalFile,
    key: &str,
) -> Result<Decision, DeployError>
where
    S: ObjectStore + ?Sized,
{
    let content = file.read().await?;

    let decision = plan_file(store, key, &content.fingerprint, config.probe_failure).await?;
    if decision == Decision::Skip {
        info!(file = %file.relative_path, "[DEPLOY] not modified, skip");
        return Ok(decision);
    }

    info!(file = %file.relative_path, key, "[DEPLOY] uploading");
    let policy = resolve_policy(
        &file.relative_path,
        file.extension(),
        &config.stable_asset_exts,
        &config.rules,
    );
    upload_file(store, key, &content, &policy).await?;
    Ok(decision)
}

/// Deploys `config.public_dir` to the bucket behind `store`.
pub async fn deploy<S>(config: &RunConfig, store: &S) -> Result<DeployReport, DeployError>
where
    S: ObjectStore + ?Sized,
{
    info!(
        public_dir = %config.public_dir.display(),
        destination = %format!("oss://{}{}", config.storage.bucket, config.path_prefix),
        "[DEPLOY] Starting deploy"
    );

    let files = enumerate_files(&config.public_dir)?;

    let outcomes = run_batches(
        &files,
        config.chunk_size,
        |file| process_file(config, store, file),
        |outcome: &FileOutcome| matches!(&outcome.result, Err(e) if e.is_fatal()),
    )
    .await;

    let mut report = DeployReport {
        considered: files.len(),
        ..DeployReport::default()
    };

    for outcome in outcomes {
        match outcome.result {
            Ok(Decision::Skip) => report.skipped.push(outcome.relative_path),
            Ok(Decision::Upload) => report.uploaded.push(outcome.relative_path),
            Err(e) if e.is_fatal() => {
                error!(file = %outcome.relative_path, error = %e, "[DEPLOY][ERROR] Aborting deploy");
                return Err(e);
            }
            Err(e) => {
                error!(file = %outcome.relative_path, error = %e, "[DEPLOY][ERROR] File failed");
                report.failed.push(FailedFile {
                    relative_path: outcome.relative_path,
                    key: outcome.key,
                    reason: e.to_string(),
                });
            }
        }
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[DEPLOY][DEBUG] Report as JSON"),
        Err(e) => error!(error = ?e, "[DEPLOY][DEBUG] Failed to serialize report as JSON"),
    }

    info!(
        considered = report.considered,
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "[DEPLOY] Processed {} files",
        report.considered
    );

    Ok(report)
}
