//! Diff planning: decide per file whether the bucket already has its content.

use tracing::{debug, warn};

use crate::config::ProbeFailurePolicy;
use crate::contract::ObjectStore;
use crate::error::DeployError;
use crate::fingerprint::Fingerprint;
use crate::probe::probe_remote_fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Upload,
}

/// Compares `local` with the fingerprint stored at `key`.
///
/// Only an exact match of both encoded fingerprints skips the upload. A failed
/// probe uploads again under [`ProbeFailurePolicy::Reupload`] and is an error
/// under [`ProbeFailurePolicy::Fail`].
pub async fn plan_file<S>(
    store: &S,
    key: &str,
    local: &Fingerprint,
    probe_failure: ProbeFailurePolicy,
) -> Result<Decision, DeployError>
where
    S: ObjectStore + ?Sized,
{
    let remote = match probe_remote_fingerprint(store, key).await {
        Ok(remote) => remote,
        Err(source) => match probe_failure {
            ProbeFailurePolicy::Reupload => {
                warn!(key, error = %source, "Remote probe failed, uploading anyway");
                None
            }
            ProbeFailurePolicy::Fail => {
                return Err(DeployError::RemoteProbe {
                    key: key.to_string(),
                    source,
                })
            }
        },
    };

    let decision = match remote {
        Some(remote) if remote == *local => Decision::Skip,
        _ => Decision::Upload,
    };
    debug!(key, local = %local, ?decision, "Planned file");
    Ok(decision)
}
