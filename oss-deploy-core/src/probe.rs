use tracing::debug;

use crate::contract::ObjectStore;
use crate::error::StoreError;
use crate::fingerprint::Fingerprint;

/// Looks up the fingerprint stored on `key`.
///
/// A missing object is the normal state for a first deploy or a new file, so
/// it yields `Ok(None)` whether the backend reports it through
/// `ObjectHead::exists` or through `StoreError::NotFound`. Any other backend
/// failure is returned to the caller.
pub async fn probe_remote_fingerprint<S>(
    store: &S,
    key: &str,
) -> Result<Option<Fingerprint>, StoreError>
where
    S: ObjectStore + ?Sized,
{
    match store.head(key).await {
        Ok(head) if head.exists => {
            if head.fingerprint.is_none() {
                debug!(key, "remote object has no stored fingerprint");
            }
            Ok(head.fingerprint.map(Fingerprint::from_stored))
        }
        Ok(_) | Err(StoreError::NotFound(_)) => {
            debug!(key, "remote object not found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
