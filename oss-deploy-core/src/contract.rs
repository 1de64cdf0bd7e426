//! # contract: the storage capability consumed by the deploy engine
//!
//! The engine only ever needs two things from a bucket: a metadata-only lookup
//! of a key and a whole-object write. [`ObjectStore`] captures exactly that, so
//! the planner and uploader run unchanged against a real S3/OSS client, a
//! `mockall` mock or an in-memory fake.
//!
//! ## Mocking & Testing
//! - With the `test-export-mocks` feature (on by default) the trait is annotated
//!   with `automock`, exporting `MockObjectStore` to dependents and tests.
//!
//! ## Implementing a backend
//! - `head` on a missing key should return `ObjectHead::missing()` or
//!   `StoreError::NotFound`; both are treated as "absent" by the prober.
//! - `put` must persist `fingerprint` so that a later `head` returns it.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::StoreError;
use crate::fingerprint::Fingerprint;
use crate::policy::CachePolicy;

/// Result of a metadata-only request against a key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectHead {
    pub exists: bool,
    /// Fingerprint stored on the object at upload time, if any.
    pub fingerprint: Option<String>,
}

impl ObjectHead {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn found(fingerprint: Option<String>) -> Self {
        ObjectHead {
            exists: true,
            fingerprint,
        }
    }
}

/// A whole-object upload.
#[derive(Debug)]
pub struct PutObject<'a> {
    /// Remote key, `pathPrefix` joined with the relative path.
    pub key: &'a str,
    pub body: &'a [u8],
    /// Headers to attach, Cache-Control baseline plus rule overrides.
    pub headers: &'a CachePolicy,
    /// Content fingerprint, sent as `Content-MD5` and stored as metadata.
    pub fingerprint: &'a Fingerprint,
}

/// Trait for the two bucket operations the deploy engine relies on.
///
/// The trait is `Send` + `Sync` and intended for async/await usage; a single
/// store is shared by every concurrent upload of a batch.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the metadata of an object without transferring its body.
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError>;

    /// Write an object, replacing any existing object at the same key.
    async fn put<'a>(&self, req: PutObject<'a>) -> Result<(), StoreError>;
}
