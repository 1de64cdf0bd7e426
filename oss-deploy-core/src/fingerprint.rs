//! Content fingerprints: base64 encoded MD5 of a file's bytes.
//!
//! The encoding matches an HTTP `Content-MD5` header, so the same value is sent
//! as the upload integrity header and stored as object metadata.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(content: &[u8]) -> Self {
        let digest = md5::compute(content);
        Fingerprint(STANDARD.encode(digest.0))
    }

    /// Wraps a fingerprint previously stored on a remote object.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Fingerprint(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the whole file once and fingerprints it. The bytes are handed back
/// so the same read can be uploaded.
pub async fn fingerprint_file(path: &Path) -> std::io::Result<(Fingerprint, Vec<u8>)> {
    let content = tokio::fs::read(path).await?;
    Ok((Fingerprint::of(&content), content))
}
