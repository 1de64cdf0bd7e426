//! Local file enumeration and remote key addressing.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::DeployError;
use crate::fingerprint::{fingerprint_file, Fingerprint};
use crate::policy::extension_of;

/// A file under the public directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path relative to the public directory, always `/` separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
}

/// Content of a [`LocalFile`], read once and fingerprinted.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub bytes: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl LocalFile {
    pub fn new(public_dir: &Path, relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        let absolute_path = relative_path
            .split('/')
            .fold(public_dir.to_path_buf(), |acc, seg| acc.join(seg));
        LocalFile {
            relative_path,
            absolute_path,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.relative_path)
    }

    pub async fn read(&self) -> Result<FileContent, DeployError> {
        let (fingerprint, bytes) = fingerprint_file(&self.absolute_path)
            .await
            .map_err(|source| DeployError::LocalIo {
                path: self.absolute_path.clone(),
                source,
            })?;
        Ok(FileContent { bytes, fingerprint })
    }
}

/// Remote key for a relative path: a plain string join, no normalisation.
pub fn remote_key(path_prefix: &str, relative_path: &str) -> String {
    format!("{path_prefix}{relative_path}")
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Recursively lists every regular file under `public_dir`, sorted by relative path.
///
/// Directories are descended into but not listed. Symlinks to files are
/// listed, symlinks to directories are skipped. Entries whose name starts
/// with a dot are skipped, together with everything below them.
pub fn enumerate_files(public_dir: &Path) -> Result<Vec<LocalFile>, DeployError> {
    fn visit_dir(
        dir: &Path,
        public_dir: &Path,
        results: &mut Vec<LocalFile>,
    ) -> Result<(), DeployError> {
        let listing_error = |source| DeployError::Listing {
            path: dir.to_path_buf(),
            source,
        };
        for entry_res in std::fs::read_dir(dir).map_err(listing_error)? {
            let entry = entry_res.map_err(listing_error)?;
            let path = entry.path();
            let file_name = entry.file_name();
            if is_hidden(&file_name.to_string_lossy()) {
                debug!(path = %path.display(), "Skipping hidden entry");
                continue;
            }
            // file_type() does not follow symlinks
            let file_type = entry.file_type().map_err(listing_error)?;
            let is_file = if file_type.is_symlink() {
                // linked files are published, linked directories are not walked
                let linked_file = path.is_file();
                if !linked_file {
                    debug!(path = %path.display(), "Skipping symlink that is not a file");
                }
                linked_file
            } else {
                file_type.is_file()
            };
            if file_type.is_dir() {
                visit_dir(&path, public_dir, results)?;
            } else if is_file {
                let Ok(rel_path) = path.strip_prefix(public_dir) else {
                    continue;
                };
                let relative_path = rel_path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                results.push(LocalFile {
                    relative_path,
                    absolute_path: path,
                });
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(public_dir, public_dir, &mut files)?;
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    info!(
        public_dir = %public_dir.display(),
        count = files.len(),
        "Enumerated local files"
    );
    Ok(files)
}
