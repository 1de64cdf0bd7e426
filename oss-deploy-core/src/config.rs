//! Run configuration.
//!
//! [`RunSettings`] is the plain, serde-friendly shape handed over by whatever
//! loads configuration (the CLI merges env, file and flags into it). It is
//! turned into a [`RunConfig`] by [`RunConfig::try_from`], which applies every
//! check up front and compiles the rule patterns, so a deploy never starts
//! with a configuration it cannot honour.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::policy::Rule;

pub const DEFAULT_PUBLIC_DIR: &str = "dist";
pub const DEFAULT_PATH_PREFIX: &str = "/";
pub const DEFAULT_STABLE_ASSET_EXTS: [&str; 6] = ["jpg", "png", "gif", "ico", "js", "css"];
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// What to do when a remote probe fails for a reason other than not-found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeFailurePolicy {
    /// Treat the object as absent and upload it again.
    #[default]
    Reupload,
    /// Record the file as failed without uploading it.
    Fail,
}

/// A rule as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    /// Overrides the endpoint derived from the region.
    pub endpoint: Option<String>,
}

/// Unvalidated settings with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    pub public_dir: PathBuf,
    pub path_prefix: String,
    pub stable_asset_exts: Vec<String>,
    pub chunk_size: usize,
    pub rules: Vec<RuleSpec>,
    pub storage: StorageSettings,
    pub probe_failure: ProbeFailurePolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            stable_asset_exts: DEFAULT_STABLE_ASSET_EXTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            rules: Vec::new(),
            storage: StorageSettings::default(),
            probe_failure: ProbeFailurePolicy::default(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub endpoint: Option<String>,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Validated configuration for a single deploy run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub public_dir: PathBuf,
    pub path_prefix: String,
    pub stable_asset_exts: Vec<String>,
    pub chunk_size: usize,
    pub rules: Vec<Rule>,
    pub storage: StorageCredentials,
    pub probe_failure: ProbeFailurePolicy,
}

impl RunConfig {
    pub fn trace_loaded(&self) {
        info!(
            public_dir = %self.public_dir.display(),
            path_prefix = %self.path_prefix,
            bucket = %self.storage.bucket,
            chunk_size = self.chunk_size,
            rules_count = self.rules.len(),
            "Loaded RunConfig"
        );
        debug!(config = ?self, "RunConfig loaded (full debug)");
    }
}

/// `^/.*/$`, with the bare root `/` accepted as well.
fn is_valid_path_prefix(prefix: &str) -> bool {
    prefix.starts_with('/') && prefix.ends_with('/') && !prefix.contains('\n')
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingStorageField(field)),
    }
}

impl TryFrom<RunSettings> for RunConfig {
    type Error = ConfigError;

    fn try_from(settings: RunSettings) -> Result<Self, Self::Error> {
        let storage = StorageCredentials {
            region: required(settings.storage.region, "region")?,
            bucket: required(settings.storage.bucket, "bucket")?,
            access_key_id: required(settings.storage.access_key_id, "accessKeyId")?,
            access_key_secret: required(settings.storage.access_key_secret, "accessKeySecret")?,
            endpoint: settings.storage.endpoint.filter(|e| !e.trim().is_empty()),
        };

        if !is_valid_path_prefix(&settings.path_prefix) {
            return Err(ConfigError::InvalidPathPrefix(settings.path_prefix));
        }

        if settings.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }

        let rules = settings
            .rules
            .iter()
            .enumerate()
            .map(|(i, spec)| Rule::compile(i, &spec.pattern, &spec.headers))
            .collect::<Result<Vec<_>, _>>()?;

        let stable_asset_exts = settings
            .stable_asset_exts
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(RunConfig {
            public_dir: settings.public_dir,
            path_prefix: settings.path_prefix,
            stable_asset_exts,
            chunk_size: settings.chunk_size,
            rules,
            storage,
            probe_failure: settings.probe_failure,
        })
    }
}
