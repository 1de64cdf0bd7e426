/// `load_config` module: merges environment variables, an optional YAML file and
/// CLI flags into the validated [`RunConfig`] consumed by `oss-deploy-core`.
///
/// # Precedence
/// Layers are merged field by field, later layers winning:
///   1. environment (`DEPLOY_*`, after `.env` has been loaded by `main`)
///   2. the YAML config file (`.webcli.yaml` by default; skipped when absent)
///   3. command-line flags
///
/// Defaults are applied after merging, then the result is validated by the
/// core crate, so a malformed rule or a missing credential fails before any
/// request is sent.
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics,
/// and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use oss_deploy_core::config::{
    ProbeFailurePolicy, RuleSpec, RunConfig, RunSettings, StorageSettings,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::cli::DeployArgs;

pub const ENV_PUBLIC_DIR: &str = "DEPLOY_PUBLIC_DIR";
pub const ENV_PATH_PREFIX: &str = "DEPLOY_PATH_PREFIX";
pub const ENV_STABLE_ASSETS_EXTS: &str = "DEPLOY_STABLE_ASSETS_EXTS";
pub const ENV_CHUNK_SIZE: &str = "DEPLOY_CHUNK_SIZE";
pub const ENV_OSS_REGION: &str = "DEPLOY_OSS_REGION";
pub const ENV_OSS_BUCKET: &str = "DEPLOY_OSS_BUCKET";
pub const ENV_OSS_AK: &str = "DEPLOY_OSS_AK";
pub const ENV_OSS_SK: &str = "DEPLOY_OSS_SK";
pub const ENV_OSS_ENDPOINT: &str = "DEPLOY_OSS_ENDPOINT";

/// One partial source of configuration. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    pub public_dir: Option<PathBuf>,
    pub path_prefix: Option<String>,
    pub stable_asset_exts: Option<Vec<String>>,
    pub chunk_size: Option<usize>,
    pub rules: Option<Vec<RuleSpec>>,
    pub probe_failure: Option<ProbeFailurePolicy>,
    #[serde(alias = "storage")]
    pub oss: Option<StorageSettings>,
}

fn pick<T>(lower: Option<T>, upper: Option<T>) -> Option<T> {
    upper.or(lower)
}

impl ConfigLayer {
    /// Returns `self` with every field set in `upper` replaced by `upper`'s value.
    pub fn overlay(self, upper: ConfigLayer) -> ConfigLayer {
        let oss = match (self.oss, upper.oss) {
            (Some(lower), Some(upper)) => Some(StorageSettings {
                region: pick(lower.region, upper.region),
                bucket: pick(lower.bucket, upper.bucket),
                access_key_id: pick(lower.access_key_id, upper.access_key_id),
                access_key_secret: pick(lower.access_key_secret, upper.access_key_secret),
                endpoint: pick(lower.endpoint, upper.endpoint),
            }),
            (lower, upper) => pick(lower, upper),
        };

        ConfigLayer {
            public_dir: pick(self.public_dir, upper.public_dir),
            path_prefix: pick(self.path_prefix, upper.path_prefix),
            stable_asset_exts: pick(self.stable_asset_exts, upper.stable_asset_exts),
            chunk_size: pick(self.chunk_size, upper.chunk_size),
            rules: pick(self.rules, upper.rules),
            probe_failure: pick(self.probe_failure, upper.probe_failure),
            oss,
        }
    }

    /// Fills every unset field with its default.
    pub fn into_settings(self) -> RunSettings {
        let defaults = RunSettings::default();
        RunSettings {
            public_dir: self.public_dir.unwrap_or(defaults.public_dir),
            path_prefix: self.path_prefix.unwrap_or(defaults.path_prefix),
            stable_asset_exts: self.stable_asset_exts.unwrap_or(defaults.stable_asset_exts),
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            rules: self.rules.unwrap_or(defaults.rules),
            storage: self.oss.unwrap_or(defaults.storage),
            probe_failure: self.probe_failure.unwrap_or(defaults.probe_failure),
        }
    }
}

/// Splits a comma separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn storage_layer(
    region: Option<String>,
    bucket: Option<String>,
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
    endpoint: Option<String>,
) -> Option<StorageSettings> {
    let storage = StorageSettings {
        region: non_empty(region),
        bucket: non_empty(bucket),
        access_key_id: non_empty(access_key_id),
        access_key_secret: non_empty(access_key_secret),
        endpoint: non_empty(endpoint),
    };
    (storage != StorageSettings::default()).then_some(storage)
}

/// Builds the environment layer through `lookup`. Empty values count as unset.
pub fn layer_from_vars<F>(lookup: F) -> Result<ConfigLayer>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| non_empty(lookup(name));

    let chunk_size = match var(ENV_CHUNK_SIZE) {
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) => Some(n),
            Err(e) => {
                error!(error = ?e, var = %raw, "{ENV_CHUNK_SIZE} must be a positive integer");
                anyhow::bail!("{ENV_CHUNK_SIZE} must be a positive integer: {e}");
            }
        },
        None => None,
    };

    Ok(ConfigLayer {
        public_dir: var(ENV_PUBLIC_DIR).map(PathBuf::from),
        path_prefix: var(ENV_PATH_PREFIX),
        stable_asset_exts: var(ENV_STABLE_ASSETS_EXTS).map(|raw| split_list(&raw)),
        chunk_size,
        rules: None,
        probe_failure: None,
        oss: storage_layer(
            var(ENV_OSS_REGION),
            var(ENV_OSS_BUCKET),
            var(ENV_OSS_AK),
            var(ENV_OSS_SK),
            var(ENV_OSS_ENDPOINT),
        ),
    })
}

pub fn layer_from_env() -> Result<ConfigLayer> {
    layer_from_vars(|name| std::env::var(name).ok())
}

/// Reads the YAML config file, or `None` when it does not exist.
pub fn layer_from_file(path: &Path) -> Result<Option<ConfigLayer>> {
    if !path.exists() {
        info!(config_path = ?path, "No config file found, skipping");
        return Ok(None);
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    // an empty file parses to `null`
    if content.trim().is_empty() {
        return Ok(Some(ConfigLayer::default()));
    }

    match serde_yaml::from_str::<ConfigLayer>(&content) {
        Ok(layer) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(Some(layer))
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path))
        }
    }
}

pub fn layer_from_args(args: &DeployArgs) -> ConfigLayer {
    ConfigLayer {
        public_dir: args.public_dir.clone(),
        path_prefix: non_empty(args.path_prefix.clone()),
        stable_asset_exts: args.stable_asset_exts.as_deref().map(split_list),
        chunk_size: args.chunk_size,
        rules: None,
        probe_failure: args.probe_failure,
        oss: storage_layer(
            args.oss_region.clone(),
            args.oss_bucket.clone(),
            args.oss_access_key_id.clone(),
            args.oss_access_key_secret.clone(),
            args.oss_endpoint.clone(),
        ),
    }
}

/// Merges the three layers, applies defaults and validates.
pub fn resolve(env: ConfigLayer, file: Option<ConfigLayer>, cli: ConfigLayer) -> Result<RunConfig> {
    let merged = env.overlay(file.unwrap_or_default()).overlay(cli);
    let config = RunConfig::try_from(merged.into_settings()).map_err(|e| {
        error!(error = %e, "Configuration is invalid");
        anyhow::Error::new(e).context("Invalid configuration")
    })?;
    info!(
        public_dir = %config.public_dir.display(),
        bucket = %config.storage.bucket,
        "Config loaded and merged successfully"
    );
    Ok(config)
}

/// Loads the full run configuration for a `deploy` invocation.
pub fn load_config(args: &DeployArgs) -> Result<RunConfig> {
    info!(config_path = ?args.config, "Loading configuration");
    let env = layer_from_env().context("Failed to read configuration from environment")?;
    let file = layer_from_file(&args.config)?;
    resolve(env, file, layer_from_args(args))
}
