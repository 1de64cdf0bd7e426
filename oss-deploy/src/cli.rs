/// # oss-deploy CLI Interface (Module)
///
/// This module implements the CLI interface for oss-deploy: command parsing,
/// the async `run` entrypoint and user-visible output.
///
/// All decision logic (diffing, cache policies, batching) lives in the
/// [`oss-deploy-core`] crate. This module is strictly CLI glue: it loads the
/// configuration, builds the bucket client and hands both to the core.
///
/// ## How To Use
/// - For command-line users: use the installed `oss-deploy` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`oss-deploy-core`]: ../../oss-deploy-core/
use crate::load_config::load_config;
use crate::store::OssStore;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oss_deploy_core::config::ProbeFailurePolicy;
use oss_deploy_core::deploy::deploy;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = ".webcli.yaml";

/// CLI for oss-deploy: publish built static assets to an object-storage bucket.
#[derive(Parser, Debug)]
#[clap(
    name = "oss-deploy",
    version,
    about = "Upload a directory of built static assets to an OSS/S3 bucket, skipping unchanged files"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload every changed file under the public directory
    Deploy(DeployArgs),
}

/// Flags for `deploy`. Anything set here overrides the config file and environment.
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Local directory to publish [default: dist]
    #[clap(long, alias = "publicDir")]
    pub public_dir: Option<PathBuf>,

    /// Remote key prefix, must start and end with '/' [default: /]
    #[clap(long, alias = "pathPrefix")]
    pub path_prefix: Option<String>,

    /// Comma separated extensions cached for three years
    #[clap(long, alias = "stableAssetExts")]
    pub stable_asset_exts: Option<String>,

    /// Number of files uploaded concurrently per batch [default: 20]
    #[clap(long, alias = "chunkSize")]
    pub chunk_size: Option<usize>,

    /// What to do when a remote lookup fails: reupload or fail
    #[clap(long, value_parser = parse_probe_failure)]
    pub probe_failure: Option<ProbeFailurePolicy>,

    #[clap(long, alias = "oss_region")]
    pub oss_region: Option<String>,

    #[clap(long, alias = "oss_bucket")]
    pub oss_bucket: Option<String>,

    #[clap(long, alias = "oss_accessKeyId")]
    pub oss_access_key_id: Option<String>,

    #[clap(long, alias = "oss_accessKeySecret")]
    pub oss_access_key_secret: Option<String>,

    /// Endpoint URL, derived from the region when omitted
    #[clap(long, alias = "oss_endpoint")]
    pub oss_endpoint: Option<String>,

    /// Path to the YAML config file, ignored when it does not exist
    #[clap(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

impl Default for DeployArgs {
    fn default() -> Self {
        DeployArgs {
            public_dir: None,
            path_prefix: None,
            stable_asset_exts: None,
            chunk_size: None,
            probe_failure: None,
            oss_region: None,
            oss_bucket: None,
            oss_access_key_id: None,
            oss_access_key_secret: None,
            oss_endpoint: None,
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

fn parse_probe_failure(raw: &str) -> Result<ProbeFailurePolicy, String> {
    match raw.to_ascii_lowercase().as_str() {
        "reupload" => Ok(ProbeFailurePolicy::Reupload),
        "fail" => Ok(ProbeFailurePolicy::Fail),
        other => Err(format!("expected 'reupload' or 'fail', got '{other}'")),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Deploy(args) => {
            let config = load_config(&args)?;
            config.trace_loaded();
            tracing::info!(command = "deploy", "Starting deploy");

            let store = OssStore::new(&config.storage);
            let report = deploy(&config, &store)
                .await
                .context("Deploy aborted")?;

            if !report.is_success() {
                for failed in &report.failed {
                    tracing::error!(
                        command = "deploy",
                        file = %failed.relative_path,
                        key = %failed.key,
                        reason = %failed.reason,
                        "File was not deployed"
                    );
                }
                let files: Vec<&str> = report
                    .failed
                    .iter()
                    .map(|f| f.relative_path.as_str())
                    .collect();
                anyhow::bail!(
                    "{} of {} files failed to deploy: {}",
                    files.len(),
                    report.considered,
                    files.join(", ")
                );
            }

            tracing::info!(command = "deploy", ?report, "Deploy complete");
            println!(
                "Deploy complete: {} files processed, {} uploaded, {} unchanged.",
                report.considered,
                report.uploaded.len(),
                report.skipped.len()
            );
            Ok(())
        }
    }
}
