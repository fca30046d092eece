use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gate::poller::PollSettings;
use crate::platform::model::{BuildConfigName, Namespace};
use crate::platform::openshift::ClusterSettings;

#[derive(Debug, Parser)]
#[command(
    name = "buildgate",
    about = "Verifies that the latest OpenShift build of a build config completed and that downstream image change triggers fired."
)]
pub struct Cli {
    /// YAML file with gate settings; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Cluster API endpoint. Falls back to the local kubeconfig when absent.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Build config whose latest build is verified.
    #[arg(long)]
    pub build_config: Option<String>,

    /// Namespace holding the builds and deployment configs.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Bearer token for the cluster API.
    #[arg(long)]
    pub token: Option<String>,

    /// Report intermediate polling progress, not just entry/exit banners.
    #[arg(long)]
    pub verbose: bool,

    /// Wall-clock budget for the polling loop, in seconds.
    #[arg(long)]
    pub budget_seconds: Option<u64>,

    /// Delay between poll iterations, in seconds.
    #[arg(long)]
    pub interval_seconds: Option<u64>,

    /// Run the gate against stubbed cluster responses instead of a cluster.
    #[arg(long)]
    pub dry_run: bool,
}

// YAML specific configuration

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub build_config: Option<BuildConfigName>,
    pub namespace: Option<Namespace>,
    pub token: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    pub budget_seconds: Option<u64>,
    pub interval_seconds: Option<u64>,
}

pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<FileConfig> {
    let conf_file = std::fs::File::open(path)?;
    Ok(serde_yaml::from_reader(conf_file)?)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("build config name is required and must not be empty")]
    MissingBuildConfig,
    #[error("namespace is required and must not be empty")]
    MissingNamespace,
}

/// Everything the gate needs for one run, validated.
pub struct GateConfig {
    pub cluster: ClusterSettings,
    pub build_config: BuildConfigName,
    pub namespace: Namespace,
    pub verbose: bool,
    pub poll: PollSettings,
    pub dry_run: bool,
}

pub fn resolve(cli: Cli, file: FileConfig) -> Result<GateConfig, ConfigError> {
    let build_config = match cli.build_config {
        Some(raw) => Some(BuildConfigName::new(raw).ok_or(ConfigError::MissingBuildConfig)?),
        None => file.build_config,
    }
    .ok_or(ConfigError::MissingBuildConfig)?;

    let namespace = match cli.namespace {
        Some(raw) => Some(Namespace::new(raw).ok_or(ConfigError::MissingNamespace)?),
        None => file.namespace,
    }
    .ok_or(ConfigError::MissingNamespace)?;

    let defaults = PollSettings::default();
    let poll = PollSettings {
        budget: cli
            .budget_seconds
            .or(file.budget_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.budget),
        interval: cli
            .interval_seconds
            .or(file.interval_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval),
    };

    Ok(GateConfig {
        cluster: ClusterSettings {
            api_url: cli.api_url.or(file.api_url),
            auth_token: cli.token.or(file.token),
        },
        build_config,
        namespace,
        verbose: cli.verbose || file.verbose,
        poll,
        dry_run: cli.dry_run,
    })
}
