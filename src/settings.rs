use crate::consts::{
    DEFAULT_ABI_FILE, DEFAULT_ADDRESSES_FILE, DEFAULT_OPTIMIZER_RUNS, DEFAULT_PRIVATE_KEY_FILE,
    DEFAULT_RPC_URL, DEFAULT_SOURCE_FILE, ENV_PREFIX,
};
use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;
use std::{path::Path, path::PathBuf, time::Duration};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub rpc: RpcSettings,
    pub files: FileSettings,
    pub compiler: CompilerSettings,
    pub deployment: DeploymentSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcSettings {
    pub url: Url,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: Url::try_from(DEFAULT_RPC_URL).expect("valid url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub private_key: PathBuf,
    /// Solidity source holding all three contracts.
    pub source: PathBuf,
    /// Combined `{ContractName: ABI[]}` json written by `deploy`, read by `check`.
    pub abi: PathBuf,
    /// `ContractName: 0xAddress` lines written by `deploy`, read by `check`.
    pub addresses: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            private_key: DEFAULT_PRIVATE_KEY_FILE.into(),
            source: DEFAULT_SOURCE_FILE.into(),
            abi: DEFAULT_ABI_FILE.into(),
            addresses: DEFAULT_ADDRESSES_FILE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSettings {
    pub optimizer_runs: usize,
    /// Explicit solc binary. Takes precedence over `version`.
    pub solc_path: Option<PathBuf>,
    /// Solc version installed through svm when no explicit binary is given.
    pub version: Option<String>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            optimizer_runs: DEFAULT_OPTIMIZER_RUNS,
            solc_path: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentSettings {
    pub confirmations: usize,
    pub poll_interval_ms: u64,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            confirmations: 1,
            poll_interval_ms: 1000,
        }
    }
}

impl DeploymentSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Settings {
    /// Layers `VDS_DEPLOYER__*` environment variables over the config file.
    /// A missing config file is not an error.
    pub fn build(config_path: &Path) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::from(config_path.to_path_buf()));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        builder
            .build()?
            .try_deserialize()
            .map_err(|err| anyhow!(err))
    }
}
