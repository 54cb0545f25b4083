//! Files exchanged between the `deploy` and `check` runs.

use crate::{
    settings::FileSettings,
    types::{display_address, ContractAbi, VdsContract},
};
use ethers_core::types::Address;
use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("file {0} does not exist")]
    Missing(PathBuf),
    #[error("file {0} is empty")]
    Empty(PathBuf),
    #[error("couldn't read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is malformed: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error("abi file has no abi for {0}")]
    MissingAbi(VdsContract),
    #[error("address file has no address for {0}")]
    MissingAddress(VdsContract),
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("couldn't serialize abi map: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("couldn't write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn read_non_empty(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()));
    }
    Ok(content)
}

/// Reads the raw private key. Surrounding whitespace is dropped.
pub fn read_private_key(path: &Path) -> Result<String, ConfigError> {
    read_non_empty(path).map(|key| key.trim().to_string())
}

pub type AbiMap = BTreeMap<String, ContractAbi>;

pub fn read_abi_map(path: &Path) -> Result<AbiMap, ConfigError> {
    let content = read_non_empty(path)?;
    serde_json::from_str(&content).map_err(|err| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Contract name to deployed address mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRegistry(BTreeMap<String, Address>);

impl AddressRegistry {
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.0.insert(name.into(), address);
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses `Name: 0xAddress` lines.
    ///
    /// Each line is split on the first `": "`. Lines without both a name
    /// and a value are skipped, but a value that is not an address is an error.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut registry = Self::default();
        for (number, line) in content.lines().enumerate() {
            let Some((name, value)) = line.split_once(": ") else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            let address = Address::from_str(value)
                .map_err(|err| format!("line {}: invalid address {value}: {err}", number + 1))?;
            registry.insert(name, address);
        }
        Ok(registry)
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = read_non_empty(path)?;
        Self::parse(&content).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Suite contracts come first in deployment order, any other names follow.
    pub fn render(&self) -> String {
        let suite = VdsContract::ALL.map(|contract| contract.name());
        let known = suite
            .iter()
            .filter_map(|name| self.0.get_key_value(*name));
        let others = self
            .0
            .iter()
            .filter(|(name, _)| !suite.contains(&name.as_str()));

        known
            .chain(others)
            .map(|(name, address)| format!("{name}: {}\n", display_address(address)))
            .collect()
    }
}

/// Everything `check` needs from disk.
///
/// Only built through [`DeploymentArtifacts::new`], so every suite contract
/// has both an abi and an address.
pub struct DeploymentArtifacts {
    private_key: String,
    abis: AbiMap,
    addresses: AddressRegistry,
}

impl std::fmt::Debug for DeploymentArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentArtifacts")
            .field("private_key", &"<redacted>")
            .field("abis", &self.abis.keys().collect::<Vec<_>>())
            .field("addresses", &self.addresses)
            .finish()
    }
}

impl DeploymentArtifacts {
    pub fn new(
        private_key: String,
        abis: AbiMap,
        addresses: AddressRegistry,
    ) -> Result<Self, ConfigError> {
        for contract in VdsContract::ALL {
            if !abis.contains_key(contract.name()) {
                return Err(ConfigError::MissingAbi(contract));
            }
            if addresses.get(contract.name()).is_none() {
                return Err(ConfigError::MissingAddress(contract));
            }
        }
        Ok(Self {
            private_key,
            abis,
            addresses,
        })
    }

    pub fn load(files: &FileSettings) -> Result<Self, ConfigError> {
        let private_key = read_private_key(&files.private_key)?;
        let abis = read_abi_map(&files.abi)?;
        let addresses = AddressRegistry::read(&files.addresses)?;
        Self::new(private_key, abis, addresses)
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn abis(&self) -> &AbiMap {
        &self.abis
    }

    pub fn addresses(&self) -> &AddressRegistry {
        &self.addresses
    }

    pub fn abi(&self, contract: VdsContract) -> &ContractAbi {
        &self.abis[contract.name()]
    }

    pub fn address(&self, contract: VdsContract) -> Address {
        self.addresses
            .get(contract.name())
            .unwrap_or_else(|| unreachable!("{contract} address is checked on construction"))
    }
}

fn stage(target: &Path, content: &[u8]) -> Result<NamedTempFile, PersistError> {
    let write_err = |source| PersistError::Write {
        path: target.to_path_buf(),
        source,
    };
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(content).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    Ok(file)
}

/// Writes all `files` or none of them, as far as staging goes.
///
/// Every file is staged next to its target first, so a failure to stage
/// leaves existing targets untouched. The staged files are then renamed in
/// order; a failed rename leaves the earlier targets already replaced.
pub fn write_all_or_nothing(files: &[(&Path, Vec<u8>)]) -> Result<(), PersistError> {
    let staged = files
        .iter()
        .map(|(target, content)| stage(target, content).map(|file| (*target, file)))
        .collect::<Result<Vec<_>, _>>()?;

    for (target, file) in staged {
        file.persist(target).map_err(|err| PersistError::Write {
            path: target.to_path_buf(),
            source: err.error,
        })?;
    }
    Ok(())
}

/// Saves the combined abi map and the address registry.
///
/// The registry is renamed last, so a registry on disk never points at
/// contracts whose abi map was not written.
pub fn persist(
    files: &FileSettings,
    abis: &AbiMap,
    addresses: &AddressRegistry,
) -> Result<(), PersistError> {
    let abi_json = serde_json::to_vec_pretty(abis)?;
    write_all_or_nothing(&[
        (files.abi.as_path(), abi_json),
        (files.addresses.as_path(), addresses.render().into_bytes()),
    ])
}
