//! Deployment of the suite as a chain of typed states.
//!
//! Every step consumes the previous state, and the addresses a contract
//! needs for its constructor only exist on the state before it, so the
//! contracts can only be deployed as Core, Search, Verification.

use super::deployer::{DeployError, Deployer};
use crate::{
    artifacts::{self, AbiMap, AddressRegistry, PersistError},
    compiler::{CompilationError, CompiledContracts},
    settings::FileSettings,
    types::{CompiledContract, VdsContract},
};
use ethers_core::{abi::Token, types::Address};

/// Final addresses of the three contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteAddresses {
    pub core: Address,
    pub search: Address,
    pub verification: Address,
}

impl SuiteAddresses {
    pub fn registry(&self) -> AddressRegistry {
        let mut registry = AddressRegistry::default();
        registry.insert(VdsContract::Core.name(), self.core);
        registry.insert(VdsContract::Search.name(), self.search);
        registry.insert(VdsContract::Verification.name(), self.verification);
        registry
    }
}

#[derive(Debug)]
pub struct Compiled {
    core: CompiledContract,
    search: CompiledContract,
    verification: CompiledContract,
}

impl Compiled {
    pub fn new(mut contracts: CompiledContracts) -> Result<Self, CompilationError> {
        Ok(Self {
            core: contracts.take(VdsContract::Core.name())?,
            search: contracts.take(VdsContract::Search.name())?,
            verification: contracts.take(VdsContract::Verification.name())?,
        })
    }

    pub async fn deploy_core<D: Deployer + ?Sized>(
        self,
        deployer: &D,
    ) -> Result<CoreDeployed, DeployError> {
        let core = deployer.deploy(&self.core, vec![]).await?;
        Ok(CoreDeployed {
            contracts: self,
            core,
        })
    }

    fn abi_map(&self) -> AbiMap {
        [&self.core, &self.search, &self.verification]
            .into_iter()
            .map(|contract| (contract.name.clone(), contract.abi.clone()))
            .collect()
    }
}

#[derive(Debug)]
pub struct CoreDeployed {
    contracts: Compiled,
    core: Address,
}

impl CoreDeployed {
    pub fn core(&self) -> Address {
        self.core
    }

    pub async fn deploy_search<D: Deployer + ?Sized>(
        self,
        deployer: &D,
    ) -> Result<SearchDeployed, DeployError> {
        let search = deployer
            .deploy(&self.contracts.search, vec![Token::Address(self.core)])
            .await?;
        Ok(SearchDeployed {
            contracts: self.contracts,
            core: self.core,
            search,
        })
    }
}

#[derive(Debug)]
pub struct SearchDeployed {
    contracts: Compiled,
    core: Address,
    search: Address,
}

impl SearchDeployed {
    pub fn search(&self) -> Address {
        self.search
    }

    pub async fn deploy_verification<D: Deployer + ?Sized>(
        self,
        deployer: &D,
    ) -> Result<VerificationDeployed, DeployError> {
        let verification = deployer
            .deploy(
                &self.contracts.verification,
                vec![Token::Address(self.core), Token::Address(self.search)],
            )
            .await?;
        Ok(VerificationDeployed {
            abis: self.contracts.abi_map(),
            addresses: SuiteAddresses {
                core: self.core,
                search: self.search,
                verification,
            },
        })
    }
}

#[derive(Debug)]
pub struct VerificationDeployed {
    abis: AbiMap,
    addresses: SuiteAddresses,
}

impl VerificationDeployed {
    pub fn addresses(&self) -> SuiteAddresses {
        self.addresses
    }

    /// Writes the abi map and the registry together.
    pub fn persist(self, files: &FileSettings) -> Result<Persisted, PersistError> {
        artifacts::persist(files, &self.abis, &self.addresses.registry())?;
        Ok(Persisted {
            addresses: self.addresses,
        })
    }
}

#[derive(Debug)]
pub struct Persisted {
    pub addresses: SuiteAddresses,
}
