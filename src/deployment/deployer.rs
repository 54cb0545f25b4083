use crate::types::{display_address, CompiledContract};
use async_trait::async_trait;
use ethers::{contract::ContractFactory, providers::Middleware};
use ethers_core::{
    abi::Token,
    types::{Address, H256, U64},
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("couldn't build deployment of {contract}: {message}")]
    Prepare { contract: String, message: String },
    #[error("deployment of {contract} failed: {message}")]
    Submit { contract: String, message: String },
    #[error("deployment of {contract} reverted in transaction {tx_hash:?}")]
    Reverted { contract: String, tx_hash: H256 },
}

/// Submits a contract creation transaction and waits until it is confirmed.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(
        &self,
        contract: &CompiledContract,
        constructor_args: Vec<Token>,
    ) -> Result<Address, DeployError>;
}

pub struct EthersDeployer<M> {
    client: Arc<M>,
    confirmations: usize,
}

impl<M> EthersDeployer<M> {
    pub fn new(client: Arc<M>, confirmations: usize) -> Self {
        Self {
            client,
            confirmations,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> Deployer for EthersDeployer<M> {
    async fn deploy(
        &self,
        contract: &CompiledContract,
        constructor_args: Vec<Token>,
    ) -> Result<Address, DeployError> {
        log::info!("deploying {} ...", contract.name);
        let factory = ContractFactory::new(
            contract.abi.abi.clone(),
            contract.bytecode.clone(),
            self.client.clone(),
        );
        let deployment = factory
            .deploy_tokens(constructor_args)
            .map_err(|err| DeployError::Prepare {
                contract: contract.name.clone(),
                message: err.to_string(),
            })?
            .confirmations(self.confirmations);
        let (instance, receipt) = deployment
            .send_with_receipt()
            .await
            .map_err(|err| DeployError::Submit {
                contract: contract.name.clone(),
                message: err.to_string(),
            })?;
        // Nodes fill `contractAddress` for reverted creations too.
        if receipt.status != Some(U64::from(1)) {
            return Err(DeployError::Reverted {
                contract: contract.name.clone(),
                tx_hash: receipt.transaction_hash,
            });
        }

        let address = instance.address();
        log::info!("{} deployed at {}", contract.name, display_address(&address));
        Ok(address)
    }
}
