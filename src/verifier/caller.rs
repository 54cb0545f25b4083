use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers_core::{
    abi::{Abi, Token},
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest},
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("function {0} is not in the abi")]
    UnknownFunction(String),
    #[error("couldn't encode call to {function}: {reason}")]
    Encode { function: String, reason: String },
    #[error("call to {function} failed: {message}")]
    Rpc { function: String, message: String },
    #[error("couldn't decode output of {function}: {reason}")]
    Decode { function: String, reason: String },
    #[error("{function} returned unexpected output: {reason}")]
    UnexpectedOutput { function: String, reason: String },
}

impl CallError {
    pub fn unexpected(function: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read-only access to argument-less contract functions.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call(
        &self,
        address: Address,
        abi: &Abi,
        function: &str,
    ) -> Result<Vec<Token>, CallError>;
}

/// Issues `eth_call` requests through any ethers middleware.
pub struct EthersCaller<M> {
    client: Arc<M>,
}

impl<M> EthersCaller<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractCaller for EthersCaller<M> {
    async fn call(
        &self,
        address: Address,
        abi: &Abi,
        function: &str,
    ) -> Result<Vec<Token>, CallError> {
        let func = abi
            .function(function)
            .map_err(|_| CallError::UnknownFunction(function.to_string()))?;
        let data = func.encode_input(&[]).map_err(|err| CallError::Encode {
            function: function.to_string(),
            reason: err.to_string(),
        })?;
        let tx: TypedTransaction = TransactionRequest::new().to(address).data(data).into();

        let output = self
            .client
            .call(&tx, None)
            .await
            .map_err(|err| CallError::Rpc {
                function: function.to_string(),
                message: err.to_string(),
            })?;
        func.decode_output(&output).map_err(|err| CallError::Decode {
            function: function.to_string(),
            reason: err.to_string(),
        })
    }
}
