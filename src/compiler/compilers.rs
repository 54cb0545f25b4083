use super::fetcher::{FetchError, SolcFetcher};
use crate::types::{CompiledContract, ContractAbi};
use async_trait::async_trait;
use ethers_solc::{
    artifacts::{output_selection::OutputSelection, Severity, Source, Sources},
    error::SolcError,
    CompilerInput, CompilerOutput,
};
use std::{collections::BTreeMap, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("Error while fetching compiler: {0:#}")]
    Fetch(#[from] FetchError),
    #[error("Internal error while compiling: {0}")]
    Internal(#[from] SolcError),
    #[error("Compilation error: {0:?}")]
    Compilation(Vec<String>),
    #[error("compiler output has no contracts for {0}")]
    MissingSource(String),
    #[error("contract {0} not found in compiler output")]
    MissingContract(String),
    #[error("contract {0} has no abi")]
    MissingAbi(String),
    #[error("contract {name} has an invalid abi: {reason}")]
    InvalidAbi { name: String, reason: String },
    #[error("bytecode of {0} is empty or unlinked")]
    EmptyBytecode(String),
}

/// Compiled contracts of one source file, keyed by contract name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledContracts(BTreeMap<String, CompiledContract>);

impl CompiledContracts {
    pub fn take(&mut self, name: &str) -> Result<CompiledContract, CompilationError> {
        self.0
            .remove(name)
            .ok_or_else(|| CompilationError::MissingContract(name.to_string()))
    }

    pub fn take_first(&mut self) -> Result<CompiledContract, CompilationError> {
        let name = self
            .0
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| CompilationError::MissingContract("<any>".to_string()))?;
        self.take(&name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<CompiledContract> for CompiledContracts {
    fn from_iter<I: IntoIterator<Item = CompiledContract>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|contract| (contract.name.clone(), contract))
                .collect(),
        )
    }
}

#[async_trait]
pub trait SourceCompiler: Send + Sync {
    async fn compile(
        &self,
        source: &str,
        file_name: &str,
    ) -> Result<CompiledContracts, CompilationError>;
}

/// Standard-json input for a single source with the optimizer turned on.
pub fn compiler_input(source: &str, file_name: &str, optimizer_runs: usize) -> CompilerInput {
    let mut compiler_input = CompilerInput {
        language: "Solidity".to_string(),
        sources: Sources::from([(PathBuf::from(file_name), Source::new(source))]),
        settings: Default::default(),
    };
    compiler_input.settings.evm_version = None;
    compiler_input.settings.optimizer.enabled = Some(true);
    compiler_input.settings.optimizer.runs = Some(optimizer_runs);
    compiler_input.settings.output_selection = OutputSelection(BTreeMap::from([(
        "*".to_string(),
        BTreeMap::from([(
            "*".to_string(),
            vec!["abi".to_string(), "evm.bytecode".to_string()],
        )]),
    )]));
    compiler_input
}

/// Extracts abi and bytecode of every contract declared in `file_name`.
///
/// Compilations errors, warnings and info messages are all returned in
/// `CompilerOutput.errors`; only the ones with `error` severity fail the build.
pub fn process_output(
    mut output: CompilerOutput,
    file_name: &str,
) -> Result<CompiledContracts, CompilationError> {
    let mut errors = Vec::new();
    for err in &output.errors {
        let message = err.formatted_message.as_ref().unwrap_or(&err.message);
        if err.severity == Severity::Error {
            log::error!(target: "compiler", "{message}");
            errors.push(message.clone());
        } else {
            log::warn!(target: "compiler", "{message}");
        }
    }
    if !errors.is_empty() {
        return Err(CompilationError::Compilation(errors));
    }

    let contracts = output
        .contracts
        .remove(file_name)
        .ok_or_else(|| CompilationError::MissingSource(file_name.to_string()))?;

    contracts
        .into_iter()
        .map(|(name, contract)| {
            let abi_json = contract
                .abi
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|err| CompilationError::InvalidAbi {
                    name: name.clone(),
                    reason: err.to_string(),
                })?
                .ok_or_else(|| CompilationError::MissingAbi(name.clone()))?;
            let abi =
                ContractAbi::try_from(abi_json).map_err(|err| CompilationError::InvalidAbi {
                    name: name.clone(),
                    reason: err.to_string(),
                })?;
            let bytecode = contract
                .evm
                .as_ref()
                .and_then(|evm| evm.bytecode.as_ref())
                .and_then(|bytecode| bytecode.object.as_bytes())
                .filter(|bytes| !bytes.is_empty())
                .cloned()
                .ok_or_else(|| CompilationError::EmptyBytecode(name.clone()))?;
            Ok(CompiledContract {
                name,
                abi,
                bytecode,
            })
        })
        .collect()
}

pub struct SolcCompiler {
    fetcher: SolcFetcher,
    optimizer_runs: usize,
}

impl SolcCompiler {
    pub fn new(fetcher: SolcFetcher, optimizer_runs: usize) -> Self {
        Self {
            fetcher,
            optimizer_runs,
        }
    }
}

#[async_trait]
impl SourceCompiler for SolcCompiler {
    async fn compile(
        &self,
        source: &str,
        file_name: &str,
    ) -> Result<CompiledContracts, CompilationError> {
        let solc = self.fetcher.fetch().await?;
        let input = compiler_input(source, file_name, self.optimizer_runs);
        log::info!(
            target: "compiler",
            "compiling {file_name} (optimizer runs: {})",
            self.optimizer_runs
        );
        let output = solc.compile(&input)?;
        process_output(output, file_name)
    }
}
