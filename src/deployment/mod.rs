mod deployer;
mod pipeline;

pub use deployer::{DeployError, Deployer, EthersDeployer};
pub use pipeline::{
    Compiled, CoreDeployed, Persisted, SearchDeployed, SuiteAddresses, VerificationDeployed,
};

use crate::{
    artifacts::{self, ConfigError},
    compiler::SourceCompiler,
    settings::FileSettings,
    types::{display_address, CompiledContract},
};
use anyhow::Context;
use ethers_core::types::Address;
use std::path::Path;

fn read_source(path: &Path) -> Result<(String, String), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: "not a file".to_string(),
        })?;
    Ok((source, file_name))
}

/// Reads and compiles `source`, then extracts the three suite contracts.
pub async fn compile_suite<C>(compiler: &C, source: &Path) -> anyhow::Result<Compiled>
where
    C: SourceCompiler + ?Sized,
{
    log::info!("step 1: compiling {}", source.display());
    let (source_code, file_name) = read_source(source)?;
    let contracts = compiler
        .compile(&source_code, &file_name)
        .await
        .with_context(|| format!("compilation of {} failed", source.display()))?;
    Ok(Compiled::new(contracts)?)
}

/// Deploys Core, Search and Verification in that order and persists the
/// abi map and the address registry.
///
/// Contracts deployed before a failing step stay on chain.
pub async fn deploy_compiled<D>(
    compiled: Compiled,
    deployer: &D,
    files: &FileSettings,
) -> anyhow::Result<SuiteAddresses>
where
    D: Deployer + ?Sized,
{
    log::info!("step 2: deploying contracts");
    let core_deployed = compiled.deploy_core(deployer).await?;
    let search_deployed = core_deployed.deploy_search(deployer).await?;
    let verification_deployed = search_deployed.deploy_verification(deployer).await?;

    log::info!("step 3: saving artifacts");
    let persisted = verification_deployed.persist(files)?;
    log::info!("abi saved to {}", files.abi.display());
    log::info!("addresses saved to {}", files.addresses.display());
    log::info!("all contracts deployed successfully");

    Ok(persisted.addresses)
}

/// [`compile_suite`] followed by [`deploy_compiled`].
pub async fn deploy_suite<C, D>(
    compiler: &C,
    deployer: &D,
    files: &FileSettings,
) -> anyhow::Result<SuiteAddresses>
where
    C: SourceCompiler + ?Sized,
    D: Deployer + ?Sized,
{
    let compiled = compile_suite(compiler, &files.source).await?;
    deploy_compiled(compiled, deployer, files).await
}

/// Compiles `source` and picks `contract_name`, or the first contract by
/// name when none is given.
pub async fn compile_single<C>(
    compiler: &C,
    source: &Path,
    contract_name: Option<&str>,
) -> anyhow::Result<CompiledContract>
where
    C: SourceCompiler + ?Sized,
{
    let (source_code, file_name) = read_source(source)?;
    let mut contracts = compiler
        .compile(&source_code, &file_name)
        .await
        .with_context(|| format!("compilation of {} failed", source.display()))?;
    let contract = match contract_name {
        Some(name) => contracts.take(name)?,
        None => contracts.take_first()?,
    };
    Ok(contract)
}

/// Deploys `contract` without constructor arguments and writes its bare
/// abi array and bare address.
pub async fn deploy_contract<D>(
    contract: &CompiledContract,
    deployer: &D,
    abi_output: &Path,
    address_output: &Path,
) -> anyhow::Result<Address>
where
    D: Deployer + ?Sized,
{
    let address = deployer.deploy(contract, vec![]).await?;

    artifacts::write_all_or_nothing(&[
        (abi_output, serde_json::to_vec_pretty(&contract.abi)?),
        (address_output, display_address(&address).into_bytes()),
    ])?;
    log::info!("abi saved to {}", abi_output.display());
    log::info!("address saved to {}", address_output.display());
    Ok(address)
}

/// [`compile_single`] followed by [`deploy_contract`].
pub async fn deploy_single<C, D>(
    compiler: &C,
    deployer: &D,
    source: &Path,
    contract_name: Option<&str>,
    abi_output: &Path,
    address_output: &Path,
) -> anyhow::Result<Address>
where
    C: SourceCompiler + ?Sized,
    D: Deployer + ?Sized,
{
    let contract = compile_single(compiler, source, contract_name).await?;
    deploy_contract(&contract, deployer, abi_output, address_output).await
}
