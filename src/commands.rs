use crate::{
    artifacts::{read_private_key, DeploymentArtifacts},
    cli::{Args, Command, SingleDeployArgs},
    compiler::{SolcCompiler, SolcFetcher},
    deployment::{self, EthersDeployer},
    settings::Settings,
    signer::{self, SigningIdentity},
    types::{display_address, VdsContract},
    verifier::{ConnectivityChecker, EthersCaller},
};
use std::sync::Arc;

pub async fn run(args: Args) -> anyhow::Result<()> {
    let settings = Settings::build(&args.config_path)?;
    match args.command {
        Command::Deploy => deploy(&settings).await,
        Command::DeploySingle(single) => deploy_single(&settings, &single).await,
        Command::Check => check(&settings).await,
    }
}

fn solc_compiler(settings: &Settings) -> anyhow::Result<SolcCompiler> {
    let fetcher = SolcFetcher::from_settings(&settings.compiler)?;
    Ok(SolcCompiler::new(fetcher, settings.compiler.optimizer_runs))
}

async fn deployer(
    settings: &Settings,
    identity: SigningIdentity,
) -> anyhow::Result<EthersDeployer<signer::Client>> {
    let client = signer::connect(
        &settings.rpc.url,
        identity,
        settings.deployment.poll_interval(),
    )
    .await?;
    Ok(EthersDeployer::new(client, settings.deployment.confirmations))
}

async fn deploy(settings: &Settings) -> anyhow::Result<()> {
    let identity = SigningIdentity::from_key(&read_private_key(&settings.files.private_key)?)?;
    let compiler = solc_compiler(settings)?;
    let compiled = deployment::compile_suite(&compiler, &settings.files.source).await?;

    let deployer = deployer(settings, identity).await?;
    let addresses = deployment::deploy_compiled(compiled, &deployer, &settings.files).await?;
    for (contract, address) in VdsContract::ALL.into_iter().zip([
        addresses.core,
        addresses.search,
        addresses.verification,
    ]) {
        log::info!("{contract}: {}", display_address(&address));
    }
    Ok(())
}

async fn deploy_single(settings: &Settings, args: &SingleDeployArgs) -> anyhow::Result<()> {
    let identity = SigningIdentity::from_key(&read_private_key(&settings.files.private_key)?)?;
    let compiler = solc_compiler(settings)?;
    let contract =
        deployment::compile_single(&compiler, &args.source, args.contract.as_deref()).await?;

    let deployer = deployer(settings, identity).await?;
    deployment::deploy_contract(&contract, &deployer, &args.abi_output, &args.address_output)
        .await?;
    Ok(())
}

async fn check(settings: &Settings) -> anyhow::Result<()> {
    log::info!("step 1: reading configuration files");
    let artifacts = DeploymentArtifacts::load(&settings.files)?;
    log::info!("[ok] configuration files loaded");

    log::info!("step 2: connecting to rpc");
    let identity = SigningIdentity::from_key(artifacts.private_key())?;
    let client = signer::connect(
        &settings.rpc.url,
        identity,
        settings.deployment.poll_interval(),
    )
    .await?;

    log::info!("step 3: registered addresses");
    for contract in VdsContract::ALL {
        log::info!(
            "{contract} address: {}",
            display_address(&artifacts.address(contract))
        );
    }

    log::info!("step 4: checking deployment and connections");
    let caller = EthersCaller::new(Arc::clone(&client));
    let report = ConnectivityChecker::new(&caller, &artifacts).run().await;

    if report.is_fully_connected() {
        log::info!("[ok] deployment and connection check finished");
    } else {
        log::warn!("deployment and connection check finished with problems");
    }
    if matches!(&report.core, Ok(status) if !status.initialized) {
        log::info!("the system is not initialized yet: call initializeSystem(...) on VDSCore");
    }
    Ok(())
}
