use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(short, long, default_value = "config.toml")]
    pub config_path: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Compile the source and deploy VDSCore, VDSSearch and VDSVerification in order.
    Deploy,
    /// Compile a single source file and deploy one contract without constructor arguments.
    DeploySingle(SingleDeployArgs),
    /// Check that previously deployed contracts reference each other correctly.
    Check,
}

#[derive(clap::Args, Debug, PartialEq, Eq)]
pub struct SingleDeployArgs {
    #[clap(long, default_value = "vdscontract.sol")]
    pub source: PathBuf,
    /// Contract to deploy. Defaults to the first contract of the source.
    #[clap(long)]
    pub contract: Option<String>,
    #[clap(long, default_value = "vdscontract.json")]
    pub abi_output: PathBuf,
    #[clap(long, default_value = "vdscontract.txt")]
    pub address_output: PathBuf,
}
