use clap::Parser;
use vds_deployer::cli::Args;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(err) = vds_deployer::run(args).await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
