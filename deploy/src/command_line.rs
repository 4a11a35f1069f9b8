use std::{env, io, path::PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ethers::types::H160;

use crate::{config::DeployConfig, deploy::Deploy, deployer::EthersDeployer};

const DEFAULT_CONTRACT: &str = "MetawinRaffle";
const DEFAULT_VRF_CONSUMER: &str = "0x9E24F6e2a161C1dfADb2D9e5331336ad836C2F4F";

#[derive(Debug, Parser)]
#[clap(name = "raffle-deploy", version, about = "Deploy the raffle contract")]
pub struct CommandLine {
    /// JSON network config, built-in goerli/mainnet/localhost table if omitted
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deploy the contract to a network
    Deploy(DeployArgs),
    /// List configured networks
    Networks,
}

#[derive(Debug, Args)]
struct DeployArgs {
    #[clap(short, long)]
    network: String,

    #[clap(long, default_value = DEFAULT_CONTRACT)]
    contract: String,

    /// VRF consumer address passed to the constructor
    #[clap(long, default_value = DEFAULT_VRF_CONSUMER)]
    constructor_arg: H160,

    #[clap(long, default_value = "artifacts")]
    artifacts: PathBuf,

    #[clap(long, default_value_t = 1)]
    confirmations: usize,
}

impl CommandLine {
    pub async fn execute(self) -> Result<()> {
        dotenv::dotenv().ok();

        let config = match &self.config {
            Some(path) => DeployConfig::from_file(path)?,
            None => DeployConfig::default(),
        };

        match self.command {
            Command::Deploy(args) => args.execute(&config).await,
            Command::Networks => config.write_summary(&mut io::stdout(), |key| env::var(key).ok()),
        }
    }
}

impl DeployArgs {
    async fn execute(self, config: &DeployConfig) -> Result<()> {
        let profile = config.resolve(&self.network)?;
        let deployer = EthersDeployer::connect(&profile, self.confirmations).await?;

        let deploy = Deploy::new(deployer, config, self.artifacts);
        let result = deploy
            .run(&self.contract, self.constructor_arg, &mut io::stdout())
            .await?;

        if let Some(url) = profile.explorer_address_url(result.contract_address) {
            log::info!("explorer: {}", url);
        }
        Ok(())
    }
}
