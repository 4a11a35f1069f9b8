use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use ethers::{types::H160, utils::to_checksum};

use crate::{artifact::ContractArtifact, config::DeployConfig, deployer::ContractDeployer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentResult {
    pub contract_address: H160,
}

pub struct Deploy<D> {
    deployer: D,
    artifacts_dir: PathBuf,
    solc_version: String,
}

impl<D: ContractDeployer> Deploy<D> {
    pub fn new(deployer: D, config: &DeployConfig, artifacts_dir: PathBuf) -> Self {
        Self {
            deployer,
            artifacts_dir,
            solc_version: config.solidity.version.clone(),
        }
    }

    /// Deploys `contract_name` once and writes its address to `out`.
    /// Nothing is written unless the deployment is confirmed.
    pub async fn run<W: Write>(
        &self,
        contract_name: &str,
        constructor_arg: H160,
        out: &mut W,
    ) -> Result<DeploymentResult> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, contract_name)?;
        artifact.check_compiler(&self.solc_version)?;

        let contract_address = self
            .deployer
            .deploy(&artifact, constructor_arg)
            .await
            .with_context(|| format!("failed to deploy {}", artifact.contract_name))?;

        writeln!(
            out,
            "{} deployed to address: {}",
            artifact.contract_name,
            to_checksum(&contract_address, None)
        )?;

        Ok(DeploymentResult { contract_address })
    }
}
