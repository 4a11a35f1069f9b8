use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ethers::{
    contract::ContractFactory,
    middleware::SignerMiddleware,
    providers::{Http, JsonRpcClient, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::H160,
    utils::hex,
};

use crate::{
    artifact::ContractArtifact,
    config::{NetworkProfile, PRIVATE_KEY_ENV_VAR},
};

pub type SignerClient<P = Http> = SignerMiddleware<Provider<P>, LocalWallet>;

/// Submits one contract creation and waits for it to be mined.
pub(crate) trait ContractDeployer {
    async fn deploy(&self, artifact: &ContractArtifact, constructor_arg: H160) -> Result<H160>;
}

pub struct EthersDeployer<P = Http> {
    client: Arc<SignerClient<P>>,
    confirmations: usize,
}

impl EthersDeployer {
    pub async fn connect(profile: &NetworkProfile, confirmations: usize) -> Result<Self> {
        let wallet = wallet(profile)?;
        let provider = Provider::<Http>::try_from(profile.rpc_url.as_str())
            .map_err(|_| anyhow!("invalid rpc url for network {}", profile.name))?;

        Self::with_provider(provider, wallet, profile, confirmations).await
    }
}

impl<P: JsonRpcClient + 'static> EthersDeployer<P> {
    /// Checks the node's chain id against the profile before signing anything.
    pub async fn with_provider(
        provider: Provider<P>,
        wallet: LocalWallet,
        profile: &NetworkProfile,
        confirmations: usize,
    ) -> Result<Self> {
        let chain_id = provider
            .get_chainid()
            .await
            .with_context(|| format!("failed to reach network {}", profile.name))?
            .as_u64();
        if chain_id != profile.chain_id {
            return Err(anyhow!(
                "network {} is configured with chain id {} but the node reports {}",
                profile.name,
                profile.chain_id,
                chain_id
            ));
        }
        log::info!(
            "connected to {} (chain id {}) as {:?}",
            profile.name,
            chain_id,
            wallet.address()
        );

        let client = Arc::new(SignerMiddleware::new(
            provider,
            wallet.with_chain_id(chain_id),
        ));
        Ok(Self {
            client,
            confirmations,
        })
    }
}

impl<P: JsonRpcClient + 'static> ContractDeployer for EthersDeployer<P> {
    async fn deploy(&self, artifact: &ContractArtifact, constructor_arg: H160) -> Result<H160> {
        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            self.client.clone(),
        );

        log::info!(
            "deploying {} with constructor argument {:?}",
            artifact.qualified_name(),
            constructor_arg
        );
        let (contract, receipt) = factory
            .deploy(constructor_arg)?
            .legacy()
            .confirmations(self.confirmations)
            .send_with_receipt()
            .await?;
        log::info!(
            "transaction hash:{:?} block:{:?} gas used:{:?}",
            receipt.transaction_hash,
            receipt.block_number,
            receipt.gas_used
        );

        Ok(contract.address())
    }
}

/// Builds the signer before any network I/O so a bad key fails fast.
pub fn wallet(profile: &NetworkProfile) -> Result<LocalWallet> {
    let key = profile
        .signing_key
        .strip_prefix("0x")
        .unwrap_or(&profile.signing_key);
    let bytes = hex::decode(key).map_err(|_| anyhow!("{} is not valid hex", PRIVATE_KEY_ENV_VAR))?;
    if bytes.len() != 32 {
        return Err(anyhow!(
            "{} must be 32 bytes, got {}",
            PRIVATE_KEY_ENV_VAR,
            bytes.len()
        ));
    }
    LocalWallet::from_bytes(&bytes)
        .map_err(|_| anyhow!("{} is not a valid secp256k1 key", PRIVATE_KEY_ENV_VAR))
}
