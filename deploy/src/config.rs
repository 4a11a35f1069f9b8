use std::{collections::BTreeMap, env, fmt, fs, io::Write, path::Path};

use anyhow::{anyhow, Context, Result};
use ethers::types::H160;
use serde::{Deserialize, Serialize};

pub const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

const DEFAULT_SOLC_VERSION: &str = "0.8.4";
const DEFAULT_ETHERSCAN_API_KEY_ENV_VAR: &str = "ETHERSCAN_API_KEY";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub version: String,
}

/// A network as written in the config file. Holds no secrets: the API key
/// appended to `url` is read from `api_key_env` at resolution time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub chain_id: u64,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherscanConfig {
    pub api_key_env: String,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_ETHERSCAN_API_KEY_ENV_VAR.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub solidity: CompilerConfig,
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub etherscan: EtherscanConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            "goerli".to_string(),
            NetworkConfig {
                url: "https://eth-goerli.g.alchemy.com/v2".to_string(),
                api_key_env: Some("GOERLI_API_KEY".to_string()),
                chain_id: 5,
                explorer_url: Some("https://goerli.etherscan.io".to_string()),
            },
        );
        networks.insert(
            "mainnet".to_string(),
            NetworkConfig {
                url: "https://eth-mainnet.g.alchemy.com/v2".to_string(),
                api_key_env: Some("MAINNET_API_KEY".to_string()),
                chain_id: 1,
                explorer_url: Some("https://etherscan.io".to_string()),
            },
        );
        networks.insert(
            "localhost".to_string(),
            NetworkConfig {
                url: "http://127.0.0.1:8545".to_string(),
                api_key_env: None,
                chain_id: 31337,
                explorer_url: None,
            },
        );

        Self {
            solidity: CompilerConfig {
                version: DEFAULT_SOLC_VERSION.to_string(),
            },
            networks,
            etherscan: EtherscanConfig::default(),
        }
    }
}

/// Everything needed to talk to one network, resolved for this run.
#[derive(Clone, PartialEq)]
pub struct NetworkProfile {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub signing_key: String,
    pub explorer_url: Option<String>,
}

impl NetworkProfile {
    pub fn explorer_address_url(&self, address: H160) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/address/{:?}", base.trim_end_matches('/'), address))
    }
}

// rpc_url carries an API key and signing_key is the deployer's secret.
impl fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("name", &self.name)
            .field("rpc_url", &"<redacted>")
            .field("chain_id", &self.chain_id)
            .field("signing_key", &"<redacted>")
            .field("explorer_url", &self.explorer_url)
            .finish()
    }
}

impl DeployConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        log::info!(
            "loaded config from {}: {} network(s)",
            path.display(),
            config.networks.len()
        );
        Ok(config)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).ok_or(anyhow!(
            "unknown network {:?}, configured networks: {}",
            name,
            self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
        ))
    }

    pub fn resolve(&self, name: &str) -> Result<NetworkProfile> {
        self.resolve_with(name, |key| env::var(key).ok())
    }

    pub fn resolve_with<F>(&self, name: &str, lookup: F) -> Result<NetworkProfile>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = self.network(name)?;

        let rpc_url = match &network.api_key_env {
            Some(key_env) => {
                let api_key = non_empty(lookup(key_env.as_str()))
                    .ok_or(anyhow!("{} is not set, needed for network {}", key_env, name))?;
                format!("{}/{}", network.url.trim_end_matches('/'), api_key)
            }
            None => network.url.clone(),
        };

        let private_key = non_empty(lookup(PRIVATE_KEY_ENV_VAR))
            .ok_or(anyhow!("{} is not set", PRIVATE_KEY_ENV_VAR))?;
        let signing_key = format!(
            "0x{}",
            private_key.strip_prefix("0x").unwrap_or(&private_key)
        );

        Ok(NetworkProfile {
            name: name.to_string(),
            rpc_url,
            chain_id: network.chain_id,
            signing_key,
            explorer_url: network.explorer_url.clone(),
        })
    }

    pub fn etherscan_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(lookup(self.etherscan.api_key_env.as_str()))
    }

    /// Writes the network table without resolving any secret.
    pub fn write_summary<W, F>(&self, out: &mut W, lookup: F) -> Result<()>
    where
        W: Write,
        F: Fn(&str) -> Option<String>,
    {
        writeln!(out, "solidity {}", self.solidity.version)?;
        for (name, network) in &self.networks {
            let url = match &network.api_key_env {
                Some(key_env) => {
                    let state = if non_empty(lookup(key_env.as_str())).is_some() {
                        "set"
                    } else {
                        "unset"
                    };
                    format!(
                        "{}/<${}: {}>",
                        network.url.trim_end_matches('/'),
                        key_env,
                        state
                    )
                }
                None => network.url.clone(),
            };
            writeln!(out, "{}\tchain {}\t{}", name, network.chain_id, url)?;
        }
        let etherscan = if self.etherscan_api_key_with(&lookup).is_some() {
            "set"
        } else {
            "unset"
        };
        writeln!(out, "etherscan ${}: {}", self.etherscan.api_key_env, etherscan)?;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
