//! The value threaded through every deployment step and operator script.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};

use crate::{
    LotteryError,
    artifacts::ContractArtifact,
    chain::{Chain, JsonRpcChain, TxSigner},
    config::{FrontendConfig, LotteryConfig, VerificationConfig},
    deployer::DeploymentStore,
    network::{NetworkEntry, NetworkKind, NetworkProfile},
    rpc::RpcClient,
};

/// Secrets supplied by the operator, never read from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Hex private key of the deployer.
    pub private_key: Option<String>,
    /// BIP-39 mnemonic of the deployer (first account is used).
    pub mnemonic: Option<String>,
    /// API key of the source verification service.
    pub etherscan_api_key: Option<String>,
}

/// Everything an operation needs to know about the network it runs against.
#[derive(Debug)]
pub struct LotteryContext<C> {
    pub chain: C,
    pub network: String,
    pub entry: NetworkEntry,
    pub profile: NetworkProfile,
    /// Root of the contracts project, where verification reads the sources from.
    pub project_root: PathBuf,
    pub artifacts_dir: PathBuf,
    pub deployments_dir: PathBuf,
    pub frontend: FrontendConfig,
    pub verification: VerificationConfig,
    pub etherscan_api_key: Option<String>,
}

impl<C: Chain> LotteryContext<C> {
    /// Build a context for `network` around an existing chain client.
    ///
    /// Paths of the configuration are resolved against its project root.
    pub fn new(chain: C, config: &LotteryConfig, network: &str) -> Result<Self, LotteryError> {
        let entry = config.networks.get(network)?.clone();
        let profile = entry.profile();

        let frontend = FrontendConfig {
            enabled: config.frontend.enabled,
            addresses_file: config.resolve(&config.frontend.addresses_file),
            abi_file: config.resolve(&config.frontend.abi_file),
        };

        Ok(Self {
            chain,
            network: network.to_string(),
            entry,
            profile,
            project_root: config.project_root.clone(),
            artifacts_dir: config.resolve(&config.artifacts_dir),
            deployments_dir: config.resolve(&config.deployments_dir),
            frontend,
            verification: config.verification.clone(),
            etherscan_api_key: None,
        })
    }

    /// Set the verification API key. Empty keys count as absent.
    pub fn with_etherscan_api_key(mut self, api_key: Option<String>) -> Self {
        self.etherscan_api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// Confirmations to wait for after each transaction.
    pub fn confirmations(&self) -> u64 {
        self.profile.required_confirmations
    }

    /// The deployment store of this network.
    pub fn store(&self) -> DeploymentStore {
        DeploymentStore::new(&self.deployments_dir, &self.network)
    }

    /// Load a compiled contract artifact.
    pub fn artifact(&self, name: &str) -> Result<ContractArtifact> {
        ContractArtifact::load(&self.artifacts_dir, name)
    }

    /// Check that the node serves the chain declared in the network table.
    pub async fn ensure_chain_id(&self) -> Result<()> {
        let actual = self
            .chain
            .chain_id()
            .await
            .with_context(|| format!("Failed to query chain ID of network `{}`", self.network))?;

        if actual != self.entry.chain_id {
            return Err(LotteryError::ConfigurationMissing {
                network: self.network.clone(),
                detail: format!(
                    "node reports chain ID {actual}, network table declares {}",
                    self.entry.chain_id
                ),
            }
            .into());
        }

        Ok(())
    }
}

impl LotteryContext<JsonRpcChain> {
    /// Connect to the JSON-RPC endpoint of `network`.
    ///
    /// The deployer is the private key or mnemonic when one is given. Otherwise local
    /// networks use the first unlocked account of the node and public networks fail.
    pub async fn connect(
        config: &LotteryConfig,
        network: &str,
        credentials: Credentials,
    ) -> Result<Self> {
        let entry = config.networks.get(network)?;
        let rpc = RpcClient::new(entry.rpc_url.clone())?;

        let signer = match (&credentials.private_key, &credentials.mnemonic) {
            (Some(key), _) => TxSigner::from_private_key(key)?,
            (None, Some(phrase)) => TxSigner::from_mnemonic(phrase)?,
            (None, None) if entry.kind == NetworkKind::Local => {
                TxSigner::Unlocked(JsonRpcChain::first_node_account(&rpc).await?)
            }
            (None, None) => {
                return Err(LotteryError::ConfigurationMissing {
                    network: network.to_string(),
                    detail: "no deployer key, set PRIVATE_KEY or MNEMONIC".to_string(),
                }
                .into());
            }
        };

        tracing::info!(
            network,
            rpc_url = %entry.rpc_url,
            deployer = %signer.address(),
            "Connecting to network"
        );

        let chain = JsonRpcChain::new(rpc, signer)
            .receipt_timeout(Duration::from_secs(config.receipt_timeout_secs));
        let ctx = Self::new(chain, config, network)?
            .with_etherscan_api_key(credentials.etherscan_api_key);
        ctx.ensure_chain_id().await?;

        Ok(ctx)
    }
}
