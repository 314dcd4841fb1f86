//! Contract creation and the deployment store.

use std::path::{Path, PathBuf};

use alloy_core::{
    json_abi::JsonAbi,
    primitives::{Address, B256, Bytes},
};
use alloy_sol_types::SolConstructor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    LotteryError,
    artifacts::ContractArtifact,
    chain::{Chain, TxRequest},
    context::LotteryContext,
    contracts::{LOTTERY_CONTRACT, Lottery},
    resolver::NetworkParameters,
};

/// Name of the file holding the chain ID next to the records of a network.
pub const CHAIN_ID_FILENAME: &str = ".chainId";

/// A successful contract creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    pub transaction_hash: B256,
    pub block_number: u64,
    /// ABI-encoded constructor arguments, as submitted for source verification.
    pub constructor_args: Bytes,
    pub confirmations_waited: u64,
    /// SHA-256 of the init code the contract was created from.
    pub bytecode_hash: String,
    pub abi: JsonAbi,
    /// Unix timestamp of the deployment.
    pub deployed_at: u64,
}

/// Deployment records of one network, stored as `<deployments_dir>/<network>/<Name>.json`.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: PathBuf,
}

impl DeploymentStore {
    pub fn new(deployments_dir: &Path, network: &str) -> Self {
        Self {
            dir: deployments_dir.join(network),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, contract_name: &str) -> PathBuf {
        self.dir.join(format!("{contract_name}.json"))
    }

    /// Save a record, replacing any previous record of the same contract.
    pub fn save(&self, record: &DeploymentRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.record_path(&record.contract_name);
        let json = serde_json::to_string_pretty(record)
            .context("Failed to serialize deployment record")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write deployment record to {}", path.display()))?;

        tracing::debug!(path = %path.display(), contract = %record.contract_name, "Deployment record saved");
        Ok(path)
    }

    /// Write the chain ID of the network next to its records.
    pub fn save_chain_id(&self, chain_id: u64) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.dir.join(CHAIN_ID_FILENAME);
        std::fs::write(&path, chain_id.to_string())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Load the record of a contract, `None` if it was never deployed.
    pub fn load(&self, contract_name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(contract_name);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read deployment record {}", path.display()))?;

        let record = serde_json::from_str(&content).map_err(|err| LotteryError::MalformedState {
            path: path.clone(),
            reason: err.to_string(),
        })?;

        Ok(Some(record))
    }

    /// Load the record of a contract that must have been deployed.
    pub fn require(&self, contract_name: &str) -> Result<DeploymentRecord> {
        self.load(contract_name)?.with_context(|| {
            format!(
                "No deployment of {contract_name} in {}. Run `lottery deploy` first.",
                self.dir.display()
            )
        })
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Create a contract from its artifact and wait for `confirmations`.
///
/// Rejections, receipt failures and reverted creations are all reported as
/// [`LotteryError::DeploymentFailure`]. Nothing is retried.
pub async fn deploy_contract<C: Chain>(
    chain: &C,
    artifact: &ContractArtifact,
    constructor_args: Bytes,
    confirmations: u64,
) -> Result<DeploymentRecord> {
    let failure = |reason: String| LotteryError::DeploymentFailure {
        contract: artifact.name.clone(),
        reason,
    };

    tracing::info!(contract = %artifact.name, deployer = %chain.sender(), "Deploying contract");

    let tx = TxRequest::create(artifact.init_code(&constructor_args));
    let tx_hash = chain
        .send_transaction(tx)
        .await
        .map_err(|err| failure(format!("{err:#}")))?;

    tracing::debug!(contract = %artifact.name, %tx_hash, confirmations, "Waiting for creation receipt");

    let receipt = chain
        .wait_for_receipt(tx_hash, confirmations)
        .await
        .map_err(|err| failure(format!("{err:#}")))?;

    if !receipt.status {
        return Err(failure(format!("creation transaction {tx_hash} reverted")).into());
    }

    let address = receipt
        .contract_address
        .ok_or_else(|| failure(format!("receipt of {tx_hash} has no contract address")))?;

    tracing::info!(
        contract = %artifact.name,
        %address,
        block = receipt.block_number,
        "Contract deployed"
    );

    Ok(DeploymentRecord {
        contract_name: artifact.name.clone(),
        address,
        transaction_hash: tx_hash,
        block_number: receipt.block_number,
        constructor_args,
        confirmations_waited: confirmations,
        bytecode_hash: artifact.bytecode_hash(),
        abi: artifact.abi.clone(),
        deployed_at: now_unix(),
    })
}

/// Deploy the lottery with the resolved parameters and store the record.
pub async fn deploy_lottery<C: Chain>(
    ctx: &LotteryContext<C>,
    params: &NetworkParameters,
) -> Result<DeploymentRecord> {
    let artifact = ctx.artifact(LOTTERY_CONTRACT)?;

    let constructor_args = Lottery::constructorCall {
        vrfCoordinatorV2: params.oracle_coordinator,
        minContribution: params.minimum_entry,
        gasLane: params.gas_lane,
        subscriptionId: params.subscription_id,
        interval: params.interval,
        callbackGasLimit: params.callback_gas_limit,
    }
    .abi_encode();

    let record = deploy_contract(
        &ctx.chain,
        &artifact,
        constructor_args.into(),
        ctx.confirmations(),
    )
    .await?;

    let store = ctx.store();
    store.save(&record)?;
    store.save_chain_id(ctx.entry.chain_id)?;

    Ok(record)
}
