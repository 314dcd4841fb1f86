//! [`Chain`] implementation backed by a JSON-RPC endpoint.

use std::{str::FromStr, time::Duration};

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_core::primitives::{Address, B256, Bytes, TxKind};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use anyhow::{Context, Result};
use serde_json::{Value, json};

use super::{Chain, TxReceipt, TxRequest};
use crate::rpc::{self, RpcClient, parse_hex_u64};

/// Default time to wait for a transaction to be mined and confirmed.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Extra gas added on top of `eth_estimateGas`, in percent.
const GAS_LIMIT_MARGIN_PERCENT: u64 = 20;

/// How transactions are signed.
#[derive(Debug, Clone)]
pub enum TxSigner {
    /// The node holds the key and signs `eth_sendTransaction` requests
    /// (development nodes expose such accounts through `eth_accounts`).
    Unlocked(Address),
    /// The key is held locally and raw transactions are submitted.
    Local(PrivateKeySigner),
}

impl TxSigner {
    /// Signer from a hex-encoded private key.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(key.trim()).context("Invalid private key")?;
        Ok(Self::Local(signer))
    }

    /// Signer for the first account derived from a BIP-39 mnemonic.
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase.trim())
            .index(0u32)
            .context("Invalid derivation index")?
            .build()
            .context("Failed to derive key from mnemonic")?;
        Ok(Self::Local(signer))
    }

    /// The address transactions are sent from.
    pub fn address(&self) -> Address {
        match self {
            Self::Unlocked(address) => *address,
            Self::Local(signer) => signer.address(),
        }
    }
}

/// A chain reached over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcChain {
    rpc: RpcClient,
    signer: TxSigner,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl JsonRpcChain {
    /// Create a chain client sending transactions with `signer`.
    pub fn new(rpc: RpcClient, signer: TxSigner) -> Self {
        Self {
            rpc,
            signer,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: rpc::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how long to wait for receipts and confirmations.
    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// The first account managed by the node (`eth_accounts[0]`).
    pub async fn first_node_account(rpc: &RpcClient) -> Result<Address> {
        let accounts: Vec<Address> = rpc
            .call("eth_accounts", vec![])
            .await
            .context("Failed to list node accounts")?;

        accounts
            .into_iter()
            .next()
            .context("The node does not manage any account; provide a private key")
    }

    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<u64> {
        let raw: String = self.rpc.call(method, params).await?;
        parse_hex_u64(&raw).with_context(|| format!("Invalid quantity `{raw}` from {method}"))
    }

    async fn quantity_u128(&self, method: &str) -> Result<u128> {
        let raw: String = self.rpc.call(method, vec![]).await?;
        u128::from_str_radix(raw.trim_start_matches("0x"), 16)
            .with_context(|| format!("Invalid quantity `{raw}` from {method}"))
    }

    fn call_object(&self, tx: &TxRequest) -> Value {
        let mut object = json!({
            "from": self.signer.address(),
            "value": tx.value,
            "data": tx.input,
        });
        if let Some(to) = tx.to {
            object["to"] = json!(to);
        }
        object
    }

    async fn send_signed(&self, signer: &PrivateKeySigner, tx: &TxRequest) -> Result<B256> {
        let chain_id = self.chain_id().await?;
        let nonce = self
            .quantity(
                "eth_getTransactionCount",
                vec![json!(signer.address()), json!("pending")],
            )
            .await
            .context("Failed to fetch nonce")?;

        // A revert surfaces here, before anything is broadcast.
        let estimated_gas = self
            .quantity("eth_estimateGas", vec![self.call_object(tx)])
            .await
            .context("Failed to estimate gas")?;
        let gas_limit = estimated_gas + estimated_gas * GAS_LIMIT_MARGIN_PERCENT / 100;

        let gas_price = self.quantity_u128("eth_gasPrice").await?;
        let max_fee_per_gas = gas_price.saturating_mul(2);
        let max_priority_fee_per_gas = match self.quantity_u128("eth_maxPriorityFeePerGas").await {
            Ok(tip) => tip.min(max_fee_per_gas),
            Err(err) => {
                tracing::debug!(error = %err, "eth_maxPriorityFeePerGas unavailable, using gas price");
                gas_price
            }
        };

        let unsigned = TxEip1559 {
            chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: tx.to.map_or(TxKind::Create, TxKind::Call),
            value: tx.value,
            input: tx.input.clone(),
            ..Default::default()
        };

        let signature = signer
            .sign_hash_sync(&unsigned.signature_hash())
            .context("Failed to sign transaction")?;
        let envelope: TxEnvelope = unsigned.into_signed(signature).into();
        let raw = Bytes::from(envelope.encoded_2718());

        tracing::debug!(nonce, gas_limit, max_fee_per_gas, "Sending raw transaction");

        self.rpc
            .call("eth_sendRawTransaction", vec![json!(raw)])
            .await
            .context("Failed to send raw transaction")
    }
}

impl Chain for JsonRpcChain {
    fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn chain_id(&self) -> Result<u64> {
        self.quantity("eth_chainId", vec![])
            .await
            .context("Failed to fetch chain ID")
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.rpc
            .call("eth_getCode", vec![json!(address), json!("latest")])
            .await
            .with_context(|| format!("Failed to fetch code at {address}"))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes> {
        self.rpc
            .call(
                "eth_call",
                vec![
                    json!({ "from": self.signer.address(), "to": to, "data": input }),
                    json!("latest"),
                ],
            )
            .await
            .with_context(|| format!("eth_call to {to} failed"))
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        match &self.signer {
            TxSigner::Unlocked(_) => self
                .rpc
                .call("eth_sendTransaction", vec![self.call_object(&tx)])
                .await
                .context("Failed to send transaction"),
            TxSigner::Local(signer) => self.send_signed(signer, &tx).await,
        }
    }

    async fn wait_for_receipt(&self, tx_hash: B256, confirmations: u64) -> Result<TxReceipt> {
        let receipt: TxReceipt = rpc::poll_until(
            "transaction receipt",
            self.receipt_timeout,
            self.poll_interval,
            || async move {
                self.rpc
                    .call::<Option<TxReceipt>>("eth_getTransactionReceipt", vec![json!(tx_hash)])
                    .await
            },
        )
        .await
        .with_context(|| format!("Transaction {tx_hash} was not mined"))?;

        if confirmations > 1 {
            let target = receipt.block_number + confirmations - 1;
            tracing::info!(%tx_hash, confirmations, "Waiting for confirmations...");

            rpc::poll_until(
                "block confirmations",
                self.receipt_timeout,
                self.poll_interval,
                || async move {
                    let head = self.quantity("eth_blockNumber", vec![]).await?;
                    Ok((head >= target).then_some(()))
                },
            )
            .await
            .with_context(|| format!("Transaction {tx_hash} did not reach {confirmations} confirmations"))?;
        }

        Ok(receipt)
    }

    async fn increase_time(&self, seconds: u64) -> Result<()> {
        let _: Value = self
            .rpc
            .call("evm_increaseTime", vec![json!(seconds)])
            .await
            .context("Failed to increase chain time")?;
        Ok(())
    }

    async fn mine(&self) -> Result<()> {
        let _: Value = self
            .rpc
            .call("evm_mine", vec![])
            .await
            .context("Failed to mine a block")?;
        Ok(())
    }
}
