//! Chain access used by every deployment step and operator script.
//!
//! [`Chain`] is the seam between the workflow and the node: [`JsonRpcChain`] talks to a
//! real JSON-RPC endpoint, tests use an in-memory simulator.

mod json_rpc;
pub use json_rpc::{JsonRpcChain, TxSigner};

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::rpc::deserialize_u64_from_hex;

/// A transaction to be sent by the chain's signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    /// Recipient, or `None` for a contract creation.
    pub to: Option<Address>,
    /// Wei attached to the transaction.
    pub value: U256,
    /// Calldata, or init code for a creation.
    pub input: Bytes,
}

impl TxRequest {
    /// A contract creation with the given init code.
    pub fn create(init_code: Bytes) -> Self {
        Self {
            to: None,
            value: U256::ZERO,
            input: init_code,
        }
    }

    /// A call to `to` with the given calldata.
    pub fn call(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            value: U256::ZERO,
            input: input.into(),
        }
    }

    /// Attach a value to the transaction.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A log emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The subset of a transaction receipt the workflow reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    pub block_number: u64,
    #[serde(deserialize_with = "deserialize_status")]
    pub status: bool,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_u64_from_hex(deserializer)? == 1)
}

/// Access to an EVM chain through a single signing identity.
pub trait Chain: Send + Sync {
    /// The address transactions are sent from.
    fn sender(&self) -> Address;

    /// The chain ID reported by the node.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The runtime bytecode at `address` (empty when no contract lives there).
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Execute a read-only call against the latest block.
    fn call(&self, to: Address, input: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// Sign and submit a transaction, returning its hash.
    fn send_transaction(&self, tx: TxRequest) -> impl Future<Output = Result<B256>> + Send;

    /// Wait until the transaction is mined and `confirmations` blocks include it.
    fn wait_for_receipt(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// Move the chain clock forward (development nodes only).
    fn increase_time(&self, seconds: u64) -> impl Future<Output = Result<()>> + Send;

    /// Mine a block (development nodes only).
    fn mine(&self) -> impl Future<Output = Result<()>> + Send;
}
