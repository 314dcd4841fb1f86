//! Static per-network configuration and the capability profile derived from it.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256, U256, address, b256, utils::parse_ether};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::LotteryError;

/// Chain ID used by local development nodes (hardhat, anvil).
pub const LOCAL_CHAIN_ID: u64 = 31337;

/// Gas lane (key hash) shared by the built-in entries.
pub const DEFAULT_GAS_LANE: B256 =
    b256!("0x474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c");

/// VRF coordinator v2 deployed on Sepolia.
pub const SEPOLIA_VRF_COORDINATOR: Address = address!("0x8103b0a8a00be2ddc778e6e7eaa21791cd364625");

/// Whether a network is a disposable development chain or a public one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NetworkKind {
    /// Development chain: randomness is simulated and the clock can be moved.
    Local,
    /// Public chain backed by the real randomness oracle network.
    Public,
}

/// One entry of the network table.
///
/// Fields needed for the lottery constructor are optional here: a public entry may
/// be declared before its subscription exists. Resolution reports the first
/// missing field as [`LotteryError::ConfigurationMissing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    /// The chain ID, also used as key of the frontend address map.
    pub chain_id: u64,
    /// The JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Local or public network.
    pub kind: NetworkKind,
    /// Confirmations to wait for after a transaction on this network.
    #[serde(default = "default_block_confirmations")]
    pub block_confirmations: u64,
    /// Address of the VRF coordinator. Unused on local networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_coordinator: Option<Address>,
    /// VRF subscription funding the lottery requests. Unused on local networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<u64>,
    /// Key hash selecting the VRF fee tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_lane: Option<B256>,
    /// Gas limit for the randomness fulfilment callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_gas_limit: Option<u32>,
    /// Seconds between two draws.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// Minimum entry amount in ether, e.g. `"0.01"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_entry: Option<String>,
}

fn default_block_confirmations() -> u64 {
    1
}

impl NetworkEntry {
    /// The capability profile of this network.
    pub fn profile(&self) -> NetworkProfile {
        match self.kind {
            NetworkKind::Local => NetworkProfile {
                has_randomness_simulator: true,
                required_confirmations: 1,
                supports_verification: false,
            },
            NetworkKind::Public => NetworkProfile {
                has_randomness_simulator: false,
                required_confirmations: self.block_confirmations.max(1),
                supports_verification: true,
            },
        }
    }

    /// The minimum entry amount in wei.
    pub fn minimum_entry_wei(&self, network: &str) -> anyhow::Result<U256> {
        let raw = self
            .minimum_entry
            .as_deref()
            .ok_or_else(|| LotteryError::missing_field(network, "minimum_entry"))?;

        parse_ether(raw).with_context(|| {
            format!("Invalid minimum_entry `{raw}` for network `{network}`")
        })
    }
}

/// What a network supports, selected once when the context is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkProfile {
    /// A VRF coordinator simulator must be deployed and driven by hand.
    pub has_randomness_simulator: bool,
    /// Confirmations to wait for after each transaction.
    pub required_confirmations: u64,
    /// Deployed contracts may be submitted for source verification.
    pub supports_verification: bool,
}

/// Network table keyed by network name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkTable(pub BTreeMap<String, NetworkEntry>);

impl NetworkTable {
    /// Look up a network by name.
    pub fn get(&self, network: &str) -> Result<&NetworkEntry, LotteryError> {
        self.0
            .get(network)
            .ok_or_else(|| LotteryError::ConfigurationMissing {
                network: network.to_string(),
                detail: "network is not declared in the network table".to_string(),
            })
    }

    /// Iterate over entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &NetworkEntry)> {
        self.0.iter()
    }
}

impl Default for NetworkTable {
    fn default() -> Self {
        let local = |rpc_url: &str| NetworkEntry {
            chain_id: LOCAL_CHAIN_ID,
            rpc_url: Url::parse(rpc_url).expect("static URL is valid"),
            kind: NetworkKind::Local,
            block_confirmations: 1,
            vrf_coordinator: None,
            subscription_id: None,
            gas_lane: Some(DEFAULT_GAS_LANE),
            callback_gas_limit: Some(500_000),
            interval: Some(30),
            minimum_entry: Some("0.01".to_string()),
        };

        let mut networks = BTreeMap::new();
        networks.insert("hardhat".to_string(), local("http://127.0.0.1:8545"));
        networks.insert("localhost".to_string(), local("http://127.0.0.1:8545"));
        networks.insert(
            "sepolia".to_string(),
            NetworkEntry {
                chain_id: 11155111,
                rpc_url: Url::parse("https://ethereum-sepolia-rpc.publicnode.com")
                    .expect("static URL is valid"),
                kind: NetworkKind::Public,
                block_confirmations: 6,
                vrf_coordinator: Some(SEPOLIA_VRF_COORDINATOR),
                subscription_id: Some(1),
                gas_lane: Some(DEFAULT_GAS_LANE),
                callback_gas_limit: Some(500_000),
                interval: Some(30),
                minimum_entry: Some("0.01".to_string()),
            },
        );

        Self(networks)
    }
}
