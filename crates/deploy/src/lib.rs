//! lottery-deploy - Deployment library for the VRF lottery.
//!
//! This crate deploys the lottery contract on local or public networks, wires it to
//! the VRF coordinator, publishes the files the frontend reads, and provides the
//! operator scripts that drive the lottery during local testing.

mod error;
pub use error::LotteryError;

mod rpc;
pub use rpc::{DEFAULT_POLL_INTERVAL, RpcClient, poll_until};

pub mod chain;
pub use chain::{Chain, JsonRpcChain, LogEntry, TxReceipt, TxRequest, TxSigner};

mod network;
pub use network::{
    DEFAULT_GAS_LANE, LOCAL_CHAIN_ID, NetworkEntry, NetworkKind, NetworkProfile, NetworkTable,
    SEPOLIA_VRF_COORDINATOR,
};

mod config;
pub use config::{CONFIG_FILENAME, FrontendConfig, LotteryConfig, VerificationConfig};

mod context;
pub use context::{Credentials, LotteryContext};

pub mod artifacts;
pub mod contracts;

mod tx;
pub use tx::TransactionOutcome;

mod deployer;
pub use deployer::{
    CHAIN_ID_FILENAME, DeploymentRecord, DeploymentStore, deploy_contract, deploy_lottery,
};

mod resolver;
pub use resolver::{
    MOCK_BASE_FEE, MOCK_GAS_PRICE_LINK, NetworkParameters, SUBSCRIPTION_FUND_AMOUNT,
    create_funded_subscription, ensure_simulator, resolve_parameters,
};

pub mod verify;

mod wiring;
pub use wiring::{VerificationOutcome, register_consumer, verify_deployment};

mod frontend;
pub use frontend::{AddressUpdate, FrontendAddressMap, FrontendPublisher};

pub mod scripts;

mod pipeline;
pub use pipeline::{DeploySummary, DeployTag, run_deploy};

#[cfg(test)]
mod test_utils;
